//! The demo landing page, expressed as a [`MemoryDocument`].

use reveal_core::RevealConfig;
use reveal_core::page::{ANCHOR_ELEMENT_ID, ARIA_HIDDEN, ElementSnapshot, MemoryDocument, Selector};

/// Id of the fallback container when the configured selector is not an id.
const FALLBACK_CONTENT_ID: &str = "delayed-content";

/// Build the page the controller will act on.
///
/// Contains the anchor, the delayed container matched by the configured
/// selector, a second delayed call-to-action and, when configured, the scroll
/// target.
#[must_use]
pub fn build_landing_page(config: &RevealConfig) -> MemoryDocument {
    let document = MemoryDocument::new();

    document.insert(
        ElementSnapshot::new("h1")
            .with_id("headline")
            .with_text("Watch the full presentation"),
    );
    document.insert(
        ElementSnapshot::new("p")
            .with_id("intro")
            .with_text("The offer below unlocks once you have watched enough of the video."),
    );
    document.insert(ElementSnapshot::new("div").with_id(ANCHOR_ELEMENT_ID));
    document.insert(content_container(config));
    document.insert(
        ElementSnapshot::new("a")
            .with_id("delayed-cta")
            .with_class(config.delay_class())
            .with_text("Claim your seat"),
    );

    if let Some(target) = config.scroll_to_id() {
        if document.find_by_id(target).is_none() {
            document.insert(
                ElementSnapshot::new("section")
                    .with_id(target)
                    .with_text("Frequently asked questions"),
            );
        }
    }

    document
}

fn content_container(config: &RevealConfig) -> ElementSnapshot {
    let base = match Selector::parse(config.delayed_content_selector()) {
        Ok(Selector::Id(id)) => ElementSnapshot::new("section").with_id(id),
        Ok(Selector::Class(class)) => ElementSnapshot::new("section")
            .with_id(FALLBACK_CONTENT_ID)
            .with_class(class),
        Ok(Selector::Tag(tag)) => ElementSnapshot::new(tag).with_id(FALLBACK_CONTENT_ID),
        Err(err) => {
            tracing::warn!(error = %err, "content selector cannot be matched by the demo page");
            ElementSnapshot::new("section").with_id(FALLBACK_CONTENT_ID)
        }
    };
    base.with_class(config.delay_class())
        .with_attribute(ARIA_HIDDEN, "true")
        .with_text("Special offer: enrolment is open for the next 48 hours.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reveal_core::RevealConfigDraft;

    #[test]
    fn default_page_hides_the_content() {
        let config = RevealConfig::default();
        let page = build_landing_page(&config);
        let content = page.find_by_id("delayed-content").unwrap();
        assert!(content.has_class("atomicat-delay"));
        assert_eq!(content.attribute("aria-hidden"), Some("true"));
        assert!(page.find_by_id(ANCHOR_ELEMENT_ID).is_some());
    }

    #[test]
    fn class_selector_gets_a_matching_container() {
        let mut draft = RevealConfigDraft::new().with_scroll_to_id("faq");
        draft.delayed_content_selector = Some(".offer".into());
        let page = build_landing_page(&draft.validate().unwrap());

        let content = page.find_by_id("delayed-content").unwrap();
        assert!(content.has_class("offer"));
        assert!(page.find_by_id("faq").is_some());
    }
}
