use reveal_core::page::{ARIA_HIDDEN, ElementSnapshot};

/// One page element as the landing view renders it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageElementVm {
    pub key: String,
    pub tag: String,
    pub id: Option<String>,
    pub class: String,
    pub aria_hidden: Option<String>,
    pub text: String,
    pub hidden: bool,
}

/// Map the document model; elements carrying `delay_class` are hidden.
#[must_use]
pub fn map_page_elements(elements: &[ElementSnapshot], delay_class: &str) -> Vec<PageElementVm> {
    elements
        .iter()
        .enumerate()
        .map(|(index, element)| PageElementVm {
            key: element
                .id
                .clone()
                .unwrap_or_else(|| format!("element-{index}")),
            tag: element.tag.clone(),
            id: element.id.clone(),
            class: element.class_attr(),
            aria_hidden: element.attribute(ARIA_HIDDEN).map(str::to_string),
            text: element.text.clone(),
            hidden: element.has_class(delay_class),
        })
        .collect()
}
