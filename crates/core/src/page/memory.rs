use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use super::{Document, Element, PageError, ScrollOptions, Selector};

/// Plain-data view of one element in a [`MemoryDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub tag: String,
    pub id: Option<String>,
    pub classes: BTreeSet<String>,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
}

impl ElementSnapshot {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            classes: BTreeSet::new(),
            attributes: BTreeMap::new(),
            text: String::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.insert(class.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Space-separated class list, as it would appear in markup.
    #[must_use]
    pub fn class_attr(&self) -> String {
        self.classes.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    fn matches(&self, selector: Selector<'_>) -> bool {
        match selector {
            Selector::Id(id) => self.id.as_deref() == Some(id),
            Selector::Class(class) => self.has_class(class),
            Selector::Tag(tag) => self.tag.eq_ignore_ascii_case(tag),
        }
    }
}

/// Observable change in a [`MemoryDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Mutated { index: usize },
    Scrolled {
        id: Option<String>,
        options: ScrollOptions,
    },
}

type PageListener = Rc<dyn Fn(&PageEvent)>;

#[derive(Default)]
struct DocumentState {
    elements: Vec<ElementSnapshot>,
    events: Vec<PageEvent>,
    listeners: Vec<PageListener>,
}

/// In-memory document used by tests and by hosts that render the page themselves.
///
/// Only real changes are recorded: adding a class that is already present does not
/// produce a `Mutated` event.
#[derive(Clone, Default)]
pub struct MemoryDocument {
    state: Rc<RefCell<DocumentState>>,
}

impl MemoryDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element and return its index.
    pub fn insert(&self, element: ElementSnapshot) -> usize {
        let mut state = self.state.borrow_mut();
        state.elements.push(element);
        state.elements.len() - 1
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ElementSnapshot> {
        self.state.borrow().elements.clone()
    }

    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<ElementSnapshot> {
        self.state
            .borrow()
            .elements
            .iter()
            .find(|el| el.id.as_deref() == Some(id))
            .cloned()
    }

    #[must_use]
    pub fn events(&self) -> Vec<PageEvent> {
        self.state.borrow().events.clone()
    }

    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|event| matches!(event, PageEvent::Mutated { .. }))
            .count()
    }

    /// Ids of scrolled elements, oldest first.
    #[must_use]
    pub fn scrolled_ids(&self) -> Vec<Option<String>> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|event| match event {
                PageEvent::Scrolled { id, .. } => Some(id.clone()),
                PageEvent::Mutated { .. } => None,
            })
            .collect()
    }

    /// Register a listener notified after every recorded event.
    pub fn subscribe(&self, listener: impl Fn(&PageEvent) + 'static) {
        self.state.borrow_mut().listeners.push(Rc::new(listener));
    }

    fn handle(&self, index: usize) -> Rc<dyn Element> {
        Rc::new(MemoryElement {
            document: self.clone(),
            index,
        })
    }

    fn update(
        &self,
        index: usize,
        apply: impl FnOnce(&mut ElementSnapshot) -> bool,
    ) -> Result<(), PageError> {
        let changed = {
            let mut state = self.state.borrow_mut();
            let element = state.elements.get_mut(index).ok_or(PageError::Detached)?;
            apply(element)
        };
        if changed {
            self.record(PageEvent::Mutated { index });
        }
        Ok(())
    }

    fn record(&self, event: PageEvent) {
        let listeners = {
            let mut state = self.state.borrow_mut();
            state.events.push(event.clone());
            state.listeners.clone()
        };
        for listener in listeners {
            listener(&event);
        }
    }
}

impl Document for MemoryDocument {
    fn elements_by_class(&self, class: &str) -> Vec<Rc<dyn Element>> {
        let indices: Vec<usize> = self
            .state
            .borrow()
            .elements
            .iter()
            .enumerate()
            .filter(|(_, el)| el.has_class(class))
            .map(|(index, _)| index)
            .collect();
        indices.into_iter().map(|index| self.handle(index)).collect()
    }

    fn query_selector(&self, selector: &str) -> Result<Option<Rc<dyn Element>>, PageError> {
        let selector = Selector::parse(selector)?;
        let index = self
            .state
            .borrow()
            .elements
            .iter()
            .position(|el| el.matches(selector));
        Ok(index.map(|index| self.handle(index)))
    }

    fn element_by_id(&self, id: &str) -> Option<Rc<dyn Element>> {
        let index = self
            .state
            .borrow()
            .elements
            .iter()
            .position(|el| el.id.as_deref() == Some(id));
        index.map(|index| self.handle(index))
    }
}

struct MemoryElement {
    document: MemoryDocument,
    index: usize,
}

impl Element for MemoryElement {
    fn id(&self) -> Option<String> {
        self.document
            .state
            .borrow()
            .elements
            .get(self.index)
            .and_then(|el| el.id.clone())
    }

    fn add_class(&self, class: &str) -> Result<(), PageError> {
        self.document
            .update(self.index, |el| el.classes.insert(class.to_string()))
    }

    fn remove_class(&self, class: &str) -> Result<(), PageError> {
        self.document
            .update(self.index, |el| el.classes.remove(class))
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), PageError> {
        self.document.update(self.index, |el| {
            el.attributes.insert(name.to_string(), value.to_string()).as_deref() != Some(value)
        })
    }

    fn scroll_into_view(&self, options: ScrollOptions) -> Result<(), PageError> {
        let id = self.id();
        self.document.record(PageEvent::Scrolled { id, options });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn sample_page() -> MemoryDocument {
        let doc = MemoryDocument::new();
        doc.insert(ElementSnapshot::new("div").with_id("delayed-anchor"));
        doc.insert(
            ElementSnapshot::new("section")
                .with_id("delayed-content")
                .with_class("atomicat-delay")
                .with_attribute("aria-hidden", "true"),
        );
        doc.insert(ElementSnapshot::new("div").with_class("atomicat-delay"));
        doc
    }

    #[test]
    fn queries_by_class_id_and_selector() {
        let doc = sample_page();
        assert_eq!(doc.elements_by_class("atomicat-delay").len(), 2);
        assert!(doc.element_by_id("delayed-anchor").is_some());
        let content = doc.query_selector("#delayed-content").unwrap().unwrap();
        assert_eq!(content.id().as_deref(), Some("delayed-content"));
        assert!(doc.query_selector("#missing").unwrap().is_none());
        assert!(doc.query_selector("a b").is_err());
    }

    #[test]
    fn records_only_real_mutations() {
        let doc = sample_page();
        let content = doc.element_by_id("delayed-content").unwrap();
        content.add_class("show").unwrap();
        content.add_class("show").unwrap();
        content.set_attribute("aria-hidden", "false").unwrap();
        content.set_attribute("aria-hidden", "false").unwrap();
        content.remove_class("missing").unwrap();
        assert_eq!(doc.mutation_count(), 2);

        let snapshot = doc.find_by_id("delayed-content").unwrap();
        assert!(snapshot.has_class("show"));
        assert_eq!(snapshot.attribute("aria-hidden"), Some("false"));
        assert_eq!(snapshot.class_attr(), "atomicat-delay show");
    }

    #[test]
    fn scrolls_are_logged_with_element_id() {
        let doc = sample_page();
        let anchor = doc.element_by_id("delayed-anchor").unwrap();
        anchor.scroll_into_view(ScrollOptions::to_top()).unwrap();
        assert_eq!(doc.scrolled_ids(), vec![Some("delayed-anchor".to_string())]);
    }

    #[test]
    fn listeners_see_every_event() {
        let doc = sample_page();
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        doc.subscribe(move |_| counter.set(counter.get() + 1));

        for el in doc.elements_by_class("atomicat-delay") {
            el.remove_class("atomicat-delay").unwrap();
        }
        assert_eq!(seen.get(), 2);
        assert!(doc.elements_by_class("atomicat-delay").is_empty());
    }
}
