//! Tagged tree shared by every feed encoding.
//!
//! An [`Element`] is either a leaf (text only) or a node carrying
//! attributes, ordered children and any trimmed text of its own. The XML
//! encoding reads and writes this tree directly; the key-ordered encodings
//! go through [`normalize`].

pub mod encode;
pub mod normalize;
pub mod xml;

pub use encode::Format;
pub use normalize::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub content: Content,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// No attributes, no children. `None` when the element is empty.
    Leaf(Option<String>),
    Node {
        attributes: Vec<(String, String)>,
        children: Vec<Element>,
        text: Option<String>,
    },
}

impl Element {
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Element {
        Element {
            name: name.into(),
            content: Content::Leaf(Some(text.into())),
        }
    }

    pub fn empty(name: impl Into<String>) -> Element {
        Element {
            name: name.into(),
            content: Content::Leaf(None),
        }
    }

    /// Leaf holding `text`, or an empty element when absent.
    pub fn optional(name: impl Into<String>, text: Option<&str>) -> Element {
        match text {
            Some(t) => Element::leaf(name, t),
            None => Element::empty(name),
        }
    }

    pub fn node(name: impl Into<String>, children: Vec<Element>) -> Element {
        Element {
            name: name.into(),
            content: Content::Node {
                attributes: Vec::new(),
                children,
                text: None,
            },
        }
    }

    pub fn children(&self) -> &[Element] {
        match &self.content {
            Content::Leaf(_) => &[],
            Content::Node { children, .. } => children,
        }
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children().iter().find(|c| c.name == name)
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Leaf(text) | Content::Node { text, .. } => text.as_deref(),
        }
    }
}

/// Collapse whitespace runs and trim; `None` when nothing is left.
pub(crate) fn clean_text(raw: &str) -> Option<String> {
    let t = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}
