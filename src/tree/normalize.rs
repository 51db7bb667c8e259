//! Tagged tree <-> key-ordered value.
//!
//! Rules:
//! - a leaf becomes its trimmed text (or null when empty);
//! - a node becomes a mapping: child keys in first-seen order, then
//!   attributes, then any own text under [`TEXT_KEY`];
//! - siblings sharing a tag collapse into a sequence, a single occurrence
//!   stays bare.

use super::{Content, Element};
use crate::error::{FeedError, Result};

pub const TEXT_KEY: &str = "#text";

/// Key-ordered value. Mappings are a list of pairs so insertion order is
/// part of the type, not a property of some map implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Text(String),
    Seq(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl Value {
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Sequence view: a bare value counts as a one-element sequence, null as empty.
    pub fn items(&self) -> Vec<&Value> {
        match self {
            Value::Seq(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        match self {
            Value::Map(entries) => entries.iter().map(|(k, _)| k.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

/// Normalize the body of one element (its tag is not included).
pub fn normalize(el: &Element) -> Value {
    match &el.content {
        Content::Leaf(Some(text)) => trimmed(text),
        Content::Leaf(None) => Value::Null,
        Content::Node {
            attributes,
            children,
            text,
        } => {
            let mut grouped: Vec<(String, Vec<Value>)> = Vec::new();
            for child in children {
                let value = normalize(child);
                match grouped.iter_mut().find(|(k, _)| *k == child.name) {
                    Some((_, values)) => values.push(value),
                    None => grouped.push((child.name.clone(), vec![value])),
                }
            }

            let mut entries: Vec<(String, Value)> = grouped
                .into_iter()
                .map(|(k, mut values)| {
                    let v = if values.len() == 1 {
                        values.remove(0)
                    } else {
                        Value::Seq(values)
                    };
                    (k, v)
                })
                .collect();

            for (k, v) in attributes {
                insert(&mut entries, k, Value::Text(v.clone()));
            }
            if let Some(t) = text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                insert(&mut entries, TEXT_KEY, Value::Text(t.to_string()));
            }
            Value::Map(entries)
        }
    }
}

/// Trimmed text, or null when nothing is left.
fn trimmed(text: &str) -> Value {
    match text.trim() {
        "" => Value::Null,
        t => Value::Text(t.to_string()),
    }
}

fn insert(entries: &mut Vec<(String, Value)>, key: &str, value: Value) {
    match entries.iter_mut().find(|(k, _)| k == key) {
        Some((_, slot)) => *slot = value,
        None => entries.push((key.to_string(), value)),
    }
}

/// Whole document: `{root_tag: normalize(root)}`.
pub fn to_document(root: &Element) -> Value {
    Value::Map(vec![(root.name.clone(), normalize(root))])
}

/// Inverse of [`to_document`]. Mapping keys come back as child elements,
/// so attributes return as children.
pub fn from_document(doc: &Value) -> Result<Element> {
    match doc {
        Value::Map(entries) if entries.len() == 1 => {
            let (name, body) = &entries[0];
            let mut els = expand(name, body)?;
            if els.len() != 1 {
                return Err(FeedError::Shape(format!("root `{}` must not be a sequence", name)));
            }
            Ok(els.remove(0))
        }
        _ => Err(FeedError::Shape("document must be a mapping with exactly one root key".into())),
    }
}

fn expand(name: &str, value: &Value) -> Result<Vec<Element>> {
    Ok(match value {
        Value::Null => vec![Element::empty(name)],
        Value::Text(t) => vec![Element::leaf(name, t.as_str())],
        Value::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if matches!(item, Value::Seq(_)) {
                    return Err(FeedError::Shape(format!("nested sequence under `{}`", name)));
                }
                out.extend(expand(name, item)?);
            }
            out
        }
        Value::Map(entries) => {
            let mut children = Vec::new();
            let mut text = None;
            for (k, v) in entries {
                if k == TEXT_KEY {
                    text = v.as_str().map(str::to_string);
                } else {
                    children.extend(expand(k, v)?);
                }
            }
            vec![Element {
                name: name.to_string(),
                content: Content::Node {
                    attributes: Vec::new(),
                    children,
                    text,
                },
            }]
        }
    })
}
