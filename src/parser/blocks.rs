use scraper::{ElementRef, Html, Selector};

use crate::error::{FeedError, Result};
use crate::model::LinkEntry;
use crate::tree::clean_text;

/// Flat, document-ordered view of the parts of a page the extractors care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Emphasis(String),
    /// One `<ul>`/`<ol>`: one entry per hyperlink, or one link-less entry per
    /// item that has no hyperlink.
    List(Vec<LinkEntry>),
}

/// Classify everything under the first element matching `container`.
pub fn classify_html(html: &str, container: &str) -> Result<Vec<Block>> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse(container).map_err(|_| FeedError::Selector(container.to_string()))?;
    let root = doc
        .select(&selector)
        .next()
        .ok_or_else(|| FeedError::MissingContainer(container.to_string()))?;

    let mut blocks = Vec::new();
    walk(root, &mut blocks);
    Ok(blocks)
}

fn walk(el: ElementRef, blocks: &mut Vec<Block>) {
    for child in el.children().filter_map(ElementRef::wrap) {
        let name = child.value().name();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name.as_bytes()[1] - b'0';
                // Headings with no text carry nothing to key on.
                if let Some(text) = element_text(child) {
                    blocks.push(Block::Heading { level, text });
                }
            }
            "em" => {
                if let Some(text) = element_text(child) {
                    blocks.push(Block::Emphasis(text));
                }
            }
            "ul" | "ol" => blocks.push(Block::List(list_entries(child))),
            "script" | "style" | "template" | "noscript" => {}
            _ => walk(child, blocks),
        }
    }
}

fn list_entries(list: ElementRef) -> Vec<LinkEntry> {
    let mut entries = Vec::new();
    for item in list
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "li")
    {
        let links = anchors(item);
        if links.is_empty() {
            if let Some(text) = element_text(item) {
                entries.push(LinkEntry {
                    display_name: text,
                    target: None,
                });
            }
        } else {
            entries.extend(links);
        }
    }
    entries
}

/// Every `<a>` under `el`, in document order.
pub(crate) fn anchors(el: ElementRef) -> Vec<LinkEntry> {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "a")
        .map(|a| LinkEntry {
            display_name: element_text(a).unwrap_or_default(),
            target: a.value().attr("href").map(|h| h.trim().to_string()),
        })
        .collect()
}

pub(crate) fn element_text(el: ElementRef) -> Option<String> {
    clean_text(&el.text().collect::<String>())
}
