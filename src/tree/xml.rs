use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{Content, Element};
use crate::error::{FeedError, Result};

struct Frame {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: Vec<String>,
}

impl Frame {
    fn new(start: &BytesStart) -> Result<Frame> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            attributes.push((key, attr.unescape_value()?.into_owned()));
        }
        Ok(Frame {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            children: Vec::new(),
            text: Vec::new(),
        })
    }

    fn push_text(&mut self, raw: &str) {
        let t = raw.trim();
        if !t.is_empty() {
            self.text.push(t.to_string());
        }
    }

    fn finish(self) -> Element {
        let text = if self.text.is_empty() {
            None
        } else {
            Some(self.text.join(" "))
        };
        let content = if self.attributes.is_empty() && self.children.is_empty() {
            Content::Leaf(text)
        } else {
            Content::Node {
                attributes: self.attributes,
                children: self.children,
                text,
            }
        };
        Element {
            name: self.name,
            content,
        }
    }
}

/// Parse an XML document into its root element. Declarations, comments and
/// processing instructions are dropped; text is trimmed per run.
pub fn parse(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(Frame::new(&e)?),
            Event::Empty(e) => {
                let el = Frame::new(&e)?.finish();
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| FeedError::Shape("unbalanced end tag".into()))?;
                attach(&mut stack, &mut root, frame.finish())?;
            }
            Event::Text(e) => {
                if let Some(top) = stack.last_mut() {
                    top.push_text(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(top) = stack.last_mut() {
                    top.push_text(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(FeedError::Shape(format!("unclosed element <{}>", stack[0].name)));
    }
    root.ok_or_else(|| FeedError::Shape("document has no root element".into()))
}

fn attach(stack: &mut [Frame], root: &mut Option<Element>, el: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_none() => *root = Some(el),
        None => return Err(FeedError::Shape(format!("second root element <{}>", el.name))),
    }
    Ok(())
}

/// Serialize with an XML declaration and 4-space indentation.
pub fn write(root: &Element) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    write_element(&mut writer, root)?;
    let mut out = String::from_utf8(writer.into_inner())
        .map_err(|e| FeedError::Shape(e.to_string()))?;
    out.push('\n');
    Ok(out)
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<()> {
    if !is_xml_name(&el.name) {
        return Err(FeedError::Shape(format!("`{}` is not a valid element name", el.name)));
    }
    match &el.content {
        Content::Leaf(None) => {
            writer.write_event(Event::Empty(BytesStart::new(el.name.as_str())))?;
        }
        Content::Leaf(Some(text)) => {
            writer.write_event(Event::Start(BytesStart::new(el.name.as_str())))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
        }
        Content::Node {
            attributes,
            children,
            text,
        } => {
            let mut start = BytesStart::new(el.name.as_str());
            for (k, v) in attributes {
                start.push_attribute((k.as_str(), v.as_str()));
            }
            if children.is_empty() && text.is_none() {
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }
            writer.write_event(Event::Start(start))?;
            if let Some(t) = text {
                writer.write_event(Event::Text(BytesText::new(t)))?;
            }
            for child in children {
                write_element(writer, child)?;
            }
            writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
        }
    }
    Ok(())
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
