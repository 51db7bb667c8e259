use std::path::Path;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::normalize::{self, Value};
use super::xml;
use crate::error::{FeedError, Result};

/// One textual encoding of a normalized document.
pub trait Encoding {
    fn encode(&self, doc: &Value) -> Result<String>;
    fn decode(&self, input: &str) -> Result<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Xml,
    Json,
    Yaml,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Xml, Format::Json, Format::Yaml];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Xml => "xml",
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }

    pub fn from_path(path: &Path) -> Option<Format> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "xml" => Some(Format::Xml),
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    pub fn encoding(self) -> &'static dyn Encoding {
        match self {
            Format::Xml => &XmlEncoding,
            Format::Json => &JsonEncoding,
            Format::Yaml => &YamlEncoding,
        }
    }
}

pub struct XmlEncoding;
pub struct JsonEncoding;
pub struct YamlEncoding;

impl Encoding for XmlEncoding {
    fn encode(&self, doc: &Value) -> Result<String> {
        xml::write(&normalize::from_document(doc)?)
    }

    fn decode(&self, input: &str) -> Result<Value> {
        Ok(normalize::to_document(&xml::parse(input)?))
    }
}

impl Encoding for JsonEncoding {
    fn encode(&self, doc: &Value) -> Result<String> {
        let mut buf = Vec::new();
        let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
        doc.serialize(&mut ser)?;
        buf.push(b'\n');
        String::from_utf8(buf).map_err(|e| FeedError::Shape(e.to_string()))
    }

    fn decode(&self, input: &str) -> Result<Value> {
        let raw: serde_json::Value = serde_json::from_str(input)?;
        Ok(from_json(raw))
    }
}

impl Encoding for YamlEncoding {
    fn encode(&self, doc: &Value) -> Result<String> {
        Ok(serde_yaml::to_string(doc)?)
    }

    fn decode(&self, input: &str) -> Result<Value> {
        let raw: serde_yaml::Value = serde_yaml::from_str(input)?;
        from_yaml(raw)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

// serde_json is built with `preserve_order`, so object iteration is document order.
fn from_json(raw: serde_json::Value) -> Value {
    match raw {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Text(b.to_string()),
        serde_json::Value::Number(n) => Value::Text(n.to_string()),
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => Value::Seq(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(obj) => {
            Value::Map(obj.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

fn from_yaml(raw: serde_yaml::Value) -> Result<Value> {
    Ok(match raw {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Text(b.to_string()),
        serde_yaml::Value::Number(n) => Value::Text(n.to_string()),
        serde_yaml::Value::String(s) => Value::Text(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Seq(items.into_iter().map(from_yaml).collect::<Result<_>>()?)
        }
        serde_yaml::Value::Mapping(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (k, v) in map {
                let key = match from_yaml(k)? {
                    Value::Text(s) => s,
                    other => return Err(FeedError::Shape(format!("non-scalar mapping key {:?}", other))),
                };
                entries.push((key, from_yaml(v)?));
            }
            Value::Map(entries)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Element;

    fn sample_tree() -> Element {
        Element::node(
            "latest",
            vec![
                Element::leaf("last_updated", "June 01, 2024 10:00 AM UTC"),
                Element::node(
                    "package",
                    vec![
                        Element::leaf("name", "iOS Microsoft Word"),
                        Element::leaf("version", "2.86"),
                        Element::leaf("releaseNotes", "Line one\nLine: two"),
                        Element::empty("icon_image"),
                    ],
                ),
                Element::node(
                    "package",
                    vec![
                        Element::leaf("name", "iOS Microsoft Excel"),
                        Element::leaf("version", "true"),
                        Element::leaf("releaseNotes", "N/A"),
                        Element::leaf("icon_image", "https://x/i.png"),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn json_and_yaml_decode_to_the_same_document() {
        let doc = normalize::to_document(&sample_tree());
        let json = Format::Json.encoding().encode(&doc).unwrap();
        let yaml = Format::Yaml.encoding().encode(&doc).unwrap();
        let from_json = Format::Json.encoding().decode(&json).unwrap();
        let from_yaml = Format::Yaml.encoding().decode(&yaml).unwrap();
        assert_eq!(from_json, from_yaml);
        assert_eq!(from_json, doc);
    }

    #[test]
    fn json_keeps_source_order_not_alphabetical() {
        let doc = normalize::to_document(&sample_tree());
        let json = Format::Json.encoding().encode(&doc).unwrap();
        let name = json.find("\"name\"").unwrap();
        let version = json.find("\"version\"").unwrap();
        let notes = json.find("\"releaseNotes\"").unwrap();
        let icon = json.find("\"icon_image\"").unwrap();
        assert!(name < version && version < notes && notes < icon);
        assert!(json.contains("\n        \"last_updated\""));
    }

    #[test]
    fn yaml_keeps_source_order_not_alphabetical() {
        let doc = normalize::to_document(&sample_tree());
        let yaml = Format::Yaml.encoding().encode(&doc).unwrap();
        let name = yaml.find("name:").unwrap();
        let version = yaml.find("version:").unwrap();
        let icon = yaml.find("icon_image:").unwrap();
        assert!(name < version && version < icon);
    }

    #[test]
    fn xml_encoding_goes_through_the_tree() {
        let tree = sample_tree();
        let doc = normalize::to_document(&tree);
        let xml = Format::Xml.encoding().encode(&doc).unwrap();
        assert_eq!(crate::tree::xml::parse(&xml).unwrap(), tree);
        assert_eq!(Format::Xml.encoding().decode(&xml).unwrap(), doc);
    }

    #[test]
    fn json_scalars_become_text() {
        let v = Format::Json
            .encoding()
            .decode(r#"{"a": {"n": 3, "b": false, "z": null}}"#)
            .unwrap();
        let a = v.get("a").unwrap();
        assert_eq!(a.get("n"), Some(&Value::Text("3".into())));
        assert_eq!(a.get("b"), Some(&Value::Text("false".into())));
        assert_eq!(a.get("z"), Some(&Value::Null));
        assert_eq!(a.keys(), vec!["n", "b", "z"]);
    }

    #[test]
    fn format_from_path() {
        assert_eq!(Format::from_path(Path::new("a/feed.YML")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("feed.json")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("feed.txt")), None);
    }
}
