use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{FeedError, Result};
use crate::model::FeedItem;
use crate::tree::{normalize, Element, Format, Value};

pub const LAST_UPDATED: &str = "last_updated";

/// Element and key names of one feed kind.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Output file stem, e.g. `ios_appstore_latest`.
    pub stem: &'static str,
    /// Root element of the tree encoding.
    pub root: &'static str,
    /// Repeated item element under the root.
    pub item: &'static str,
    /// Sequence key of the flat encodings.
    pub collection: &'static str,
}

pub const IOS_APPSTORE: Layout = Layout {
    stem: "ios_appstore_latest",
    root: "latest",
    item: "package",
    collection: "packages",
};

pub const MACOS_APPSTORE: Layout = Layout {
    stem: "macos_appstore_latest",
    root: "latest",
    item: "package",
    collection: "packages",
};

pub const UPDATE_HISTORY: Layout = Layout {
    stem: "macos_standalone_update_history",
    root: "releases",
    item: "release",
    collection: "releases",
};

pub const CVE_HISTORY: Layout = Layout {
    stem: "mac_standalone_cve_history",
    root: "updates",
    item: "update",
    collection: "updates",
};

pub const STANDALONE: Layout = Layout {
    stem: "macos_standalone_latest",
    root: "latest",
    item: "package",
    collection: "packages",
};

pub const LAYOUTS: [&Layout; 5] = [&IOS_APPSTORE, &MACOS_APPSTORE, &UPDATE_HISTORY, &CVE_HISTORY, &STANDALONE];

impl Layout {
    /// Layout whose file stem matches `path`, if any.
    pub fn for_path(path: &Path) -> Option<&'static Layout> {
        let stem = path.file_stem()?.to_str()?;
        LAYOUTS.into_iter().find(|l| l.stem == stem)
    }
}

/// Run timestamp written as `last_updated`.
pub fn timestamp() -> String {
    Utc::now().format("%B %d, %Y %I:%M %p UTC").to_string()
}

pub struct Feed<T> {
    pub last_updated: String,
    pub items: Vec<T>,
}

impl<T: FeedItem> Feed<T> {
    pub fn new(items: Vec<T>) -> Feed<T> {
        Feed {
            last_updated: timestamp(),
            items,
        }
    }

    pub fn to_tree(&self, layout: &Layout) -> Element {
        let mut children = Vec::with_capacity(self.items.len() + 1);
        children.push(Element::leaf(LAST_UPDATED, self.last_updated.as_str()));
        children.extend(self.items.iter().map(|i| {
            let mut el = i.to_element();
            el.name = layout.item.to_string();
            el
        }));
        Element::node(layout.root, children)
    }
}

/// Reshape a normalized tree into `{last_updated, <collection>: [...]}`.
///
/// The collection is always a sequence, however many items the run produced.
pub fn flat_document(tree: &Element, layout: &Layout) -> Value {
    let body = normalize::normalize(tree);
    let last_updated = body.get(LAST_UPDATED).cloned().unwrap_or(Value::Null);
    let items: Vec<Value> = body
        .get(layout.item)
        .map(|v| v.items().into_iter().cloned().collect())
        .unwrap_or_default();
    Value::Map(vec![
        (LAST_UPDATED.to_string(), last_updated),
        (layout.collection.to_string(), Value::Seq(items)),
    ])
}

/// Inverse of [`flat_document`].
pub fn tree_from_flat(doc: &Value, layout: &Layout) -> Result<Element> {
    let last_updated = doc.get(LAST_UPDATED).cloned().unwrap_or(Value::Null);
    let items = doc.get(layout.collection).map(Value::items).unwrap_or_default();
    let body = Value::Map(vec![
        (LAST_UPDATED.to_string(), last_updated),
        (layout.item.to_string(), Value::Seq(items.into_iter().cloned().collect())),
    ]);
    normalize::from_document(&Value::Map(vec![(layout.root.to_string(), body)]))
}

/// Render one encoding of the feed tree.
pub fn render(tree: &Element, layout: &Layout, format: Format) -> Result<String> {
    match format {
        Format::Xml => crate::tree::xml::write(tree),
        other => other.encoding().encode(&flat_document(tree, layout)),
    }
}

/// Write all three encodings into `dir`, each atomically. Returns the paths written.
pub fn write_all(tree: &Element, layout: &Layout, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(Format::ALL.len());
    for format in Format::ALL {
        let path = dir.join(format!("{}.{}", layout.stem, format.extension()));
        write_atomic(&path, &render(tree, layout, format)?)?;
        info!("Data saved to {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Temp file in the target directory, then rename over the target.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| FeedError::Io(e.error))?;
    Ok(())
}

/// Read a persisted feed in any encoding back to its flat form.
pub fn read_flat(path: &Path, layout: &Layout) -> Result<Value> {
    let format = Format::from_path(path)
        .ok_or_else(|| FeedError::Shape(format!("unknown feed extension: {}", path.display())))?;
    let input = std::fs::read_to_string(path)?;
    match format {
        Format::Xml => Ok(flat_document(&crate::tree::xml::parse(&input)?, layout)),
        other => other.encoding().decode(&input),
    }
}

/// Re-encode a file. Known feed files keep their feed shape in every
/// encoding; anything else goes through the plain document mapping.
pub fn convert(input: &Path, to: Format) -> Result<String> {
    if let Some(layout) = Layout::for_path(input) {
        let tree = tree_from_flat(&read_flat(input, layout)?, layout)?;
        return render(&tree, layout, to);
    }
    let from = Format::from_path(input)
        .ok_or_else(|| FeedError::Shape(format!("unknown extension: {}", input.display())))?;
    let doc = from.encoding().decode(&std::fs::read_to_string(input)?)?;
    to.encoding().encode(&doc)
}
