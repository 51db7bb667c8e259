use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, info};

use crate::error::Result;
use crate::feed::{self, Layout, LAST_UPDATED};
use crate::model::NOT_AVAILABLE;
use crate::tree::Value;

const README_TEMPLATE: &str = include_str!("../readme_template.md");

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap());

/// One feed's packages, looked up by product name.
#[derive(Debug, Clone, Default)]
pub struct FeedIndex {
    pub last_updated: Option<String>,
    packages: Vec<Package>,
}

#[derive(Debug, Clone)]
struct Package {
    /// Lowercased `name`.
    key: String,
    fields: Vec<(String, String)>,
}

impl FeedIndex {
    pub fn load(path: &Path, layout: &Layout) -> Result<FeedIndex> {
        info!("Reading feed {}", path.display());
        let index = FeedIndex::from_flat(&feed::read_flat(path, layout)?, layout);
        debug!("{} packages in {}", index.packages.len(), path.display());
        Ok(index)
    }

    /// Build from a flat `{last_updated, <collection>: [...]}` document.
    /// Items without a textual `name` cannot be looked up and are dropped.
    pub fn from_flat(doc: &Value, layout: &Layout) -> FeedIndex {
        let last_updated = doc.get(LAST_UPDATED).and_then(Value::as_str).map(str::to_string);
        let packages = doc
            .get(layout.collection)
            .map(Value::items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let Value::Map(entries) = item else {
                    return None;
                };
                let name = item.get("name")?.as_str()?;
                let fields = entries
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect();
                Some(Package {
                    key: name.to_lowercase(),
                    fields,
                })
            })
            .collect();
        FeedIndex { last_updated, packages }
    }

    /// Case-insensitive on both product and field. Missing data is `None`.
    pub fn lookup(&self, product: &str, field: &str) -> Option<&str> {
        let product = product.to_lowercase();
        self.packages
            .iter()
            .find(|p| p.key == product)?
            .fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(field))
            .map(|(_, v)| v.as_str())
    }

    fn field<'a>(package: &'a Package, field: &str) -> &'a str {
        package
            .fields
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.as_str())
            .unwrap_or(NOT_AVAILABLE)
    }

    /// Markdown rows for an app-store feed, in feed order.
    pub fn package_rows(&self) -> String {
        let mut out = String::new();
        for p in &self.packages {
            let app = FeedIndex::field(p, "application_name");
            out.push_str(&format!(
                "| {} | `{}` | {} | <img src=\"{}\" alt=\"{}\" width=\"40\"> |\n",
                app,
                FeedIndex::field(p, "version"),
                FeedIndex::field(p, "bundleId"),
                FeedIndex::field(p, "icon_image"),
                app
            ));
        }
        out.trim_end().to_string()
    }
}

/// Feeds a report draws from.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub standalone: FeedIndex,
    pub ios: FeedIndex,
    pub macos: FeedIndex,
}

impl Sources {
    fn get(&self, name: &str) -> Option<&FeedIndex> {
        match name.to_lowercase().as_str() {
            "standalone" => Some(&self.standalone),
            "ios" => Some(&self.ios),
            "macos" => Some(&self.macos),
            _ => None,
        }
    }

    /// `source.last_updated` or `source.Product Name.field`.
    fn resolve(&self, placeholder: &str) -> Option<String> {
        let (source, rest) = placeholder.split_once('.')?;
        let index = self.get(source)?;
        if rest == LAST_UPDATED {
            return index.last_updated.clone();
        }
        let (product, field) = rest.rsplit_once('.')?;
        index.lookup(product, field).map(str::to_string)
    }
}

/// Substitute every `{{...}}` in `template`. Anything unresolved becomes `N/A`.
pub fn render(template: &str, sources: &Sources, generated_at: &str) -> String {
    let mut missing = 0usize;
    let out = PLACEHOLDER_RE.replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        let value = match key {
            "generated_at" => Some(generated_at.to_string()),
            "ios_table" => Some(sources.ios.package_rows()),
            "macos_table" => Some(sources.macos.package_rows()),
            _ => sources.resolve(key),
        };
        value.unwrap_or_else(|| {
            debug!("Unresolved placeholder {}", key);
            missing += 1;
            NOT_AVAILABLE.to_string()
        })
    });
    if missing > 0 {
        info!("{} placeholders had no data", missing);
    }
    out.into_owned()
}

pub fn render_readme(sources: &Sources, generated_at: &str) -> String {
    render(README_TEMPLATE, sources, generated_at)
}
