use chrono::NaiveDate;

use crate::tree::Element;

pub const NOT_AVAILABLE: &str = "N/A";

/// Long-form date used by the documentation headings and the feeds.
pub const LONG_DATE: &str = "%B %d, %Y";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub display_name: String,
    pub target: Option<String>,
}

impl LinkEntry {
    pub fn not_available() -> LinkEntry {
        LinkEntry {
            display_name: NOT_AVAILABLE.to_string(),
            target: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub entries: Vec<LinkEntry>,
}

/// One dated section of the release-notes page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRecord {
    pub date: NaiveDate,
    /// Heading text as it appeared on the page.
    pub date_text: String,
    pub label: Option<String>,
    /// Never empty: a section without groups carries the N/A sentinel group.
    pub groups: Vec<Group>,
}

impl SectionRecord {
    pub fn sentinel_groups() -> Vec<Group> {
        vec![Group {
            name: NOT_AVAILABLE.to_string(),
            entries: vec![LinkEntry::not_available()],
        }]
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// One row of the update-history table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub date: String,
    pub version: String,
    /// Suite installer that bundles Teams.
    pub businesspro_suite_download: Option<String>,
    pub suite_download: Option<String>,
    /// `(slot key, url)` per app update package, in table order.
    pub app_updates: Vec<(String, String)>,
}

impl ReleaseRecord {
    /// Derived: no download slot was populated.
    pub fn archived(&self) -> bool {
        self.businesspro_suite_download.is_none()
            && self.suite_download.is_none()
            && self.app_updates.is_empty()
    }

    pub fn app_update(&self, key: &str) -> Option<&str> {
        self.app_updates
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// App-store package; every field is filled, `N/A` when upstream had nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub application_name: String,
    pub bundle_id: String,
    pub current_version_release_date: String,
    pub icon_image: String,
    pub minimum_os_version: String,
    pub release_notes: String,
    pub version: String,
}

/// Schema key -> accessor, in feed order (after `name`).
pub const PACKAGE_FIELDS: [&str; 7] = [
    "application_name",
    "bundleId",
    "currentVersionReleaseDate",
    "icon_image",
    "minimumOsVersion",
    "releaseNotes",
    "version",
];

impl PackageRecord {
    pub fn not_available(name: &str) -> PackageRecord {
        let na = || NOT_AVAILABLE.to_string();
        PackageRecord {
            name: name.to_string(),
            application_name: na(),
            bundle_id: na(),
            current_version_release_date: na(),
            icon_image: na(),
            minimum_os_version: na(),
            release_notes: na(),
            version: na(),
        }
    }

    pub fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        Some(match key {
            "application_name" => &mut self.application_name,
            "bundleId" => &mut self.bundle_id,
            "currentVersionReleaseDate" => &mut self.current_version_release_date,
            "icon_image" => &mut self.icon_image,
            "minimumOsVersion" => &mut self.minimum_os_version,
            "releaseNotes" => &mut self.release_notes,
            "version" => &mut self.version,
            _ => return None,
        })
    }

    fn fields(&self) -> [(&'static str, &str); 8] {
        [
            ("name", &self.name),
            ("application_name", &self.application_name),
            ("bundleId", &self.bundle_id),
            ("currentVersionReleaseDate", &self.current_version_release_date),
            ("icon_image", &self.icon_image),
            ("minimumOsVersion", &self.minimum_os_version),
            ("releaseNotes", &self.release_notes),
            ("version", &self.version),
        ]
    }
}

/// A record kind that can be carried in a [`crate::feed::Feed`].
pub trait FeedItem {
    fn to_element(&self) -> Element;
}

impl FeedItem for PackageRecord {
    fn to_element(&self) -> Element {
        Element::node(
            "package",
            self.fields()
                .iter()
                .map(|(k, v)| Element::leaf(*k, *v))
                .collect(),
        )
    }
}

impl FeedItem for ReleaseRecord {
    fn to_element(&self) -> Element {
        let mut children = vec![
            Element::leaf("date", self.date.as_str()),
            Element::leaf("version", self.version.as_str()),
        ];
        if let Some(url) = &self.businesspro_suite_download {
            children.push(Element::leaf("businesspro_suite_download", url.as_str()));
        }
        if let Some(url) = &self.suite_download {
            children.push(Element::leaf("suite_download", url.as_str()));
        }
        for (key, url) in &self.app_updates {
            children.push(Element::leaf(key.as_str(), url.as_str()));
        }
        children.push(Element::leaf("archived", self.archived().to_string()));
        Element::node("release", children)
    }
}

impl FeedItem for SectionRecord {
    fn to_element(&self) -> Element {
        let applications = self
            .groups
            .iter()
            .map(|g| {
                let mut children = vec![Element::leaf("name", g.name.as_str())];
                children.extend(g.entries.iter().map(|e| {
                    Element::node(
                        "cve",
                        vec![
                            Element::leaf("cve_name", e.display_name.as_str()),
                            Element::leaf("url", e.target.as_deref().unwrap_or(NOT_AVAILABLE)),
                        ],
                    )
                }));
                Element::node("application", children)
            })
            .collect();

        Element::node(
            "update",
            vec![
                Element::leaf("date", self.date_text.as_str()),
                Element::optional("version", self.label.as_deref()),
                Element::node("security_updates", applications),
            ],
        )
    }
}
