use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use super::blocks::{anchors, element_text};
use crate::error::{FeedError, Result};
use crate::model::{LinkEntry, ReleaseRecord, NOT_AVAILABLE};

pub const RELEASE_COLUMNS: [&str; 4] = ["Release date", "Version", "Install package", "Update packages"];

/// Body row keyed by header text, in column order.
pub type TableRow = Vec<(String, Vec<LinkEntry>)>;

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| FeedError::Selector(css.to_string()))
}

/// Rows of the first table whose header row is exactly `columns`.
pub fn find_table(html: &str, columns: &[&str]) -> Result<Vec<TableRow>> {
    let doc = Html::parse_document(html);
    let tables = selector("table")?;
    let rows = selector("tr")?;
    let cells = selector("th, td")?;

    for table in doc.select(&tables) {
        let mut trs = table.select(&rows);
        let Some(head) = trs.next() else {
            continue;
        };
        let headers: Vec<String> = head
            .select(&cells)
            .map(|c| element_text(c).unwrap_or_default())
            .collect();
        if headers != columns {
            continue;
        }

        info!("Found table with header row {:?}", columns);
        return Ok(trs.map(|tr| row_entries(tr, &cells, &headers)).collect());
    }

    Err(FeedError::TableNotFound(
        columns.iter().map(|c| c.to_string()).collect(),
    ))
}

fn row_entries(tr: ElementRef, cells: &Selector, headers: &[String]) -> TableRow {
    tr.select(cells)
        .zip(headers)
        .map(|(cell, header)| {
            let links = anchors(cell);
            let entries = if links.is_empty() {
                vec![LinkEntry {
                    display_name: element_text(cell).unwrap_or_default(),
                    target: None,
                }]
            } else {
                links
            };
            (header.clone(), entries)
        })
        .collect()
}

/// Classify one update-history row into download slots.
pub fn release_from_row(row: &TableRow) -> ReleaseRecord {
    let mut record = ReleaseRecord {
        date: first_text(row, RELEASE_COLUMNS[0]),
        version: first_text(row, RELEASE_COLUMNS[1]),
        businesspro_suite_download: None,
        suite_download: None,
        app_updates: Vec::new(),
    };

    for entry in cell(row, RELEASE_COLUMNS[2]) {
        let Some(url) = &entry.target else { continue };
        let name = entry.display_name.to_lowercase();
        if name.contains("with teams") {
            record.businesspro_suite_download = Some(url.clone());
        } else if name.contains("without teams") {
            record.suite_download = Some(url.clone());
        }
    }

    for entry in cell(row, RELEASE_COLUMNS[3]) {
        let Some(url) = &entry.target else { continue };
        let Some(key) = slot_key(&entry.display_name) else {
            warn!("Update package link without a name in row {}", record.date);
            continue;
        };
        match record.app_updates.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = url.clone(),
            None => record.app_updates.push((key, url.clone())),
        }
    }

    record
}

fn cell<'a>(row: &'a TableRow, header: &str) -> &'a [LinkEntry] {
    row.iter()
        .find(|(h, _)| h == header)
        .map(|(_, e)| e.as_slice())
        .unwrap_or(&[])
}

fn first_text(row: &TableRow, header: &str) -> String {
    cell(row, header)
        .first()
        .map(|e| e.display_name.clone())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// "Microsoft AutoUpdate" -> "microsoft_autoupdate_update". Keys are always
/// valid element names, so a leading digit gets a `_` prefix.
pub fn slot_key(display_name: &str) -> Option<String> {
    let words: Vec<String> = display_name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .collect();
    let first = words.first()?;
    let key = format!("{}_update", words.join("_"));
    if first.starts_with(|c: char| c.is_ascii_digit()) {
        Some(format!("_{}", key))
    } else {
        Some(key)
    }
}

pub fn extract_releases(html: &str) -> Result<Vec<ReleaseRecord>> {
    let rows = find_table(html, &RELEASE_COLUMNS)?;
    let records: Vec<ReleaseRecord> = rows.iter().map(release_from_row).collect();
    info!(
        "Extracted {} releases ({} archived)",
        records.len(),
        records.iter().filter(|r| r.archived()).count()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, url: Option<&str>) -> LinkEntry {
        LinkEntry {
            display_name: name.to_string(),
            target: url.map(str::to_string),
        }
    }

    fn row(cells: Vec<(&str, Vec<LinkEntry>)>) -> TableRow {
        cells.into_iter().map(|(h, e)| (h.to_string(), e)).collect()
    }

    #[test]
    fn end_to_end_row() {
        let r = release_from_row(&row(vec![
            ("Release date", vec![entry("January 10, 2024", None)]),
            ("Version", vec![entry("16.80", None)]),
            (
                "Install package",
                vec![
                    entry("Microsoft 365 and Office for Mac (with Teams)", Some("https://x/a.pkg")),
                    entry("Microsoft 365 and Office for Mac (without Teams)", Some("https://x/b.pkg")),
                ],
            ),
            ("Update packages", vec![entry("Word", Some("https://x/w.pkg"))]),
        ]));
        assert_eq!(r.date, "January 10, 2024");
        assert_eq!(r.version, "16.80");
        assert_eq!(r.businesspro_suite_download.as_deref(), Some("https://x/a.pkg"));
        assert_eq!(r.suite_download.as_deref(), Some("https://x/b.pkg"));
        assert_eq!(r.app_update("word_update"), Some("https://x/w.pkg"));
        assert!(!r.archived());
    }

    #[test]
    fn row_without_links_is_archived() {
        let r = release_from_row(&row(vec![
            ("Release date", vec![entry("June 13, 2017", None)]),
            ("Version", vec![entry("15.35", None)]),
            ("Install package", vec![entry("Office suite (with Teams)", None)]),
            ("Update packages", vec![entry("Word", None)]),
        ]));
        assert!(r.archived());
        assert!(r.businesspro_suite_download.is_none());
        assert!(r.app_updates.is_empty());
    }

    #[test]
    fn unmatched_install_link_does_not_populate() {
        let r = release_from_row(&row(vec![
            ("Release date", vec![entry("June 13, 2017", None)]),
            ("Install package", vec![entry("Office suite", Some("https://x/s.pkg"))]),
        ]));
        assert!(r.archived());
        assert_eq!(r.version, NOT_AVAILABLE);
    }

    #[test]
    fn slot_keys() {
        assert_eq!(slot_key("Word").as_deref(), Some("word_update"));
        assert_eq!(slot_key("Microsoft AutoUpdate").as_deref(), Some("microsoft_autoupdate_update"));
        assert_eq!(slot_key("OneNote (Free)").as_deref(), Some("onenote_free_update"));
        assert_eq!(slot_key("365 Copilot").as_deref(), Some("_365_copilot_update"));
        assert_eq!(slot_key(" () "), None);
    }

    #[test]
    fn picks_table_by_exact_header() {
        let html = r#"<table><tr><th>Release date</th><th>Version</th></tr><tr><td>x</td><td>y</td></tr></table>
            <table>
              <tr><th>Release date</th><th>Version</th><th>Install package</th><th>Update packages</th></tr>
              <tr><td>January 10, 2024</td><td>16.80</td>
                  <td><a href="https://x/a.pkg">Microsoft 365 and Office for Mac (with Teams)</a><br><a href="https://x/b.pkg">Microsoft 365 and Office for Mac (without Teams)</a></td>
                  <td><a href="https://x/w.pkg">Word</a><br><a href="https://x/e.pkg">Excel</a></td></tr>
              <tr><td>March 14, 2017</td><td>15.32</td><td>Not available</td><td>Not available</td></tr>
            </table>"#;
        let releases = extract_releases(html).unwrap();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].suite_download.as_deref(), Some("https://x/b.pkg"));
        assert_eq!(
            releases[0].app_updates,
            vec![
                ("word_update".to_string(), "https://x/w.pkg".to_string()),
                ("excel_update".to_string(), "https://x/e.pkg".to_string()),
            ]
        );
        assert!(releases[1].archived());
        assert_eq!(releases[1].version, "15.32");
    }

    #[test]
    fn missing_table_is_an_error() {
        let err = extract_releases("<table><tr><th>Other</th></tr></table>").unwrap_err();
        assert!(matches!(err, FeedError::TableNotFound(cols) if cols.len() == 4));
    }

    #[test]
    fn update_history_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/update_history.html").unwrap();
        let releases = extract_releases(&html).unwrap();
        assert_eq!(releases.len(), 3);
        assert_eq!(releases[0].date, "January 10, 2024");
        assert_eq!(releases[0].app_update("microsoft_autoupdate_update"), Some("https://officecdnmac.microsoft.com/pr/mau.pkg"));
        assert!(!releases[1].archived());
        assert!(releases[2].archived());
    }
}
