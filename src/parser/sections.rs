use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::blocks::Block;
use crate::model::{Group, LinkEntry, SectionRecord, LONG_DATE};

/// Decides where section extraction ends. The matching section and every
/// section after it are dropped.
pub trait StopRule {
    fn is_stop(&self, date: NaiveDate) -> bool;
}

/// Stop at one exact date; `None` never stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopAt(pub Option<NaiveDate>);

impl StopRule for StopAt {
    fn is_stop(&self, date: NaiveDate) -> bool {
        self.0 == Some(date)
    }
}

impl<F: Fn(NaiveDate) -> bool> StopRule for F {
    fn is_stop(&self, date: NaiveDate) -> bool {
        self(date)
    }
}

pub fn parse_heading_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), LONG_DATE).ok()
}

/// Walk heading-delimited blocks into dated sections.
///
/// `marker` is matched case-insensitively as a substring of level-3
/// headings; the level-3 headings that follow it (up to the next marker or
/// the end of the section) name the groups, and the first list after each
/// of them supplies that group's entries.
pub fn extract_sections(blocks: &[Block], marker: &str, stop: &impl StopRule) -> Vec<SectionRecord> {
    let marker = marker.to_lowercase();
    let mut records: Vec<SectionRecord> = Vec::new();

    for span in split_top_level(blocks) {
        let Block::Heading { text: heading, .. } = &span[0] else {
            continue;
        };

        let Some(date) = parse_heading_date(heading) else {
            warn!("Skipping heading that is not a date: {}", heading);
            continue;
        };
        if stop.is_stop(date) {
            info!("Reached stopping date: {}", heading);
            break;
        }
        if records.iter().any(|r| r.date == date) {
            warn!("Skipping duplicate section for {}", heading);
            continue;
        }

        let body = &span[1..];
        let mut groups = collect_groups(body, &marker);
        if groups.is_empty() {
            groups = SectionRecord::sentinel_groups();
        }

        debug!("Parsed section {} ({} groups)", heading, groups.len());
        records.push(SectionRecord {
            date,
            date_text: heading.clone(),
            label: version_label(body),
            groups,
        });
    }

    info!("Extracted {} sections", records.len());
    records
}

/// Spans starting at each level-2 heading; anything before the first one is dropped.
/// Level-1 headings never split a section.
fn split_top_level(blocks: &[Block]) -> Vec<&[Block]> {
    let starts: Vec<usize> = blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| matches!(b, Block::Heading { level, .. } if *level == 2))
        .map(|(i, _)| i)
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(blocks.len());
            &blocks[start..end]
        })
        .collect()
}

/// First emphasis before any sub-heading.
fn version_label(body: &[Block]) -> Option<String> {
    body.iter()
        .filter(|b| !matches!(b, Block::Heading { level: 1, .. }))
        .take_while(|b| !matches!(b, Block::Heading { .. }))
        .find_map(|b| match b {
            Block::Emphasis(t) => Some(t.clone()),
            _ => None,
        })
}

fn collect_groups(body: &[Block], marker: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut in_region = false;
    let mut pending: Option<&str> = None;

    for block in body {
        match block {
            Block::Heading { level: 3, text } => {
                if text.to_lowercase().contains(marker) {
                    in_region = true;
                    pending = None;
                } else if in_region {
                    pending = Some(text.as_str());
                }
            }
            Block::List(entries) => {
                if let Some(name) = pending.take() {
                    add_entries(&mut groups, name, entries);
                }
            }
            _ => {}
        }
    }

    groups
}

fn add_entries(groups: &mut Vec<Group>, name: &str, entries: &[LinkEntry]) {
    if entries.is_empty() {
        return;
    }
    match groups.iter_mut().find(|g| g.name == name) {
        Some(g) => g.entries.extend_from_slice(entries),
        None => groups.push(Group {
            name: name.to_string(),
            entries: entries.to_vec(),
        }),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NOT_AVAILABLE;
    use crate::parser::blocks::classify_html;

    fn h(level: u8, text: &str) -> Block {
        Block::Heading {
            level,
            text: text.to_string(),
        }
    }

    fn link(name: &str, url: &str) -> LinkEntry {
        LinkEntry {
            display_name: name.to_string(),
            target: Some(url.to_string()),
        }
    }

    fn dates(records: &[SectionRecord]) -> Vec<&str> {
        records.iter().map(|r| r.date_text.as_str()).collect()
    }

    const NEVER: StopAt = StopAt(None);

    #[test]
    fn groups_under_marker() {
        let blocks = vec![
            h(1, "Release notes for Office for Mac"),
            h(2, "January 16, 2024"),
            Block::Emphasis("Version 16.81 (Build 24011420)".into()),
            h(3, "Feature updates"),
            Block::List(vec![link("ignored", "https://x/f")]),
            h(3, "Security updates"),
            h(3, "Excel"),
            Block::List(vec![link("CVE-2024-20672", "https://msrc/1")]),
            h(3, "Word"),
            Block::List(vec![link("CVE-2024-20673", "https://msrc/2"), link("CVE-2024-20674", "https://msrc/3")]),
        ];
        let records = extract_sections(&blocks, "security updates", &NEVER);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2024, 1, 16).unwrap());
        assert_eq!(r.label.as_deref(), Some("Version 16.81 (Build 24011420)"));
        let names: Vec<&str> = r.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Excel", "Word"]);
        assert_eq!(r.group("Word").unwrap().entries.len(), 2);
    }

    #[test]
    fn marker_is_case_insensitive_substring() {
        let blocks = vec![
            h(2, "March 12, 2024"),
            h(3, "Microsoft SECURITY UPDATES for this release"),
            h(3, "Outlook"),
            Block::List(vec![link("CVE-1", "https://msrc/1")]),
        ];
        let records = extract_sections(&blocks, "Security Updates", &NEVER);
        assert!(records[0].group("Outlook").is_some());
    }

    #[test]
    fn zero_groups_gets_sentinel() {
        let blocks = vec![h(2, "February 13, 2024"), h(3, "Feature updates"), Block::List(vec![link("a", "b")])];
        let records = extract_sections(&blocks, "security updates", &NEVER);
        assert_eq!(records[0].groups, SectionRecord::sentinel_groups());
        let g = &records[0].groups[0];
        assert_eq!(g.name, NOT_AVAILABLE);
        assert_eq!(g.entries, vec![LinkEntry { display_name: NOT_AVAILABLE.into(), target: None }]);
    }

    #[test]
    fn invalid_date_heading_is_skipped_not_fatal() {
        let blocks = vec![
            h(2, "In this article"),
            h(2, "January 16, 2024"),
            h(2, "Not a date, 2024"),
            h(2, "December 12, 2023"),
        ];
        let records = extract_sections(&blocks, "security updates", &NEVER);
        assert_eq!(dates(&records), vec!["January 16, 2024", "December 12, 2023"]);
    }

    #[test]
    fn only_level_two_headings_open_sections() {
        let blocks = vec![
            h(1, "Release notes for Office for Mac"),
            h(2, "January 16, 2024"),
            h(1, "December 20, 2023"),
            Block::Emphasis("Version 16.81 (Build 24011420)".into()),
            h(3, "Security updates"),
            h(3, "Excel"),
            Block::List(vec![link("CVE-2024-20672", "https://msrc/1")]),
        ];
        let records = extract_sections(&blocks, "security updates", &NEVER);
        assert_eq!(dates(&records), vec!["January 16, 2024"]);
        assert_eq!(records[0].label.as_deref(), Some("Version 16.81 (Build 24011420)"));
        assert!(records[0].group("Excel").is_some());
    }

    #[test]
    fn stop_date_terminates() {
        let blocks = vec![
            h(2, "January 16, 2024"),
            h(2, "December 12, 2023"),
            h(2, "December 10, 2019"),
            h(2, "November 12, 2019"),
            h(2, "Bogus"),
        ];
        let stop = StopAt(NaiveDate::from_ymd_opt(2019, 12, 10));
        let records = extract_sections(&blocks, "security updates", &stop);
        assert_eq!(dates(&records), vec!["January 16, 2024", "December 12, 2023"]);
    }

    #[test]
    fn stop_rule_can_be_a_closure() {
        let blocks = vec![h(2, "January 16, 2024"), h(2, "December 12, 2023"), h(2, "November 14, 2023")];
        let cutoff = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let records = extract_sections(&blocks, "security updates", &|d: NaiveDate| d < cutoff);
        assert_eq!(dates(&records), vec!["January 16, 2024"]);
    }

    #[test]
    fn region_ends_at_next_marker_and_section() {
        let blocks = vec![
            h(2, "January 16, 2024"),
            h(3, "Security updates"),
            h(3, "Excel"),
            h(3, "Security updates"),
            Block::List(vec![link("orphan", "https://x")]),
            h(2, "December 12, 2023"),
            h(3, "Word"),
            Block::List(vec![link("CVE-9", "https://x/9")]),
        ];
        let records = extract_sections(&blocks, "security updates", &NEVER);
        // Excel had no list before the marker reset; the December "Word" is outside any region.
        assert_eq!(records[0].groups, SectionRecord::sentinel_groups());
        assert_eq!(records[1].groups, SectionRecord::sentinel_groups());
    }

    #[test]
    fn repeated_group_name_appends() {
        let blocks = vec![
            h(2, "January 16, 2024"),
            h(3, "Security updates"),
            h(3, "Word"),
            Block::List(vec![link("CVE-1", "u1")]),
            h(3, "Security updates (continued)"),
            h(3, "Word"),
            Block::List(vec![link("CVE-2", "u2")]),
        ];
        let records = extract_sections(&blocks, "security updates", &NEVER);
        assert_eq!(records[0].groups.len(), 1);
        assert_eq!(records[0].groups[0].entries.len(), 2);
    }

    #[test]
    fn duplicate_date_keeps_first() {
        let blocks = vec![
            h(2, "January 16, 2024"),
            Block::Emphasis("first".into()),
            h(2, "January 16, 2024"),
            Block::Emphasis("second".into()),
        ];
        let records = extract_sections(&blocks, "security updates", &NEVER);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label.as_deref(), Some("first"));
    }

    #[test]
    fn label_absent_when_no_emphasis_before_subheadings() {
        let blocks = vec![h(2, "January 16, 2024"), h(3, "Feature updates"), Block::Emphasis("late".into())];
        let records = extract_sections(&blocks, "security updates", &NEVER);
        assert_eq!(records[0].label, None);
    }

    #[test]
    fn release_notes_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/release_notes.html").unwrap();
        let blocks = classify_html(&html, "main").unwrap();
        let stop = StopAt(parse_heading_date("December 10, 2019"));
        let records = extract_sections(&blocks, "security updates", &stop);
        assert_eq!(
            dates(&records),
            vec!["February 20, 2024", "January 16, 2024", "December 12, 2023"]
        );

        let jan = &records[1];
        assert_eq!(jan.label.as_deref(), Some("Version 16.81 (Build 24011420)"));
        let excel = jan.group("Excel").unwrap();
        assert_eq!(excel.entries[0], link("CVE-2024-20672", "https://msrc.microsoft.com/update-guide/vulnerability/CVE-2024-20672"));
        assert_eq!(jan.group("Word").unwrap().entries.len(), 2);
        assert_eq!(records[0].groups, SectionRecord::sentinel_groups());
        assert_eq!(records[2].label, None);
    }
}
