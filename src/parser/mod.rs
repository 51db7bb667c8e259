pub mod blocks;
pub mod sections;
pub mod table;

use crate::error::Result;
use crate::model::{ReleaseRecord, SectionRecord};
use sections::StopRule;

/// Release-notes page: html → blocks → dated sections.
pub fn parse_release_notes(
    html: &str,
    container: &str,
    marker: &str,
    stop: &impl StopRule,
) -> Result<Vec<SectionRecord>> {
    let blocks = blocks::classify_html(html, container)?;
    Ok(sections::extract_sections(&blocks, marker, stop))
}

/// Update-history page: html → release table → release rows.
pub fn parse_update_history(html: &str) -> Result<Vec<ReleaseRecord>> {
    table::extract_releases(html)
}
