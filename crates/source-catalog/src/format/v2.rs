//! Delimited catalog: one `## <name>` section per server, stamp inline.

use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::stamp::{StampCodec, STAMP_PREFIX};
use crate::types::CatalogEntry;

/// Section marker.
pub const SECTION_MARKER: &str = "## ";

/// Shortest stamp line accepted before handing it to the codec.
const MIN_STAMP_LEN: usize = 8;

pub fn parse<C: StampCodec>(
    url: &str,
    content: &str,
    prefix: &str,
    codec: &C,
) -> SourceResult<Vec<CatalogEntry<C::Stamp>>> {
    let invalid = || SourceError::InvalidSource {
        url: url.to_string(),
    };

    let mut sections = content.split(SECTION_MARKER);
    // Preamble before the first marker is not part of any entry.
    sections.next();

    let mut entries = Vec::new();
    let mut saw_marker = false;
    for section in sections {
        saw_marker = true;

        let lines: Vec<&str> = section.trim().split('\n').collect();
        if lines.len() < 2 {
            return Err(invalid());
        }
        let name = lines[0].trim();
        if name.is_empty() {
            return Err(invalid());
        }

        let stamp_str = lines
            .iter()
            .map(|line| line.trim())
            .find(|line| line.starts_with(STAMP_PREFIX))
            .filter(|line| line.len() >= MIN_STAMP_LEN)
            .ok_or_else(|| SourceError::MissingStamp {
                name: name.to_string(),
                url: url.to_string(),
            })?;

        let stamp = codec.from_string(stamp_str)?;
        let name = format!("{}{}", prefix, name);
        debug!(name = %name, stamp = %stamp, "registered server");

        entries.push(CatalogEntry { name, stamp });
    }

    if !saw_marker {
        return Err(invalid());
    }
    Ok(entries)
}
