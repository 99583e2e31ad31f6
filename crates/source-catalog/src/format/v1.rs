//! Legacy CSV catalog.
//!
//! Columns (0-indexed): 0 name, 7 DNSSEC, 8 no-log, 10 server address,
//! 11 provider name, 12 provider public key. The first record is a header.

use tracing::{debug, warn};

use crate::error::{SourceError, SourceResult};
use crate::stamp::{ServerProperties, StampCodec};
use crate::types::CatalogEntry;

use super::csv;

/// Minimum number of fields in a data row.
pub const MIN_FIELDS: usize = 14;

const COL_NAME: usize = 0;
const COL_DNSSEC: usize = 7;
const COL_NO_LOG: usize = 8;
const COL_SERVER_ADDR: usize = 10;
const COL_PROVIDER_NAME: usize = 11;
const COL_SERVER_PK: usize = 12;

pub fn parse<C: StampCodec>(
    content: &str,
    prefix: &str,
    codec: &C,
) -> SourceResult<Vec<CatalogEntry<C::Stamp>>> {
    let records = match csv::read_records(content) {
        Ok(records) => records,
        Err(e) => {
            // Structurally broken documents yield no entries rather than an error.
            warn!(error = %e, "legacy source is not valid CSV, ignoring it");
            return Ok(Vec::new());
        }
    };

    let mut entries = Vec::new();
    for (row, record) in records.iter().enumerate() {
        if row == 0 || record.is_empty() {
            continue;
        }
        if record.len() < MIN_FIELDS {
            return Err(SourceError::ParseLine { line: row + 1 });
        }

        let mut props = ServerProperties::NONE;
        if record[COL_DNSSEC].eq_ignore_ascii_case("yes") {
            props |= ServerProperties::DNSSEC;
        }
        if record[COL_NO_LOG].eq_ignore_ascii_case("yes") {
            props |= ServerProperties::NO_LOG;
        }

        let stamp = codec.from_legacy_fields(
            &record[COL_SERVER_ADDR],
            &record[COL_SERVER_PK],
            &record[COL_PROVIDER_NAME],
            props,
        )?;
        let name = format!("{}{}", prefix, record[COL_NAME]);
        debug!(name = %name, stamp = %stamp, "registered server");

        entries.push(CatalogEntry { name, stamp });
    }

    Ok(entries)
}
