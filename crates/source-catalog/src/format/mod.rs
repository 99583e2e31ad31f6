//! Catalog wire formats.
//!
//! Both parsers are pure: they take verified text and a stamp codec and
//! return fresh entries on every call.

mod csv;
pub mod v1;
pub mod v2;

use crate::error::SourceResult;
use crate::stamp::StampCodec;
use crate::types::{CatalogEntry, Source, SourceFormat};

impl Source {
    /// Parse the verified content into catalog entries.
    ///
    /// Every entry name is `prefix` followed by the catalog's own name. This
    /// holds for `v2` sections too, not only for legacy `v1` rows.
    pub fn parse<C: StampCodec>(
        &self,
        prefix: &str,
        codec: &C,
    ) -> SourceResult<Vec<CatalogEntry<C::Stamp>>> {
        match self.format() {
            SourceFormat::V1 => v1::parse(self.content(), prefix, codec),
            SourceFormat::V2 => v2::parse(self.url(), self.content(), prefix, codec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::stamp::{ServerProperties, StampError};

    const URL: &str = "https://example.com/public-resolvers.md";

    /// Records what the parsers hand to the codec.
    #[derive(Debug, Default)]
    struct StubCodec;

    impl StampCodec for StubCodec {
        type Stamp = String;

        fn from_legacy_fields(
            &self,
            server_addr: &str,
            server_pk: &str,
            provider_name: &str,
            props: ServerProperties,
        ) -> Result<String, StampError> {
            if server_addr == "bad" {
                return Err(StampError::InvalidLegacy {
                    server_addr: server_addr.to_string(),
                    reason: "rejected by stub".to_string(),
                });
            }
            Ok(format!(
                "legacy|{}|{}|{}|{}",
                server_addr,
                server_pk,
                provider_name,
                props.bits()
            ))
        }

        fn from_string(&self, stamp: &str) -> Result<String, StampError> {
            if stamp.contains("bad") {
                return Err(StampError::InvalidStamp {
                    stamp: stamp.to_string(),
                    reason: "rejected by stub".to_string(),
                });
            }
            Ok(stamp.to_string())
        }
    }

    const V1_HEADER: &str = "Name,Full name,Description,Location,Coordinates,URL,Version,DNSSEC validation,No logs,Namecoin,Resolver address,Provider name,Provider public key,Provider public key TXT record";

    fn v1_row(name: &str, dnssec: &str, nolog: &str, addr: &str) -> String {
        format!(
            "{},Full {},desc,loc,\"1.0, 2.0\",https://example.com,1,{},{},no,{},2.dnscrypt-cert.{},AB:CD,txt",
            name, name, dnssec, nolog, addr, name
        )
    }

    fn source(format: SourceFormat, content: &str) -> Source {
        Source::new(URL.to_string(), format, content.to_string())
    }

    #[test]
    fn test_v1_maps_columns_and_flags() {
        let content = format!(
            "{}\n{}\n{}\n",
            V1_HEADER,
            v1_row("alpha", "YES", "no", "1.2.3.4:443"),
            v1_row("beta", "no", "yes", "5.6.7.8")
        );
        let entries = source(SourceFormat::V1, &content)
            .parse("legacy-", &StubCodec)
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "legacy-alpha");
        assert_eq!(
            entries[0].stamp,
            "legacy|1.2.3.4:443|AB:CD|2.dnscrypt-cert.alpha|1"
        );
        assert_eq!(entries[1].name, "legacy-beta");
        assert_eq!(entries[1].stamp, "legacy|5.6.7.8|AB:CD|2.dnscrypt-cert.beta|2");
    }

    #[test]
    fn test_v1_short_row_names_line() {
        let short = "x,1,2,3,4,5,6,7,8,9,10,11,12"; // 13 fields
        let content = format!("{}\n{}\n", V1_HEADER, short);
        let err = source(SourceFormat::V1, &content)
            .parse("", &StubCodec)
            .unwrap_err();
        assert!(matches!(err, SourceError::ParseLine { line: 2 }), "{err:?}");
    }

    #[test]
    fn test_v1_blank_lines_are_skipped() {
        let content = format!(
            "{}\n\n{}\n\n\n{}\n",
            V1_HEADER,
            v1_row("alpha", "no", "no", "1.1.1.1"),
            v1_row("beta", "no", "no", "2.2.2.2")
        );
        let entries = source(SourceFormat::V1, &content)
            .parse("", &StubCodec)
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_v1_malformed_csv_is_empty_not_error() {
        // Structural CSV errors are swallowed while short rows are fatal.
        let content = format!(
            "{}\n{}\n\"unterminated,1,2\n",
            V1_HEADER,
            v1_row("alpha", "no", "no", "1.1.1.1")
        );
        let entries = source(SourceFormat::V1, &content)
            .parse("", &StubCodec)
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_v1_header_only() {
        let entries = source(SourceFormat::V1, V1_HEADER)
            .parse("", &StubCodec)
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_v1_codec_error_aborts() {
        let content = format!(
            "{}\n{}\n{}\n",
            V1_HEADER,
            v1_row("alpha", "no", "no", "1.1.1.1"),
            v1_row("beta", "no", "no", "bad")
        );
        let err = source(SourceFormat::V1, &content)
            .parse("", &StubCodec)
            .unwrap_err();
        assert!(matches!(err, SourceError::Stamp(StampError::InvalidLegacy { .. })));
    }

    #[test]
    fn test_v2_sections() {
        let content = "# Public resolvers\n\nSome preamble text.\n\n\
                       ## resolver-a\n\nFirst resolver.\n\nsdns://AQcAAAAAAAAA\n\n\
                       ## resolver-b\nSecond resolver.\n  sdns://AgcAAAAAAAAA  \nsdns://ignored\n";
        let entries = source(SourceFormat::V2, content)
            .parse("pub-", &StubCodec)
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "pub-resolver-a");
        assert_eq!(entries[0].stamp, "sdns://AQcAAAAAAAAA");
        assert_eq!(entries[1].name, "pub-resolver-b");
        assert_eq!(entries[1].stamp, "sdns://AgcAAAAAAAAA");
    }

    #[test]
    fn test_v2_without_marker_names_url() {
        let err = source(SourceFormat::V2, "no sections here\nsdns://AQcAAAAAAAAA\n")
            .parse("", &StubCodec)
            .unwrap_err();
        match err {
            SourceError::InvalidSource { url } => assert_eq!(url, URL),
            other => panic!("expected InvalidSource, got {other:?}"),
        }
        assert!(source(SourceFormat::V2, "")
            .parse("", &StubCodec)
            .is_err());
    }

    #[test]
    fn test_v2_single_line_section() {
        let err = source(SourceFormat::V2, "## lonely\n")
            .parse("", &StubCodec)
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidSource { .. }));
    }

    #[test]
    fn test_v2_empty_name() {
        let err = source(SourceFormat::V2, "##  \n\nsdns://AQcAAAAAAAAA\n")
            .parse("", &StubCodec)
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidSource { .. }), "{err:?}");
    }

    #[test]
    fn test_v2_short_stamp_names_entry_and_url() {
        let err = source(SourceFormat::V2, "## resolver-a\n\nsdns://\n")
            .parse("", &StubCodec)
            .unwrap_err();
        match err {
            SourceError::MissingStamp { name, url } => {
                assert_eq!(name, "resolver-a");
                assert_eq!(url, URL);
            }
            other => panic!("expected MissingStamp, got {other:?}"),
        }
    }

    #[test]
    fn test_v2_missing_stamp() {
        let err = source(SourceFormat::V2, "## resolver-a\nno stamp here\n")
            .parse("", &StubCodec)
            .unwrap_err();
        assert!(matches!(err, SourceError::MissingStamp { .. }));
    }

    #[test]
    fn test_v2_codec_error_aborts() {
        let err = source(SourceFormat::V2, "## resolver-a\nsdns://bad-stamp\n")
            .parse("", &StubCodec)
            .unwrap_err();
        assert!(matches!(err, SourceError::Stamp(StampError::InvalidStamp { .. })));
    }

    #[test]
    fn test_parse_is_repeatable() {
        let src = source(SourceFormat::V2, "## a\nsdns://AQcAAAAAAAAA\n");
        let first = src.parse("", &StubCodec).unwrap();
        let second = src.parse("", &StubCodec).unwrap();
        assert_eq!(first, second);
    }
}
