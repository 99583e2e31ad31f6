//! Server stamp codec boundary.
//!
//! Parsers never build stamps themselves: they hand either the legacy CSV
//! fields or an inline `sdns://` string to a [`StampCodec`]. The crate ships
//! [`SdnsCodec`], which is enough to register and re-render catalog entries;
//! resolvers with their own stamp model plug in a different codec.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

/// Prefix of every inline stamp string.
pub const STAMP_PREFIX: &str = "sdns://";

/// Protocol byte for DNSCrypt stamps.
const PROTO_DNSCRYPT: u8 = 0x01;

/// Size of an Ed25519 provider public key.
const PROVIDER_PK_LEN: usize = 32;

/// Stamp codec errors.
#[derive(Debug, thiserror::Error)]
pub enum StampError {
    /// Inline stamp string is not a valid stamp.
    #[error("invalid stamp [{stamp}]: {reason}")]
    InvalidStamp { stamp: String, reason: String },

    /// Legacy fields cannot be turned into a stamp.
    #[error("invalid legacy server entry [{server_addr}]: {reason}")]
    InvalidLegacy { server_addr: String, reason: String },
}

/// Informal server properties advertised by a catalog entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ServerProperties(u64);

impl ServerProperties {
    pub const NONE: Self = Self(0);
    pub const DNSSEC: Self = Self(1);
    pub const NO_LOG: Self = Self(1 << 1);
    pub const NO_FILTER: Self = Self(1 << 2);

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ServerProperties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ServerProperties {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Builds opaque stamps for catalog entries.
pub trait StampCodec {
    /// Stamp type handed back to the caller.
    type Stamp: fmt::Display;

    /// Build a stamp from the fields of a legacy (v1) CSV row.
    fn from_legacy_fields(
        &self,
        server_addr: &str,
        server_pk: &str,
        provider_name: &str,
        props: ServerProperties,
    ) -> Result<Self::Stamp, StampError>;

    /// Decode an inline `sdns://` string.
    fn from_string(&self, stamp: &str) -> Result<Self::Stamp, StampError>;
}

/// Decoded `sdns://` stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStamp {
    bytes: Vec<u8>,
}

impl ServerStamp {
    /// Protocol identifier (first encoded byte).
    pub fn protocol(&self) -> u8 {
        self.bytes[0]
    }

    /// Informal properties carried in the stamp header.
    pub fn props(&self) -> ServerProperties {
        let mut le = [0u8; 8];
        le.copy_from_slice(&self.bytes[1..9]);
        ServerProperties::from_bits(u64::from_le_bytes(le))
    }

    /// Raw encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for ServerStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", STAMP_PREFIX, URL_SAFE_NO_PAD.encode(&self.bytes))
    }
}

/// Default codec for `sdns://` stamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SdnsCodec;

impl StampCodec for SdnsCodec {
    type Stamp = ServerStamp;

    fn from_legacy_fields(
        &self,
        server_addr: &str,
        server_pk: &str,
        provider_name: &str,
        props: ServerProperties,
    ) -> Result<ServerStamp, StampError> {
        let legacy_err = |reason: String| StampError::InvalidLegacy {
            server_addr: server_addr.to_string(),
            reason,
        };

        let pk = hex::decode(server_pk.replace(':', ""))
            .map_err(|e| legacy_err(format!("unsupported public key: {}", e)))?;
        if pk.len() != PROVIDER_PK_LEN {
            return Err(legacy_err(format!(
                "unsupported public key length: {}",
                pk.len()
            )));
        }

        let mut bytes = vec![PROTO_DNSCRYPT];
        bytes.extend_from_slice(&props.bits().to_le_bytes());
        push_length_prefixed(&mut bytes, server_addr.as_bytes()).map_err(&legacy_err)?;
        push_length_prefixed(&mut bytes, &pk).map_err(&legacy_err)?;
        push_length_prefixed(&mut bytes, provider_name.as_bytes()).map_err(&legacy_err)?;

        Ok(ServerStamp { bytes })
    }

    fn from_string(&self, stamp: &str) -> Result<ServerStamp, StampError> {
        let invalid = |reason: String| StampError::InvalidStamp {
            stamp: stamp.to_string(),
            reason,
        };

        let encoded = stamp
            .strip_prefix(STAMP_PREFIX)
            .ok_or_else(|| invalid(format!("missing {} prefix", STAMP_PREFIX)))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| invalid(format!("invalid base64: {}", e)))?;
        if bytes.len() < 9 {
            return Err(invalid("stamp is too short".to_string()));
        }

        Ok(ServerStamp { bytes })
    }
}

fn push_length_prefixed(out: &mut Vec<u8>, field: &[u8]) -> Result<(), String> {
    let len = u8::try_from(field.len()).map_err(|_| format!("field too long: {}", field.len()))?;
    out.push(len);
    out.extend_from_slice(field);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PK_HEX: &str = "B735:1140:206F:225D:3E2B:D822:D7FD:691E:A1C3:3CC8:D666:8D0C:BE04:BFAB:CA43:FB79";

    #[test]
    fn test_legacy_fields_encode_dnscrypt_stamp() {
        let props = ServerProperties::DNSSEC | ServerProperties::NO_LOG;
        let stamp = SdnsCodec
            .from_legacy_fields("208.67.220.220", PK_HEX, "2.dnscrypt-cert.opendns.com", props)
            .unwrap();

        assert_eq!(stamp.protocol(), PROTO_DNSCRYPT);
        assert_eq!(stamp.props(), props);
        assert!(stamp.to_string().starts_with(STAMP_PREFIX));

        let bytes = stamp.as_bytes();
        assert_eq!(bytes[9] as usize, "208.67.220.220".len());
        assert_eq!(&bytes[10..24], b"208.67.220.220");
        assert_eq!(bytes[24] as usize, PROVIDER_PK_LEN);
    }

    #[test]
    fn test_rendered_stamp_decodes_to_same_bytes() {
        let stamp = SdnsCodec
            .from_legacy_fields(
                "1.2.3.4:443",
                PK_HEX,
                "2.dnscrypt-cert.example",
                ServerProperties::NONE,
            )
            .unwrap();
        let decoded = SdnsCodec.from_string(&stamp.to_string()).unwrap();
        assert_eq!(decoded, stamp);
    }

    #[test]
    fn test_legacy_rejects_short_public_key() {
        let err = SdnsCodec
            .from_legacy_fields(
                "1.2.3.4",
                "B735:1140",
                "2.dnscrypt-cert.example",
                ServerProperties::NONE,
            )
            .unwrap_err();
        assert!(matches!(err, StampError::InvalidLegacy { .. }));
    }

    #[test]
    fn test_legacy_rejects_non_hex_public_key() {
        let err = SdnsCodec
            .from_legacy_fields(
                "1.2.3.4",
                "not-hex",
                "2.dnscrypt-cert.example",
                ServerProperties::NONE,
            )
            .unwrap_err();
        assert!(err.to_string().contains("unsupported public key"));
    }

    #[test]
    fn test_from_string_requires_prefix_and_header() {
        assert!(SdnsCodec.from_string("AQcAAAAAAAAA").is_err());
        assert!(SdnsCodec.from_string("sdns://!!!").is_err());
        // Only the protocol byte, no properties.
        assert!(SdnsCodec.from_string("sdns://AQ").is_err());
    }

    #[test]
    fn test_from_string_reads_properties() {
        let stamp = SdnsCodec.from_string("sdns://AgcAAAAAAAAAAAAAAAA").unwrap();
        assert_eq!(stamp.protocol(), 0x02);
        assert!(stamp.props().contains(ServerProperties::DNSSEC));
        assert!(stamp.props().contains(ServerProperties::NO_LOG));
        assert!(stamp.props().contains(ServerProperties::NO_FILTER));
    }
}
