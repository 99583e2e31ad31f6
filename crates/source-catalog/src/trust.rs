//! Detached signature verification (minisign format).
//!
//! # Wire format
//!
//! ```text
//! public key:  base64("Ed" || key_id[8] || ed25519_pk[32])
//!
//! signature:   untrusted comment: <free text>
//!              base64(alg[2] || key_id[8] || sig[64])
//!              trusted comment: <free text>
//!              base64(global_sig[64])
//! ```
//!
//! `alg` is `Ed` (signature over the payload) or `ED` (signature over the
//! BLAKE2b-512 hash of the payload). The global signature covers
//! `sig || trusted comment` so the trusted comment cannot be swapped.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey};

use crate::error::{SourceError, SourceResult};

const UNTRUSTED_COMMENT_PREFIX: &str = "untrusted comment:";
const TRUSTED_COMMENT_PREFIX: &str = "trusted comment: ";

const KEY_ID_LEN: usize = 8;
const PUBLIC_KEY_LEN: usize = 2 + KEY_ID_LEN + 32;
const SIGNATURE_LEN: usize = 2 + KEY_ID_LEN + 64;

/// Signature algorithm tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// Signature over the raw payload.
    Pure,
    /// Signature over the BLAKE2b-512 hash of the payload.
    Prehashed,
}

/// Minisign public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    key_id: [u8; KEY_ID_LEN],
    key: VerifyingKey,
}

impl PublicKey {
    /// Decode a public key from its base64 line, optionally preceded by an
    /// `untrusted comment:` line as found in `.pub` files.
    pub fn decode(text: &str) -> SourceResult<Self> {
        let invalid = |reason: String| SourceError::InvalidPublicKey { reason };

        let line = text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with(UNTRUSTED_COMMENT_PREFIX))
            .ok_or_else(|| invalid("empty public key".to_string()))?;

        let bytes = BASE64
            .decode(line)
            .map_err(|e| invalid(format!("invalid base64: {}", e)))?;
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(invalid(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            )));
        }
        if &bytes[..2] != b"Ed" {
            return Err(invalid("unsupported key algorithm".to_string()));
        }

        let mut key_id = [0u8; KEY_ID_LEN];
        key_id.copy_from_slice(&bytes[2..2 + KEY_ID_LEN]);
        let mut pk = [0u8; 32];
        pk.copy_from_slice(&bytes[2 + KEY_ID_LEN..]);
        let key = VerifyingKey::from_bytes(&pk)
            .map_err(|e| invalid(format!("invalid ed25519 key: {}", e)))?;

        Ok(Self { key_id, key })
    }

    /// Key identifier as printed by minisign (uppercase hex, little-endian).
    pub fn key_id(&self) -> String {
        format_key_id(&self.key_id)
    }

    /// Verify `content` against a decoded detached signature.
    pub fn verify(&self, content: &[u8], signature: &Signature) -> SourceResult<()> {
        let invalid = |reason: &str| SourceError::SignatureInvalid {
            reason: reason.to_string(),
        };

        if signature.key_id != self.key_id {
            return Err(SourceError::SignatureInvalid {
                reason: format!(
                    "incompatible key identifiers: signature {}, key {}",
                    format_key_id(&signature.key_id),
                    self.key_id()
                ),
            });
        }

        let sig = Ed25519Signature::from_bytes(&signature.signature);
        let checked = match signature.algorithm {
            SignatureAlgorithm::Pure => self.key.verify(content, &sig),
            SignatureAlgorithm::Prehashed => {
                let digest = Blake2b512::digest(content);
                self.key.verify(digest.as_slice(), &sig)
            }
        };
        checked.map_err(|_| invalid("payload signature does not match"))?;

        let mut global = Vec::with_capacity(64 + signature.trusted_comment.len());
        global.extend_from_slice(&signature.signature);
        global.extend_from_slice(signature.trusted_comment.as_bytes());
        self.key
            .verify(
                &global,
                &Ed25519Signature::from_bytes(&signature.global_signature),
            )
            .map_err(|_| invalid("global signature does not match trusted comment"))
    }
}

impl FromStr for PublicKey {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// Decoded detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    algorithm: SignatureAlgorithm,
    key_id: [u8; KEY_ID_LEN],
    signature: [u8; 64],
    trusted_comment: String,
    global_signature: [u8; 64],
}

impl Signature {
    /// Decode the four-line signature text.
    pub fn decode(text: &str) -> SourceResult<Self> {
        let malformed = |reason: String| SourceError::SignatureMalformed { reason };

        let mut lines = text.lines();
        let mut next_line = |what: &str| {
            lines
                .next()
                .ok_or_else(|| malformed(format!("missing {}", what)))
        };

        let untrusted = next_line("untrusted comment")?;
        let encoded_sig = next_line("signature")?;
        let trusted = next_line("trusted comment")?;
        let encoded_global = next_line("global signature")?;

        if !untrusted.starts_with(UNTRUSTED_COMMENT_PREFIX) {
            return Err(malformed("invalid untrusted comment".to_string()));
        }
        let trusted_comment = trusted
            .strip_prefix(TRUSTED_COMMENT_PREFIX)
            .ok_or_else(|| malformed("invalid trusted comment".to_string()))?
            .to_string();

        let bin = BASE64
            .decode(encoded_sig.trim())
            .map_err(|e| malformed(format!("invalid base64 signature: {}", e)))?;
        if bin.len() != SIGNATURE_LEN {
            return Err(malformed(format!(
                "expected {} signature bytes, got {}",
                SIGNATURE_LEN,
                bin.len()
            )));
        }
        let algorithm = match &bin[..2] {
            b"Ed" => SignatureAlgorithm::Pure,
            b"ED" => SignatureAlgorithm::Prehashed,
            _ => return Err(malformed("unsupported signature algorithm".to_string())),
        };
        let mut key_id = [0u8; KEY_ID_LEN];
        key_id.copy_from_slice(&bin[2..2 + KEY_ID_LEN]);
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&bin[2 + KEY_ID_LEN..]);

        let global = BASE64
            .decode(encoded_global.trim())
            .map_err(|e| malformed(format!("invalid base64 global signature: {}", e)))?;
        let global_signature: [u8; 64] = global
            .as_slice()
            .try_into()
            .map_err(|_| {
                malformed(format!(
                    "expected 64 global signature bytes, got {}",
                    global.len()
                ))
            })?;

        Ok(Self {
            algorithm,
            key_id,
            signature,
            trusted_comment,
            global_signature,
        })
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Trusted comment; only meaningful once [`PublicKey::verify`] succeeded.
    pub fn trusted_comment(&self) -> &str {
        &self.trusted_comment
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = Vec::with_capacity(PUBLIC_KEY_LEN);
        bytes.extend_from_slice(b"Ed");
        bytes.extend_from_slice(&self.key_id);
        bytes.extend_from_slice(self.key.as_bytes());
        write!(f, "{}", BASE64.encode(bytes))
    }
}

fn format_key_id(key_id: &[u8; KEY_ID_LEN]) -> String {
    key_id.iter().rev().map(|b| format!("{:02X}", b)).collect()
}

/// Decode `signature_text` and verify it over `content`.
pub fn verify_detached(
    content: &[u8],
    signature_text: &str,
    key: &PublicKey,
) -> SourceResult<Signature> {
    let signature = Signature::decode(signature_text)?;
    key.verify(content, &signature)?;
    Ok(signature)
}
