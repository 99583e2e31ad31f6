//! Shared fixtures: a minisign-compatible signer and mock server helpers.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Signer as _, SigningKey};
use source_catalog::SourcesConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TRUSTED_COMMENT: &str = "timestamp:1700000000\tfile:public-resolvers.md";

pub struct Signer {
    key: SigningKey,
    key_id: [u8; 8],
}

impl Signer {
    pub fn new(seed: u8) -> Self {
        Self {
            key: SigningKey::from_bytes(&[seed; 32]),
            key_id: [0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, seed],
        }
    }

    pub fn public_key(&self) -> String {
        let mut bytes = b"Ed".to_vec();
        bytes.extend_from_slice(&self.key_id);
        bytes.extend_from_slice(self.key.verifying_key().as_bytes());
        BASE64.encode(bytes)
    }

    pub fn sign(&self, content: &[u8]) -> String {
        self.encode(b"Ed", self.key.sign(content).to_bytes())
    }

    pub fn sign_prehashed(&self, content: &[u8]) -> String {
        let digest = Blake2b512::digest(content);
        self.encode(b"ED", self.key.sign(digest.as_slice()).to_bytes())
    }

    fn encode(&self, alg: &[u8; 2], sig: [u8; 64]) -> String {
        let mut bin = alg.to_vec();
        bin.extend_from_slice(&self.key_id);
        bin.extend_from_slice(&sig);

        let mut global = sig.to_vec();
        global.extend_from_slice(TRUSTED_COMMENT.as_bytes());
        let global_sig = self.key.sign(&global);

        format!(
            "untrusted comment: signature from minisign secret key\n{}\ntrusted comment: {}\n{}\n",
            BASE64.encode(bin),
            TRUSTED_COMMENT,
            BASE64.encode(global_sig.to_bytes())
        )
    }
}

pub fn test_config() -> SourcesConfig {
    SourcesConfig::default().with_max_retries(0)
}

pub async fn serve(mock_server: &MockServer, route: &str, body: impl Into<Vec<u8>>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.into()))
        .mount(mock_server)
        .await;
}

pub async fn serve_status(mock_server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(mock_server)
        .await;
}
