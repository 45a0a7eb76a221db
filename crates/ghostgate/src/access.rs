//! Access requests and their EIP-712 signatures.
//!
//! Provides:
//! - The per-call [`AccessRequest`] and its JSON wire form
//! - The typed-data domain ([`access_domain`]) and signing hash ([`signing_hash`])
//! - [`AccessSigner`], which signs requests with a local secp256k1 key
//! - [`recover_signer`], with EIP-2 malleability protection

use std::borrow::Cow;
use std::io;

use alloy::primitives::{hex, Address, Signature, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::constants::GateConfig;
use crate::error::GateError;

// EIP-712 primary type for gate access.
sol! {
    #[derive(Debug)]
    struct Access {
        string service;
        uint256 timestamp;
        string nonce;
    }
}

/// A single access attempt. Built fresh for every guarded call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub service: String,
    /// Unix seconds
    pub timestamp: u64,
    pub nonce: String,
}

impl AccessRequest {
    pub fn new(service: &str) -> Self {
        Self::at(service, now_secs())
    }

    pub fn at(service: &str, timestamp: u64) -> Self {
        Self {
            service: service.to_string(),
            timestamp,
            nonce: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    /// The `x-ghost-payload` header value: `{"service": ..., "timestamp": ..., "nonce": ...}`
    /// laid out with `", "` and `": "` separators, everything outside
    /// printable ASCII `\u`-escaped.
    pub fn to_payload(&self) -> Result<String, GateError> {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PayloadFormatter);
        self.serialize(&mut ser)?;
        String::from_utf8(buf)
            .map_err(|e| GateError::SignatureError(format!("payload is not UTF-8: {e}")))
    }

    fn typed(&self) -> Access {
        Access {
            service: self.service.clone(),
            timestamp: U256::from(self.timestamp),
            nonce: self.nonce.clone(),
        }
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Build the EIP-712 domain for the configured chain.
pub fn access_domain(config: &GateConfig) -> Eip712Domain {
    Eip712Domain {
        name: Some(Cow::Owned(config.domain_name.clone())),
        version: Some(Cow::Owned(config.domain_version.clone())),
        chain_id: Some(U256::from(config.chain_id)),
        verifying_contract: None,
        salt: None,
    }
}

pub fn signing_hash(request: &AccessRequest, config: &GateConfig) -> B256 {
    request.typed().eip712_signing_hash(&access_domain(config))
}

/// A signed access request, ready to be sent as gate headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAccess {
    pub request: AccessRequest,
    /// 0x-prefixed 65-byte signature
    pub signature: String,
    /// JSON encoding of `request`
    pub payload: String,
}

/// Signs access requests with a local private key.
#[derive(Clone)]
pub struct AccessSigner {
    signer: PrivateKeySigner,
    config: GateConfig,
}

impl std::fmt::Debug for AccessSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessSigner")
            .field("address", &self.signer.address())
            .field("chain_id", &self.config.chain_id)
            .finish()
    }
}

impl AccessSigner {
    /// Create a signer from a hex-encoded private key (with or without 0x prefix).
    pub fn new(private_key: &str, config: GateConfig) -> Result<Self, ConfigError> {
        let key = private_key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        let signer: PrivateKeySigner = key
            .parse()
            .map_err(|e| ConfigError::InvalidPrivateKey(format!("{e}")))?;
        Ok(Self { signer, config })
    }

    pub fn random(config: GateConfig) -> Self {
        Self {
            signer: PrivateKeySigner::random(),
            config,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Build and sign a fresh request for `service`.
    pub fn sign(&self, service: &str) -> Result<SignedAccess, GateError> {
        self.sign_request(AccessRequest::new(service))
    }

    pub fn sign_request(&self, request: AccessRequest) -> Result<SignedAccess, GateError> {
        let hash = signing_hash(&request, &self.config);
        let sig = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|e| GateError::SignatureError(format!("signing failed: {e}")))?;
        let payload = request.to_payload()?;

        Ok(SignedAccess {
            request,
            signature: encode_signature_hex(&sig),
            payload,
        })
    }
}

struct PayloadFormatter;

impl serde_json::ser::Formatter for PayloadFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    // Control characters, quotes and backslashes never reach here.
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if (' '..='~').contains(&c) {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

/// Encode a signature as 0x + 130 hex chars (v = 27/28 in the last byte).
pub fn encode_signature_hex(sig: &Signature) -> String {
    format!("0x{}", hex::encode(sig.as_bytes()))
}

/// secp256k1 curve order N / 2. Signatures with s above this are malleable (EIP-2).
const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xBFD25E8CD0364140,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0x7FFFFFFFFFFFFFFF,
]);

/// Recover the address that signed `request`.
pub fn recover_signer(
    request: &AccessRequest,
    signature: &str,
    config: &GateConfig,
) -> Result<Address, GateError> {
    let bytes = hex::decode(signature.trim())
        .map_err(|e| GateError::SignatureError(format!("invalid hex: {e}")))?;

    if bytes.len() != 65 {
        return Err(GateError::SignatureError(format!(
            "signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }

    let sig = Signature::from_raw(&bytes)
        .map_err(|e| GateError::SignatureError(format!("invalid signature: {e}")))?;

    if sig.s() > SECP256K1_N_DIV_2 {
        return Err(GateError::SignatureError(
            "high-s signature rejected (EIP-2 malleability)".to_string(),
        ));
    }

    sig.recover_address_from_prehash(&signing_hash(request, config))
        .map_err(|e| GateError::SignatureError(format!("recovery failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hardhat account #0. Public test key.
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_sign_and_recover_roundtrip() {
        let signer = AccessSigner::new(TEST_KEY, GateConfig::default()).unwrap();
        let signed = signer.sign("weather").unwrap();

        assert!(signed.signature.starts_with("0x"));
        assert_eq!(signed.signature.len(), 132);

        let recovered = recover_signer(&signed.request, &signed.signature, signer.config()).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_known_key_address() {
        let signer = AccessSigner::new(TEST_KEY, GateConfig::default()).unwrap();
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(signer.address(), expected);

        // Prefix is optional
        let bare = AccessSigner::new(TEST_KEY.trim_start_matches("0x"), GateConfig::default());
        assert_eq!(bare.unwrap().address(), expected);
    }

    #[test]
    fn test_domain_separates_chains() {
        let signer = AccessSigner::random(GateConfig::default());
        let signed = signer.sign("weather").unwrap();

        let other_chain = GateConfig {
            chain_id: 84532,
            ..GateConfig::default()
        };
        let recovered = recover_signer(&signed.request, &signed.signature, &other_chain);
        assert!(recovered.map_or(true, |addr| addr != signer.address()));
    }

    #[test]
    fn test_tampered_payload_does_not_recover_signer() {
        let signer = AccessSigner::random(GateConfig::default());
        let signed = signer.sign("weather").unwrap();

        let mut tampered = signed.request.clone();
        tampered.service = "premium".to_string();
        let recovered = recover_signer(&tampered, &signed.signature, signer.config());
        assert!(recovered.map_or(true, |addr| addr != signer.address()));
    }

    #[test]
    fn test_payload_json_shape() {
        let signer = AccessSigner::random(GateConfig::default());
        let request = AccessRequest::at("weather", 1_700_000_000);
        let signed = signer.sign_request(request.clone()).unwrap();

        let json: serde_json::Value = serde_json::from_str(&signed.payload).unwrap();
        assert_eq!(json["service"], "weather");
        assert_eq!(json["timestamp"], 1_700_000_000u64);
        assert_eq!(json["nonce"], request.nonce.as_str());
        assert_eq!(json.as_object().unwrap().len(), 3);
        assert_eq!(
            signed.payload,
            format!(
                r#"{{"service": "weather", "timestamp": 1700000000, "nonce": "{}"}}"#,
                request.nonce
            )
        );
    }

    #[test]
    fn test_payload_escapes_non_ascii() {
        let mut request = AccessRequest::at("m\u{e9}t\u{e9}o \u{1f327}", 1);
        request.nonce = "n\"1\u{7f}".to_string();
        let payload = request.to_payload().unwrap();

        assert_eq!(
            payload,
            r#"{"service": "m\u00e9t\u00e9o \ud83c\udf27", "timestamp": 1, "nonce": "n\"1\u007f"}"#
        );
        assert!(payload.bytes().all(|b| (b' '..=b'~').contains(&b)));
        let back: AccessRequest = serde_json::from_str(&payload).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_nonce_is_fresh_hex() {
        let a = AccessRequest::new("weather");
        let b = AccessRequest::new("weather");
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(a.nonce.len(), 32);
        assert!(a.nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_rejects_bad_signatures() {
        let request = AccessRequest::new("weather");
        let config = GateConfig::default();

        assert!(recover_signer(&request, "0xdead", &config).is_err());
        assert!(recover_signer(&request, "not-hex", &config).is_err());

        // s far above N/2
        let high_s = Signature::new(U256::from(1u64), U256::MAX >> 1, false);
        let hex_sig = encode_signature_hex(&high_s);
        assert!(recover_signer(&request, &hex_sig, &config).is_err());
    }

    #[test]
    fn test_invalid_private_key() {
        let err = AccessSigner::new("0xnotakey", GateConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPrivateKey(_)));
    }
}
