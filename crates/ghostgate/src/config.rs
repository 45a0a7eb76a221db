//! Environment-driven settings.
//!
//! [`GateSettings::from_env`] reads the process environment;
//! [`GateSettings::from_lookup`] takes any key lookup so the parsing can be
//! exercised without touching global state.

use std::env;

use url::Url;

use crate::constants::{
    GateConfig, ENV_API_KEY, ENV_BASE_URL, ENV_CHAIN_ID, ENV_PRIVATE_KEYS, ENV_SCHEME,
    ENV_TELEMETRY_URL, ENV_TOKENS,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("api_key is required")]
    MissingApiKey,

    #[error("a signing private key is required (private_key arg or GHOST_SIGNER_PRIVATE_KEY/PRIVATE_KEY)")]
    MissingSigningKey,

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("cost must be greater than 0, got {0}")]
    InvalidCost(i64),

    #[error("service is required")]
    EmptyService,

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid chain id: {0}")]
    InvalidChainId(String),

    #[error("unknown credential scheme: {0} (expected \"signature\" or \"token\")")]
    UnknownScheme(String),
}

/// How the gate obtains proof of payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialScheme {
    /// EIP-712 signed access request.
    #[default]
    Signature,
    /// Bearer token from an override or request header.
    Token,
}

impl std::str::FromStr for CredentialScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "signature" | "sig" | "eip712" => Ok(Self::Signature),
            "token" | "bearer" => Ok(Self::Token),
            other => Err(ConfigError::UnknownScheme(other.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct GateSettings {
    pub api_key: String,
    /// Signing key for the signature scheme
    pub private_key: Option<String>,
    /// Token override for the token scheme
    pub token: Option<String>,
    pub scheme: CredentialScheme,
    pub gate: GateConfig,
}

impl std::fmt::Debug for GateSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateSettings")
            .field("api_key", &"[REDACTED]")
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("scheme", &self.scheme)
            .field("gate", &self.gate)
            .finish()
    }
}

impl GateSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Required: API key
        let api_key = get(ENV_API_KEY).ok_or(ConfigError::MissingRequired(ENV_API_KEY))?;

        // Optional: gate base URL
        let mut gate = match get(ENV_BASE_URL) {
            Some(base) => {
                validate_url(&base)?;
                GateConfig::with_base_url(&base)
            }
            None => GateConfig::default(),
        };

        // Optional: separate telemetry host
        if let Some(telemetry) = get(ENV_TELEMETRY_URL) {
            validate_url(&telemetry)?;
            gate.telemetry_url = telemetry.trim_end_matches('/').to_string();
        }

        // Optional: chain id for the EIP-712 domain
        if let Some(raw) = get(ENV_CHAIN_ID) {
            gate.chain_id = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidChainId(raw.clone()))?;
        }

        let scheme = match get(ENV_SCHEME) {
            Some(s) => s.parse()?,
            None => CredentialScheme::default(),
        };

        let private_key = ENV_PRIVATE_KEYS.iter().find_map(|&key| get(key));
        let token = ENV_TOKENS.iter().find_map(|&key| get(key));

        if scheme == CredentialScheme::Signature && private_key.is_none() {
            return Err(ConfigError::MissingSigningKey);
        }

        Ok(Self {
            api_key,
            private_key,
            token,
            scheme,
            gate,
        })
    }
}

/// Reject anything `url` cannot parse as an absolute http(s) URL.
pub fn validate_url(raw: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::InvalidUrl(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key() {
        let err = GateSettings::from_lookup(lookup(&[("PRIVATE_KEY", "0x01")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired("GHOST_GATE_API_KEY")));
    }

    #[test]
    fn test_signature_scheme_requires_key() {
        let err = GateSettings::from_lookup(lookup(&[("GHOST_GATE_API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSigningKey));
    }

    #[test]
    fn test_private_key_precedence() {
        let settings = GateSettings::from_lookup(lookup(&[
            ("GHOST_GATE_API_KEY", "k"),
            ("GHOST_SIGNER_PRIVATE_KEY", "first"),
            ("PRIVATE_KEY", "second"),
        ]))
        .unwrap();
        assert_eq!(settings.private_key.as_deref(), Some("first"));
        assert_eq!(settings.gate, GateConfig::default());
    }

    #[test]
    fn test_token_scheme_without_key() {
        let settings = GateSettings::from_lookup(lookup(&[
            ("GHOST_GATE_API_KEY", "k"),
            ("GHOST_GATE_SCHEME", "token"),
            ("GHOSTGATE_TOKEN", "tok"),
        ]))
        .unwrap();
        assert_eq!(settings.scheme, CredentialScheme::Token);
        assert_eq!(settings.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_base_and_telemetry_urls() {
        let settings = GateSettings::from_lookup(lookup(&[
            ("GHOST_GATE_API_KEY", "k"),
            ("PRIVATE_KEY", "0x01"),
            ("GHOST_GATE_BASE_URL", "http://localhost:3000/"),
            ("GHOST_GATE_TELEMETRY_URL", "http://localhost:4000"),
            ("GHOST_GATE_CHAIN_ID", "84532"),
        ]))
        .unwrap();
        assert_eq!(settings.gate.base_url, "http://localhost:3000");
        assert_eq!(settings.gate.telemetry_url, "http://localhost:4000");
        assert_eq!(settings.gate.chain_id, 84532);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = GateSettings::from_lookup(lookup(&[
            ("GHOST_GATE_API_KEY", "k"),
            ("PRIVATE_KEY", "0x01"),
            ("GHOST_GATE_BASE_URL", "ftp://nope"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));

        let err = GateSettings::from_lookup(lookup(&[
            ("GHOST_GATE_API_KEY", "k"),
            ("PRIVATE_KEY", "0x01"),
            ("GHOST_GATE_CHAIN_ID", "base"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidChainId(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let settings = GateSettings::from_lookup(lookup(&[
            ("GHOST_GATE_API_KEY", "super-secret-api-key"),
            ("PRIVATE_KEY", "0xdeadbeef"),
        ]))
        .unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("super-secret-api-key"));
        assert!(!debug.contains("0xdeadbeef"));
        assert!(debug.contains("[REDACTED]"));
    }
}
