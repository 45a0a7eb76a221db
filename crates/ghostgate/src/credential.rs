//! Credential resolution.
//!
//! - [`CredentialSource`]: produces a [`Proof`] for one guarded call
//! - [`AccessSigner`]: signature scheme, signs a fresh access request
//! - [`TokenResolver`]: token scheme, override first, then request headers
//!
//! The caller's request headers are passed in explicitly as a
//! [`HeaderSource`]; there is no ambient "current request".

use std::collections::{BTreeMap, HashMap};

use crate::access::{AccessSigner, SignedAccess};
use crate::constants::{ENV_TOKENS, TOKEN_HEADER};

/// Proof of payment presented to the gate.
#[derive(Clone, PartialEq, Eq)]
pub enum Proof {
    Signed(SignedAccess),
    Bearer(String),
}

impl std::fmt::Debug for Proof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Proof::Signed(signed) => f.debug_tuple("Signed").field(signed).finish(),
            Proof::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
        }
    }
}

/// Read access to the headers of the request being served.
pub trait HeaderSource {
    fn header(&self, name: &str) -> Option<&str>;
}

/// No request in scope.
impl HeaderSource for () {
    fn header(&self, _name: &str) -> Option<&str> {
        None
    }
}

impl HeaderSource for reqwest::header::HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }
}

impl HeaderSource for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl HeaderSource for BTreeMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<H: HeaderSource + ?Sized> HeaderSource for &H {
    fn header(&self, name: &str) -> Option<&str> {
        (**self).header(name)
    }
}

/// Produces proof of payment for a guarded call.
pub trait CredentialSource: Send + Sync {
    /// Resolve a proof for `service`, or `None` when no credential is available.
    fn resolve(&self, service: &str, headers: &dyn HeaderSource) -> Option<Proof>;
}

impl CredentialSource for AccessSigner {
    fn resolve(&self, service: &str, _headers: &dyn HeaderSource) -> Option<Proof> {
        match self.sign(service) {
            Ok(signed) => Some(Proof::Signed(signed)),
            Err(e) => {
                tracing::warn!(service, error = %e, "failed to sign access request");
                None
            }
        }
    }
}

/// Bearer token lookup: explicit override, then request header.
#[derive(Clone)]
pub struct TokenResolver {
    override_token: Option<String>,
    header: String,
}

impl std::fmt::Debug for TokenResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResolver")
            .field(
                "override_token",
                &self.override_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("header", &self.header)
            .finish()
    }
}

impl Default for TokenResolver {
    fn default() -> Self {
        Self {
            override_token: None,
            header: TOKEN_HEADER.to_string(),
        }
    }
}

impl TokenResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the override from `GHOST_GATE_TOKEN` / `GHOSTGATE_TOKEN`.
    pub fn from_env() -> Self {
        let override_token = ENV_TOKENS
            .iter()
            .find_map(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()));
        Self {
            override_token,
            ..Self::default()
        }
    }

    pub fn with_override(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.override_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>) -> Self {
        self.header = name.into();
        self
    }

    /// First non-empty token wins.
    pub fn resolve_token(&self, headers: &dyn HeaderSource) -> Option<String> {
        if let Some(token) = &self.override_token {
            return Some(token.trim().to_string());
        }

        header_variants(&self.header)
            .iter()
            .filter_map(|name| headers.header(name))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }
}

impl CredentialSource for TokenResolver {
    fn resolve(&self, _service: &str, headers: &dyn HeaderSource) -> Option<Proof> {
        self.resolve_token(headers).map(Proof::Bearer)
    }
}

/// Spellings tried for a header name: as given, lower, Title-Case, UPPER.
pub fn header_variants(name: &str) -> Vec<String> {
    let title = name
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-");

    let mut variants: Vec<String> = Vec::with_capacity(4);
    for candidate in [
        name.to_string(),
        name.to_ascii_lowercase(),
        title,
        name.to_ascii_uppercase(),
    ] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GateConfig;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_header_variants() {
        assert_eq!(
            header_variants("x-ghost-token"),
            vec!["x-ghost-token", "X-Ghost-Token", "X-GHOST-TOKEN"]
        );
        assert_eq!(header_variants("X-GHOST-TOKEN").len(), 3);
    }

    #[test]
    fn test_override_beats_header() {
        let resolver = TokenResolver::new().with_override("from-env");
        let h = headers(&[("x-ghost-token", "from-header")]);
        assert_eq!(resolver.resolve_token(&h).as_deref(), Some("from-env"));
    }

    #[test]
    fn test_header_case_variants() {
        let resolver = TokenResolver::new();
        for name in ["x-ghost-token", "X-Ghost-Token", "X-GHOST-TOKEN"] {
            let h = headers(&[(name, "tok")]);
            assert_eq!(resolver.resolve_token(&h).as_deref(), Some("tok"), "{name}");
        }
    }

    #[test]
    fn test_blank_values_are_skipped() {
        let resolver = TokenResolver::new().with_override("   ");
        let h = headers(&[("x-ghost-token", "  "), ("X-Ghost-Token", "real")]);
        assert_eq!(resolver.resolve_token(&h).as_deref(), Some("real"));
    }

    #[test]
    fn test_nothing_resolves_to_none() {
        let resolver = TokenResolver::new();
        assert!(resolver.resolve("weather", &()).is_none());
        assert!(resolver.resolve("weather", &headers(&[("other", "x")])).is_none());
    }

    #[test]
    fn test_header_map_source() {
        let mut map = reqwest::header::HeaderMap::new();
        map.insert("X-Ghost-Token", "abc".parse().unwrap());
        let resolver = TokenResolver::new();
        assert_eq!(
            resolver.resolve("weather", &map),
            Some(Proof::Bearer("abc".to_string()))
        );
    }

    #[test]
    fn test_custom_header_name() {
        let resolver = TokenResolver::new().with_header("x-api-token");
        let h = headers(&[("X-Api-Token", "abc")]);
        assert_eq!(resolver.resolve_token(&h).as_deref(), Some("abc"));
    }

    #[test]
    fn test_signer_always_resolves() {
        let signer = AccessSigner::random(GateConfig::default());
        match signer.resolve("weather", &()) {
            Some(Proof::Signed(signed)) => assert_eq!(signed.request.service, "weather"),
            other => panic!("expected signed proof, got {other:?}"),
        }
    }

    #[test]
    fn test_bearer_debug_is_redacted() {
        let proof = Proof::Bearer("secret-token".to_string());
        assert!(!format!("{proof:?}").contains("secret-token"));
    }
}
