use std::time::Duration;

/// Default GhostGate deployment.
pub const DEFAULT_BASE_URL: &str = "https://ghost-rank.vercel.app";

/// Gate endpoint prefix; the service name is appended as a path segment.
pub const GATE_PATH: &str = "/api/gate";

/// Token verification endpoint.
pub const VERIFY_PATH: &str = "/api/verify";

/// Merchant heartbeat endpoint.
pub const PULSE_PATH: &str = "/api/telemetry/pulse";

/// Consumer outcome endpoint.
pub const OUTCOME_PATH: &str = "/api/telemetry/outcome";

/// EIP-712 domain name for access signatures.
pub const DOMAIN_NAME: &str = "GhostGate";

/// EIP-712 domain version for access signatures.
pub const DOMAIN_VERSION: &str = "1";

/// Base mainnet chain ID.
pub const DEFAULT_CHAIN_ID: u64 = 8453;

pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);
pub const TELEMETRY_TIMEOUT: Duration = Duration::from_secs(5);

/// Value returned in place of the handler's result when access is denied.
pub const PAYMENT_REQUIRED: &str = "Payment Required";

pub const DEFAULT_SERVICE: &str = "weather";

pub const SIG_HEADER: &str = "x-ghost-sig";
pub const PAYLOAD_HEADER: &str = "x-ghost-payload";
pub const COST_HEADER: &str = "x-ghost-credit-cost";
pub const ACCEPT_VALUE: &str = "application/json, text/plain;q=0.9, */*;q=0.8";

/// Request header carrying a bearer credential for the token scheme.
pub const TOKEN_HEADER: &str = "x-ghost-token";

pub const ENV_API_KEY: &str = "GHOST_GATE_API_KEY";
pub const ENV_BASE_URL: &str = "GHOST_GATE_BASE_URL";
pub const ENV_TELEMETRY_URL: &str = "GHOST_GATE_TELEMETRY_URL";
pub const ENV_CHAIN_ID: &str = "GHOST_GATE_CHAIN_ID";
pub const ENV_SCHEME: &str = "GHOST_GATE_SCHEME";

/// Private key variables, checked in order.
pub const ENV_PRIVATE_KEYS: [&str; 2] = ["GHOST_SIGNER_PRIVATE_KEY", "PRIVATE_KEY"];

/// Token override variables, checked in order.
pub const ENV_TOKENS: [&str; 2] = ["GHOST_GATE_TOKEN", "GHOSTGATE_TOKEN"];

/// Runtime gate configuration. Set once and shared read-only by every guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub base_url: String,
    /// Telemetry host; usually the same deployment as `base_url`.
    pub telemetry_url: String,
    pub chain_id: u64,
    pub domain_name: String,
    pub domain_version: String,
    pub verify_timeout: Duration,
    pub telemetry_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            telemetry_url: DEFAULT_BASE_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            domain_name: DOMAIN_NAME.to_string(),
            domain_version: DOMAIN_VERSION.to_string(),
            verify_timeout: VERIFY_TIMEOUT,
            telemetry_timeout: TELEMETRY_TIMEOUT,
        }
    }
}

impl GateConfig {
    /// Point both the gate and telemetry at one deployment.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            base_url: base.clone(),
            telemetry_url: base,
            ..Self::default()
        }
    }

    pub fn gate_url(&self, service: &str) -> String {
        format!("{}{}/{}", self.base_url.trim_end_matches('/'), GATE_PATH, service)
    }

    pub fn verify_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), VERIFY_PATH)
    }

    pub fn pulse_url(&self) -> String {
        format!("{}{}", self.telemetry_url.trim_end_matches('/'), PULSE_PATH)
    }

    pub fn outcome_url(&self) -> String {
        format!("{}{}", self.telemetry_url.trim_end_matches('/'), OUTCOME_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls() {
        let config = GateConfig::default();
        assert_eq!(
            config.gate_url("weather"),
            "https://ghost-rank.vercel.app/api/gate/weather"
        );
        assert_eq!(
            config.outcome_url(),
            "https://ghost-rank.vercel.app/api/telemetry/outcome"
        );
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = GateConfig::with_base_url("http://localhost:3000/");
        assert_eq!(config.verify_url(), "http://localhost:3000/api/verify");
        assert_eq!(config.pulse_url(), "http://localhost:3000/api/telemetry/pulse");
    }
}
