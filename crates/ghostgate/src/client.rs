//! HTTP client for the remote gate.
//!
//! Only the status of the final response (after redirects) is consulted.
//! Transport failures, timeouts and unexpected statuses all deny access.

use reqwest::{Method, StatusCode};

use crate::constants::{GateConfig, ACCEPT_VALUE, COST_HEADER, PAYLOAD_HEADER, SIG_HEADER};
use crate::credential::Proof;
use crate::error::GateError;

/// Redirect hops followed before the final status decides.
const MAX_REDIRECTS: usize = 10;

/// Result of one gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 2xx
    Allowed,
    /// 402
    PaymentRequired,
    /// Any other status.
    Rejected(u16),
    /// Transport error or timeout.
    Unreachable,
}

impl Verdict {
    pub fn from_status(status: u16) -> Self {
        match status {
            402 => Verdict::PaymentRequired,
            200..=299 => Verdict::Allowed,
            other => Verdict::Rejected(other),
        }
    }

    pub fn is_allowed(self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Allowed => write!(f, "allowed"),
            Verdict::PaymentRequired => write!(f, "payment required"),
            Verdict::Rejected(status) => write!(f, "rejected (status {status})"),
            Verdict::Unreachable => write!(f, "gate unreachable"),
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenVerifyBody<'a> {
    api_key: &'a str,
    token: &'a str,
    cost: i64,
}

/// Calls the gate (`/api/gate/{service}`) or the token verifier (`/api/verify`).
#[derive(Clone)]
pub struct GateClient {
    http: reqwest::Client,
    config: GateConfig,
    api_key: String,
}

impl GateClient {
    pub fn new(api_key: impl Into<String>, config: GateConfig) -> Result<Self, GateError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| GateError::HttpError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(api_key, config, http))
    }

    /// Create a client with a custom reqwest::Client.
    pub fn with_http_client(
        api_key: impl Into<String>,
        config: GateConfig,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            config,
            api_key: api_key.into(),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// `true` only when the gate answered 2xx.
    pub async fn verify(&self, proof: &Proof, cost: i64, service: &str, method: &Method) -> bool {
        self.check(proof, cost, service, method).await.is_allowed()
    }

    pub async fn check(&self, proof: &Proof, cost: i64, service: &str, method: &Method) -> Verdict {
        let request = match proof {
            Proof::Signed(signed) => self
                .http
                .request(method.clone(), self.config.gate_url(service))
                .header(SIG_HEADER, &signed.signature)
                .header(PAYLOAD_HEADER, &signed.payload)
                .header(COST_HEADER, cost.to_string())
                .header(reqwest::header::ACCEPT, ACCEPT_VALUE),
            Proof::Bearer(token) => self.http.post(self.config.verify_url()).json(&TokenVerifyBody {
                api_key: &self.api_key,
                token,
                cost,
            }),
        };

        let resp = match request.timeout(self.config.verify_timeout).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(service, error = %e, "gate request failed");
                return Verdict::Unreachable;
            }
        };

        let status = resp.status();
        let verdict = Verdict::from_status(status.as_u16());
        if status == StatusCode::PAYMENT_REQUIRED {
            tracing::debug!(service, cost, "gate denied access: payment required");
        } else if !verdict.is_allowed() {
            tracing::warn!(service, status = status.as_u16(), "gate returned unexpected status");
        } else {
            tracing::debug!(service, cost, "gate allowed access");
        }
        verdict
    }
}
