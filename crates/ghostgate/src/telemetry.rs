//! Best-effort telemetry: merchant pulses and consumer outcomes.
//!
//! Every call here returns `bool` and nothing else. Failures are logged at
//! debug level and dropped; there are no retries.

use std::time::Duration;

use serde::Serialize;

use crate::constants::GateConfig;

/// Heartbeat body for `/api/telemetry/pulse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pulse {
    pub api_key: String,
    pub agent_id: Option<String>,
}

/// Outcome body for `/api/telemetry/outcome`. Absent values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub api_key: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub agent_id: Option<String>,
}

/// POST `payload` as JSON. `true` on a 2xx answer, `false` on anything else.
pub async fn post_optional<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    payload: &T,
    timeout: Duration,
) -> bool {
    match client.post(url).json(payload).timeout(timeout).send().await {
        Ok(resp) if resp.status().is_success() => true,
        Ok(resp) => {
            tracing::debug!(url, status = resp.status().as_u16(), "telemetry rejected");
            false
        }
        Err(e) => {
            tracing::debug!(url, error = %e, "telemetry dropped");
            false
        }
    }
}

#[derive(Clone)]
pub struct Reporter {
    http: reqwest::Client,
    config: GateConfig,
    api_key: String,
}

impl Reporter {
    pub fn new(api_key: impl Into<String>, config: GateConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            config,
            api_key: api_key.into(),
        }
    }

    /// Merchant-side heartbeat.
    pub async fn send_pulse(&self, agent_id: Option<&str>) -> bool {
        let pulse = Pulse {
            api_key: self.api_key.clone(),
            agent_id: agent_id.map(str::to_string),
        };
        post_optional(
            &self.http,
            &self.config.pulse_url(),
            &pulse,
            self.config.telemetry_timeout,
        )
        .await
    }

    /// Consumer-side outcome for scoring.
    pub async fn report_outcome(
        &self,
        success: bool,
        status_code: Option<u16>,
        agent_id: Option<&str>,
    ) -> bool {
        let outcome = Outcome {
            api_key: self.api_key.clone(),
            success,
            status_code,
            agent_id: agent_id.map(str::to_string),
        };
        post_optional(
            &self.http,
            &self.config.outcome_url(),
            &outcome,
            self.config.telemetry_timeout,
        )
        .await
    }
}
