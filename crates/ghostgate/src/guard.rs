//! The access guard.
//!
//! [`GhostGate`] holds the credentials and HTTP plumbing; [`Guard`] binds a
//! cost and service to it and runs handlers behind the gate.
//!
//! A guarded call resolves a credential, verifies it with the gate, runs the
//! handler only on a 2xx verdict, then reports the handler's outcome. Denials
//! come back as [`Guarded::PaymentRequired`]; telemetry never changes the
//! returned value.

use std::future::Future;
use std::sync::Arc;

use reqwest::Method;

use crate::access::AccessSigner;
use crate::client::{GateClient, Verdict};
use crate::config::{ConfigError, CredentialScheme, GateSettings};
use crate::constants::{GateConfig, DEFAULT_SERVICE, ENV_PRIVATE_KEYS, PAYMENT_REQUIRED};
use crate::credential::{CredentialSource, HeaderSource, TokenResolver};
use crate::error::GateError;
use crate::status::{is_success, StatusCarrier};
use crate::telemetry::Reporter;

struct Inner {
    credentials: Box<dyn CredentialSource>,
    client: GateClient,
    reporter: Reporter,
}

/// Credit gate client. Cheap to clone; all clones share one HTTP pool.
#[derive(Clone)]
pub struct GhostGate {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for GhostGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GhostGate")
            .field("config", self.config())
            .finish_non_exhaustive()
    }
}

fn require_api_key(api_key: String) -> Result<String, ConfigError> {
    if api_key.trim().is_empty() {
        return Err(ConfigError::MissingApiKey);
    }
    Ok(api_key)
}

impl GhostGate {
    pub fn new(
        api_key: impl Into<String>,
        credentials: impl CredentialSource + 'static,
        config: GateConfig,
    ) -> Result<Self, GateError> {
        let api_key = require_api_key(api_key.into())?;
        let client = GateClient::new(api_key.clone(), config.clone())?;
        let reporter = Reporter::new(api_key, config, client.http().clone());

        Ok(Self {
            inner: Arc::new(Inner {
                credentials: Box::new(credentials),
                client,
                reporter,
            }),
        })
    }

    /// Signature scheme. Falls back to `GHOST_SIGNER_PRIVATE_KEY`, then
    /// `PRIVATE_KEY`, when no key is passed.
    pub fn signed(
        api_key: impl Into<String>,
        private_key: Option<&str>,
        config: GateConfig,
    ) -> Result<Self, GateError> {
        let api_key = require_api_key(api_key.into())?;
        let key = private_key
            .filter(|k| !k.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                ENV_PRIVATE_KEYS
                    .iter()
                    .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            })
            .ok_or(ConfigError::MissingSigningKey)?;

        let signer = AccessSigner::new(&key, config.clone())?;
        Self::new(api_key, signer, config)
    }

    /// Token scheme.
    pub fn with_token(
        api_key: impl Into<String>,
        resolver: TokenResolver,
        config: GateConfig,
    ) -> Result<Self, GateError> {
        Self::new(api_key, resolver, config)
    }

    pub fn from_settings(settings: GateSettings) -> Result<Self, GateError> {
        match settings.scheme {
            CredentialScheme::Signature => {
                let key = settings
                    .private_key
                    .as_deref()
                    .ok_or(ConfigError::MissingSigningKey)?;
                let signer = AccessSigner::new(key, settings.gate.clone())?;
                Self::new(settings.api_key, signer, settings.gate)
            }
            CredentialScheme::Token => {
                let mut resolver = TokenResolver::new();
                if let Some(token) = settings.token {
                    resolver = resolver.with_override(token);
                }
                Self::new(settings.api_key, resolver, settings.gate)
            }
        }
    }

    pub fn from_env() -> Result<Self, GateError> {
        Self::from_settings(GateSettings::from_env()?)
    }

    pub fn config(&self) -> &GateConfig {
        self.inner.client.config()
    }

    /// Bind a cost and service. Rejects `cost <= 0` and an empty service.
    pub fn guard(&self, cost: i64, service: &str) -> Result<Guard, GateError> {
        if cost <= 0 {
            return Err(ConfigError::InvalidCost(cost).into());
        }
        let service = service.trim();
        if service.is_empty() {
            return Err(ConfigError::EmptyService.into());
        }

        Ok(Guard {
            gate: self.clone(),
            cost,
            service: service.to_string(),
            method: Method::GET,
            report_outcomes: true,
            agent_id: None,
        })
    }

    /// [`guard`](Self::guard) for the default `weather` service.
    pub fn guard_default(&self, cost: i64) -> Result<Guard, GateError> {
        self.guard(cost, DEFAULT_SERVICE)
    }

    /// One gate check, without running anything.
    pub async fn verify_access<S: HeaderSource>(
        &self,
        service: &str,
        cost: i64,
        method: &Method,
        headers: &S,
    ) -> Verdict {
        let Some(proof) = self.inner.credentials.resolve(service, headers) else {
            tracing::debug!(service, "no credential available, denying");
            return Verdict::PaymentRequired;
        };
        self.inner.client.check(&proof, cost, service, method).await
    }

    pub async fn send_pulse(&self, agent_id: Option<&str>) -> bool {
        self.inner.reporter.send_pulse(agent_id).await
    }

    pub async fn report_outcome(
        &self,
        success: bool,
        status_code: Option<u16>,
        agent_id: Option<&str>,
    ) -> bool {
        self.inner
            .reporter
            .report_outcome(success, status_code, agent_id)
            .await
    }
}

/// Returned instead of the handler's value when access is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentRequired;

impl std::fmt::Display for PaymentRequired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(PAYMENT_REQUIRED)
    }
}

impl std::error::Error for PaymentRequired {}

/// Result of a guarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<R> {
    PaymentRequired,
    Served(R),
}

impl<R> Guarded<R> {
    pub fn is_served(&self) -> bool {
        matches!(self, Guarded::Served(_))
    }

    pub fn served(self) -> Option<R> {
        match self {
            Guarded::Served(r) => Some(r),
            Guarded::PaymentRequired => None,
        }
    }

    pub fn into_result(self) -> Result<R, PaymentRequired> {
        self.served().ok_or(PaymentRequired)
    }
}

impl<R: std::fmt::Display> std::fmt::Display for Guarded<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Guarded::PaymentRequired => f.write_str(PAYMENT_REQUIRED),
            Guarded::Served(r) => r.fmt(f),
        }
    }
}

/// A cost and service bound to a [`GhostGate`].
#[derive(Clone)]
pub struct Guard {
    gate: GhostGate,
    cost: i64,
    service: String,
    method: Method,
    report_outcomes: bool,
    agent_id: Option<String>,
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("cost", &self.cost)
            .field("service", &self.service)
            .field("method", &self.method)
            .field("report_outcomes", &self.report_outcomes)
            .field("agent_id", &self.agent_id)
            .finish()
    }
}

impl Guard {
    /// HTTP method used against the gate (default `GET`). Case-insensitive.
    pub fn with_method(mut self, method: &str) -> Result<Self, GateError> {
        let upper = method.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return Err(ConfigError::InvalidMethod(method.to_string()).into());
        }
        self.method = Method::from_bytes(upper.as_bytes())
            .map_err(|_| ConfigError::InvalidMethod(method.to_string()))?;
        Ok(self)
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn without_outcome_reporting(mut self) -> Self {
        self.report_outcomes = false;
        self
    }

    pub fn cost(&self) -> i64 {
        self.cost
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Run `handler` if the gate allows it.
    pub async fn call<S, F, Fut, R>(&self, headers: &S, handler: F) -> Guarded<R>
    where
        S: HeaderSource + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
        R: StatusCarrier,
    {
        let verdict = self
            .gate
            .verify_access(&self.service, self.cost, &self.method, headers)
            .await;
        if !verdict.is_allowed() {
            tracing::debug!(service = %self.service, %verdict, "guarded call blocked");
            return Guarded::PaymentRequired;
        }

        let result = handler().await;

        if self.report_outcomes {
            let status_code = result.status_code();
            let delivered = self
                .gate
                .report_outcome(is_success(status_code), status_code, self.agent_id.as_deref())
                .await;
            if !delivered {
                tracing::debug!(service = %self.service, "outcome report not delivered");
            }
        }

        Guarded::Served(result)
    }

    /// Wrap a reusable handler taking one argument (use a tuple for several).
    pub fn wrap<H>(self, handler: H) -> GuardedHandler<H> {
        GuardedHandler {
            guard: self,
            handler,
        }
    }
}

/// A handler permanently bound to a [`Guard`].
pub struct GuardedHandler<H> {
    guard: Guard,
    handler: H,
}

impl<H> GuardedHandler<H> {
    /// Type name of the wrapped handler.
    pub fn name(&self) -> &'static str {
        std::any::type_name::<H>()
    }

    pub fn inner(&self) -> &H {
        &self.handler
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub async fn call<S, A, Fut, R>(&self, headers: &S, arg: A) -> Guarded<R>
    where
        S: HeaderSource + Sync,
        H: Fn(A) -> Fut,
        Fut: Future<Output = R>,
        R: StatusCarrier,
    {
        self.guard.call(headers, || (self.handler)(arg)).await
    }
}
