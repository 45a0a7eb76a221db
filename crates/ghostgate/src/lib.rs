//! Credit gate for API handlers.
//!
//! A guarded handler only runs after the GhostGate service confirms the
//! caller has paid for it. Each call signs a fresh EIP-712 access request
//! (or presents a bearer token), asks the gate, and on a 2xx answer runs the
//! handler and reports how it went.
//!
//! - Access is fail-closed: no credential, a 402, any non-2xx status or a
//!   network error all block the handler.
//! - Telemetry is fail-silent: report failures never reach the caller.
//!
//! # Quick example
//!
//! ```no_run
//! use ghostgate::{GateConfig, GhostGate, Guarded};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ghostgate::GateError> {
//! let gate = GhostGate::signed("my-api-key", Some("0xYOUR_KEY"), GateConfig::default())?;
//! let guard = gate.guard(5, "weather")?;
//!
//! match guard.call(&(), || async { ("sunny".to_string(), 200u16) }).await {
//!     Guarded::Served((body, _)) => println!("{body}"),
//!     Guarded::PaymentRequired => println!("Payment Required"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod client;
pub mod config;
pub mod constants;
pub mod credential;
pub mod error;
pub mod guard;
pub mod status;
pub mod telemetry;

pub use access::{recover_signer, AccessRequest, AccessSigner, SignedAccess};
pub use client::{GateClient, Verdict};
pub use config::{ConfigError, CredentialScheme, GateSettings};
pub use constants::*;
pub use credential::{CredentialSource, HeaderSource, Proof, TokenResolver};
pub use error::GateError;
pub use guard::{GhostGate, Guard, Guarded, GuardedHandler, PaymentRequired};
pub use status::{is_success, Plain, StatusCarrier, WithStatus};
pub use telemetry::{post_optional, Outcome, Pulse, Reporter};
