//! Operator tool for a GhostGate deployment.
//!
//! Reads the same environment as the library (`GHOST_GATE_API_KEY`,
//! `GHOST_SIGNER_PRIVATE_KEY`, `GHOST_GATE_BASE_URL`, ...), with `.env`
//! support. Settings are only loaded once a command needs them, so `--help`
//! works without any environment.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ghostgate::{
    AccessSigner, CredentialScheme, GateSettings, GhostGate, Verdict, COST_HEADER,
    DEFAULT_SERVICE, PAYLOAD_HEADER, SIG_HEADER,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ghostgate", version, about = "Operator tool for a GhostGate deployment")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Print the headers of a signed access request
    Sign {
        #[arg(default_value = DEFAULT_SERVICE)]
        service: String,
    },
    /// Ask the gate once (exit 0 allowed, 2 denied)
    Check {
        service: String,
        #[arg(allow_negative_numbers = true)]
        cost: i64,
        /// HTTP method for the signed request (default GET)
        method: Option<String>,
    },
    /// Send a merchant heartbeat
    Pulse { agent_id: Option<String> },
    /// Report a consumer outcome; `-` reports no status code
    Outcome {
        #[arg(value_parser = parse_status)]
        status: ReportedStatus,
        agent_id: Option<String>,
    },
}

/// Status code argument of `outcome`, where `-` means "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReportedStatus(Option<u16>);

fn parse_status(raw: &str) -> Result<ReportedStatus, String> {
    if raw == "-" {
        return Ok(ReportedStatus(None));
    }
    raw.parse::<u16>()
        .map(|code| ReportedStatus(Some(code)))
        .map_err(|_| format!("invalid status code: {raw}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Sign { service } => sign(&service),
        Command::Check {
            service,
            cost,
            method,
        } => check(&service, cost, method.as_deref()).await,
        Command::Pulse { agent_id } => pulse(agent_id.as_deref()).await,
        Command::Outcome { status, agent_id } => outcome(status.0, agent_id.as_deref()).await,
    }
}

fn fail(e: impl std::fmt::Display) -> ExitCode {
    eprintln!("ERROR: {e}");
    ExitCode::FAILURE
}

fn report(delivered: bool) -> ExitCode {
    if delivered {
        println!("delivered");
        ExitCode::SUCCESS
    } else {
        println!("not delivered");
        ExitCode::FAILURE
    }
}

fn load_settings() -> Result<GateSettings, ExitCode> {
    let settings = GateSettings::from_env().map_err(fail)?;
    tracing::debug!(?settings, "loaded settings");
    Ok(settings)
}

fn load_gate() -> Result<(GhostGate, GateSettings), ExitCode> {
    let settings = load_settings()?;
    let gate = GhostGate::from_settings(settings.clone()).map_err(fail)?;
    Ok((gate, settings))
}

fn sign(service: &str) -> ExitCode {
    let settings = match load_settings() {
        Ok(s) => s,
        Err(code) => return code,
    };
    let Some(key) = settings.private_key.as_deref() else {
        return fail("signing requires GHOST_SIGNER_PRIVATE_KEY or PRIVATE_KEY");
    };
    let signer = match AccessSigner::new(key, settings.gate.clone()) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let signed = match signer.sign(service) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    println!("# signer {}", signer.address());
    println!("# POST|GET {}", settings.gate.gate_url(&signed.request.service));
    println!("{SIG_HEADER}: {}", signed.signature);
    println!("{PAYLOAD_HEADER}: {}", signed.payload);
    ExitCode::SUCCESS
}

async fn check(service: &str, cost: i64, method: Option<&str>) -> ExitCode {
    let (gate, settings) = match load_gate() {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    if settings.scheme == CredentialScheme::Token && settings.token.is_none() {
        return fail("token scheme needs GHOST_GATE_TOKEN or GHOSTGATE_TOKEN");
    }

    let mut guard = match gate.guard(cost, service) {
        Ok(g) => g,
        Err(e) => return fail(e),
    };
    if let Some(method) = method {
        guard = match guard.with_method(method) {
            Ok(g) => g,
            Err(e) => return fail(e),
        };
    }

    println!(
        "{} {} ({COST_HEADER}: {})",
        guard.method(),
        gate.config().gate_url(guard.service()),
        guard.cost()
    );
    let verdict = gate
        .verify_access(guard.service(), guard.cost(), guard.method(), &())
        .await;
    println!("{verdict}");

    match verdict {
        Verdict::Allowed => ExitCode::SUCCESS,
        _ => ExitCode::from(2),
    }
}

async fn pulse(agent_id: Option<&str>) -> ExitCode {
    match load_gate() {
        Ok((gate, _)) => report(gate.send_pulse(agent_id).await),
        Err(code) => code,
    }
}

async fn outcome(status_code: Option<u16>, agent_id: Option<&str>) -> ExitCode {
    let (gate, _) = match load_gate() {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let success = ghostgate::is_success(status_code);
    report(gate.report_outcome(success, status_code, agent_id).await)
}
