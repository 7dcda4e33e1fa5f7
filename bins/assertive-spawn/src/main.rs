use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use assertive_spawn::{spawn_assertively, LaunchRequest, ProcessHandle, SpawnError, SpawnErrorKind};

/// Run a command and exit with a status that reflects how it terminated
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Launch request file (YAML); the command line may add arguments to it
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Working directory for the command
    #[arg(long, value_name = "DIR")]
    cwd: Option<String>,

    /// Extra environment variable (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Start the command with an empty environment
    #[arg(long)]
    clear_env: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Command to run, followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    initialize_logging(args.debug);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let request = build_request(&args)?;
    info!("Running '{}' with args {:?}", request.command, request.args);

    let (handle, settlement) = match spawn_assertively(&request) {
        Ok(spawned) => spawned,
        Err(e) => {
            error!("{} (code: {})", e, e.error_code().unwrap_or("none"));
            return Ok(ExitCode::from(exit_status_for(&e)));
        }
    };
    debug!("Spawned '{}' (PID: {:?})", handle.command(), handle.id());

    let mut settlement = settlement;
    let result = tokio::select! {
        result = &mut settlement => result,
        _ = shutdown_signal() => {
            forward_termination(&handle).await;
            settlement.await
        }
    };

    match result {
        Ok(()) => {
            info!("'{}' completed successfully", request.command);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            warn!("{}", e);
            Ok(ExitCode::from(exit_status_for(&e)))
        }
    }
}

fn build_request(args: &Args) -> Result<LaunchRequest> {
    let mut request = match &args.config {
        Some(path) => LaunchRequest::load_from_file(path)?,
        None => {
            let (command, rest) = args
                .command
                .split_first()
                .ok_or_else(|| anyhow!("No command given (pass one after the options or use --config)"))?;
            return Ok(apply_overrides(LaunchRequest::new(command.clone()).args(rest.iter().cloned()), args));
        }
    };

    request.args.extend(args.command.iter().cloned());
    Ok(apply_overrides(request, args))
}

fn apply_overrides(mut request: LaunchRequest, args: &Args) -> LaunchRequest {
    if let Some(ref cwd) = args.cwd {
        request = request.current_dir(cwd.clone());
    }
    if args.clear_env {
        request = request.clear_env(true);
    }
    for (key, value) in &args.env {
        request = request.env(key.clone(), value.clone());
    }
    request
}

fn parse_env_pair(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(anyhow!("Environment variable name cannot be empty: '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Maps a failed settlement to this process's own exit status, shell style.
fn exit_status_for(error: &SpawnError) -> u8 {
    let code = match error.kind() {
        SpawnErrorKind::ExitCode => error.exit_code_value().unwrap_or(1),
        SpawnErrorKind::Signal => signal_exit_code(error),
        SpawnErrorKind::Launch if error.error_code() == Some("ENOENT") => 127,
        SpawnErrorKind::Launch => 126,
        SpawnErrorKind::Monitoring | SpawnErrorKind::ProcessGone | SpawnErrorKind::Control => 1,
    };
    u8::try_from(code).unwrap_or(1)
}

#[cfg(unix)]
fn signal_exit_code(error: &SpawnError) -> i32 {
    error
        .signal_name()
        .and_then(|signal| signal.number())
        .map_or(1, |number| 128 + number)
}

#[cfg(not(unix))]
fn signal_exit_code(_error: &SpawnError) -> i32 {
    1
}

async fn forward_termination(handle: &ProcessHandle) {
    info!("Forwarding termination to '{}' (PID: {:?})", handle.command(), handle.id());
    if let Err(e) = handle.terminate().await {
        warn!("Failed to terminate '{}': {}", handle.command(), e);
    }
}

fn initialize_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to create SIGTERM handler: {}", e);
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = signal::ctrl_c() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C signal");
        } else {
            std::future::pending::<()>().await;
        }
    }
}
