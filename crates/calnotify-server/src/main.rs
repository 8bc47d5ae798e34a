//! calnotify server entry point.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use calnotify_core::{TracingConfig, TracingOutputFormat, init_tracing};
use calnotify_providers::OAuthCredentials;
use calnotify_server::{
    CheckerConfig, ConfigError, DEFAULT_PORT, ServerConfig, ServerResult, SignalHandler,
    parse_timezone, serve,
};
use clap::{ArgAction, Parser};
use tracing::{Level, error, info};

/// Google Calendar notifier.
#[derive(Debug, Parser)]
#[command(name = "calnotify")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Key signing the session cookie
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Externally reachable base URL (webhook and OAuth redirect live under it)
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<String>,

    /// Google client secrets JSON
    #[arg(long, env = "CREDENTIALS_JSON", hide_env_values = true)]
    credentials_json: Option<String>,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    bind_addr: IpAddr,

    /// Token file (authorized-user JSON)
    #[arg(long, env = "TOKEN_PATH", default_value = "token.json")]
    token_path: PathBuf,

    /// Where the client secrets are written at startup
    #[arg(long, env = "CLIENT_SECRETS_PATH", default_value = "credentials.json")]
    client_secrets_path: PathBuf,

    /// IANA timezone used to display event times
    #[arg(long, env = "DISPLAY_TIMEZONE", default_value = "Asia/Kolkata")]
    display_timezone: String,

    #[arg(long, env = "CHECK_INTERVAL_SECS", default_value_t = 60)]
    check_interval_secs: u64,

    #[arg(long, env = "LOOKAHEAD_MINUTES", default_value_t = 10)]
    lookahead_minutes: i64,

    /// Announce each upcoming event once instead of on every check
    #[arg(long, env = "ALERT_DEDUP", default_value_t = false, action = ArgAction::Set)]
    alert_dedup: bool,

    /// Log output: pretty, compact or json
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "calnotify failed");
            ExitCode::FAILURE
        }
    }
}

fn setup_tracing(cli: &Cli) -> ServerResult<()> {
    let format: TracingOutputFormat = cli.log_format.parse()?;
    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    init_tracing(TracingConfig::default().with_format(format).with_level(level))?;
    Ok(())
}

async fn run(cli: Cli) -> ServerResult<()> {
    let credentials_json = cli
        .credentials_json
        .filter(|json| !json.trim().is_empty())
        .ok_or(ConfigError::Missing("CREDENTIALS_JSON"))?;
    let credentials = OAuthCredentials::from_json(&credentials_json)?;
    write_client_secrets(&cli.client_secrets_path, &credentials_json)?;

    let lookahead = chrono::Duration::try_minutes(cli.lookahead_minutes).ok_or_else(|| {
        ConfigError::Invalid(format!(
            "look-ahead of {} minutes is out of range",
            cli.lookahead_minutes
        ))
    })?;
    let checker = CheckerConfig::default()
        .with_interval(Duration::from_secs(cli.check_interval_secs))
        .with_lookahead(lookahead)
        .with_dedup(cli.alert_dedup);

    let config = ServerConfig::new(
        cli.public_url.as_deref().unwrap_or_default(),
        cli.secret_key.unwrap_or_default(),
    )?
    .with_listen(cli.bind_addr, cli.port)
    .with_token_path(cli.token_path)
    .with_client_secrets_path(cli.client_secrets_path)
    .with_display_timezone(parse_timezone(&cli.display_timezone)?)
    .with_checker(checker);

    let signals = SignalHandler::new();
    signals.spawn_listener();

    serve(config, credentials, &signals).await
}

fn write_client_secrets(path: &Path, json: &str) -> ServerResult<()> {
    std::fs::write(path, json)?;
    info!(path = %path.display(), "client secrets written");
    Ok(())
}
