use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use issue_relay_cli::{
    config::{
        self, Config, DEFAULT_OPTIONS_FILE, Secrets, load_options, load_secrets_or_default,
    },
    drupal_api::{ApiError, DEFAULT_ENDPOINT, HttpIssueApi, IssueApi},
    error::AppError,
    providers::{DryRunProvider, NotificationProvider, build_provider},
    render::load_body_template,
    service::{RelayReport, run_relay},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Relay recent drupal.org issues to email")]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch recent issues and send one notification per match.
    Run {
        #[command(flatten)]
        files: ConfigFiles,
        /// Body template file; the built-in HTML template is used when omitted.
        #[arg(long)]
        template: Option<PathBuf>,
        /// Content API endpoint.
        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
        /// Render and log messages without sending them.
        #[arg(long)]
        dry_run: bool,
        #[arg(long, value_enum, default_value_t = OutputMode::Human)]
        mode: OutputMode,
    },
    /// Validate options and secrets without touching the network.
    Check {
        #[command(flatten)]
        files: ConfigFiles,
        #[arg(long, value_enum, default_value_t = OutputMode::Human)]
        mode: OutputMode,
    },
}

#[derive(Debug, Args)]
struct ConfigFiles {
    /// Options file (TOML, top-level scalars).
    #[arg(long, default_value = DEFAULT_OPTIONS_FILE)]
    config: PathBuf,
    /// Secrets file (TOML). Defaults to `.secrets.toml` when present.
    #[arg(long)]
    secrets: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum OutputMode {
    Human,
    ServiceJson,
}

impl Cli {
    fn command_name(&self) -> &'static str {
        match &self.command {
            Commands::Run { .. } => "relay.run",
            Commands::Check { .. } => "relay.check",
        }
    }

    fn output_mode(&self) -> OutputMode {
        match &self.command {
            Commands::Run { mode, .. } | Commands::Check { mode, .. } => *mode,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let command = cli.command_name();
    let mode = cli.output_mode();

    match run(cli) {
        Ok(output) => println!("{output}"),
        Err(error) => {
            match mode {
                OutputMode::ServiceJson => {
                    println!("{}", serialize_service_error(command, &error));
                }
                OutputMode::Human => eprintln!("error: {}", error.message),
            }
            std::process::exit(error.exit_code());
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn run(cli: Cli) -> Result<String, AppError> {
    run_with(cli, std::env::vars(), Utc::now, |endpoint| {
        HttpIssueApi::new(endpoint).map(|api| Box::new(api) as Box<dyn IssueApi>)
    })
}

fn run_with<Env, Now, MakeApi>(
    cli: Cli,
    env: Env,
    now_fn: Now,
    make_api: MakeApi,
) -> Result<String, AppError>
where
    Env: IntoIterator<Item = (String, String)>,
    Now: Fn() -> DateTime<Utc>,
    MakeApi: Fn(&str) -> Result<Box<dyn IssueApi>, ApiError>,
{
    let command = cli.command_name();

    match cli.command {
        Commands::Check { files, mode } => {
            let (config, _) = resolve_config(&files, env)?;
            render_check(mode, command, &config)
        }
        Commands::Run {
            files,
            template,
            endpoint,
            dry_run,
            mode,
        } => {
            let (config, secrets) = resolve_config(&files, env)?;
            let body_template = load_body_template(template.as_deref())?;

            let provider: Option<Box<dyn NotificationProvider>> = if dry_run {
                Some(Box::new(DryRunProvider))
            } else {
                build_provider(&config.provider, &secrets)?
            };

            let api = make_api(&endpoint).map_err(|error| {
                AppError::runtime(format!("failed to initialize http client: {error}"))
            })?;

            let report = run_relay(
                &config,
                &body_template,
                api.as_ref(),
                provider.as_deref(),
                now_fn(),
            );
            render_report(mode, command, &report)
        }
    }
}

fn resolve_config<Env>(files: &ConfigFiles, env: Env) -> Result<(Config, Secrets), AppError>
where
    Env: IntoIterator<Item = (String, String)>,
{
    let options = load_options(&files.config)?;
    let secrets = load_secrets_or_default(files.secrets.as_deref())?.with_overrides_from_pairs(env);
    let config = config::resolve(&options, &secrets)?;
    Ok((config, secrets))
}

fn render_check(mode: OutputMode, command: &'static str, config: &Config) -> Result<String, AppError> {
    match mode {
        OutputMode::Human => Ok(format!(
            "configuration ok: provider={} criteria={} window={}m project={} to={}",
            config.provider,
            config.criteria.as_str(),
            config.window_minutes,
            config.project,
            config.to
        )),
        OutputMode::ServiceJson => render_envelope(
            command,
            json!({
                "provider": config.provider,
                "subject": config.subject,
                "criteria_type": config.criteria.as_str(),
                "criteria_limit": config.window_minutes,
                "project": config.project,
                "from": config.from,
                "to": config.to,
                "issue_tag": config.issue_tag,
            }),
        ),
    }
}

fn render_report(
    mode: OutputMode,
    command: &'static str,
    report: &RelayReport,
) -> Result<String, AppError> {
    match mode {
        OutputMode::Human => Ok(match &report.fetch_error {
            Some(fetch_error) => format!("fetch failed, nothing sent: {fetch_error}"),
            None => format!(
                "fetched {} issues, {} matched, {} sent, {} failed",
                report.fetched, report.matched, report.sent, report.failed
            ),
        }),
        OutputMode::ServiceJson => {
            let result = serde_json::to_value(report)
                .map_err(|err| AppError::runtime(format!("failed to serialize report: {err}")))?;
            render_envelope(command, result)
        }
    }
}

#[derive(Debug, Serialize)]
struct ServiceErrorEnvelope {
    code: &'static str,
    message: String,
    details: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ServiceEnvelope {
    schema_version: &'static str,
    command: &'static str,
    ok: bool,
    result: Option<Value>,
    error: Option<ServiceErrorEnvelope>,
}

fn render_envelope(command: &'static str, result: Value) -> Result<String, AppError> {
    serde_json::to_string(&ServiceEnvelope {
        schema_version: "v1",
        command,
        ok: true,
        result: Some(result),
        error: None,
    })
    .map_err(|err| AppError::runtime(format!("failed to serialize service envelope: {err}")))
}

fn serialize_service_error(command: &'static str, error: &AppError) -> String {
    let envelope = ServiceEnvelope {
        schema_version: "v1",
        command,
        ok: false,
        result: None,
        error: Some(ServiceErrorEnvelope {
            code: error.code(),
            message: error.message.clone(),
            details: None,
        }),
    };

    serde_json::to_string(&envelope).unwrap_or_else(|serialize_error| {
        json!({
            "schema_version": "v1",
            "command": command,
            "ok": false,
            "result": Value::Null,
            "error": {
                "code": "internal.serialize",
                "message": format!("failed to serialize service error envelope: {serialize_error}"),
                "details": Value::Null,
            }
        })
        .to_string()
    })
}
