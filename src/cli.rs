//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate, health), and their associated argument
//! structs. Every `run` flag has an environment variable equivalent for
//! container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "matchbridge",
    version,
    about = "Allow-list filtering bridge between Kafka clusters",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        matchbridge validate bridge.yaml     Check a config file\n  \
        matchbridge run                      Start with ./matchbridge.yaml\n  \
        matchbridge run -c bridge.yaml       Start with a specific config"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the bridge
    Run(Box<RunArgs>),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        matchbridge run                                   Auto-detect config\n  \
        matchbridge run -c bridge.yaml                    Specific config file\n  \
        matchbridge run -c bridge.yaml --pretty -l debug  Local dev mode\n  \
        matchbridge run --admin-addr 127.0.0.1:9090       Override admin listener")]
pub struct RunArgs {
    /// Config file path (.yaml, .json, .toml)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Admin listener address (overrides `admin.listen_addr`)
    #[arg(long, env = "ADMIN_ADDR")]
    pub admin_addr: Option<String>,

    /// Ignore any persisted snapshot and start with an empty cache
    #[arg(long, env = "RESET_CACHE")]
    pub reset_cache: bool,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Observability --
    /// Sentry DSN (enables error tracking)
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "SENTRY_DSN", help_heading = "Observability")]
    pub sentry_dsn: Option<String>,

    /// Sentry environment tag
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "SENTRY_ENVIRONMENT", help_heading = "Observability")]
    pub sentry_environment: Option<String>,

    // -- Tuning --
    /// Max admin request body size in bytes
    #[arg(
        long,
        env = "MAX_BODY_SIZE",
        default_value_t = 1_048_576,
        help_heading = "Tuning"
    )]
    pub max_body: usize,

    /// Seconds the admin listener gets to drain on shutdown
    #[arg(
        long,
        env = "SHUTDOWN_GRACE_SECS",
        default_value_t = 5,
        help_heading = "Tuning"
    )]
    pub shutdown_grace: u64,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "matchbridge.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance's admin listener
    #[arg(default_value = "http://localhost:8080")]
    pub url: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "matchbridge",
            "run",
            "-c",
            "bridge.yaml",
            "--admin-addr",
            "127.0.0.1:9000",
            "-l",
            "debug",
        ])
        .unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config.as_deref(), Some(std::path::Path::new("bridge.yaml")));
        assert_eq!(args.admin_addr.as_deref(), Some("127.0.0.1:9000"));
        assert!(matches!(args.log_level, LogLevel::Debug));
        assert_eq!(args.shutdown_grace, 5);
    }

    #[test]
    fn pretty_and_json_conflict() {
        assert!(Cli::try_parse_from(["matchbridge", "run", "--pretty", "--json"]).is_err());
    }
}
