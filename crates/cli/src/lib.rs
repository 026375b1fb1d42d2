pub mod commands;
pub mod halt;

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use overseer_core::config::{AppConfig, ConfigOverrides, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "overseer",
    about = "Overseer supervision CLI",
    long_about = "Run supervised demo scenarios and inspect effective configuration.",
    after_help = "Examples:\n  overseer demo\n  overseer demo --runtime model --intent \"reject values over 100\"\n  overseer config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Wrap a demo list and run a scripted sequence of supervised calls")]
    Demo {
        #[arg(long, value_enum, default_value_t = RuntimeKind::Passthrough)]
        runtime: RuntimeKind,
        #[arg(long, default_value = "be a good list", help = "Standing instruction for the decision authority")]
        intent: String,
        #[arg(long, help = "Append flagged events to this report file")]
        report: Option<std::path::PathBuf>,
        #[arg(long, help = "Block on halt decisions until Enter is pressed")]
        pause: bool,
    },
    #[command(about = "Inspect effective configuration values with redaction")]
    Config,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RuntimeKind {
    Passthrough,
    Rules,
    Model,
}

fn init_logging(config: &AppConfig) {
    use overseer_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(LoadOptions {
        config_path: None,
        require_file: false,
        overrides: ConfigOverrides::default(),
    }) {
        Ok(config) => config,
        Err(error) => {
            let result =
                commands::CommandResult::failure("overseer", "config_validation", error.to_string(), 2);
            println!("{}", result.output);
            return ExitCode::from(result.exit_code);
        }
    };
    init_logging(&config);

    let result = match cli.command {
        Command::Demo { runtime, intent, report, pause } => {
            commands::demo::run(&config, runtime, &intent, report.as_deref(), pause)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&config) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
