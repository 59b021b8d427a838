use anyhow::{Context, Result};
use clap::Parser;
use livetrans::app::run_command;
use livetrans::cli::{Cli, Commands};
use livetrans::config::Config;
use livetrans::defaults;
use livetrans::language::LANGUAGES;
use livetrans::tts::voice::{Gender, VoicePreference, pick_voice};
use owo_colors::OwoColorize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run(args) => {
            let config = load_config(cli.config.as_deref())?;
            tracing::debug!(
                version = %livetrans::version_string(),
                backend = defaults::gpu_backend(),
                "starting"
            );
            let report = run_command(config, args, cli.verbose)?;
            if !report.translated {
                eprintln!(
                    "{} recognition model unavailable; output is the untranslated input",
                    "warning:".yellow()
                );
            }
        }
        Commands::Languages => {
            println!("Languages:");
            for language in LANGUAGES {
                println!("  {:<5} {}", language.code.green(), language.label);
            }
        }
        Commands::Voices {
            language,
            gender,
            style,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let mut preference = config.voice.preference();
            if let Some(gender) = gender {
                preference.gender = Gender::parse(&gender);
            }
            if style.is_some() {
                preference = VoicePreference::new(preference.gender, style.as_deref());
            }
            let profile = pick_voice(&language, &preference);
            println!("  {}    {}", "Voice:".dimmed(), profile.voice.green());
            println!("  {}    {}", "Style:".dimmed(), profile.style);
            println!("  {}   {}", "Gender:".dimmed(), profile.gender);
            println!("  {} {}", "Language:".dimmed(), profile.language);
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise -v = debug, -vv = trace, default warn.
fn init_logging(verbosity: u8) {
    let directive = match verbosity {
        0 => "livetrans=warn",
        1 => "livetrans=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/livetrans/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}
