use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod ai;
mod analysis;
mod app;
mod chat;
mod client;
mod config;
mod editor;
mod handler;
mod language;
mod prompt;
mod provider;
mod tui;
mod ui;

use ai::{ClaudeClient, GeminiClient, OllamaClient, OpenAIClient};
use analysis::AnalysisType;
use app::{App, Theme, DEFAULT_CODE};
use client::AnalysisClient;
use config::Config;
use language::SupportedLanguage;
use provider::Provider;
use tui::EventHandler;

const LOG_ENV: &str = "CODELENS_LOG";

#[derive(Parser)]
#[command(name = "codelens", version)]
#[command(about = "Review, optimize, security-scan and explain code with an LLM")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Source file to load into the editor
    file: Option<PathBuf>,

    /// Language of the code (detected from the file extension if omitted)
    #[arg(short, long, global = true)]
    language: Option<String>,

    /// Model provider: gemini, ollama, claude or openai
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Model name (defaults to the provider's default)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Color theme: dark or light
    #[arg(long)]
    theme: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one analysis and print the result as JSON
    Analyze {
        /// review, optimize, secure or explain
        #[arg(value_parser = parse_analysis_type)]
        kind: AnalysisType,
        /// Source file to analyze
        file: PathBuf,
    },
    /// List supported languages
    Languages,
    /// List providers, key status and models
    Models,
}

fn parse_analysis_type(s: &str) -> Result<AnalysisType, String> {
    AnalysisType::from_str(s)
        .ok_or_else(|| format!("unknown analysis type '{}' (review, optimize, secure, explain)", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|_| Config::new());

    match &cli.command {
        Some(Commands::Analyze { kind, file }) => {
            init_stderr_logging();
            analyze_file(&cli, &config, *kind, file).await
        }
        Some(Commands::Languages) => {
            list_languages();
            Ok(())
        }
        Some(Commands::Models) => {
            list_models(&config).await;
            Ok(())
        }
        None => {
            let _guard = init_file_logging();
            run_tui(&cli, &config).await
        }
    }
}

/// The TUI owns the terminal, so logs go to a daily file instead.
fn init_file_logging() -> Option<WorkerGuard> {
    let log_dir = Config::log_dir().ok()?;
    std::fs::create_dir_all(&log_dir).ok()?;

    let appender = tracing_appender::rolling::daily(log_dir, "codelens.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_provider(cli: &Cli, config: &Config) -> Result<Provider> {
    match &cli.provider {
        Some(name) => Provider::from_str(name)
            .with_context(|| format!("unknown provider '{}'", name)),
        None => Ok(config.provider()),
    }
}

fn resolve_language(cli: &Cli, config: &Config, file: Option<&Path>) -> Result<SupportedLanguage> {
    if let Some(name) = &cli.language {
        return SupportedLanguage::from_str(name)
            .with_context(|| format!("unsupported language '{}' (see `codelens languages`)", name));
    }
    Ok(file
        .and_then(SupportedLanguage::detect)
        .or(config.language)
        .unwrap_or_default())
}

fn build_client(cli: &Cli, config: &Config) -> Result<AnalysisClient> {
    let provider = resolve_provider(cli, config)?;
    let model_name = cli
        .model
        .clone()
        .unwrap_or_else(|| config.model_for(provider));

    let model = ai::connect(provider, config).with_context(|| {
        format!(
            "set {} or add the key to {}",
            provider.key_env_vars().join(" / "),
            Config::config_dir()
                .map(|d| d.join("config.json").display().to_string())
                .unwrap_or_else(|_| "the config file".to_string())
        )
    })?;

    info!(provider = provider.as_str(), model = %model_name, "model client ready");
    Ok(AnalysisClient::new(model, &model_name).with_timeout(config.request_timeout()))
}

async fn analyze_file(cli: &Cli, config: &Config, kind: AnalysisType, file: &Path) -> Result<()> {
    let code = std::fs::read_to_string(file)
        .with_context(|| format!("could not read {}", file.display()))?;
    if code.is_empty() {
        bail!("{} is empty", file.display());
    }

    let language = resolve_language(cli, config, Some(file))?;
    let client = build_client(cli, config)?;

    let result = client.analyze(kind, &code, language).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn list_languages() {
    for language in SupportedLanguage::all() {
        println!("{:<12} {}", language.as_str(), language.display_name());
    }
}

async fn list_models(config: &Config) {
    for provider in Provider::all() {
        let status = match config.key_source(provider) {
            Some("env") => "(env var)",
            Some("config") => "(configured)",
            Some("local") => "(local)",
            _ => "(needs key)",
        };
        println!("{} {}", provider.display_name(), status);

        let models = match provider {
            Provider::Gemini => Ok(GeminiClient::list_models()),
            Provider::Claude => Ok(ClaudeClient::list_models()),
            Provider::OpenAI => Ok(OpenAIClient::list_models()),
            Provider::Ollama => OllamaClient::new(config.ollama_url()).list_models().await,
        };
        match models {
            Ok(models) if models.is_empty() => println!("  (no models found)"),
            Ok(models) => {
                for model in models {
                    println!("  {}", model);
                }
            }
            Err(e) => println!("  unavailable: {}", e),
        }
    }
}

async fn run_tui(cli: &Cli, config: &Config) -> Result<()> {
    let (code, language) = match &cli.file {
        Some(path) => (
            std::fs::read_to_string(path)
                .with_context(|| format!("could not read {}", path.display()))?,
            resolve_language(cli, config, Some(path))?,
        ),
        // The sample is JavaScript whatever the saved preference says
        None if cli.language.is_none() => (DEFAULT_CODE.to_string(), SupportedLanguage::Javascript),
        None => (DEFAULT_CODE.to_string(), resolve_language(cli, config, None)?),
    };
    let theme = match &cli.theme {
        Some(name) => Theme::from_str(name).with_context(|| format!("unknown theme '{}'", name))?,
        None => config.theme.unwrap_or_default(),
    };
    let client = build_client(cli, config)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(client, &code, language, theme);

    info!(language = %language, "starting TUI");
    let outcome = run_loop(&mut terminal, &mut events, &mut app).await;
    tui::restore()?;
    outcome
}

async fn run_loop(terminal: &mut tui::Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}
