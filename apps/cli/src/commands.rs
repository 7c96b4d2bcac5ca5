//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use leadmagnet_core::{
    FileStore, GenerationPipeline, LogAccumulator, ProgressUpdate, Snapshot,
};
use leadmagnet_providers::{OpenAiCompatibleClient, TavilyClient};
use leadmagnet_shared::{
    AppConfig, GenerationSettings, init_config, load_config, load_settings, redact_secrets,
    save_settings, settings_file_path, validate_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Lead magnet generator: research a topic and write a polished guide.
#[derive(Parser)]
#[command(
    name = "leadmagnet",
    version,
    about = "Generate researched, multi-chapter lead magnet documents from a topic.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate a lead magnet for a topic.
    Generate(GenerateArgs),

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Saved generation settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

/// Options for `generate`. Unset options fall back to the saved settings.
#[derive(Args)]
pub(crate) struct GenerateArgs {
    /// Topic of the document.
    pub topic: String,

    /// Target words per chapter (100-1000).
    #[arg(long)]
    pub words_per_chapter: Option<i64>,

    /// Number of chapters (1-10).
    #[arg(long)]
    pub chapters: Option<i64>,

    /// Writer temperature (0.0-1.0).
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Editor temperature (0.0-1.0).
    #[arg(long)]
    pub editor_temperature: Option<f32>,

    /// Keep source links in the text.
    #[arg(long, overrides_with = "no_keep_links")]
    pub keep_links: bool,

    /// Strip source links from the text.
    #[arg(long, overrides_with = "keep_links")]
    pub no_keep_links: bool,

    /// Run length-guarded editors over every section.
    #[arg(long, overrides_with = "no_section_editors")]
    pub section_editors: bool,

    /// Skip per-section editing; only the final polish runs.
    #[arg(long, overrides_with = "section_editors")]
    pub no_section_editors: bool,

    /// Output directory (defaults to `[output].dir`).
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

impl GenerateArgs {
    /// Overlay the flags that were given onto `base`.
    fn resolve(&self, base: GenerationSettings) -> GenerationSettings {
        let mut input = base.to_input();
        if let Some(words) = self.words_per_chapter {
            input.words_per_chapter = words;
        }
        if let Some(chapters) = self.chapters {
            input.chapter_count = chapters;
        }
        if let Some(temperature) = self.temperature {
            input.temperature = temperature;
        }
        if let Some(temperature) = self.editor_temperature {
            input.editor_temperature = temperature;
        }
        if self.keep_links {
            input.keep_links = true;
        }
        if self.no_keep_links {
            input.keep_links = false;
        }
        if self.section_editors {
            input.enable_section_editors = true;
        }
        if self.no_section_editors {
            input.enable_section_editors = false;
        }
        GenerationSettings::new(input)
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Settings subcommands.
#[derive(Subcommand)]
pub(crate) enum SettingsAction {
    /// Show the settings the next run starts from.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "leadmagnet=info",
        1 => "leadmagnet=debug",
        _ => "leadmagnet=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate(args) => cmd_generate(args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
        Command::Settings { action } => match action {
            SettingsAction::Show => cmd_settings_show(),
        },
    }
}

/// Saved settings if present, otherwise the config defaults.
fn starting_settings(config: &AppConfig) -> Result<GenerationSettings> {
    let path = settings_file_path()?;
    Ok(if path.exists() {
        load_settings(&path)
    } else {
        config.generation
    })
}

async fn cmd_generate(args: GenerateArgs) -> Result<()> {
    let config = load_config()?;
    let credentials = validate_config(&config, |name| std::env::var(name).ok())?;

    let settings = args.resolve(starting_settings(&config)?);
    if let Err(e) = settings_file_path().and_then(|path| save_settings(&settings, &path)) {
        warn!(error = %redact_secrets(&e.to_string()), "could not save settings");
    }

    let generator = OpenAiCompatibleClient::new(&config.llm, credentials.llm_api_key)?;
    let search = TavilyClient::new(&config.search, credentials.search_api_key)?;
    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.dir));
    let store = FileStore::new(out_dir, config.output.prefix.clone());
    let max_results = config.search.max_results;

    let spinner = new_spinner();
    let printer = spinner.clone();
    let accumulator = Arc::new(LogAccumulator::new(
        move |update: &ProgressUpdate, _snapshot: &Snapshot| {
            printer.suspend(|| println!("{}", update.log_line));
            printer.set_message(update.log_line.clone());
        },
    ));

    info!(topic = %args.topic, "starting generation");
    let sink = Arc::clone(&accumulator);
    let topic = args.topic;
    let mut task = tokio::spawn(async move {
        GenerationPipeline::new(settings, &generator, &search, &store, sink.as_ref())
            .with_max_results(max_results)
            .run(&topic)
            .await
    });

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::signal::ctrl_c() => {
            task.abort();
            spinner.finish_and_clear();
            println!("Generation cancelled.");
            return Ok(());
        }
    };
    spinner.finish_and_clear();

    match joined {
        Ok(Ok(output)) => {
            println!();
            println!("  Lead magnet generated!");
            println!("  Run:      {}", output.run_id);
            println!("  Draft:    {}", output.draft_locator);
            println!("  Document: {}", output.locator);
            println!();
            Ok(())
        }
        Ok(Err(failure)) => {
            accumulator.record_failure(&failure);
            bail!("generation stopped at stage {}", failure.stage())
        }
        Err(join_error) => {
            let category = if join_error.is_panic() {
                "InternalPanic"
            } else {
                "TaskCancelled"
            };
            accumulator.record_unexpected(category);
            bail!("generation aborted unexpectedly")
        }
    }
}

fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn cmd_settings_show() -> Result<()> {
    let config = load_config()?;
    let settings = starting_settings(&config)?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
