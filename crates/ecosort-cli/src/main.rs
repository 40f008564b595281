//! EcoSort — entry point.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::json;

use ecosort::{decode_analysis, encode_image, Classified, Uploader};
use ecosort_cli::config::{Overrides, Settings};
use ecosort_cli::remote;
use ecosort_cli::session::Pipeline;

#[derive(Parser)]
#[command(
    name = "ecosort",
    about = "EcoSort — recycle or trash? Guess, then see what the AI says",
    version
)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct SettingsArgs {
    /// Object storage base URL (env: ECOSORT_STORAGE_URL).
    #[arg(long, global = true)]
    storage_url: Option<String>,

    /// Bearer token for object storage (env: ECOSORT_STORAGE_TOKEN).
    #[arg(long, global = true)]
    storage_token: Option<String>,

    /// Vision model base URL (env: ECOSORT_AI_URL).
    #[arg(long, global = true)]
    ai_url: Option<String>,

    /// Vision model API key (env: ECOSORT_AI_KEY).
    #[arg(long, global = true)]
    ai_key: Option<String>,

    /// Vision model name (env: ECOSORT_AI_MODEL).
    #[arg(long, global = true)]
    ai_model: Option<String>,

    /// Directory of images used as the camera (env: ECOSORT_CAMERA).
    #[arg(long, global = true)]
    camera: Option<String>,

    /// Timer cadence of the live loop, in milliseconds.
    #[arg(long, global = true)]
    tick_ms: Option<u64>,

    /// Minimum gap between analysis attempts, in milliseconds.
    #[arg(long, global = true)]
    throttle_ms: Option<u64>,

    /// HTTP request timeout, in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

impl From<SettingsArgs> for Overrides {
    fn from(a: SettingsArgs) -> Self {
        Overrides {
            storage_url: a.storage_url,
            storage_token: a.storage_token,
            ai_url: a.ai_url,
            ai_key: a.ai_key,
            ai_model: a.ai_model,
            camera_dir: a.camera,
            tick_ms: a.tick_ms,
            throttle_ms: a.throttle_ms,
            timeout_ms: a.timeout_ms,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Play interactively (default).
    Play,

    /// Classify a single image file and print the verdict as JSON.
    Classify {
        /// Image to classify.
        image: PathBuf,
    },

    /// Decode a saved model reply ("-" for stdin) and print the typed result.
    Decode {
        input: String,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   ecosort completions bash > ~/.local/share/bash-completion/completions/ecosort
    ///   ecosort completions zsh > ~/.zfunc/_ecosort
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Play) {
        Commands::Play => {
            let settings = Settings::resolve(cli.settings.into())?;
            ecosort_cli::repl::run(settings)?;
        }

        Commands::Classify { image } => {
            let settings = Settings::resolve(cli.settings.into())?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(classify_file(&settings, &image))?;
        }

        Commands::Decode { input } => {
            let raw = if input == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&input)?
            };
            match decode_analysis(&raw) {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(e) => {
                    eprintln!("Rejected: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "ecosort", &mut std::io::stdout());
        }
    }

    Ok(())
}

async fn classify_file(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    let img = image::open(path)?;
    let still = encode_image(&img, &path.display().to_string())?;
    let (store, classifier) = remote::connect(settings)?;
    let pipeline = Pipeline::new(Uploader::new(store, None), classifier);

    tracing::info!("Classifying {}", path.display());
    let classified = pipeline.analyze_frame(&still).await?;

    let fallback_reason = match &classified {
        Classified::Model(_) => None,
        Classified::Fallback { reason, .. } => Some(reason.to_string()),
    };
    let out = json!({
        "image": path.display().to_string(),
        "result": classified.result(),
        "fallback": fallback_reason,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
