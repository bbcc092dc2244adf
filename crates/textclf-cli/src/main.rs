use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use textclf_ai::ClassifierSession;
use textclf_assets::{AssetClient, CatalogLoader};
use textclf_core::{Catalog, ClassifyError, Location};

mod chat;
mod display;

#[derive(Parser)]
#[command(name = "textclf", version)]
#[command(about = "Classify free text with pre-trained TF-IDF + ONNX models", long_about = None)]
struct Cli {
    /// Model catalog (JSON)
    #[arg(long, env = "TEXTCLF_CATALOG", default_value = "catalog.json", global = true)]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the models in the catalog
    Models,

    /// Classify one text (reads stdin when neither TEXT nor --file is given)
    Classify {
        /// Model name from the catalog
        #[arg(short, long, env = "TEXTCLF_MODEL")]
        model: String,

        #[arg(value_name = "TEXT", conflicts_with = "file")]
        text: Option<String>,

        /// Read text from file
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Emit JSON instead of a human-readable line
        #[arg(long)]
        json: bool,
    },

    /// Interactive session: one text per line, `/help` for commands
    Chat {
        /// Model to load at start
        #[arg(short, long, env = "TEXTCLF_MODEL")]
        model: Option<String>,

        /// Write the session history as an Arrow IPC file on exit
        #[arg(long, value_name = "PATH")]
        export: Option<PathBuf>,
    },

    /// Show the feature vector a text produces
    Features {
        /// Vocabulary/IDF file or bundle (path or URL)
        #[arg(long)]
        preprocessing: String,

        /// Separate scaler file (path or URL)
        #[arg(long)]
        scaler: Option<String>,

        /// Number of slots to list
        #[arg(long, default_value_t = 10)]
        top: usize,

        #[arg(value_name = "TEXT")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    tracing::debug!("textclf v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    match cli.command {
        Command::Models => {
            let catalog = load_catalog(&cli.catalog)?;
            display::print_models(&catalog);
        }
        Command::Classify {
            model,
            text,
            file,
            json,
        } => {
            let text = read_input(text, file)?;
            let session = session(load_catalog(&cli.catalog)?);
            let outcome = match session.select_model(&model).await {
                Ok(()) => session.classify(&text).await,
                Err(e) => Err(e),
            };
            let failed = outcome.is_err();
            print_outcome(&outcome, json)?;
            if failed {
                std::process::exit(1);
            }
        }
        Command::Chat { model, export } => {
            let catalog = load_catalog(&cli.catalog)?;
            let session = session(catalog.clone());
            chat::run(&session, &catalog, model, export.as_deref()).await?;
        }
        Command::Features {
            preprocessing,
            scaler,
            top,
            text,
        } => {
            let scaler = scaler.map(Location::from);
            let tables = AssetClient::new()
                .load_preprocessing(&Location::from(preprocessing), scaler.as_ref())
                .await?;
            display::print_features(&text, &tables, top)?;
        }
    }

    Ok(())
}

fn load_catalog(path: &std::path::Path) -> Result<Catalog> {
    Catalog::load(path).with_context(|| format!("loading catalog {}", path.display()))
}

fn session(catalog: Catalog) -> ClassifierSession {
    ClassifierSession::new(Arc::new(CatalogLoader::onnx(catalog, AssetClient::new())))
}

/// Priority: TEXT argument > --file > stdin.
fn read_input(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading stdin")?;
    Ok(buf)
}

fn print_outcome(
    outcome: &Result<textclf_core::Classification, ClassifyError>,
    json: bool,
) -> Result<()> {
    match (outcome, json) {
        (Ok(c), true) => println!("{}", serde_json::to_string(c)?),
        (Ok(c), false) => println!("{c}"),
        (Err(e), true) => println!(
            "{}",
            serde_json::json!({ "error": { "kind": e.kind(), "message": e.to_string() } })
        ),
        (Err(e), false) => eprintln!("error: {e}"),
    }
    Ok(())
}
