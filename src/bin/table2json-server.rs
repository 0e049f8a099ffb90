//! HTTP server binary for table2json.
//!
//! A thin shim over the library crate that maps CLI flags to `ServerConfig`,
//! sets up logging, and runs the server.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use table2json::ServerConfig;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start on the default port (3000)
  export GEMINI_API_KEY=...
  table2json-server

  # Different port and uploads directory
  table2json-server --port 8080 --uploads-dir /var/lib/table2json

  # Upload a sheet
  curl -F "file=@sheet.jpg;type=image/jpeg" http://localhost:3000/upload

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY            Google Gemini API key (required for --provider gemini)
  OPENAI_API_KEY            OpenAI API key (--provider openai)
  ANTHROPIC_API_KEY         Anthropic API key (--provider anthropic)
  TABLE2JSON_API_KEY_VAR    Read the API key from a different variable
  TABLE2JSON_HOST           Listen address
  TABLE2JSON_PORT           Listen port
  TABLE2JSON_UPLOADS_DIR    Where accepted uploads are written
  TABLE2JSON_MODEL          Vision model ID
  TABLE2JSON_PROVIDER       LLM provider name
  RUST_LOG                  Log filter, overrides --verbose/--quiet
"#;

/// Serve table-image → JSON extraction over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "table2json-server",
    version,
    about = "Transcribe uploaded table images and PDFs to JSON using a Vision LLM",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "TABLE2JSON_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "TABLE2JSON_PORT", default_value_t = 3000)]
    port: u16,

    /// Directory that receives uploaded files.
    #[arg(long, env = "TABLE2JSON_UPLOADS_DIR", default_value = "uploads")]
    uploads_dir: PathBuf,

    /// Maximum upload size in MiB.
    #[arg(long, env = "TABLE2JSON_MAX_UPLOAD_MB", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..=1024))]
    max_upload_mb: u64,

    /// Vision model ID.
    #[arg(long, env = "TABLE2JSON_MODEL", default_value = table2json::config::DEFAULT_MODEL)]
    model: String,

    /// LLM provider: gemini, openai, anthropic, ...
    #[arg(long, env = "TABLE2JSON_PROVIDER", default_value = table2json::config::DEFAULT_PROVIDER)]
    provider: String,

    /// Environment variable holding the API key.
    /// Derived from --provider if unset (GEMINI_API_KEY, OPENAI_API_KEY, ...).
    #[arg(long, env = "TABLE2JSON_API_KEY_VAR")]
    api_key_var: Option<String>,

    /// LLM temperature (0.0–2.0). Provider default if unset.
    #[arg(long, env = "TABLE2JSON_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max output tokens. Provider default if unset.
    #[arg(long, env = "TABLE2JSON_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TABLE2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TABLE2JSON_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "table2json=debug,tower_http=debug"
    } else if cli.quiet {
        "error"
    } else {
        "table2json=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match start(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn start(cli: &Cli) -> Result<()> {
    let config = build_config(cli)?;
    table2json::run(config).await.context("Server failed to start")
}

/// Map CLI args to `ServerConfig`.
fn build_config(cli: &Cli) -> Result<ServerConfig> {
    let mut builder = ServerConfig::builder()
        .host(cli.host.clone())
        .port(cli.port)
        .uploads_dir(cli.uploads_dir.clone())
        .max_upload_bytes((cli.max_upload_mb * 1024 * 1024) as usize)
        .model(cli.model.clone())
        .provider_name(cli.provider.clone());

    if let Some(var) = &cli.api_key_var {
        builder = builder.api_key_var(var.clone());
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }

    builder.build().context("Invalid configuration")
}
