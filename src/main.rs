use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nostr_core::{sanitize_file_name, KIND_METADATA, KIND_TEXT_NOTE};
use nostr_vault::render::{
    profile_display_name, NoteContext, NoteRecord, NoteRenderer, ProfileMetadata, ProfileRenderer,
};
use nostr_vault::{parse_input, Config, FsDocumentStore, IngestOptions, InputItem, TitleIndex, Vault};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vault_frontmatter::{FrontmatterCodec, TracingNotifier};

#[derive(Parser)]
#[command(name = "nostr-vault")]
#[command(about = "Turn Nostr events into cross-linked Markdown documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "nostr-vault.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest events from a file, or `-` for stdin
    Ingest {
        input: String,
        /// Drop events with an invalid id or signature
        #[arg(long)]
        verify: bool,
    },
    /// Validate the configuration and exit
    CheckConfig,
    /// Render the first event of INPUT to stdout without writing anything
    Render { input: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;
    config.apply_env_overrides();
    config
        .expand_paths()
        .with_context(|| "Failed to expand paths in config")?;

    init_logging(&config.logging.level)?;

    config
        .validate()
        .with_context(|| "Configuration validation failed")?;

    match cli.command {
        Commands::Ingest { input, verify } => ingest(config, &input, verify).await,
        Commands::CheckConfig => check_config(&config),
        Commands::Render { input } => render(&config, &input).await,
    }
}

async fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input))
}

async fn ingest(config: Config, input: &str, verify: bool) -> Result<()> {
    tracing::info!("Starting nostr-vault v{}", env!("CARGO_PKG_VERSION"));
    let store = Arc::new(FsDocumentStore::new(config.vault_dir()));
    tracing::info!("Vault at {}", store.root().display());

    let vault = Vault::open(&config, store, Arc::new(TracingNotifier))
        .await
        .with_context(|| "Failed to open vault")?;

    let items = parse_input(&read_input(input).await?);
    tracing::info!("Read {} input items", items.len());

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, stopping after the current chunk");
                cancel.cancel();
            }
        })
    };

    let result = vault.run(items, IngestOptions { verify }, &cancel).await;
    watcher.abort();
    let summary = result?;

    println!(
        "Received {} events: {} delivered, {} duplicates, {} rejected{}",
        summary.received,
        summary.delivered,
        summary.duplicates,
        summary.rejected,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}

fn check_config(config: &Config) -> Result<()> {
    println!("Testing configuration...");
    config
        .validate()
        .with_context(|| "Configuration validation failed")?;
    println!("✓ Configuration is valid");

    let vault_dir = config.vault_dir();
    if vault_dir.is_dir() {
        println!("✓ Vault directory exists: {}", vault_dir.display());
    } else {
        println!("⚠ Vault directory {} does not exist yet", vault_dir.display());
        println!("  (It will be created on first ingest)");
    }
    println!("  Notes:    {}", vault_dir.join(&config.vault.notes_dir).display());
    println!("  Profiles: {}", vault_dir.join(&config.vault.profiles_dir).display());
    println!(
        "  Batches of {} events{}",
        config.ingest.batch_size,
        config
            .batch_delay()
            .map(|d| format!(", {} ms apart", d.as_millis()))
            .unwrap_or_default()
    );
    Ok(())
}

async fn render(config: &Config, input: &str) -> Result<()> {
    let event = parse_input(&read_input(input).await?)
        .into_iter()
        .find_map(|item| match item {
            InputItem::Event(event) => Some(event),
            InputItem::EndOfStoredEvents => None,
        })
        .with_context(|| format!("No event found in {}", input))?;

    let codec = FrontmatterCodec::new(Arc::new(TracingNotifier));
    let doc = match event.kind {
        KIND_TEXT_NOTE => {
            let record = NoteRecord::from_event(&event);
            let ctx = NoteContext {
                title: sanitize_file_name(&record.suggested_title()),
                ..Default::default()
            };
            let renderer = NoteRenderer::new(codec, Arc::new(TitleIndex::new()));
            renderer.render(&record, &ctx, None).await
        }
        KIND_METADATA => {
            let meta = ProfileMetadata::from_content(&event.content)
                .with_context(|| "Profile content is not a JSON object")?;
            let renderer = ProfileRenderer::new(codec, config.render.profile_reference_sections);
            renderer.render(
                &profile_display_name(&meta, &event.pubkey),
                &event.pubkey,
                event.created_at,
                &meta,
                None,
            )
        }
        other => anyhow::bail!("No renderer for kind {}", other),
    };
    print!("{doc}");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter.to_string())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();

    Ok(())
}
