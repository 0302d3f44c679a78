//! Command-line client for curating ordered collections on a Curate item service.

use anyhow::bail;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use curate_core::http::HttpItemService;
use curate_core::{
    Collection, Config, EntryPayload, ItemId, ItemKey, LoadStatus, ParentId, RemoteItemService,
    SequenceItem, SyncResult,
};
use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "curate", about = "Curate CLI", version)]
struct Cli {
    /// Server URL (can also be set via CURATE_SERVER env var)
    #[arg(short, long, env = "CURATE_SERVER")]
    server: Option<String>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    json: bool,

    /// Print timing for load and save
    #[arg(long, global = true)]
    timing: bool,

    /// Request timeout in seconds (default: REQUEST_TIMEOUT_SECS or 30)
    #[arg(short = 't', long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Show a collection in order
    List { parent: String },
    /// Move the item at FROM to TO and save the new order
    Move {
        parent: String,
        from: usize,
        to: usize,
    },
    /// Create an item at the end of a collection
    Add {
        parent: String,
        title: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        summary: Option<String>,
    },
    /// Insert an item at INDEX and save the new order
    Insert {
        parent: String,
        index: usize,
        title: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        summary: Option<String>,
    },
    /// Delete an item on the server, then locally
    Remove { parent: String, id: String },
    /// Drop the item at INDEX locally and save the resulting order
    Delete { parent: String, index: usize },
    /// Persist any positions that drifted from the dense order
    Save { parent: String },
}

fn log_timing(timing: bool, label: &str, duration: Duration) {
    if timing {
        eprintln!(
            "[timing] {}: {:.1} ms",
            label,
            duration.as_secs_f64() * 1000.0
        );
    }
}

fn normalize_server(server: String) -> String {
    if let Ok(mut url) = reqwest::Url::parse(&server) {
        let should_normalize_localhost =
            url.scheme().eq_ignore_ascii_case("http") && url.host_str() == Some("localhost");
        if should_normalize_localhost && url.set_host(Some("127.0.0.1")).is_err() {
            return server;
        }
        let mut normalized = url.to_string();
        while normalized.ends_with('/') {
            normalized.pop();
        }
        return normalized;
    }
    server
}

fn explicit_server_override(server: Option<String>) -> Option<String> {
    server.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn resolve_server(server: Option<String>, config: &Config) -> String {
    explicit_server_override(server).unwrap_or_else(|| config.server_url.clone())
}

fn entry(title: String, url: Option<String>, summary: Option<String>) -> EntryPayload {
    EntryPayload {
        title,
        url,
        summary,
        completed: false,
    }
}

fn item_json(item: &SequenceItem<EntryPayload>) -> Value {
    json!({
        "id": item.key.to_string(),
        "position": item.position,
        "payload": item.payload,
    })
}

fn format_items(items: &[SequenceItem<EntryPayload>], json: bool) -> Result<String, String> {
    if json {
        let rows: Vec<Value> = items.iter().map(item_json).collect();
        return serde_json::to_string_pretty(&rows)
            .map_err(|err| format!("response encoding error: {}", err));
    }

    let rows: Vec<String> = items
        .iter()
        .map(|item| {
            let marker = if item.payload.completed { "x" } else { " " };
            format!(
                "{:>3} [{}] {:<36} {}",
                item.position, marker, item.key, item.payload.title
            )
        })
        .collect();
    Ok(rows.join("\n"))
}

fn format_sync_result(result: &SyncResult, json: bool) -> Result<String, String> {
    if json {
        let outcomes: Vec<Value> = result
            .outcomes()
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(key) => json!({
                    "key": outcome.key.to_string(),
                    "kind": outcome.kind.to_string(),
                    "id": key.to_string(),
                }),
                Err(err) => json!({
                    "key": outcome.key.to_string(),
                    "kind": outcome.kind.to_string(),
                    "error": err.to_string(),
                }),
            })
            .collect();
        let body = json!({
            "success": result.is_success(),
            "error": result.batch_error().map(ToString::to_string),
            "outcomes": outcomes,
        });
        return serde_json::to_string_pretty(&body)
            .map_err(|err| format!("response encoding error: {}", err));
    }

    if result.is_empty() {
        return Ok(match result.batch_error() {
            Some(err) => format!("Save failed: {}", err),
            None => "Nothing to save".to_string(),
        });
    }
    let mut lines = vec![format!(
        "Saved {} of {} change(s)",
        result.succeeded().count(),
        result.len()
    )];
    for outcome in result.failed() {
        if let Err(err) = &outcome.result {
            lines.push(format!("  {} {} failed: {}", outcome.kind, outcome.key, err));
        }
    }
    if let Some(err) = result.batch_error() {
        lines.push(format!("  {}", err));
    }
    Ok(lines.join("\n"))
}

fn print_output(output: Result<String, String>, action: &str) -> anyhow::Result<()> {
    match output {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(message) => bail!("{} failed: {}", action, message),
    }
}

fn key_at(collection: &Collection<EntryPayload>, index: usize) -> anyhow::Result<ItemKey> {
    let items = collection.snapshot()?;
    match items.get(index) {
        Some(item) => Ok(item.key.clone()),
        None => bail!(
            "Index {} is out of range for a collection of {} items",
            index,
            items.len()
        ),
    }
}

async fn open(
    remote: Arc<dyn RemoteItemService<EntryPayload>>,
    parent: String,
    timing: bool,
) -> anyhow::Result<Collection<EntryPayload>> {
    let start = Instant::now();
    let (collection, status) = Collection::load(remote, ParentId::new(parent)).await;
    log_timing(timing, "load", start.elapsed());
    if let LoadStatus::Failed(err) = status {
        bail!("{}", err);
    }
    Ok(collection)
}

async fn save(
    collection: &Collection<EntryPayload>,
    json: bool,
    timing: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let result = collection.save_order().await;
    log_timing(timing, "save", start.elapsed());
    print_output(format_sync_result(&result, json), "Save")?;
    if !result.is_success() {
        bail!(
            "{} of {} change(s) were not saved; rerun `curate save` to retry",
            result.failed().count(),
            result.len()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curate_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let Cli {
        server,
        json,
        timing,
        timeout,
        command,
    } = Cli::parse();

    if let Commands::Completions { shell } = &command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let config = Config::from_env();
    let server = normalize_server(resolve_server(server, &config));
    let timeout = timeout
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.request_timeout());
    let remote: Arc<dyn RemoteItemService<EntryPayload>> =
        Arc::new(HttpItemService::new(&server, timeout)?);

    match command {
        Commands::Completions { .. } => unreachable!("completions handled before client setup"),
        Commands::List { parent } => {
            let collection = open(remote, parent, timing).await?;
            print_output(format_items(&collection.snapshot()?, json), "List")?;
        }
        Commands::Move { parent, from, to } => {
            let collection = open(remote, parent, timing).await?;
            collection.move_item(from, to)?;
            save(&collection, json, timing).await?;
            if !json {
                print_output(format_items(&collection.snapshot()?, false), "Move")?;
            }
        }
        Commands::Add {
            parent,
            title,
            url,
            summary,
        } => {
            let collection = open(remote, parent, timing).await?;
            let start = Instant::now();
            let item = collection.add_item(entry(title, url, summary)).await?;
            log_timing(timing, "add", start.elapsed());
            if json {
                println!("{}", serde_json::to_string_pretty(&item_json(&item))?);
            } else {
                println!(
                    "Added: {} ({}) at {}",
                    item.payload.title, item.key, item.position
                );
            }
        }
        Commands::Insert {
            parent,
            index,
            title,
            url,
            summary,
        } => {
            let collection = open(remote, parent, timing).await?;
            collection.insert(entry(title, url, summary), Some(index))?;
            save(&collection, json, timing).await?;
        }
        Commands::Remove { parent, id } => {
            let collection = open(remote, parent, timing).await?;
            let start = Instant::now();
            collection.remove_item(&ItemId::new(id.as_str())).await?;
            log_timing(timing, "remove", start.elapsed());
            if !json {
                println!("Removed: {}", id);
            }
            // Items after the removed one moved up and still need their positions saved.
            save(&collection, json, timing).await?;
        }
        Commands::Delete { parent, index } => {
            let collection = open(remote, parent, timing).await?;
            let key = key_at(&collection, index)?;
            collection.delete(&key)?;
            save(&collection, json, timing).await?;
        }
        Commands::Save { parent } => {
            let collection = open(remote, parent, timing).await?;
            save(&collection, json, timing).await?;
        }
    }

    Ok(())
}
