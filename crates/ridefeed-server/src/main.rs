//! `ridefeed` binary.
//!
//! Reads `ridefeed.toml` (or the path given with `--config`), opens the
//! SQLite listing store, and either serves the JSON API over HTTP or follows
//! the live feed in the terminal.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use ridefeed_core::{
  feed::{FeedState, Scope},
  filter::FilterCriteria,
};
use ridefeed_engine::FeedAggregator;
use ridefeed_server::{ServerConfig, load_config, open_feed, router};
use ridefeed_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Live ride offer/request feed")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "ridefeed.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API (the default).
  Serve,
  /// Print the feed each time it changes.
  Watch {
    /// Scope to follow; defaults to `initial_scope` from the config.
    #[arg(long)]
    scope: Option<Scope>,
    /// Only listings whose origin contains this text.
    #[arg(long)]
    origin: Option<String>,
    /// Only listings whose destination contains this text.
    #[arg(long)]
    destination: Option<String>,
    /// Print each state as JSON instead of a summary.
    #[arg(long)]
    json: bool,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = load_config(&cli.config).context("failed to load configuration")?;

  if let Some(parent) = cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(cfg, store).await,
    Command::Watch { scope, origin, destination, json } => {
      let criteria = FilterCriteria::new(origin, destination, None);
      watch(cfg, store, scope, criteria, json).await
    }
  }
}

async fn serve(cfg: ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let feed = open_feed(&store, &cfg, cfg.initial_scope);
  let app = router(feed.clone(), Arc::new(store));
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  feed.shutdown().await;
  Ok(())
}

async fn watch(
  cfg: ServerConfig,
  store: SqliteStore,
  scope: Option<Scope>,
  criteria: FilterCriteria,
  json: bool,
) -> anyhow::Result<()> {
  let scope = scope.unwrap_or(cfg.initial_scope);
  let feed = FeedAggregator::new(ridefeed_server::session_deps(&store, cfg.caller_uid.clone()));
  feed.set_filter_criteria(criteria);
  feed.set_scope(scope);
  tracing::info!(%scope, filters = feed.filter_criteria().active_count(), "watching feed");

  let mut rx = feed.subscribe();
  loop {
    let state = rx.borrow_and_update().clone();
    if json {
      println!("{}", serde_json::to_string(&state).context("failed to encode feed state")?);
    } else {
      print_summary(&state);
    }

    tokio::select! {
      changed = rx.changed() => {
        if changed.is_err() {
          break;
        }
      }
      _ = shutdown_signal() => break,
    }
  }

  feed.shutdown().await;
  Ok(())
}

fn print_summary(state: &FeedState) {
  match state {
    FeedState::Loading => println!("loading…"),
    FeedState::Empty => println!("no posts"),
    FeedState::Error { message, retryable } => {
      println!("error: {message}{}", if *retryable { " (retryable)" } else { "" });
    }
    FeedState::Success { items } => {
      println!("{} posts", items.len());
      for post in items {
        println!(
          "  [{}] {} → {}  seats={}  owner={}  id={}",
          post.kind,
          post.origin,
          post.destination,
          post.seat_count.map_or_else(|| "-".to_owned(), |n| n.to_string()),
          post.owner_id,
          post.id,
        );
      }
    }
  }
}

async fn shutdown_signal() {
  if let Err(err) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %err, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
}
