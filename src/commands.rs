//! CLI subcommands: drive the worker against a real origin.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheLayer, CacheSource, CacheStorage, MemoryStorage, NoopStorage, SqliteStorage};
use crate::config::Config;
use crate::event::{Dispatched, PlatformEvent};
use crate::platform::{HttpNetwork, LocalClients, LogNotifier, Network};
use crate::push::{Notification, PushPayload};
use crate::runtime::WorkerRuntime;
use crate::worker::{ClickOutcome, Destination, FetchDecision, Request, ServiceWorker};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Install and activate the configured cache generation, sweeping older ones
  Activate,
  /// Fetch a URL through the worker
  Fetch {
    url: String,
    /// Resource type the page is loading
    #[arg(short, long, value_enum, default_value_t = Destination::Script)]
    destination: Destination,
    /// Extra request header, "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,
    /// Exit without waiting for the background cache refresh
    #[arg(long)]
    no_wait: bool,
  },
  /// List cache stores and their entry counts
  Stores,
  /// Print the notification a push payload produces (reads stdin if omitted)
  Push { payload: Option<String> },
  /// Route a notification click for URL against the given open pages
  Click {
    url: String,
    /// URL of an open page (repeatable, in tab order)
    #[arg(long = "client")]
    clients: Vec<String>,
  },
}

/// Parse a "Name: value" header argument.
fn parse_header(s: &str) -> std::result::Result<(String, String), String> {
  let (name, value) = s
    .split_once(':')
    .ok_or_else(|| format!("expected 'Name: value', got '{}'", s))?;
  let name = name.trim();
  if name.is_empty() {
    return Err(format!("missing header name in '{}'", s));
  }
  Ok((name.to_string(), value.trim().to_string()))
}

type CliWorker<S> = ServiceWorker<S, HttpNetwork, LocalClients, LogNotifier>;

fn build_worker<S: CacheStorage + 'static>(
  config: &Config,
  storage: Arc<S>,
  clients: LocalClients,
) -> Result<CliWorker<S>> {
  let network = HttpNetwork::new(Duration::from_secs(config.network.timeout_secs))?;
  Ok(ServiceWorker::new(
    CacheLayer::new(storage, config.cache.generation.clone()),
    Arc::new(network),
    Arc::new(clients),
    Arc::new(LogNotifier::new()),
    config.origin_url()?,
    config.notifications.clone(),
  ))
}

/// Pick the cache backend from config and flags, then run `command`.
///
/// With caching disabled, fetches never touch the disk, but `activate` and
/// `stores` still reach an existing database so old generations get swept.
pub async fn execute(command: Command, config: &Config, ephemeral: bool) -> Result<()> {
  if !config.cache.enabled {
    if matches!(command, Command::Activate | Command::Stores) {
      if let Some(storage) = SqliteStorage::open_existing(config.cache.path.as_deref())? {
        return run(command, config, Arc::new(storage)).await;
      }
    }
    return run(command, config, Arc::new(NoopStorage)).await;
  }

  if ephemeral {
    run(command, config, Arc::new(MemoryStorage::new())).await
  } else {
    let storage = SqliteStorage::open(config.cache.path.as_deref())?;
    run(command, config, Arc::new(storage)).await
  }
}

/// Run a subcommand against `storage`.
pub async fn run<S: CacheStorage + 'static>(
  command: Command,
  config: &Config,
  storage: Arc<S>,
) -> Result<()> {
  match command {
    Command::Activate => {
      let worker = build_worker(config, storage, LocalClients::new())?;
      let mut runtime = WorkerRuntime::new(worker);
      let deleted = runtime.start().await?;

      println!("active generation: {}", config.cache.generation);
      if deleted.is_empty() {
        println!("no old generations to delete");
      }
      for name in deleted {
        println!("deleted: {}", name);
      }
    }
    Command::Fetch {
      url,
      destination,
      headers,
      no_wait,
    } => {
      let mut request = Request::get(&url, destination)?;
      request.headers = headers;
      fetch(config, storage, request, !no_wait).await?;
    }
    Command::Stores => {
      let names = storage.store_names()?;
      if names.is_empty() {
        println!("no cache stores");
      }
      for name in names {
        let marker = if name == config.cache.generation { "*" } else { " " };
        println!("{} {} ({} entries)", marker, name, storage.entry_count(&name)?);
      }
    }
    Command::Push { payload } => {
      let data = match payload {
        Some(payload) => payload.into_bytes(),
        None => {
          let mut buf = Vec::new();
          std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| eyre!("Failed to read payload from stdin: {}", e))?;
          buf
        }
      };

      let worker = build_worker(config, storage, LocalClients::new())?;
      let notification = worker.on_push(Some(data.as_slice()))?;
      let json = serde_json::to_string_pretty(&notification)
        .map_err(|e| eyre!("Failed to serialize notification: {}", e))?;
      println!("{}", json);
    }
    Command::Click { url, clients } => {
      let base = config.origin_url()?;
      let pages = clients
        .iter()
        .map(|page| {
          base
            .join(page)
            .map_err(|e| eyre!("Invalid client URL '{}': {}", page, e))
        })
        .collect::<Result<Vec<_>>>()?;

      let worker = build_worker(config, storage, LocalClients::with_pages(pages))?;
      let payload = PushPayload {
        url: Some(url),
        ..PushPayload::default()
      };
      let notification = Notification::from_payload(&payload, &config.notifications);

      match worker.on_notification_click(&notification).await? {
        ClickOutcome::Focused(client) => println!("focused {} {}", client.id, client.url),
        ClickOutcome::Opened(client) => println!("opened {} {}", client.id, client.url),
      }
    }
  }

  Ok(())
}

async fn fetch<S: CacheStorage + 'static>(
  config: &Config,
  storage: Arc<S>,
  request: Request,
  wait_for_refresh: bool,
) -> Result<()> {
  let worker = build_worker(config, storage, LocalClients::new())?;
  let mut runtime = WorkerRuntime::new(worker);
  runtime.start().await?;

  match runtime.dispatch(PlatformEvent::Fetch(request.clone())).await? {
    Dispatched::Fetch(FetchDecision::Responded(revalidated)) => {
      let response = &revalidated.response;
      let source = match response.source {
        CacheSource::Cache => "cache",
        CacheSource::Network => "network",
      };
      println!(
        "{} {} ({} bytes)",
        response.data.status,
        source,
        response.data.body.len()
      );
      if let Some(cached_at) = response.cached_at {
        println!("cached at {}", cached_at.to_rfc3339());
      }

      if let Some(refresh) = revalidated.refresh {
        if wait_for_refresh {
          match refresh.wait().await {
            Ok(fresh) => println!("refreshed: {}", fresh.status),
            Err(e) => println!("refresh failed: {}", e),
          }
        }
      }
    }
    Dispatched::Fetch(FetchDecision::Passthrough(reason)) => {
      // Not ours: the network serves it as if there were no worker
      let response = runtime.worker().network().fetch(request).await?;
      println!(
        "{} passthrough, {} ({} bytes)",
        response.status,
        reason,
        response.body.len()
      );
    }
    other => return Err(eyre!("Unexpected fetch dispatch: {:?}", other)),
  }

  Ok(())
}
