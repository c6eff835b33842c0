//! Cache layer that orchestrates stale-while-revalidate over a storage backend.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::{CacheKey, CacheResult, CachedResponse};
use crate::worker::request::{Request, Response};

/// Cache layer bound to the current cache generation.
///
/// This layer sits between the worker and the network: it answers from the
/// current store when it can and keeps that store fresh in the background.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  /// Name of the current generation's store
  generation: String,
}

/// Outcome of a stale-while-revalidate fetch.
#[derive(Debug)]
pub struct Revalidated {
  /// The response handed back to the page
  pub response: CacheResult<Response>,
  /// Background refresh, present when the page was answered from cache
  pub refresh: Option<RefreshHandle>,
}

/// Handle on a background cache refresh.
///
/// Dropping the handle detaches the task; it keeps running.
#[derive(Debug)]
pub struct RefreshHandle {
  task: JoinHandle<Result<Response>>,
}

impl RefreshHandle {
  /// Wait for the refresh to finish. Returns the network response, which has
  /// been written to the cache if it was a 200.
  pub async fn wait(self) -> Result<Response> {
    self
      .task
      .await
      .map_err(|e| eyre!("Cache refresh task failed: {}", e))?
  }

  /// Cancel the refresh. A cache write that already happened is kept.
  pub fn abort(&self) {
    self.task.abort();
  }

  pub fn is_finished(&self) -> bool {
    self.task.is_finished()
  }
}

impl<S: CacheStorage + 'static> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend and generation tag.
  pub fn new(storage: Arc<S>, generation: impl Into<String>) -> Self {
    Self {
      storage,
      generation: generation.into(),
    }
  }

  pub fn generation(&self) -> &str {
    &self.generation
  }

  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  /// Delete every store that is not the current generation, then make sure
  /// the current one exists. Returns the names of the deleted stores.
  pub fn sweep_generations(&self) -> Result<Vec<String>> {
    let current = self.generation.as_str();
    let deleted = self.storage.delete_stores(|name| name != current)?;
    self.storage.open_store(current)?;

    for name in &deleted {
      debug!(store = %name, "Deleted old cache generation");
    }
    Ok(deleted)
  }

  /// Serve `request` stale-while-revalidate.
  ///
  /// 1. Start the network fetch in a background task
  /// 2. Look the request up in the current store
  /// 3. On a hit, answer with the cached copy right away
  /// 4. On a miss, wait for the network and answer with its response
  ///
  /// The background task writes 200 responses to the cache, replacing the
  /// previous entry. On a miss a network failure is returned as the error.
  pub async fn stale_while_revalidate<F>(&self, request: &Request, fetch: F) -> Result<Revalidated>
  where
    F: Future<Output = Result<Response>> + Send + 'static,
  {
    let key = CacheKey::for_request(request);

    let refresh = RefreshHandle {
      task: tokio::spawn(refresh_entry(
        Arc::clone(&self.storage),
        self.generation.clone(),
        key.clone(),
        fetch,
      )),
    };

    // A broken cache read is treated as a miss; the network can still answer
    let cached = self.storage.get(&self.generation, &key).unwrap_or_else(|e| {
      warn!(url = %key.url(), error = %e, "Cache lookup failed");
      None
    });

    match cached {
      Some(entry) => {
        debug!(url = %key.url(), "Cache hit, revalidating in background");
        let cached_at = entry.cached_at;
        Ok(Revalidated {
          response: CacheResult::from_cache(entry.into_response(), cached_at),
          refresh: Some(refresh),
        })
      }
      None => {
        debug!(url = %key.url(), "Cache miss, waiting for network");
        let response = refresh.wait().await?;
        Ok(Revalidated {
          response: CacheResult::from_network(response),
          refresh: None,
        })
      }
    }
  }
}

/// Fetch from the network and store a copy of a 200 response.
async fn refresh_entry<S, F>(
  storage: Arc<S>,
  generation: String,
  key: CacheKey,
  fetch: F,
) -> Result<Response>
where
  S: CacheStorage,
  F: Future<Output = Result<Response>>,
{
  let response = match fetch.await {
    Ok(response) => response,
    Err(e) => {
      debug!(url = %key.url(), error = %e, "Network fetch failed");
      return Err(e);
    }
  };

  if response.is_cacheable() {
    // The page gets its response even if the write fails
    if let Err(e) = storage.put(&generation, &key, &CachedResponse::snapshot(&response)) {
      warn!(url = %key.url(), error = %e, "Failed to update cache entry");
    }
  } else {
    debug!(url = %key.url(), status = response.status, "Not caching non-200 response");
  }

  Ok(response)
}
