//! The worker's event handlers.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{debug, info};
use url::{Origin, Url};

use super::policy::{bypass_reason, Bypass};
use super::request::Request;
use crate::cache::{CacheLayer, CacheStorage, Revalidated};
use crate::config::NotificationConfig;
use crate::platform::{Client, Clients, Network, Notifier};
use crate::push::{Notification, PushPayload};

/// What the worker did with a fetch event.
#[derive(Debug)]
pub enum FetchDecision {
  /// Not intercepted; the network handles the request as if no worker existed
  Passthrough(Bypass),
  /// Answered by the worker
  Responded(Revalidated),
}

/// Result of a notification click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
  /// An already-open page at the target URL was brought forward
  Focused(Client),
  /// No page matched; a new one was opened
  Opened(Client),
}

/// Stateless handler for platform events.
///
/// All state lives behind the injected services: the cache storage, the
/// network, the open pages and the notification surface.
pub struct ServiceWorker<S: CacheStorage, N, C, P> {
  cache: CacheLayer<S>,
  network: Arc<N>,
  clients: Arc<C>,
  notifier: Arc<P>,
  /// Page origin; relative notification URLs resolve against it
  base: Url,
  notifications: NotificationConfig,
}

impl<S, N, C, P> ServiceWorker<S, N, C, P>
where
  S: CacheStorage + 'static,
  N: Network,
  C: Clients,
  P: Notifier,
{
  pub fn new(
    cache: CacheLayer<S>,
    network: Arc<N>,
    clients: Arc<C>,
    notifier: Arc<P>,
    base: Url,
    notifications: NotificationConfig,
  ) -> Self {
    Self {
      cache,
      network,
      clients,
      notifier,
      base,
      notifications,
    }
  }

  pub fn network(&self) -> &Arc<N> {
    &self.network
  }

  pub fn origin(&self) -> Origin {
    self.base.origin()
  }

  /// Nothing is precached; assets are cached lazily on first request.
  pub fn on_install(&self) {
    info!(generation = %self.cache.generation(), "Worker installed");
  }

  /// Sweep old cache generations and take control of open pages.
  /// Returns the names of the deleted stores.
  pub async fn on_activate(&self) -> Result<Vec<String>> {
    let deleted = self.cache.sweep_generations()?;
    self.clients.claim().await?;

    info!(
      generation = %self.cache.generation(),
      deleted = deleted.len(),
      "Worker activated"
    );
    Ok(deleted)
  }

  /// Decide whether to answer `request` and, if so, answer it
  /// stale-while-revalidate.
  pub async fn on_fetch(&self, request: Request) -> Result<FetchDecision> {
    if let Some(reason) = bypass_reason(&request, &self.origin()) {
      debug!(url = %request.url, %reason, "Passing request through");
      return Ok(FetchDecision::Passthrough(reason));
    }

    let fetch = self.network.fetch(request.clone());
    let revalidated = self.cache.stale_while_revalidate(&request, fetch).await?;
    Ok(FetchDecision::Responded(revalidated))
  }

  /// Show the notification for a push message. Malformed data falls back to
  /// the default notification.
  pub fn on_push(&self, data: Option<&[u8]>) -> Result<Notification> {
    let payload = PushPayload::parse(data);
    let notification = Notification::from_payload(&payload, &self.notifications);
    self.notifier.show(&notification)?;
    Ok(notification)
  }

  /// Close the notification and focus a page at its target URL, opening one
  /// if none is open.
  pub async fn on_notification_click(&self, notification: &Notification) -> Result<ClickOutcome> {
    self.notifier.close(notification)?;

    let target = self.base.join(notification.target_url()).map_err(|e| {
      eyre!(
        "Invalid notification URL '{}': {}",
        notification.target_url(),
        e
      )
    })?;

    let pages = self.clients.match_all().await?;
    if let Some(page) = pages.into_iter().find(|page| page.url == target) {
      debug!(url = %target, client = %page.id, "Focusing existing page");
      let focused = self.clients.focus(page.id).await?;
      return Ok(ClickOutcome::Focused(focused));
    }

    debug!(url = %target, "Opening new page");
    let opened = self.clients.open_window(target).await?;
    Ok(ClickOutcome::Opened(opened))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheKey, CacheSource, CachedResponse, MemoryStorage};
  use crate::platform::testing::ScriptedNetwork;
  use crate::platform::{LocalClients, LogNotifier};
  use crate::worker::request::{Destination, Response};
  use reqwest::Method;

  const GENERATION: &str = "static-cache-v1";

  struct Harness {
    worker: ServiceWorker<MemoryStorage, ScriptedNetwork, LocalClients, LogNotifier>,
    storage: Arc<MemoryStorage>,
    network: Arc<ScriptedNetwork>,
    clients: Arc<LocalClients>,
    notifier: Arc<LogNotifier>,
  }

  fn harness_with_pages(paths: &[&str]) -> Harness {
    let base = Url::parse("https://app.example").unwrap();
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(ScriptedNetwork::new());
    let clients = Arc::new(LocalClients::with_pages(
      paths.iter().map(|p| base.join(p).unwrap()),
    ));
    let notifier = Arc::new(LogNotifier::new());

    let worker = ServiceWorker::new(
      CacheLayer::new(Arc::clone(&storage), GENERATION),
      Arc::clone(&network),
      Arc::clone(&clients),
      Arc::clone(&notifier),
      base,
      NotificationConfig::default(),
    );

    Harness {
      worker,
      storage,
      network,
      clients,
      notifier,
    }
  }

  fn harness() -> Harness {
    harness_with_pages(&[])
  }

  fn responded(decision: FetchDecision) -> Revalidated {
    match decision {
      FetchDecision::Responded(revalidated) => revalidated,
      FetchDecision::Passthrough(reason) => panic!("expected a response, got passthrough: {}", reason),
    }
  }

  #[tokio::test]
  async fn test_cache_hit_does_not_block_on_network() {
    let h = harness();
    let url = "https://app.example/static/js/custom.js";
    let request = Request::get(url, Destination::Script).unwrap();
    h.storage
      .put(
        GENERATION,
        &CacheKey::for_request(&request),
        &CachedResponse::snapshot(&Response::new(200, "cached")),
      )
      .unwrap();
    h.network.hang(url);

    let revalidated = responded(h.worker.on_fetch(request).await.unwrap());

    assert_eq!(revalidated.response.source, CacheSource::Cache);
    assert_eq!(revalidated.response.data.body, b"cached");
    // The refresh was still issued
    assert_eq!(h.network.calls(), vec![url]);
  }

  #[tokio::test]
  async fn test_first_load_caches_and_second_load_hits() {
    let h = harness();
    let url = "https://app.example/static/css/style.css";
    h.network.respond(url, Response::new(200, "v1"));

    let first = responded(
      h.worker
        .on_fetch(Request::get(url, Destination::Style).unwrap())
        .await
        .unwrap(),
    );
    assert_eq!(first.response.source, CacheSource::Network);

    h.network.respond(url, Response::new(200, "v2"));
    let second = responded(
      h.worker
        .on_fetch(Request::get(url, Destination::Style).unwrap())
        .await
        .unwrap(),
    );
    // Stale copy now, fresh copy on the next load
    assert_eq!(second.response.data.body, b"v1");
    second.refresh.unwrap().wait().await.unwrap();

    let third = responded(
      h.worker
        .on_fetch(Request::get(url, Destination::Style).unwrap())
        .await
        .unwrap(),
    );
    assert_eq!(third.response.data.body, b"v2");
  }

  #[tokio::test]
  async fn test_cross_origin_is_never_intercepted_or_stored() {
    let h = harness();
    let url = "https://cdn.example/bootstrap.min.css";
    h.network.respond(url, Response::new(200, "cdn"));

    let decision = h
      .worker
      .on_fetch(Request::get(url, Destination::Style).unwrap())
      .await
      .unwrap();

    assert!(matches!(decision, FetchDecision::Passthrough(Bypass::CrossOrigin)));
    assert!(h.network.calls().is_empty());
    assert!(h.storage.store_names().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_websocket_upgrade_is_never_answered() {
    let h = harness();
    let request = Request::get("https://app.example/ws/notifications/", Destination::Other)
      .unwrap()
      .with_header("Upgrade", "websocket");

    let decision = h.worker.on_fetch(request).await.unwrap();

    assert!(matches!(decision, FetchDecision::Passthrough(_)));
    assert!(h.network.calls().is_empty());
  }

  #[tokio::test]
  async fn test_post_is_passed_through() {
    let h = harness();
    let url = Url::parse("https://app.example/notifications/save-subscription/").unwrap();
    let request = Request::new(Method::POST, url, Destination::Other);

    let decision = h.worker.on_fetch(request).await.unwrap();
    assert!(matches!(decision, FetchDecision::Passthrough(Bypass::Method)));
  }

  #[tokio::test]
  async fn test_offline_miss_fails_like_a_network_error() {
    let h = harness();
    let url = "https://app.example/static/images/logo.png";
    h.network.fail(url);

    let result = h
      .worker
      .on_fetch(Request::get(url, Destination::Image).unwrap())
      .await;

    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_offline_after_first_fetch_returns_same_bytes() {
    let h = harness();
    let url = "https://app.example/static/fonts/inter.woff2";
    h.network.respond(url, Response::new(200, vec![7u8; 16]));
    h.worker
      .on_fetch(Request::get(url, Destination::Font).unwrap())
      .await
      .unwrap();

    h.network.fail(url);
    let mut bodies = Vec::new();
    for _ in 0..2 {
      let revalidated = responded(
        h.worker
          .on_fetch(Request::get(url, Destination::Font).unwrap())
          .await
          .unwrap(),
      );
      bodies.push(revalidated.response.data.body);
    }

    assert_eq!(bodies, vec![vec![7u8; 16], vec![7u8; 16]]);
  }

  #[tokio::test]
  async fn test_activate_sweeps_and_claims() {
    let h = harness_with_pages(&["/dashboard"]);
    let request = Request::get("https://app.example/static/app.js", Destination::Script).unwrap();
    let entry = CachedResponse::snapshot(&Response::new(200, "old"));
    h.storage
      .put("static-cache-v0", &CacheKey::for_request(&request), &entry)
      .unwrap();

    let deleted = h.worker.on_activate().await.unwrap();

    assert_eq!(deleted, vec!["static-cache-v0"]);
    assert_eq!(h.storage.store_names().unwrap(), vec![GENERATION]);
    assert!(h.clients.pages().unwrap().iter().all(|c| c.controlled));
  }

  #[tokio::test]
  async fn test_push_shows_notification() {
    let h = harness();

    let notification = h
      .worker
      .on_push(Some(br#"{"title":"Hi","body":"New message","url":"/inbox"}"#))
      .unwrap();

    assert_eq!(notification.title, "Hi");
    assert_eq!(notification.body, "New message");
    assert_eq!(h.notifier.visible().unwrap(), vec![notification]);
  }

  #[tokio::test]
  async fn test_push_with_garbage_shows_default() {
    let h = harness();

    let notification = h.worker.on_push(Some(b"\xff\xfe")).unwrap();

    assert_eq!(notification.title, "Notification");
    assert_eq!(notification.body, "You have a new message");
    assert_eq!(notification.target_url(), "/");
  }

  #[tokio::test]
  async fn test_click_focuses_existing_page() {
    let h = harness_with_pages(&["/dashboard", "/inbox"]);
    let notification = h.worker.on_push(Some(br#"{"url":"/inbox"}"#)).unwrap();

    let outcome = h.worker.on_notification_click(&notification).await.unwrap();

    let pages = h.clients.pages().unwrap();
    assert_eq!(outcome, ClickOutcome::Focused(pages[1].clone()));
    assert_eq!(pages.len(), 2);
    assert!(h.notifier.visible().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_click_opens_page_when_none_matches() {
    let h = harness_with_pages(&["/dashboard"]);
    let notification = h.worker.on_push(Some(br#"{"url":"/inbox"}"#)).unwrap();

    let outcome = h.worker.on_notification_click(&notification).await.unwrap();

    match outcome {
      ClickOutcome::Opened(client) => {
        assert_eq!(client.url.as_str(), "https://app.example/inbox");
      }
      other => panic!("expected a new page, got {:?}", other),
    }
    assert_eq!(h.clients.pages().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_click_matches_exact_url_only() {
    let h = harness_with_pages(&["/inbox/"]);
    let notification = h.worker.on_push(Some(br#"{"url":"/inbox"}"#)).unwrap();

    let outcome = h.worker.on_notification_click(&notification).await.unwrap();
    assert!(matches!(outcome, ClickOutcome::Opened(_)));
  }

  #[tokio::test]
  async fn test_click_with_absolute_url() {
    let h = harness_with_pages(&["/inbox"]);
    let notification = h
      .worker
      .on_push(Some(br#"{"url":"https://app.example/inbox"}"#))
      .unwrap();

    let outcome = h.worker.on_notification_click(&notification).await.unwrap();
    assert!(matches!(outcome, ClickOutcome::Focused(_)));
  }
}
