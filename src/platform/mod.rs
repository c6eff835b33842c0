//! Services the browser platform provides to a worker.
//!
//! The worker only talks to the outside world through these traits, so it can
//! run against a real HTTP origin or against in-process fakes.

mod clients;
mod network;
mod notifier;
#[cfg(test)]
pub mod testing;

use color_eyre::Result;
use futures::future::BoxFuture;
use url::Url;

use crate::push::Notification;
use crate::worker::request::{Request, Response};

pub use clients::{Client, LocalClients};
pub use network::HttpNetwork;
pub use notifier::LogNotifier;

/// Issues live network requests.
pub trait Network: Send + Sync + 'static {
  /// Fetch `request`. The future owns everything it needs so it can run as a
  /// detached background task.
  ///
  /// HTTP error statuses are responses; only transport failures are errors.
  fn fetch(&self, request: Request) -> BoxFuture<'static, Result<Response>>;
}

/// The pages (window clients) the worker can see.
pub trait Clients: Send + Sync {
  /// All open pages, including ones this worker does not control yet.
  fn match_all(&self) -> BoxFuture<'_, Result<Vec<Client>>>;

  /// Bring a page to the foreground.
  fn focus(&self, id: String) -> BoxFuture<'_, Result<Client>>;

  /// Open a new page at `url`.
  fn open_window(&self, url: Url) -> BoxFuture<'_, Result<Client>>;

  /// Take control of every open page without a reload.
  fn claim(&self) -> BoxFuture<'_, Result<()>>;
}

/// Shows and dismisses notifications.
pub trait Notifier: Send + Sync {
  fn show(&self, notification: &Notification) -> Result<()>;

  fn close(&self, notification: &Notification) -> Result<()>;
}
