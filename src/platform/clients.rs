use color_eyre::{eyre::eyre, Result};
use futures::future::{self, BoxFuture, FutureExt};
use std::sync::Mutex;
use url::Url;

use super::Clients;

/// An open page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
  pub id: String,
  pub url: Url,
  pub focused: bool,
  /// Whether the worker controls this page
  pub controlled: bool,
}

#[derive(Default)]
struct Registry {
  pages: Vec<Client>,
  next_id: u64,
}

impl Registry {
  fn add(&mut self, url: Url) -> Client {
    self.next_id += 1;
    let client = Client {
      id: format!("client-{}", self.next_id),
      url,
      focused: false,
      controlled: false,
    };
    self.pages.push(client.clone());
    client
  }

  fn focus(&mut self, id: &str) -> Result<Client> {
    if !self.pages.iter().any(|c| c.id == id) {
      return Err(eyre!("No open page with id {}", id));
    }
    for page in &mut self.pages {
      page.focused = page.id == id;
    }
    self
      .pages
      .iter()
      .find(|c| c.id == id)
      .cloned()
      .ok_or_else(|| eyre!("No open page with id {}", id))
  }
}

/// In-process registry of open pages.
#[derive(Default)]
pub struct LocalClients {
  registry: Mutex<Registry>,
}

impl LocalClients {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry pre-populated with pages at `urls`, in order.
  pub fn with_pages(urls: impl IntoIterator<Item = Url>) -> Self {
    let mut registry = Registry::default();
    for url in urls {
      registry.add(url);
    }
    Self {
      registry: Mutex::new(registry),
    }
  }

  /// Snapshot of the open pages.
  pub fn pages(&self) -> Result<Vec<Client>> {
    self.with_registry(|registry| Ok(registry.pages.clone()))
  }

  fn with_registry<T>(&self, f: impl FnOnce(&mut Registry) -> Result<T>) -> Result<T> {
    let mut registry = self
      .registry
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    f(&mut registry)
  }
}

impl Clients for LocalClients {
  fn match_all(&self) -> BoxFuture<'_, Result<Vec<Client>>> {
    future::ready(self.pages()).boxed()
  }

  fn focus(&self, id: String) -> BoxFuture<'_, Result<Client>> {
    future::ready(self.with_registry(|registry| registry.focus(&id))).boxed()
  }

  fn open_window(&self, url: Url) -> BoxFuture<'_, Result<Client>> {
    let opened = self.with_registry(|registry| {
      let client = registry.add(url);
      registry.focus(&client.id)
    });
    future::ready(opened).boxed()
  }

  fn claim(&self) -> BoxFuture<'_, Result<()>> {
    let claimed = self.with_registry(|registry| {
      for page in &mut registry.pages {
        page.controlled = true;
      }
      Ok(())
    });
    future::ready(claimed).boxed()
  }
}
