//! Drives a worker through its lifecycle and dispatches platform events to it.

use color_eyre::Result;
use tracing::{debug, warn};

use crate::cache::CacheStorage;
use crate::event::{Dispatched, PlatformEvent};
use crate::platform::{Clients, Network, Notifier};
use crate::worker::handler::ServiceWorker;
use crate::worker::lifecycle::{Lifecycle, LifecycleState};

pub struct WorkerRuntime<S: CacheStorage, N, C, P> {
  lifecycle: Lifecycle,
  worker: ServiceWorker<S, N, C, P>,
}

impl<S, N, C, P> WorkerRuntime<S, N, C, P>
where
  S: CacheStorage + 'static,
  N: Network,
  C: Clients,
  P: Notifier,
{
  pub fn new(worker: ServiceWorker<S, N, C, P>) -> Self {
    Self {
      lifecycle: Lifecycle::new(),
      worker,
    }
  }

  pub fn state(&self) -> LifecycleState {
    self.lifecycle.state()
  }

  pub fn worker(&self) -> &ServiceWorker<S, N, C, P> {
    &self.worker
  }

  /// Install and immediately activate (the worker skips waiting).
  /// Returns the deleted cache generations.
  pub async fn start(&mut self) -> Result<Vec<String>> {
    self.dispatch(PlatformEvent::Install).await?;
    match self.dispatch(PlatformEvent::Activate).await? {
      Dispatched::Activated { deleted } => Ok(deleted),
      _ => Ok(Vec::new()),
    }
  }

  pub async fn dispatch(&mut self, event: PlatformEvent) -> Result<Dispatched> {
    debug!(event = event.name(), state = %self.lifecycle.state(), "Dispatching event");

    match event {
      PlatformEvent::Install => {
        self.lifecycle.transition(LifecycleState::Installed)?;
        self.worker.on_install();
        Ok(Dispatched::Installed)
      }
      PlatformEvent::Activate => {
        self.lifecycle.transition(LifecycleState::Activating)?;
        match self.worker.on_activate().await {
          Ok(deleted) => {
            self.lifecycle.transition(LifecycleState::Active)?;
            Ok(Dispatched::Activated { deleted })
          }
          Err(e) => {
            self.lifecycle.transition(LifecycleState::Installed)?;
            Err(e)
          }
        }
      }
      PlatformEvent::Fetch(request) => {
        if !self.lifecycle.is_active() {
          // Only an active worker controls fetches; the network handles this one
          debug!(url = %request.url, state = %self.lifecycle.state(), "Worker not active, passing through");
          return Ok(Dispatched::Ignored(self.lifecycle.state()));
        }
        Ok(Dispatched::Fetch(self.worker.on_fetch(request).await?))
      }
      PlatformEvent::Push(data) => {
        if !self.lifecycle.is_active() {
          warn!(state = %self.lifecycle.state(), "Dropping push message for inactive worker");
          return Ok(Dispatched::Ignored(self.lifecycle.state()));
        }
        Ok(Dispatched::Shown(self.worker.on_push(data.as_deref())?))
      }
      PlatformEvent::NotificationClick(notification) => {
        if !self.lifecycle.is_active() {
          warn!(state = %self.lifecycle.state(), "Dropping notification click for inactive worker");
          return Ok(Dispatched::Ignored(self.lifecycle.state()));
        }
        Ok(Dispatched::Clicked(
          self.worker.on_notification_click(&notification).await?,
        ))
      }
    }
  }
}
