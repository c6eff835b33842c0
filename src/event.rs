use crate::push::Notification;
use crate::worker::handler::{ClickOutcome, FetchDecision};
use crate::worker::lifecycle::LifecycleState;
use crate::worker::request::Request;

/// Events the platform delivers to a worker
#[derive(Debug)]
pub enum PlatformEvent {
  Install,
  Activate,
  /// A page issued a request
  Fetch(Request),
  /// Push message with its raw data, if any
  Push(Option<Vec<u8>>),
  /// The user clicked a notification this worker showed
  NotificationClick(Notification),
}

impl PlatformEvent {
  pub fn name(&self) -> &'static str {
    match self {
      PlatformEvent::Install => "install",
      PlatformEvent::Activate => "activate",
      PlatformEvent::Fetch(_) => "fetch",
      PlatformEvent::Push(_) => "push",
      PlatformEvent::NotificationClick(_) => "notificationclick",
    }
  }
}

/// What handling an event produced
#[derive(Debug)]
pub enum Dispatched {
  Installed,
  /// Activation finished; lists the cache generations that were deleted
  Activated { deleted: Vec<String> },
  Fetch(FetchDecision),
  Shown(Notification),
  Clicked(ClickOutcome),
  /// The worker is not active yet and did not handle the event
  Ignored(LifecycleState),
}
