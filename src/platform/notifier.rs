use color_eyre::{eyre::eyre, Result};
use std::sync::Mutex;
use tracing::info;

use super::Notifier;
use crate::push::Notification;

/// Notifier that logs notifications and keeps the currently visible ones.
#[derive(Default)]
pub struct LogNotifier {
  visible: Mutex<Vec<Notification>>,
}

impl LogNotifier {
  pub fn new() -> Self {
    Self::default()
  }

  /// Notifications shown and not yet closed, oldest first.
  pub fn visible(&self) -> Result<Vec<Notification>> {
    Ok(
      self
        .visible
        .lock()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?
        .clone(),
    )
  }
}

impl Notifier for LogNotifier {
  fn show(&self, notification: &Notification) -> Result<()> {
    info!(
      title = %notification.title,
      body = %notification.body,
      url = %notification.target_url(),
      "Showing notification"
    );
    self
      .visible
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .push(notification.clone());
    Ok(())
  }

  fn close(&self, notification: &Notification) -> Result<()> {
    let mut visible = self
      .visible
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if let Some(pos) = visible.iter().position(|n| n == notification) {
      visible.remove(pos);
    }
    Ok(())
  }
}
