use serde::{Deserialize, Serialize};
use tracing::warn;

use super::payload::PushPayload;
use crate::config::NotificationConfig;

/// Application data attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
  /// The URL to open when the notification is clicked
  pub url: String,
}

/// A user-visible notification, ready to be shown by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub data: NotificationData,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub vibrate: Option<Vec<u32>>,
  // Mobile platforms may ignore this
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sound: Option<String>,
}

impl Notification {
  /// Build the notification for a push payload, filling gaps from `config`.
  pub fn from_payload(payload: &PushPayload, config: &NotificationConfig) -> Self {
    Self {
      title: non_empty(payload.title.as_deref()).unwrap_or(&config.default_title).to_string(),
      body: non_empty(payload.body.as_deref()).unwrap_or(&config.default_body).to_string(),
      icon: config.icon.clone(),
      badge: config.badge.clone(),
      data: NotificationData {
        url: non_empty(payload.url.as_deref()).unwrap_or(&config.default_url).to_string(),
      },
      vibrate: payload
        .wants_vibration()
        .then(|| config.vibration_pattern.clone()),
      sound: payload
        .sound
        .as_deref()
        .and_then(|sound| sound_path(&config.sound_dir, sound)),
    }
  }

  /// Where a click should navigate to (may be relative to the page origin).
  pub fn target_url(&self) -> &str {
    &self.data.url
  }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
  value.filter(|v| !v.is_empty())
}

/// Path of a sound file under `sound_dir`, or None for an identifier that
/// could escape the directory.
fn sound_path(sound_dir: &str, sound: &str) -> Option<String> {
  let valid = !sound.is_empty()
    && sound
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

  if !valid {
    warn!(sound = %sound, "Ignoring invalid notification sound");
    return None;
  }

  Some(format!("{}/{}.mp3", sound_dir.trim_end_matches('/'), sound))
}
