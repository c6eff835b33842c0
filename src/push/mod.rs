//! Push message parsing and notification building.

mod notification;
mod payload;

pub use notification::{Notification, NotificationData};
pub use payload::PushPayload;
