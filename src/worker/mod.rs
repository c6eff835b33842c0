//! The offline asset cache worker: lifecycle, interception policy and event handlers.

pub mod handler;
pub mod lifecycle;
pub mod policy;
pub mod request;

pub use handler::{ClickOutcome, FetchDecision, ServiceWorker};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use request::{Destination, Request, Response};
