//! Offline asset cache worker.
//!
//! A platform-independent rendition of a web app's service worker: it serves
//! same-origin static assets stale-while-revalidate from a generational cache,
//! sweeps old cache generations on activation, and turns push messages into
//! notifications whose clicks focus or open the right page.

pub mod cache;
pub mod commands;
pub mod config;
pub mod event;
pub mod logging;
pub mod platform;
pub mod push;
pub mod runtime;
pub mod worker;
