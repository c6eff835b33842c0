//! Which requests the cache manager intercepts.

use std::fmt;

use reqwest::Method;
use url::Origin;

use super::request::{Destination, Request};

/// Why a request was left to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bypass {
  /// Anything other than GET
  Method,
  /// Protocol upgrade (WebSocket handshake)
  Upgrade,
  /// Not a style, script, font or image
  Destination(Destination),
  /// Cross-origin or CDN request; opaque responses must not enter the cache
  CrossOrigin,
}

impl fmt::Display for Bypass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Bypass::Method => write!(f, "non-GET method"),
      Bypass::Upgrade => write!(f, "protocol upgrade"),
      Bypass::Destination(d) => write!(f, "destination {:?} is not a static asset", d),
      Bypass::CrossOrigin => write!(f, "cross-origin request"),
    }
  }
}

/// Check a request against the interception policy.
///
/// Returns `None` when the request should be served stale-while-revalidate,
/// or the first rule that rejected it.
pub fn bypass_reason(request: &Request, origin: &Origin) -> Option<Bypass> {
  if request.method != Method::GET {
    return Some(Bypass::Method);
  }

  if request.header("upgrade").is_some() {
    return Some(Bypass::Upgrade);
  }

  if !request.destination.is_static_asset() {
    return Some(Bypass::Destination(request.destination));
  }

  if &request.url.origin() != origin {
    return Some(Bypass::CrossOrigin);
  }

  None
}
