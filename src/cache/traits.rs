//! Core types for the asset cache.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::worker::request::{Request, Response};

/// Identifies one cache entry: the request method plus its normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  method: String,
  url: String,
}

impl CacheKey {
  /// Build the key for a request. The URL fragment never reaches the
  /// network, so it is not part of the key.
  pub fn for_request(request: &Request) -> Self {
    let mut url = request.url.clone();
    url.set_fragment(None);
    Self {
      method: request.method.as_str().to_string(),
      url: url.to_string(),
    }
  }

  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  /// Stable, fixed-length key for storage backends.
  pub fn hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A response snapshot as stored in a cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  /// When the snapshot was taken
  pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
  /// Copy a network response for storage.
  pub fn snapshot(response: &Response) -> Self {
    Self {
      status: response.status,
      headers: response.headers.clone(),
      body: response.body.clone(),
      cached_at: Utc::now(),
    }
  }

  pub fn into_response(self) -> Response {
    Response {
      status: self.status,
      headers: self.headers,
      body: self.body,
    }
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Live network response (cache miss)
  Network,
  /// Cached copy, possibly stale; a refresh runs in the background
  Cache,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::worker::request::Destination;

  #[test]
  fn test_fragment_is_not_part_of_key() {
    let a = Request::get("https://app.example/static/app.css#top", Destination::Style).unwrap();
    let b = Request::get("https://app.example/static/app.css", Destination::Style).unwrap();

    assert_eq!(CacheKey::for_request(&a), CacheKey::for_request(&b));
    assert_eq!(CacheKey::for_request(&a).url(), "https://app.example/static/app.css");
  }

  #[test]
  fn test_query_string_is_part_of_key() {
    let a = Request::get("https://app.example/static/app.css?v=1", Destination::Style).unwrap();
    let b = Request::get("https://app.example/static/app.css?v=2", Destination::Style).unwrap();

    assert_ne!(
      CacheKey::for_request(&a).hash(),
      CacheKey::for_request(&b).hash()
    );
  }

  #[test]
  fn test_hash_is_hex_sha256() {
    let request = Request::get("https://app.example/static/app.js", Destination::Script).unwrap();
    let hash = CacheKey::for_request(&request).hash();

    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(hash, CacheKey::for_request(&request).hash());
  }

  #[test]
  fn test_snapshot_round_trips_response() {
    let response = Response::new(200, "body").with_header("content-type", "text/css");
    let snapshot = CachedResponse::snapshot(&response);

    assert_eq!(snapshot.clone().into_response(), response);
  }
}
