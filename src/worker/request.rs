//! Request and response snapshots exchanged between the page, the worker and the network.

use clap::ValueEnum;
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

/// What kind of resource the page is loading (the fetch `destination`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
  Document,
  Style,
  Script,
  Font,
  Image,
  /// fetch()/XHR from script, or anything else the platform reports
  Other,
}

impl Destination {
  /// Static assets are the only destinations the cache manager serves.
  pub fn is_static_asset(self) -> bool {
    matches!(
      self,
      Destination::Style | Destination::Script | Destination::Font | Destination::Image
    )
  }
}

/// An outgoing request issued by a page.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub headers: Vec<(String, String)>,
  pub destination: Destination,
}

impl Request {
  pub fn new(method: Method, url: Url, destination: Destination) -> Self {
    Self {
      method,
      url,
      headers: Vec::new(),
      destination,
    }
  }

  /// Build a GET request from a URL string.
  pub fn get(url: &str, destination: Destination) -> Result<Self> {
    let url = Url::parse(url).map_err(|e| eyre!("Invalid request URL '{}': {}", url, e))?;
    Ok(Self::new(Method::GET, url, destination))
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }
}

/// A response as seen by the page: status, headers and the full body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }

  /// Only plain 200 responses are worth keeping in the cache.
  pub fn is_cacheable(&self) -> bool {
    self.status == 200
  }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
  headers
    .iter()
    .find(|(k, _)| k.eq_ignore_ascii_case(name))
    .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_lookup_is_case_insensitive() {
    let request = Request::get("https://app.example/ws", Destination::Other)
      .unwrap()
      .with_header("Upgrade", "websocket");

    assert_eq!(request.header("upgrade"), Some("websocket"));
    assert_eq!(request.header("UPGRADE"), Some("websocket"));
    assert_eq!(request.header("connection"), None);
  }

  #[test]
  fn test_static_asset_destinations() {
    assert!(Destination::Style.is_static_asset());
    assert!(Destination::Script.is_static_asset());
    assert!(Destination::Font.is_static_asset());
    assert!(Destination::Image.is_static_asset());
    assert!(!Destination::Document.is_static_asset());
    assert!(!Destination::Other.is_static_asset());
  }

  #[test]
  fn test_only_200_is_cacheable() {
    assert!(Response::new(200, "ok").is_cacheable());
    assert!(!Response::new(206, "partial").is_cacheable());
    assert!(!Response::new(404, "missing").is_cacheable());
  }

  #[test]
  fn test_invalid_url_is_rejected() {
    assert!(Request::get("not a url", Destination::Script).is_err());
  }
}
