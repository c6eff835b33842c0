//! Test doubles for the platform traits.

use color_eyre::{eyre::eyre, Result};
use futures::future::{self, BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Mutex;

use super::Network;
use crate::worker::request::{Request, Response};

#[derive(Clone)]
enum Reply {
  Respond(Response),
  Fail,
  Hang,
}

/// Network with canned replies per URL. Unknown URLs fail like an offline network.
#[derive(Default)]
pub struct ScriptedNetwork {
  replies: Mutex<HashMap<String, Reply>>,
  calls: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, url: &str, response: Response) {
    self.set(url, Reply::Respond(response));
  }

  pub fn fail(&self, url: &str) {
    self.set(url, Reply::Fail);
  }

  /// Requests to `url` never complete.
  pub fn hang(&self, url: &str) {
    self.set(url, Reply::Hang);
  }

  /// URLs requested so far, in order.
  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  fn set(&self, url: &str, reply: Reply) {
    self.replies.lock().unwrap().insert(url.to_string(), reply);
  }
}

impl Network for ScriptedNetwork {
  fn fetch(&self, request: Request) -> BoxFuture<'static, Result<Response>> {
    let url = request.url.to_string();
    self.calls.lock().unwrap().push(url.clone());

    let reply = self.replies.lock().unwrap().get(&url).cloned();
    match reply {
      Some(Reply::Respond(response)) => future::ready(Ok(response)).boxed(),
      Some(Reply::Hang) => future::pending::<Result<Response>>().boxed(),
      Some(Reply::Fail) | None => future::ready(Err(eyre!("network unreachable: {}", url))).boxed(),
    }
  }
}
