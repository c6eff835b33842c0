use serde_json::{Map, Value};
use tracing::warn;

/// JSON body of a push message. Every field is optional.
///
/// `{ title?, body?, url?, sound?, vibration? }`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushPayload {
  pub title: Option<String>,
  pub body: Option<String>,
  pub url: Option<String>,
  /// Sound identifier, e.g. "chime1"
  pub sound: Option<String>,
  pub vibration: Option<bool>,
}

impl PushPayload {
  /// Parse push message data.
  ///
  /// Never fails: a missing, empty or non-object payload yields the empty
  /// payload. Fields are read one by one, so a field of the wrong type is
  /// dropped on its own and its siblings survive.
  pub fn parse(data: Option<&[u8]>) -> Self {
    let bytes = match data {
      Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => bytes,
      _ => return Self::default(),
    };

    let fields = match serde_json::from_slice::<Value>(bytes) {
      Ok(Value::Object(fields)) => fields,
      Ok(other) => {
        warn!(kind = json_kind(&other), "Ignoring push payload that is not an object");
        return Self::default();
      }
      Err(e) => {
        warn!(error = %e, "Ignoring malformed push payload");
        return Self::default();
      }
    };

    Self {
      title: string_field(&fields, "title"),
      body: string_field(&fields, "body"),
      url: string_field(&fields, "url"),
      sound: string_field(&fields, "sound"),
      vibration: fields.get("vibration").map(is_truthy),
    }
  }

  pub fn wants_vibration(&self) -> bool {
    self.vibration.unwrap_or(false)
  }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
  match fields.get(name)? {
    Value::String(s) => Some(s.clone()),
    Value::Null => None,
    other => {
      warn!(field = name, kind = json_kind(other), "Ignoring push payload field of the wrong type");
      None
    }
  }
}

/// `vibration` is a flag; any truthy JSON value turns it on.
fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
