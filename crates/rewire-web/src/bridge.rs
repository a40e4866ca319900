#![forbid(unsafe_code)]

//! JSON boundary between JavaScript callers and the runtime's typed
//! configuration surfaces. Target-independent; exercised natively.

use serde_json::{Map, Value};

use rewire_runtime::reactor::{ReactorError, ReactorOptions};
use rewire_runtime::store::{StoreConfig, StoreError};

/// Name of the DOM `CustomEvent` re-publishing store notifications.
pub const STATE_CHANGED_EVENT: &str = "rewire:state-changed";

/// Error surface of the JSON boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The payload was not valid JSON.
    Json(String),
    /// The payload parsed but was not a JSON object.
    NotAnObject,
    /// The store config map was rejected by the runtime.
    Store(StoreError),
    /// The reactor option map was rejected by the runtime.
    Reactor(ReactorError),
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "invalid JSON payload: {msg}"),
            Self::NotAnObject => write!(f, "payload must be a JSON object"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Reactor(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<StoreError> for BridgeError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<ReactorError> for BridgeError {
    fn from(err: ReactorError) -> Self {
        Self::Reactor(err)
    }
}

/// Parse a JSON object string into a state snapshot map.
pub fn parse_state_object(json: &str) -> Result<Map<String, Value>, BridgeError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| BridgeError::Json(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(BridgeError::NotAnObject),
    }
}

/// Parse the dynamic store configuration (`{debounce_ms, ...}`).
///
/// An empty or blank payload yields the defaults.
pub fn parse_store_config(json: &str) -> Result<StoreConfig, BridgeError> {
    if json.trim().is_empty() {
        return Ok(StoreConfig::default());
    }
    let map = parse_state_object(json)?;
    Ok(StoreConfig::from_json_map(&map)?)
}

/// Parse the dynamic reactor options (`{listen_to_global_state, ...}`).
///
/// An empty or blank payload yields the defaults.
pub fn parse_reactor_options(json: &str) -> Result<ReactorOptions, BridgeError> {
    if json.trim().is_empty() {
        return Ok(ReactorOptions::default());
    }
    let map = parse_state_object(json)?;
    Ok(ReactorOptions::from_json_map(&map)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use web_time::Duration;

    #[test]
    fn parses_state_object() {
        let map = parse_state_object(r#"{"count": 0, "name": "gdb"}"#).unwrap();
        assert_eq!(map.get("count"), Some(&json!(0)));
        assert_eq!(map.get("name"), Some(&json!("gdb")));
    }

    #[test]
    fn rejects_non_object_state() {
        assert_eq!(parse_state_object("[1, 2]"), Err(BridgeError::NotAnObject));
        assert!(matches!(
            parse_state_object("{nope"),
            Err(BridgeError::Json(_))
        ));
    }

    #[test]
    fn store_config_roundtrip() {
        let config =
            parse_store_config(r#"{"debounce_ms": 20, "max_suppressed_event_count": 7}"#)
                .unwrap();
        assert_eq!(config.debounce, Duration::from_millis(20));
        assert_eq!(config.max_suppressed_events, 7);
    }

    #[test]
    fn blank_config_is_default() {
        let config = parse_store_config("  ").unwrap();
        assert_eq!(config.debounce, Duration::from_millis(50));
    }

    #[test]
    fn unknown_config_key_propagates() {
        let err = parse_store_config(r#"{"debouncems": 20}"#).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Store(StoreError::InvalidOptions {
                keys: vec!["debouncems".into()],
            })
        );
    }

    #[test]
    fn reactor_options_roundtrip() {
        let options = parse_reactor_options(
            r#"{"listen_to_global_state": true, "state": {"open": true}}"#,
        )
        .unwrap();
        assert!(options.listen_to_global_state);
        assert_eq!(options.state.get("open"), Some(&json!(true)));
    }

    #[test]
    fn unknown_reactor_option_propagates() {
        let err = parse_reactor_options(r#"{"listen": true}"#).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Reactor(ReactorError::InvalidOptions {
                keys: vec!["listen".into()],
            })
        );
    }
}
