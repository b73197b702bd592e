//! Extracting JSON results from noisy tool output.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

/// The last line of `text` that parses as a JSON object.
///
/// Tools may print progress or log noise before their final result, so lines
/// are scanned from the end and the first object found wins.
pub fn last_json_object(text: &str) -> Option<Map<String, Value>> {
    text.lines().rev().find_map(|line| {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    })
}

/// Deserialize the last JSON object in `text` into `T`.
///
/// Returns `None` when there is no object or the object does not match `T`.
pub fn parse_last_json_object<T: DeserializeOwned>(text: &str, context: &'static str) -> Option<T> {
    let object = last_json_object(text)?;
    match serde_json::from_value(Value::Object(object)) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(context, error = %error, "JSON result does not have the expected shape");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_picks_last_object() {
        let text = "noise\n{\"bad\":true}\nmore noise\n{\"asset_path\":\"/tmp/x.mp4\",\"title\":\"Clip\",\"ext\":\".mp4\"}";
        let object = last_json_object(text).unwrap();
        assert_eq!(object["asset_path"], "/tmp/x.mp4");
        assert!(!object.contains_key("bad"));
    }

    #[test]
    fn test_skips_trailing_noise_and_broken_json() {
        let text = "{\"a\":1}\n{\"a\":\ndone.\n";
        let object = last_json_object(text).unwrap();
        assert_eq!(object["a"], 1);
    }

    #[test]
    fn test_ignores_non_object_json() {
        assert!(last_json_object("[1,2]\n42\n\"text\"").is_none());
        assert!(last_json_object("").is_none());
    }

    #[test]
    fn test_typed_parse() {
        #[derive(Deserialize)]
        struct Probe {
            ok: bool,
        }

        let probe: Probe = parse_last_json_object("log\n{\"ok\":true}", "probe").unwrap();
        assert!(probe.ok);
        assert!(parse_last_json_object::<Probe>("{\"other\":1}", "probe").is_none());
    }
}
