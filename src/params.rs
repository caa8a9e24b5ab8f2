//! Parameter Serialization Utilities
//!
//! Turns nested parameter structures into the bracket-keyed pairs the
//! platform expects (`expand[0]=lines`, `customer[address][city]=…`) and
//! normalizes header maps between `reqwest` and plain string maps.

use std::collections::HashMap;

use reqwest::header::HeaderMap;
use serde_json::Value;

/// Flatten a nested parameter structure into bracket-keyed string pairs.
///
/// Objects nest as `parent[child]`, arrays as `parent[index]`. Scalars are
/// rendered with their JSON text form; strings are used verbatim and nulls
/// are omitted. A bare scalar at the top level has no name to flatten under
/// and is ignored.
pub fn flatten(params: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    flatten_into(None, params, &mut pairs);
    pairs
}

fn flatten_into(prefix: Option<&str>, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let name = match prefix {
                    Some(parent) => format!("{parent}[{key}]"),
                    None => key.clone(),
                };
                flatten_into(Some(&name), child, out);
            }
        }
        Value::Array(items) => {
            if let Some(parent) = prefix {
                for (index, child) in items.iter().enumerate() {
                    let name = format!("{parent}[{index}]");
                    flatten_into(Some(&name), child, out);
                }
            }
        }
        Value::Null => {}
        Value::String(text) => {
            if let Some(name) = prefix {
                out.push((name.to_string(), text.clone()));
            }
        }
        scalar => {
            if let Some(name) = prefix {
                out.push((name.to_string(), scalar.to_string()));
            }
        }
    }
}

/// Percent-encode a flattened parameter structure into a query/body string.
pub fn encode(params: &Value) -> String {
    flatten(params)
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Convert a `reqwest` [`HeaderMap`] to a `HashMap<String, String>` with
/// lowercased keys. Header values that are not valid UTF-8 are filtered out.
pub fn headermap_to_hashmap(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(key, value)| {
            value
                .to_str()
                .ok()
                .map(|text| (key.as_str().to_string(), text.to_string()))
        })
        .collect()
}
