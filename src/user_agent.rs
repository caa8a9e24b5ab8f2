//! User-Agent Builder
//!
//! Assembles the diagnostic identity attached to every request: a plain
//! `User-Agent` string plus a JSON mapping sent in the
//! `X-Keystone-Client-User-Agent` header. The mapping is computed once per
//! client instance; the expensive system probe (`uname`) is computed once per
//! process and reused.

use std::collections::BTreeMap;
use std::process::Command;
use std::sync::OnceLock;

/// Version of this crate, reported in every identity mapping.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const UNKNOWN_PLATFORM: &str = "unknown platform";

static UNAME: OnceLock<String> = OnceLock::new();

/// The plain `User-Agent` header value.
pub fn user_agent_string() -> String {
    format!("keystone-erp-rust/{VERSION}")
}

/// Build the identity mapping for the diagnostic header.
///
/// Fields with empty values are omitted.
pub fn identity() -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    insert_nonempty(&mut map, "bindings_version", VERSION.to_string());
    insert_nonempty(&mut map, "client", user_agent_string());
    insert_nonempty(&mut map, "lang", "rust".to_string());
    insert_nonempty(
        &mut map,
        "platform",
        format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
    );
    insert_nonempty(&mut map, "engine", "rustc".to_string());
    insert_nonempty(&mut map, "uname", uname().to_string());
    if let Some(hostname) = hostname() {
        insert_nonempty(&mut map, "hostname", hostname);
    }
    map
}

fn insert_nonempty(map: &mut BTreeMap<String, String>, key: &str, value: String) {
    if !value.is_empty() {
        map.insert(key.to_string(), value);
    }
}

/// Best-effort system description, computed once per process.
///
/// Reads the kernel version file when present, falls back to running
/// `uname -a`, and degrades to a fixed string on any failure.
fn uname() -> &'static str {
    UNAME.get_or_init(compute_uname)
}

fn compute_uname() -> String {
    if let Ok(contents) = std::fs::read_to_string("/proc/version") {
        let trimmed = contents.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    match Command::new("uname").arg("-a").output() {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if text.is_empty() {
                UNKNOWN_PLATFORM.to_string()
            } else {
                text
            }
        }
        _ => UNKNOWN_PLATFORM.to_string(),
    }
}

/// Best-effort local hostname.
fn hostname() -> Option<String> {
    if let Ok(name) = std::env::var("HOSTNAME") {
        let trimmed = name.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    if let Ok(contents) = std::fs::read_to_string("/etc/hostname") {
        let trimmed = contents.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    match Command::new("hostname").output() {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if text.is_empty() { None } else { Some(text) }
        }
        _ => None,
    }
}
