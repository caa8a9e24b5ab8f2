//! Connection Provider
//!
//! Supplies one reusable blocking transport per execution thread. The handle
//! is cached in a thread-local slot keyed by a fingerprint of the transport
//! settings, so sequential calls on the same thread reuse the connection and
//! a config change rebuilds it. Handles are never shared across threads.
//!
//! The transport is built with multipart and URL-encoded body support; the
//! executor promotes non-2xx responses to errors after each attempt.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::ClientConfig;
use crate::error::ErpError;

/// Process-wide flag for the one-time TLS verification warning. Must fire at
/// most once regardless of how many threads build connections.
static VERIFY_WARNING_EMITTED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static CONNECTION: RefCell<Option<(Fingerprint, Client)>> = RefCell::new(None);
}

/// Transport settings that require a rebuild when changed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    open_timeout: Duration,
    read_timeout: Duration,
    verify_ssl_certs: bool,
}

impl Fingerprint {
    fn of(config: &ClientConfig) -> Self {
        Self {
            open_timeout: config.open_timeout,
            read_timeout: config.read_timeout,
            verify_ssl_certs: config.verify_ssl_certs,
        }
    }
}

/// Return the cached transport for the calling thread, building one if the
/// cache is empty or the transport settings changed.
pub fn for_current_thread(config: &ClientConfig) -> Result<Client, ErpError> {
    let fingerprint = Fingerprint::of(config);
    CONNECTION.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some((cached, client)) = slot.as_ref()
            && *cached == fingerprint
        {
            return Ok(client.clone());
        }
        let client = build(config)?;
        *slot = Some((fingerprint, client.clone()));
        Ok(client)
    })
}

fn build(config: &ClientConfig) -> Result<Client, ErpError> {
    let mut builder = Client::builder()
        .connect_timeout(config.open_timeout)
        .timeout(config.read_timeout);
    if !config.verify_ssl_certs {
        warn_verification_disabled_once();
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder
        .build()
        .map_err(|e| ErpError::ConfigurationError(format!("could not build HTTP transport: {e}")))
}

fn warn_verification_disabled_once() {
    if VERIFY_WARNING_EMITTED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        tracing::warn!(
            target: "keystone_erp::connection",
            "TLS certificate verification is disabled; the transport will accept any certificate. \
             Enable it with ClientConfig::builder().verify_ssl_certs(true)"
        );
    }
}
