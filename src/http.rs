//! Shared HTTP client construction for listing and download traffic.

use std::panic::{AssertUnwindSafe, catch_unwind, set_hook, take_hook};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use thiserror::Error;
use tracing::warn;

/// User-Agent sent on every request.
pub const USER_AGENT: &str = "Mozilla/5.0";

/// Errors raised while constructing an HTTP client.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// reqwest rejected the builder configuration.
    #[error("HTTP client construction failed: {0}")]
    Build(#[source] reqwest::Error),

    /// The builder panicked even with proxy lookup disabled.
    #[error("HTTP client construction panicked while loading proxy settings")]
    Panicked,
}

/// Connect and overall request timeouts for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Connect timeout in seconds.
    pub connect_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_secs: u64,
}

/// How the builder resolves proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProxyMode {
    System,
    Direct,
}

/// Serializes panic-hook swaps between concurrent builds.
static HOOK_LOCK: Mutex<()> = Mutex::new(());

/// Builds a client with the shared User-Agent and the given timeouts.
///
/// reqwest can panic while reading system proxy settings in some sandboxes.
/// The build is then retried as a direct (proxy-less) client, since dufs
/// servers are usually on the local network.
///
/// # Errors
///
/// Returns [`ClientBuildError`] when neither build attempt succeeds.
pub fn build_client(timeouts: HttpTimeouts) -> Result<Client, ClientBuildError> {
    if let Some(result) = build_quietly(timeouts, ProxyMode::System) {
        return result.map_err(ClientBuildError::Build);
    }
    warn!("proxy discovery panicked; building a direct HTTP client");
    build_quietly(timeouts, ProxyMode::Direct)
        .ok_or(ClientBuildError::Panicked)?
        .map_err(ClientBuildError::Build)
}

/// Runs one build with the panic hook muted. `None` means the build panicked.
fn build_quietly(
    timeouts: HttpTimeouts,
    mode: ProxyMode,
) -> Option<Result<Client, reqwest::Error>> {
    let _guard = HOOK_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let previous_hook = take_hook();
    set_hook(Box::new(|_| {}));
    let outcome = catch_unwind(AssertUnwindSafe(|| client_builder(timeouts, mode).build()));
    set_hook(previous_hook);
    outcome.ok()
}

fn client_builder(timeouts: HttpTimeouts, mode: ProxyMode) -> ClientBuilder {
    let builder = Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.read_secs))
        .gzip(true)
        .user_agent(USER_AGENT);
    match mode {
        ProxyMode::System => builder,
        ProxyMode::Direct => builder.no_proxy(),
    }
}
