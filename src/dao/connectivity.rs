//! Network reachability checks used to tell "offline" apart from other
//! store failures.

use futures::future::BoxFuture;

/// Fragments of low-level error messages that hint at a network failure.
const NETWORK_ERROR_SNIPPETS: &[&str] = &[
    "network request failed",
    "network error",
    "offline",
    "failed to fetch",
    "timeout",
    "timed out",
    "socket",
    "enotfound",
    "econnrefused",
    // reqwest / hyper wording
    "error sending request",
    "connection refused",
    "dns error",
];

/// Default probe target; answers 204 when the internet is reachable.
pub const DEFAULT_PROBE_URL: &str = "https://www.gstatic.com/generate_204";

/// Whether an error message looks like it came from a network failure.
pub fn looks_like_network_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    NETWORK_ERROR_SNIPPETS
        .iter()
        .any(|snippet| lower.contains(snippet))
}

/// Source of truth for "is the network reachable right now".
pub trait Connectivity: Send + Sync {
    /// `Some(false)` only when the network is known to be unreachable;
    /// `None` when it cannot be determined.
    fn is_reachable(&self) -> BoxFuture<'static, Option<bool>>;
}

/// Connectivity with a fixed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedConnectivity(pub Option<bool>);

impl FixedConnectivity {
    /// Always reachable; network-looking errors are never rewritten.
    pub fn online() -> Self {
        Self(Some(true))
    }

    /// Always unreachable.
    pub fn offline() -> Self {
        Self(Some(false))
    }
}

impl Connectivity for FixedConnectivity {
    fn is_reachable(&self) -> BoxFuture<'static, Option<bool>> {
        let answer = self.0;
        Box::pin(async move { answer })
    }
}

#[cfg(feature = "couch-store")]
pub use http_probe::HttpProbe;

#[cfg(feature = "couch-store")]
mod http_probe {
    use std::{sync::Arc, time::Duration};

    use futures::future::BoxFuture;
    use reqwest::Client;
    use tracing::warn;

    use super::Connectivity;

    const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

    /// Reachability probe sending `HEAD` to a well-known URL.
    #[derive(Clone)]
    pub struct HttpProbe {
        client: Client,
        url: Arc<str>,
    }

    impl HttpProbe {
        /// Probe `url`.
        pub fn new(url: impl Into<String>) -> Self {
            let client = Client::builder()
                .timeout(PROBE_TIMEOUT)
                .build()
                .unwrap_or_else(|err| {
                    warn!(error = %err, "falling back to default probe client");
                    Client::new()
                });
            Self {
                client,
                url: Arc::from(url.into()),
            }
        }
    }

    impl Connectivity for HttpProbe {
        fn is_reachable(&self) -> BoxFuture<'static, Option<bool>> {
            let probe = self.clone();
            Box::pin(async move {
                match probe.client.head(probe.url.as_ref()).send().await {
                    Ok(response) => Some(response.status().is_success()),
                    Err(err) => {
                        warn!(error = %err, url = %probe.url, "connectivity probe failed");
                        Some(false)
                    }
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_network_failures_case_insensitively() {
        assert!(looks_like_network_error("TypeError: Network request failed"));
        assert!(looks_like_network_error("connect ECONNREFUSED 127.0.0.1:5984"));
        assert!(looks_like_network_error(
            "storage unavailable: failed to send CouchDB request to `_all_docs`: error sending request"
        ));
        assert!(!looks_like_network_error("Nickname already taken"));
        assert!(!looks_like_network_error(""));
    }

    #[tokio::test]
    async fn fixed_connectivity_answers_as_configured() {
        assert_eq!(FixedConnectivity::offline().is_reachable().await, Some(false));
        assert_eq!(FixedConnectivity(None).is_reachable().await, None);
    }
}
