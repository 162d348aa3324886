use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, trace};
use url::Url;

use super::error::HttpRemoteError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration of an [`HttpRemote`](super::HttpRemote).
#[derive(Clone, Debug)]
pub struct HttpRemoteConfig {
    pub(crate) base_url: Url,
    /// Timeout for each HTTP request. Defaults to 30 seconds.
    pub(crate) timeout: Duration,
    /// Bearer token sent with every request, if set.
    pub(crate) token: Option<SecretString>,
}

impl HttpRemoteConfig {
    /// Creates a configuration for the server at `base_url`, e.g. `http://localhost:8080`.
    ///
    /// # Errors
    /// Returns `HttpRemoteError::InvalidConfiguration` if the URL does not parse or cannot
    /// serve as a base for API paths.
    pub fn new(base_url: &str) -> Result<Self, HttpRemoteError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            HttpRemoteError::InvalidConfiguration(format!("Invalid base URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(HttpRemoteError::InvalidConfiguration(format!(
                "Base URL '{}' cannot carry a path",
                base_url
            )));
        }
        Ok(Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            token: None,
        })
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends `token` as a bearer token. An empty token is ignored.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.is_empty()).then(|| token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// HTTP client plus configuration, shared by every request of one remote.
#[derive(Clone, Debug)]
pub(crate) struct SharedClient {
    config: HttpRemoteConfig,
    http_client: Client,
}

impl SharedClient {
    /// Builds a default reqwest client unless one is provided.
    #[instrument(name = "http_remote_client_new", skip(config, client_override))]
    pub(crate) fn new(
        config: HttpRemoteConfig,
        client_override: Option<Client>,
    ) -> Result<Self, HttpRemoteError> {
        let http_client = match client_override {
            Some(client) => {
                debug!("Using provided HTTP client");
                client
            }
            None => {
                debug!(timeout = ?config.timeout, "Building default HTTP client");
                Client::builder().timeout(config.timeout).build().map_err(|e| {
                    HttpRemoteError::InvalidConfiguration(format!(
                        "Failed to build HTTP client: {}",
                        e
                    ))
                })?
            }
        };
        debug!(
            base_url = %config.base_url,
            authenticated = config.token.is_some(),
            "HTTP remote initialized"
        );
        Ok(Self { config, http_client })
    }

    pub(crate) fn config(&self) -> &HttpRemoteConfig {
        &self.config
    }

    /// Appends `segments` to the base URL. Each segment is percent-encoded, so filenames
    /// may contain spaces or slashes.
    pub(crate) fn build_url(&self, segments: &[&str]) -> Result<Url, HttpRemoteError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                HttpRemoteError::InvalidConfiguration("Base URL cannot carry a path".to_string())
            })?
            .pop_if_empty()
            .extend(segments);
        trace!(built_url = %url, "Built remote URL");
        Ok(url)
    }

    pub(crate) fn get(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http_client.get(url))
    }

    pub(crate) fn post(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http_client.post(url))
    }

    pub(crate) fn delete(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http_client.delete(url))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}
