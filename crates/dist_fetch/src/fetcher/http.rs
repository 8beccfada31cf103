use reqwest::{Client, StatusCode, header::USER_AGENT};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use super::{FetchBody, Fetcher, join_dist_path};
use crate::{
    FetchError,
    consts::{DEFAULT_FETCH_LIMIT, DEFAULT_GATEWAY, IPNS_IPFS_DIST},
};

/// Fetches files from a distribution through a single HTTP(S) gateway.
///
/// A file at `path` is requested from `<gateway><dist path>/<path>`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    gateway: String,
    dist_path: String,
    user_agent: Option<String>,
    fetch_limit: u64,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// A fetcher for the default gateway and distribution path.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            gateway: DEFAULT_GATEWAY.to_string(),
            dist_path: IPNS_IPFS_DIST.to_string(),
            user_agent: None,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }

    /// Use `client` for all requests.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Send `user_agent` as the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Fail reads once more than `limit` bytes were received; `0` disables
    /// the limit.
    #[must_use]
    pub fn with_fetch_limit(mut self, limit: u64) -> Self {
        self.fetch_limit = limit;
        self
    }

    pub fn with_gateway(mut self, gateway: &str) -> Result<Self, FetchError> {
        self.set_gateway(gateway)?;
        Ok(self)
    }

    pub fn with_dist_path(mut self, dist_path: &str) -> Result<Self, FetchError> {
        self.set_dist_path(dist_path)?;
        Ok(self)
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    /// Replaces the gateway. Malformed urls are rejected and leave the
    /// current gateway untouched.
    pub fn set_gateway(&mut self, gateway: &str) -> Result<(), FetchError> {
        self.gateway = parse_gateway(gateway)?;
        Ok(())
    }

    /// The absolute url `path` is fetched from.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.gateway, join_dist_path(&self.dist_path, path))
    }
}

fn parse_gateway(gateway: &str) -> Result<String, FetchError> {
    let invalid = |reason: String| FetchError::InvalidGateway {
        gateway: gateway.to_string(),
        reason,
    };

    let url = Url::parse(gateway.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self, cancel), fields(gateway = %self.gateway))]
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<FetchBody, FetchError> {
        let url = self.url_for(path);

        let mut request = self.client.get(url.as_str());
        if let Some(user_agent) = &self.user_agent {
            request = request.header(USER_AGENT, user_agent);
        }

        let response = cancel
            .run_until_cancelled(request.send())
            .await
            .ok_or(FetchError::Cancelled)??;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                path: path.to_string(),
                url,
                status,
            });
        }
        if status.as_u16() >= 300 {
            let message = cancel
                .run_until_cancelled(response.text())
                .await
                .ok_or(FetchError::Cancelled)??;
            return Err(FetchError::HttpStatus {
                url,
                status,
                message: message.trim().to_string(),
            });
        }

        debug!("fetching {url}");
        Ok(FetchBody::from_response(
            url,
            response,
            cancel,
            self.fetch_limit,
        ))
    }

    fn dist_path(&self) -> &str {
        &self.dist_path
    }

    fn set_dist_path(&mut self, dist_path: &str) -> Result<(), FetchError> {
        let trimmed = dist_path.trim();
        if trimmed.is_empty() {
            return Err(FetchError::InvalidDistPath(dist_path.to_string()));
        }
        self.dist_path = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        Ok(())
    }
}
