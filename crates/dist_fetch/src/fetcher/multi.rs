use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{FetchBody, Fetcher};
use crate::FetchError;

/// Tries an ordered list of fetchers until one of them succeeds.
///
/// When every fetcher fails, the error of the last one is returned. A
/// cancelled fetch is never retried on the next fetcher.
#[derive(Debug)]
pub struct MultiFetcher {
    fetchers: Vec<Box<dyn Fetcher>>,
}

impl MultiFetcher {
    pub fn new(fetchers: Vec<Box<dyn Fetcher>>) -> Result<Self, FetchError> {
        if fetchers.is_empty() {
            return Err(FetchError::NoFetchers);
        }
        Ok(Self { fetchers })
    }

    /// The wrapped fetchers, in the order they are tried.
    pub fn fetchers(&self) -> &[Box<dyn Fetcher>] {
        &self.fetchers
    }
}

#[async_trait::async_trait]
impl Fetcher for MultiFetcher {
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<FetchBody, FetchError> {
        let mut last_err = FetchError::NoFetchers;
        for (idx, fetcher) in self.fetchers.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            match fetcher.fetch(cancel, path).await {
                Ok(body) => return Ok(body),
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(err) => {
                    debug!("fetcher {idx} failed to fetch {path}: {err}");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    /// The distribution path of the first fetcher.
    fn dist_path(&self) -> &str {
        self.fetchers
            .first()
            .map(|fetcher| fetcher.dist_path())
            .unwrap_or_default()
    }

    /// Sets the distribution path on every fetcher in order. The first
    /// failure stops the propagation; fetchers before it keep the new path.
    fn set_dist_path(&mut self, dist_path: &str) -> Result<(), FetchError> {
        for fetcher in &mut self.fetchers {
            fetcher.set_dist_path(dist_path)?;
        }
        Ok(())
    }
}
