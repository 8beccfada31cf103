//! Retrieval of files relative to a distribution path.
//!
//! A [`Fetcher`] is configured once (gateway, distribution path) and then
//! used for any number of [`Fetcher::fetch`] calls, possibly concurrently.
//! Changing the configuration needs `&mut self`, so callers that share a
//! fetcher across tasks have to synchronize reconfiguration themselves.

mod http;
mod multi;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

pub use http::HttpFetcher;
pub use multi::MultiFetcher;

use crate::FetchError;

/// Something that can retrieve files from a distribution.
#[async_trait::async_trait]
pub trait Fetcher: std::fmt::Debug + Send + Sync {
    /// Fetches `path`, relative to the distribution path, and returns its
    /// body. Every read of the returned body observes `cancel`.
    async fn fetch(&self, cancel: &CancellationToken, path: &str)
    -> Result<FetchBody, FetchError>;

    /// The distribution path files are resolved against.
    fn dist_path(&self) -> &str;

    /// Replaces the distribution path.
    fn set_dist_path(&mut self, dist_path: &str) -> Result<(), FetchError>;
}

enum BodySource {
    Http(reqwest::Response),
    Memory(Option<Bytes>),
}

/// The body of a successful fetch.
///
/// The underlying connection is released when the body is dropped, whether
/// it was read to the end or not.
pub struct FetchBody {
    url: String,
    source: BodySource,
    cancel: CancellationToken,
    limit: u64,
    read: u64,
}

impl std::fmt::Debug for FetchBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchBody")
            .field("url", &self.url)
            .field("read", &self.read)
            .finish_non_exhaustive()
    }
}

impl FetchBody {
    pub(crate) fn from_response(
        url: String,
        response: reqwest::Response,
        cancel: &CancellationToken,
        limit: u64,
    ) -> Self {
        Self {
            url,
            source: BodySource::Http(response),
            cancel: cancel.clone(),
            limit,
            read: 0,
        }
    }

    /// A body that is already held in memory.
    pub fn from_bytes(
        url: impl Into<String>,
        bytes: impl Into<Bytes>,
        cancel: &CancellationToken,
    ) -> Self {
        Self {
            url: url.into(),
            source: BodySource::Memory(Some(bytes.into())),
            cancel: cancel.clone(),
            limit: 0,
            read: 0,
        }
    }

    /// The absolute location the body was fetched from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The announced length of the body, if known.
    pub fn content_length(&self) -> Option<u64> {
        match &self.source {
            BodySource::Http(response) => response.content_length(),
            BodySource::Memory(bytes) => bytes.as_ref().map(|b| b.len() as u64),
        }
    }

    /// Reads the next chunk of the body, `None` once it is exhausted.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        let next = match &mut self.source {
            BodySource::Http(response) => self
                .cancel
                .run_until_cancelled(response.chunk())
                .await
                .ok_or(FetchError::Cancelled)??,
            BodySource::Memory(bytes) => {
                if self.cancel.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
                bytes.take()
            }
        };

        if let Some(chunk) = &next {
            self.read += chunk.len() as u64;
            if self.limit > 0 && self.read > self.limit {
                return Err(FetchError::SizeLimitExceeded {
                    url: self.url.clone(),
                    limit: self.limit,
                });
            }
        }
        Ok(next)
    }

    /// Reads the remaining body into memory.
    pub async fn bytes(mut self) -> Result<Vec<u8>, FetchError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Streams the remaining body into `writer`, returning the number of bytes
    /// written. `on_chunk` sees the size of every chunk as it is written.
    pub async fn copy_to<W>(
        &mut self,
        writer: &mut W,
        mut on_chunk: impl FnMut(u64),
    ) -> Result<u64, FetchError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut written = 0;
        while let Some(chunk) = self.chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
            on_chunk(chunk.len() as u64);
        }
        writer.flush().await?;
        Ok(written)
    }
}

/// Joins a distribution path and a relative path the way `path.join` would
/// on a URL path: one leading slash, no empty segments.
pub(crate) fn join_dist_path(dist_path: &str, path: &str) -> String {
    let segments: Vec<&str> = dist_path
        .split('/')
        .chain(path.split('/'))
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    format!("/{}", segments.join("/"))
}
