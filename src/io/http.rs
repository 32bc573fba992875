use async_trait::async_trait;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderName, RANGE};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ReadAt;
use anyhow::{Result, anyhow, bail};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 10;
const RETRY_BACKOFF_MS: u64 = 500;

/// Remote workbook read through HTTP Range requests.
///
/// Only the archive tail, the central directory and the shared-strings entry
/// are fetched; the rest of the workbook is never downloaded.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: AtomicU64,
}

impl HttpRangeReader {
    /// Query `url` with a HEAD request for range support and size.
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let resp = client.head(&url).send().await?;

        if !resp.status().is_success() {
            bail!("HEAD {} failed with status: {}", url, resp.status());
        }

        let header = |name: HeaderName| resp.headers().get(name).and_then(|v| v.to_str().ok());

        if !header(ACCEPT_RANGES).is_some_and(|v| v.contains("bytes")) {
            bail!("{} does not support Range requests", url);
        }

        let size = header(CONTENT_LENGTH)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("{} did not return Content-Length", url))?;

        tracing::debug!(%url, size, "opened remote workbook");
        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: AtomicU64::new(0),
        })
    }

    /// Total bytes received so far
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Fetch `start..=end` into `dst`, retrying transient network failures.
    async fn fetch_into(&self, start: u64, end: u64, dst: &mut [u8]) -> Result<usize> {
        let range = format!("bytes={start}-{end}");
        let mut attempt = 0;
        loop {
            match self
                .client
                .get(&self.url)
                .header(RANGE, &range)
                .send()
                .await
            {
                Ok(resp) if resp.status() == StatusCode::PARTIAL_CONTENT => {
                    let bytes = resp.bytes().await?;
                    let n = bytes.len().min(dst.len());
                    dst[..n].copy_from_slice(&bytes[..n]);
                    return Ok(n);
                }
                Ok(resp) => bail!("Range {} failed with status: {}", range, resp.status()),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        bail!("Range {} failed after {} retries: {}", range, attempt, e);
                    }
                    tracing::warn!(
                        attempt,
                        max = MAX_RETRIES,
                        error = %e,
                        "retrying range request"
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64))
                        .await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        let end = (offset + buf.len() as u64 - 1).min(self.size - 1);
        let wanted = (end - offset + 1) as usize;

        let mut received = 0;
        while received < wanted {
            let n = self
                .fetch_into(offset + received as u64, end, &mut buf[received..wanted])
                .await?;
            if n == 0 {
                bail!("Server returned an empty range for {}", self.url);
            }
            received += n;
            self.transferred_bytes.fetch_add(n as u64, Ordering::Relaxed);
        }

        Ok(received)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
