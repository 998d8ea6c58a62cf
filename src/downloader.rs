use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::error::{DownloadError, ProtocolFault};
use crate::hashing::verify_hash;
use crate::observer::{BusyGuard, ProgressObserver};
use crate::session::TransferSession;
use crate::sink::{Artifact, ArtifactSink};
use crate::utils::parse_download_url;
use crate::{APK_FILENAME, APK_MIME};

#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Bytes per second; `None` means unthrottled.
    pub rate_limit: Option<NonZeroU32>,
    pub expected_sha256: Option<String>,
    pub filename: String,
    pub mime: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("apkget/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(10),
            rate_limit: None,
            expected_sha256: None,
            filename: APK_FILENAME.to_string(),
            mime: APK_MIME.to_string(),
        }
    }
}

/// Result of a completed download.
#[derive(Debug, Clone)]
pub struct Saved {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: Option<String>,
}

pub struct Throttle {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    burst: NonZeroU32,
}

impl Throttle {
    pub fn per_second(limit: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(limit)),
            burst: limit,
        }
    }

    /// Waits until `len` bytes fit in the quota. Fragments larger than one
    /// second's worth are admitted in burst-sized steps.
    pub async fn wait(&self, len: usize) {
        let mut remaining = len as u64;
        while remaining > 0 {
            let step = remaining.min(self.burst.get() as u64) as u32;
            if let Some(n) = NonZeroU32::new(step) {
                if self.limiter.until_n_ready(n).await.is_err() {
                    break;
                }
            }
            remaining -= step as u64;
        }
    }
}

pub struct Downloader<S> {
    client: Client,
    config: DownloaderConfig,
    sink: S,
    throttle: Option<Throttle>,
    busy: AtomicBool,
}

impl<S: ArtifactSink> Downloader<S> {
    pub fn new(config: DownloaderConfig, sink: S) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()?;

        let throttle = config.rate_limit.map(Throttle::per_second);

        Ok(Self {
            client,
            config,
            sink,
            throttle,
            busy: AtomicBool::new(false),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn download_and_save<O>(&self, url: &str, observer: &O) -> Result<Saved, DownloadError>
    where
        O: ProgressObserver + ?Sized,
    {
        self.download_and_save_with_cancel(url, observer, &CancellationToken::new())
            .await
    }

    /// Fetches `url`, reports progress to `observer` and hands the assembled
    /// bytes to the sink. Rejects with [`DownloadError::InFlight`] while
    /// another call on this downloader is running.
    pub async fn download_and_save_with_cancel<O>(
        &self,
        url: &str,
        observer: &O,
        cancel: &CancellationToken,
    ) -> Result<Saved, DownloadError>
    where
        O: ProgressObserver + ?Sized,
    {
        let _busy = BusyGuard::acquire(&self.busy, observer).ok_or(DownloadError::InFlight)?;

        let result = self.run(url, observer, cancel).await;
        match &result {
            Ok(saved) => log::info!("Saved {} ({} bytes)", saved.path.display(), saved.bytes),
            Err(e) => log::warn!("Download of {} failed: {}", url, e),
        }
        observer.on_finish(&result);
        result
    }

    async fn run<O>(&self, url: &str, observer: &O, cancel: &CancellationToken) -> Result<Saved, DownloadError>
    where
        O: ProgressObserver + ?Sized,
    {
        let url = parse_download_url(url)?;
        log::debug!("GET {}", url);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.client.get(url).send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Transport {
                status: Some(status.as_u16()),
                reason: status.canonical_reason().unwrap_or("Unknown status").to_string(),
            });
        }
        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return Err(ProtocolFault::NoBody.into());
        }

        let total = declared_size(response.headers()).ok_or(ProtocolFault::SizeUnknown)?;
        log::info!("Declared size: {} bytes", total);
        observer.on_start(total);

        let session = receive(
            response.bytes_stream(),
            total,
            observer,
            cancel,
            self.throttle.as_ref(),
        )
        .await?;

        let bytes = session.finish()?;
        let sha256 = match &self.config.expected_sha256 {
            Some(expected) => Some(verify_hash(&bytes, expected)?),
            None => None,
        };

        let size = bytes.len() as u64;
        let path = self
            .sink
            .save(Artifact {
                bytes,
                filename: self.config.filename.clone(),
                mime: self.config.mime.clone(),
            })
            .await?;

        Ok(Saved {
            path,
            bytes: size,
            sha256,
        })
    }
}

/// Content-Length as a positive integer, if the server declared one.
pub fn declared_size(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
}

/// Drains `stream` into a fresh session, emitting progress after every
/// fragment. Cancellation is checked before each read.
pub async fn receive<St, E, O>(
    mut stream: St,
    total: u64,
    observer: &O,
    cancel: &CancellationToken,
    throttle: Option<&Throttle>,
) -> Result<TransferSession, DownloadError>
where
    St: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<DownloadError>,
    O: ProgressObserver + ?Sized,
{
    let mut session = TransferSession::new(total);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = stream.next() => next,
        };
        let Some(item) = next else {
            break;
        };
        let chunk = item.map_err(Into::into)?;

        if let Some(throttle) = throttle {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                _ = throttle.wait(chunk.len()) => {}
            }
        }

        let progress = session.append(chunk)?;
        observer.on_progress(progress);
    }

    Ok(session)
}
