//! Streams a remote APK to disk while reporting determinate progress.

pub mod cli;
pub mod downloader;
pub mod error;
pub mod hashing;
pub mod observer;
pub mod session;
pub mod sink;
pub mod utils;

pub use downloader::{Downloader, DownloaderConfig, Saved};
pub use error::{DownloadError, ProtocolFault};
pub use observer::{LogObserver, ProgressBarObserver, ProgressObserver};
pub use session::{Progress, TransferSession};
pub use sink::{Artifact, ArtifactSink, DiskSink};

pub const DEFAULT_URL: &str =
    "https://raw.githubusercontent.com/paybd/grs-remit-for-me/main/public/gs_agent.apk";

pub const APK_FILENAME: &str = "app.apk";

pub const APK_MIME: &str = "application/vnd.android.package-archive";

/// Shown once the artifact has been handed to the sink.
pub const INSTALL_INSTRUCTIONS: &str =
    "After the download completes, open the APK file from your device's file manager to install.";
