use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use apkget::cli::ProgressMode;
use apkget::{
    DiskSink, Downloader, DownloaderConfig, LogObserver, ProgressBarObserver, ProgressObserver,
    APK_FILENAME, DEFAULT_URL, INSTALL_INSTRUCTIONS,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the APK to download
    #[arg(index = 1, default_value = DEFAULT_URL)]
    url: String,

    /// Directory to save the downloaded file
    #[arg(short = 'd', long = "download-dir", default_value = "downloads")]
    download_dir: PathBuf,

    /// Rate limit in bytes per second (e.g., 1048576 for 1MB/s)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..))]
    rate_limit: Option<u32>,

    /// Expected SHA-256 of the file; the file is not saved on mismatch
    #[arg(long)]
    sha256: Option<String>,

    /// Connect timeout in seconds
    #[arg(long = "connect-timeout", default_value_t = 10)]
    connect_timeout: u64,

    /// Progress display
    #[arg(long, value_enum, default_value = "bar")]
    progress: ProgressMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = Args::parse();

    // Output dir might not exist yet, so we resolve it relative to current dir
    if args.download_dir.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            args.download_dir = cwd.join(&args.download_dir);
        }
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let config = DownloaderConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout),
        rate_limit: args.rate_limit.and_then(NonZeroU32::new),
        expected_sha256: args.sha256,
        ..DownloaderConfig::default()
    };
    let downloader = Downloader::new(config, DiskSink::new(&args.download_dir))
        .map_err(|e| anyhow!(e.user_message()))?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling download");
            ctrl_c.cancel();
        }
    });

    let observer: Box<dyn ProgressObserver> = match args.progress {
        ProgressMode::Bar => Box::new(ProgressBarObserver::new(APK_FILENAME)),
        ProgressMode::Log => Box::new(LogObserver::new()),
        ProgressMode::Off => Box::new(()),
    };

    let result = downloader
        .download_and_save_with_cancel(&args.url, observer.as_ref(), &cancel)
        .await;

    match result {
        Ok(saved) => {
            println!("Saved to {}", saved.path.display());
            if let Some(hash) = saved.sha256 {
                println!("SHA256: {}", hash);
            }
            println!();
            println!("{}", INSTALL_INSTRUCTIONS);
            Ok(())
        }
        Err(e) => Err(anyhow!(e.user_message())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_limit_is_rejected() {
        assert!(Args::try_parse_from(["apkget", "--rate-limit", "0"]).is_err());
    }

    #[test]
    fn positive_rate_limit_is_accepted() {
        let args = Args::try_parse_from(["apkget", "-r", "1048576"]).unwrap();
        assert_eq!(args.rate_limit, Some(1_048_576));
        assert_eq!(args.url, DEFAULT_URL);
    }
}
