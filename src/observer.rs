use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::downloader::Saved;
use crate::error::DownloadError;
use crate::session::Progress;

/// Receives progress and busy-state changes from a download.
///
/// Progress calls arrive in fragment order on the task driving the download.
/// All methods default to no-ops.
pub trait ProgressObserver {
    fn on_start(&self, _total: u64) {}

    fn on_progress(&self, _progress: Progress) {}

    fn on_busy(&self, _busy: bool) {}

    /// Called once with the outcome, while the busy flag is still set.
    fn on_finish(&self, _result: &Result<Saved, DownloadError>) {}
}

impl ProgressObserver for () {}

/// Terminal progress bar.
pub struct ProgressBarObserver {
    pb: ProgressBar,
}

impl ProgressBarObserver {
    pub fn new(label: &str) -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr_with_hz(5));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {bytes_per_sec:>12} {eta:>4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        pb.set_style(style);
        pb.set_message(format!("Downloading {}", label));
        Self { pb }
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_start(&self, total: u64) {
        self.pb.set_length(total);
        self.pb.set_position(0);
    }

    fn on_progress(&self, progress: Progress) {
        self.pb.set_position(progress.received);
    }

    fn on_busy(&self, busy: bool) {
        if busy {
            self.pb.reset();
        } else if !self.pb.is_finished() {
            self.pb.abandon();
        }
    }

    fn on_finish(&self, result: &Result<Saved, DownloadError>) {
        match result {
            Ok(saved) => self
                .pb
                .finish_with_message(format!("Completed   {}", saved.path.display())),
            Err(e) => self
                .pb
                .abandon_with_message(format!("Failed      {}", e.user_message())),
        }
    }
}

/// Writes one log line each time the integer percentage moves.
#[derive(Default)]
pub struct LogObserver {
    last_percent: AtomicU8,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressObserver for LogObserver {
    fn on_start(&self, total: u64) {
        self.last_percent.store(0, Ordering::Relaxed);
        log::info!("Download started, {} bytes declared", total);
    }

    fn on_progress(&self, progress: Progress) {
        let previous = self.last_percent.swap(progress.percent, Ordering::Relaxed);
        if progress.percent != previous {
            log::info!(
                "{:>3}% ({}/{} bytes)",
                progress.percent,
                progress.received,
                progress.total
            );
        }
    }

    fn on_busy(&self, busy: bool) {
        log::debug!("busy = {}", busy);
    }

    fn on_finish(&self, result: &Result<Saved, DownloadError>) {
        match result {
            Ok(saved) => log::info!("100% done, {} bytes", saved.bytes),
            Err(e) => log::warn!("Download failed: {}", e.user_message()),
        }
    }
}

/// Holds the busy flag for the lifetime of one download and clears it on
/// drop, whichever way the download exits.
pub struct BusyGuard<'a, O: ProgressObserver + ?Sized> {
    flag: &'a AtomicBool,
    observer: &'a O,
}

impl<'a, O: ProgressObserver + ?Sized> BusyGuard<'a, O> {
    /// Returns `None` when the flag is already held.
    pub fn acquire(flag: &'a AtomicBool, observer: &'a O) -> Option<Self> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        observer.on_busy(true);
        Some(Self { flag, observer })
    }
}

impl<O: ProgressObserver + ?Sized> Drop for BusyGuard<'_, O> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.observer.on_busy(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        busy: Mutex<Vec<bool>>,
    }

    impl ProgressObserver for Recorder {
        fn on_busy(&self, busy: bool) {
            self.busy.lock().unwrap().push(busy);
        }
    }

    #[test]
    fn guard_clears_flag_on_drop() {
        let flag = AtomicBool::new(false);
        let recorder = Recorder::default();
        {
            let _guard = BusyGuard::acquire(&flag, &recorder).unwrap();
            assert!(flag.load(Ordering::Acquire));
        }
        assert!(!flag.load(Ordering::Acquire));
        assert_eq!(*recorder.busy.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn second_acquire_is_rejected() {
        let flag = AtomicBool::new(false);
        let recorder = Recorder::default();
        let _guard = BusyGuard::acquire(&flag, &recorder).unwrap();
        assert!(BusyGuard::acquire(&flag, &recorder).is_none());
        assert_eq!(*recorder.busy.lock().unwrap(), vec![true]);
    }

    #[test]
    fn log_observer_accepts_both_outcomes() {
        let observer = LogObserver::new();
        observer.on_finish(&Ok(Saved {
            path: "app.apk".into(),
            bytes: 3,
            sha256: None,
        }));
        observer.on_finish(&Err(DownloadError::Cancelled));
    }

    #[test]
    fn log_observer_tracks_last_percent() {
        let observer = LogObserver::new();
        observer.on_start(10);
        observer.on_progress(Progress {
            received: 5,
            total: 10,
            percent: 50,
        });
        assert_eq!(observer.last_percent.load(Ordering::Relaxed), 50);
    }
}
