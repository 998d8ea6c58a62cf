use clap::ValueEnum;

/// How progress is rendered while a download runs.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressMode {
    /// Interactive progress bar on stderr
    Bar,
    /// One log line per percent
    Log,
    /// No progress output
    Off,
}
