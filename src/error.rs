use thiserror::Error;

/// Why a successful response could still not be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolFault {
    #[error("No response body received from server")]
    NoBody,

    #[error("Could not determine file size")]
    SizeUnknown,

    #[error("Server sent more data than the declared size of {declared} bytes")]
    Overrun { declared: u64 },

    #[error("Download ended early: received {received} of {declared} bytes")]
    Truncated { received: u64, declared: u64 },
}

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Connection failure, invalid URL or a non-2xx status.
    #[error("{}", transport_message(.status, .reason))]
    Transport { status: Option<u16>, reason: String },

    #[error("{0}")]
    Protocol(ProtocolFault),

    #[error("{0}")]
    Unknown(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    Checksum { expected: String, actual: String },

    #[error("A download is already in progress")]
    InFlight,

    #[error("Download cancelled")]
    Cancelled,
}

pub const GENERIC_FAILURE: &str = "Failed to download the app";

fn transport_message(status: &Option<u16>, reason: &str) -> String {
    match status {
        Some(code) => format!("Server returned {}: {}", code, reason),
        None => reason.to_string(),
    }
}

impl DownloadError {
    pub fn status(&self) -> Option<u16> {
        match self {
            DownloadError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Text for the inline message shown next to the download trigger.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            message
        }
    }
}

impl From<ProtocolFault> for DownloadError {
    fn from(fault: ProtocolFault) -> Self {
        DownloadError::Protocol(fault)
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        // Body errors happen mid-stream, after the transfer was established.
        if err.is_body() || err.is_decode() {
            return DownloadError::Unknown(err.to_string());
        }

        let status = err.status().map(|s| s.as_u16());
        let reason = if err.is_timeout() {
            format!("Request timed out: {}", err)
        } else if err.is_connect() {
            format!("Connection failed: {}", err)
        } else {
            err.to_string()
        };
        DownloadError::Transport { status, reason }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        DownloadError::Unknown(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_message_carries_status() {
        let err = DownloadError::Transport {
            status: Some(404),
            reason: "Not Found".to_string(),
        };
        assert_eq!(err.user_message(), "Server returned 404: Not Found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn transport_without_status_uses_reason() {
        let err = DownloadError::Transport {
            status: None,
            reason: "Connection failed: refused".to_string(),
        };
        assert_eq!(err.user_message(), "Connection failed: refused");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn empty_unknown_falls_back_to_generic() {
        let err = DownloadError::Unknown(String::new());
        assert_eq!(err.user_message(), GENERIC_FAILURE);
    }

    #[test]
    fn protocol_faults_have_fixed_text() {
        let err: DownloadError = ProtocolFault::SizeUnknown.into();
        assert_eq!(err.user_message(), "Could not determine file size");
        let err: DownloadError = ProtocolFault::NoBody.into();
        assert_eq!(err.user_message(), "No response body received from server");
    }
}
