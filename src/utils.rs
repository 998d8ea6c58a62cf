use std::path::{Path, PathBuf};

use url::Url;

use crate::error::DownloadError;

/// Accepts only absolute http(s) locators.
pub fn parse_download_url(raw: &str) -> Result<Url, DownloadError> {
    let url = Url::parse(raw.trim()).map_err(|e| DownloadError::Transport {
        status: None,
        reason: format!("Invalid URL {:?}: {}", raw, e),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(DownloadError::Transport {
            status: None,
            reason: format!("Unsupported URL scheme: {}", other),
        }),
    }
}

pub fn sanitize_filename(filename: &str) -> String {
    let cleaned = filename.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_', "_");
    if cleaned.trim_matches('.').is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

/// First free path in `dir` for `filename`, appending `_1`, `_2`, ... to the stem.
pub fn get_unique_filepath(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let original = Path::new(filename);
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());
    let extension = original.extension().map(|e| e.to_string_lossy().to_string());

    let mut counter = 1;
    loop {
        let name = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let path = dir.join(name);
        if !path.exists() {
            return path;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_and_non_http() {
        assert!(parse_download_url("gs_agent.apk").is_err());
        assert!(parse_download_url("ftp://example.com/app.apk").is_err());
        assert!(parse_download_url("https://example.com/app.apk").is_ok());
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_filename("../evil/app.apk"), ".._evil_app.apk");
        assert_eq!(sanitize_filename("my app.apk"), "my_app.apk");
        assert_eq!(sanitize_filename(".."), "download");
    }

    #[test]
    fn unique_path_appends_counter() {
        let dir = std::env::temp_dir().join(format!("apkget-utils-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("app.apk"), b"x").unwrap();
        std::fs::write(dir.join("app_1.apk"), b"x").unwrap();

        assert_eq!(get_unique_filepath(&dir, "app.apk"), dir.join("app_2.apk"));
        assert_eq!(get_unique_filepath(&dir, "other.apk"), dir.join("other.apk"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
