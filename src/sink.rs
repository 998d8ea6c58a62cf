use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;
use crate::utils::{get_unique_filepath, sanitize_filename};

/// A fully assembled download, ready to hand to the host.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime: String,
}

/// Persists an artifact on behalf of the user. Returns where it ended up.
#[allow(async_fn_in_trait)]
pub trait ArtifactSink {
    async fn save(&self, artifact: Artifact) -> Result<PathBuf, DownloadError>;
}

/// Saves into a directory, never overwriting an existing file.
#[derive(Debug, Clone)]
pub struct DiskSink {
    dir: PathBuf,
}

impl DiskSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactSink for DiskSink {
    async fn save(&self, artifact: Artifact) -> Result<PathBuf, DownloadError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
        }

        let filename = sanitize_filename(&artifact.filename);
        let filepath = get_unique_filepath(&self.dir, &filename);
        let mut part_filepath = filepath.clone().into_os_string();
        part_filepath.push(".part");
        let part_filepath = PathBuf::from(part_filepath);

        persist(&part_filepath, &filepath, &artifact.bytes).await?;
        log::debug!(
            "Saved {} bytes ({}) to {}",
            artifact.bytes.len(),
            artifact.mime,
            filepath.display()
        );
        Ok(filepath)
    }
}

/// Writes `bytes` to `part_filepath` and renames it over `filepath`. The
/// partial file is removed if any step fails.
async fn persist(part_filepath: &Path, filepath: &Path, bytes: &[u8]) -> Result<(), DownloadError> {
    let written = async {
        let mut file = fs::File::create(part_filepath).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);
        fs::rename(part_filepath, filepath).await
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(part_filepath).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("apkget-sink-{}-{}", name, std::process::id()))
    }

    fn artifact(bytes: &[u8]) -> Artifact {
        Artifact {
            bytes: bytes.to_vec(),
            filename: "app.apk".to_string(),
            mime: crate::APK_MIME.to_string(),
        }
    }

    #[tokio::test]
    async fn creates_directory_and_writes_bytes() {
        let dir = scratch_dir("write");
        let _ = std::fs::remove_dir_all(&dir);

        let sink = DiskSink::new(&dir);
        let path = sink.save(artifact(b"payload")).await.unwrap();

        assert_eq!(path, dir.join("app.apk"));
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
        assert!(!dir.join("app.apk.part").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn failed_rename_removes_partial_file() {
        let dir = scratch_dir("rename");
        let _ = std::fs::remove_dir_all(&dir);
        let blocker = dir.join("app.apk");
        std::fs::create_dir_all(blocker.join("occupied")).unwrap();
        let part = dir.join("app.apk.part");

        let err = persist(&part, &blocker, b"payload").await.unwrap_err();

        assert!(matches!(err, DownloadError::Unknown(_)));
        assert!(!part.exists());
        assert!(blocker.is_dir());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn second_save_does_not_overwrite() {
        let dir = scratch_dir("twice");
        let _ = std::fs::remove_dir_all(&dir);

        let sink = DiskSink::new(&dir);
        let first = sink.save(artifact(b"one")).await.unwrap();
        let second = sink.save(artifact(b"two")).await.unwrap();

        assert_eq!(second, dir.join("app_1.apk"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
