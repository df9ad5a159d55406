//! Uploaded file storage below the configured media root.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use bookshelf_kernel::settings::MediaSettings;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const MAX_STEM_CHARS: usize = 80;
const MAX_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    url_prefix: String,
}

impl MediaStore {
    pub fn new(settings: &MediaSettings) -> Self {
        Self {
            root: settings.root.clone(),
            url_prefix: settings.url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create `<root>/<upload_to>` if it does not exist yet.
    pub async fn ensure_dir(&self, upload_to: &str) -> anyhow::Result<()> {
        let dir = self.root.join(upload_to);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create media directory {}", dir.display()))
    }

    /// Write `bytes` under `<root>/<upload_to>/` and return the stored path
    /// relative to the media root.
    ///
    /// The file name is derived from `original_name` with `extension` forced.
    /// Existing files are never overwritten: a random suffix is appended until
    /// a free name is found.
    pub async fn save(
        &self,
        upload_to: &str,
        original_name: &str,
        extension: &str,
        bytes: &[u8],
    ) -> anyhow::Result<String> {
        self.ensure_dir(upload_to).await?;
        let dir = self.root.join(upload_to);
        let stem = file_stem(original_name);

        for attempt in 0..MAX_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{stem}.{extension}")
            } else {
                let suffix = Uuid::new_v4().simple().to_string();
                format!("{stem}_{}.{extension}", &suffix[..7])
            };
            let path = dir.join(&name);

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(err).with_context(|| format!("failed to create {}", path.display()))
                }
            };

            file.write_all(bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            file.flush()
                .await
                .with_context(|| format!("failed to flush {}", path.display()))?;

            let stored = format!("{upload_to}/{name}");
            tracing::debug!(path = %stored, size = bytes.len(), "media file stored");
            return Ok(stored);
        }

        bail!("no free file name for '{}' in {}", stem, dir.display())
    }

    /// Delete a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, relative: &str) -> anyhow::Result<()> {
        let path = self.root.join(relative.trim_start_matches('/'));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %relative, "media file removed");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
        }
    }

    /// Public URL for a stored relative path.
    pub fn url(&self, relative: &str) -> String {
        format!("{}/{}", self.url_prefix, relative.trim_start_matches('/'))
    }
}

/// Reduce an uploaded file name to a safe stem: last path component, without
/// extension, restricted to ASCII letters, digits, `-` and `_`.
pub fn file_stem(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let base = match base.rfind('.') {
        Some(0) | None => base,
        Some(dot) => &base[..dot],
    };

    let stem: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_CHARS)
        .collect();

    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "upload".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> MediaStore {
        MediaStore::new(&MediaSettings {
            root: dir.path().to_path_buf(),
            url_prefix: "/media/".to_string(),
            max_upload_bytes: 1024,
        })
    }

    #[test]
    fn stems_are_sanitized() {
        assert_eq!(file_stem("dune cover.png"), "dune_cover");
        assert_eq!(file_stem("../../etc/passwd"), "passwd");
        assert_eq!(file_stem("C:\\Users\\me\\cover.final.JPG"), "cover_final");
        assert_eq!(file_stem(".hidden"), "hidden");
        assert_eq!(file_stem("???.png"), "upload");
        assert_eq!(file_stem(""), "upload");
    }

    #[test]
    fn urls_join_prefix_and_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            store(&dir).url("books/dune.png"),
            "/media/books/dune.png"
        );
    }

    #[tokio::test]
    async fn saving_twice_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let media = store(&dir);

        let first = media.save("books", "dune.jpeg", "png", b"one").await.unwrap();
        let second = media.save("books", "dune.jpeg", "png", b"two").await.unwrap();

        assert_eq!(first, "books/dune.png");
        assert_ne!(first, second);
        assert!(second.starts_with("books/dune_"));
        assert_eq!(std::fs::read(dir.path().join(&first)).unwrap(), b"one");
        assert_eq!(std::fs::read(dir.path().join(&second)).unwrap(), b"two");
    }

    #[tokio::test]
    async fn removing_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let media = store(&dir);

        let stored = media.save("books", "dune.png", "png", b"one").await.unwrap();
        media.remove(&stored).await.unwrap();
        assert!(!dir.path().join(&stored).exists());
        media.remove(&stored).await.unwrap();
    }
}
