use crate::error::PanelError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{info, warn};

/// Where a stored file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub save_path: String,
    pub file_url: String,
}

/// A storage strategy for uploaded files.
#[async_trait]
pub trait Storer: Send + Sync {
    async fn put(
        &self,
        dst_file: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
        size: u64,
    ) -> Result<StoredFile, PanelError>;
}

/// Stores files below a root directory and serves them under a URL prefix.
#[derive(Debug, Clone)]
pub struct LocalStorer {
    root: PathBuf,
    url_prefix: String,
}

impl LocalStorer {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `dst_file` under the root, refusing anything that could escape it.
    fn resolve(&self, dst_file: &str) -> Result<PathBuf, PanelError> {
        let relative = Path::new(dst_file);
        let safe = !dst_file.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(PanelError::UploadRejected(format!(
                "invalid destination `{dst_file}`"
            )));
        }
        Ok(self.root.join(relative))
    }

    fn url_for(&self, dst_file: &str) -> String {
        format!("{}/{}", self.url_prefix.trim_end_matches('/'), dst_file)
    }
}

#[async_trait]
impl Storer for LocalStorer {
    async fn put(
        &self,
        dst_file: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
        size: u64,
    ) -> Result<StoredFile, PanelError> {
        let path = self.resolve(dst_file)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&path).await?;
        let written = tokio::io::copy(body, &mut file).await?;
        file.flush().await?;
        if written != size {
            warn!(dst_file, expected = size, written, "stored size differs from declared size");
        }

        info!(dst_file, path = %path.display(), bytes = written, "file stored");
        Ok(StoredFile {
            save_path: path.display().to_string(),
            file_url: self.url_for(dst_file),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_root() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        std::env::temp_dir().join(format!("dbpanel-storer-{}-{}", std::process::id(), nanos))
    }

    #[tokio::test]
    async fn put_writes_under_root_and_builds_url() {
        let root = temp_root();
        let storer = LocalStorer::new(&root, "https://cdn.example/files/");
        let mut body: &[u8] = b"id,name\n1,a\n";

        let stored = storer.put("2024/05/a.csv", &mut body, 12).await.unwrap();
        assert_eq!(stored.file_url, "https://cdn.example/files/2024/05/a.csv");
        assert_eq!(
            std::fs::read(root.join("2024/05/a.csv")).unwrap(),
            b"id,name\n1,a\n"
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn put_refuses_escaping_paths() {
        let storer = LocalStorer::new(temp_root(), "/uploads");
        for dst in ["../x.txt", "/etc/x.txt", "a/../../x.txt", ""] {
            let mut body: &[u8] = b"x";
            let err = storer.put(dst, &mut body, 1).await.unwrap_err();
            assert!(matches!(err, PanelError::UploadRejected(_)), "dst: {dst}");
        }
    }
}
