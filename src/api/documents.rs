use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Where document content is persisted. `fetch` answers `Ok(None)` for a
/// document that does not exist yet.
pub trait DocumentBackend: Send + Sync {
    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Option<String>>>;
    fn save<'a>(&'a self, document_id: &'a str, content: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Documents stored as files under one root directory. Ids are
/// root-relative paths; anything that escapes the root is refused.
pub struct FsDocumentBackend {
    root: PathBuf,
    canonical_root: PathBuf,
}

impl FsDocumentBackend {
    pub fn new(root: PathBuf) -> Self {
        let canonical_root = fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
        Self {
            root,
            canonical_root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn resolve_path(&self, document_id: &str) -> Result<PathBuf> {
        if document_id.trim().is_empty() {
            bail!("document path must not be empty");
        }
        if document_id.starts_with('/') || document_id.contains('\\') {
            bail!("Security error: absolute or platform-specific path not allowed: {document_id}");
        }

        let relative_path = Path::new(document_id);
        for component in relative_path.components() {
            if matches!(component, Component::ParentDir) {
                bail!("Security error: path traversal detected: {document_id}");
            }
        }

        let requested = self.root.join(relative_path);
        self.ensure_path_is_within_root(&requested).await?;
        Ok(requested)
    }

    async fn ensure_path_is_within_root(&self, path: &Path) -> Result<()> {
        let guard_path = nearest_existing_ancestor(path)
            .await
            .context("Security error: could not find an existing parent path")?;
        let canonical_guard = tokio::fs::canonicalize(guard_path)
            .await
            .with_context(|| format!("Failed to canonicalize {}", guard_path.display()))?;
        if !canonical_guard.starts_with(&self.canonical_root) {
            bail!(
                "Security error: path escapes document root via symlink: {}",
                path.display()
            );
        }
        Ok(())
    }

    async fn read(&self, document_id: &str) -> Result<Option<String>> {
        let resolved = self.resolve_path(document_id).await?;
        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => Ok(Some(content)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => {
                Err(error).with_context(|| format!("Failed to read {}", resolved.display()))
            }
        }
    }

    async fn write(&self, document_id: &str, content: &str) -> Result<()> {
        let resolved = self.resolve_path(document_id).await?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&resolved, content)
            .await
            .with_context(|| format!("Failed to write {}", resolved.display()))
    }
}

async fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    let mut current = path;
    while !tokio::fs::try_exists(current).await.unwrap_or(false) {
        current = current.parent()?;
    }
    Some(current)
}

impl DocumentBackend for FsDocumentBackend {
    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(self.read(document_id))
    }

    fn save<'a>(&'a self, document_id: &'a str, content: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.write(document_id, content))
    }
}

/// In-process backend, handy for embedding and for exercising sessions.
#[derive(Clone, Default)]
pub struct MemoryDocumentBackend {
    documents: Arc<Mutex<HashMap<String, String>>>,
    fail_saves: Arc<Mutex<bool>>,
}

impl MemoryDocumentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I, K, V>(documents: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let backend = Self::new();
        if let Ok(mut guard) = backend.documents.lock() {
            guard.extend(documents.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
        backend
    }

    pub fn get(&self, document_id: &str) -> Option<String> {
        self.documents
            .lock()
            .ok()
            .and_then(|guard| guard.get(document_id).cloned())
    }

    /// Makes every subsequent save fail, to exercise error paths.
    pub fn set_fail_saves(&self, fail: bool) {
        if let Ok(mut guard) = self.fail_saves.lock() {
            *guard = fail;
        }
    }
}

impl DocumentBackend for MemoryDocumentBackend {
    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(self.get(document_id)) })
    }

    fn save<'a>(&'a self, document_id: &'a str, content: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.fail_saves.lock().map(|guard| *guard).unwrap_or(false) {
                bail!("save of {document_id} rejected by backend");
            }
            let mut guard = self
                .documents
                .lock()
                .map_err(|_| anyhow::anyhow!("document map poisoned"))?;
            guard.insert(document_id.to_string(), content.to_string());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fs_backend_round_trips_and_reports_missing() {
        let temp = TempDir::new().expect("temp dir");
        let backend = FsDocumentBackend::new(temp.path().to_path_buf());

        assert_eq!(backend.fetch("notes/a.md").await.unwrap(), None);
        backend.save("notes/a.md", "# A\n").await.unwrap();
        assert_eq!(
            backend.fetch("notes/a.md").await.unwrap().as_deref(),
            Some("# A\n")
        );
    }

    #[tokio::test]
    async fn test_fs_backend_blocks_traversal() {
        let temp = TempDir::new().expect("temp dir");
        let backend = FsDocumentBackend::new(temp.path().to_path_buf());

        assert!(backend.fetch("../../etc/passwd").await.is_err());
        assert!(backend.fetch("/etc/passwd").await.is_err());
        assert!(backend.save("..\\evil.md", "x").await.is_err());
        assert!(backend.fetch("").await.is_err());
    }

    #[tokio::test]
    async fn test_fs_backend_allows_double_dots_inside_names() {
        let temp = TempDir::new().expect("temp dir");
        let backend = FsDocumentBackend::new(temp.path().to_path_buf());
        backend.save("my..notes.md", "ok").await.unwrap();
        assert_eq!(
            backend.fetch("my..notes.md").await.unwrap().as_deref(),
            Some("ok")
        );
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "current_thread")]
    async fn test_fs_backend_refuses_symlink_escape_and_serves_concurrent_fetches() {
        let temp = TempDir::new().expect("temp dir");
        let outside = TempDir::new().expect("outside dir");
        std::fs::write(outside.path().join("secret.md"), "secret").expect("write secret");
        std::os::unix::fs::symlink(outside.path(), temp.path().join("linked"))
            .expect("symlink");
        let backend = FsDocumentBackend::new(temp.path().to_path_buf());
        backend.save("a.md", "A").await.unwrap();
        backend.save("b.md", "B").await.unwrap();

        assert!(backend.fetch("linked/secret.md").await.is_err());
        assert!(backend.save("linked/new.md", "x").await.is_err());

        let (a, b, missing) = tokio::join!(
            backend.fetch("a.md"),
            backend.fetch("b.md"),
            backend.fetch("nested/missing.md"),
        );
        assert_eq!(a.unwrap().as_deref(), Some("A"));
        assert_eq!(b.unwrap().as_deref(), Some("B"));
        assert_eq!(missing.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_backend_can_fail_saves() {
        let backend = MemoryDocumentBackend::with_documents([("a.md", "A")]);
        backend.set_fail_saves(true);
        assert!(backend.save("a.md", "B").await.is_err());
        assert_eq!(backend.get("a.md").as_deref(), Some("A"));
    }
}
