//! Per-request scratch directories.
//!
//! Every request gets its own directory under the configured temp root, named
//! after a random request id. All staged uploads and conversion outputs live
//! inside it, and dropping the [`Workspace`] removes the whole tree. Handlers
//! that fail simply return and the directory goes with them; successful
//! downloads hand the workspace to the response body (see `download`), so the
//! directory is removed once the body has been sent. Inside the runtime the
//! recursive delete runs on the blocking pool.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    dir: Option<TempDir>,
    path: PathBuf,
    counter: AtomicUsize,
}

impl Workspace {
    pub fn create(root: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("creating temp root {}", root.display()))?;

        let id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&format!("rpt-{id}-"))
            .tempdir_in(root)
            .with_context(|| format!("creating request workspace under {}", root.display()))?;
        let path = dir.path().to_path_buf();

        tracing::Span::current().record("request_id", tracing::field::display(id));
        tracing::debug!(request_id = %id, dir = %path.display(), "allocated workspace");

        Ok(Self {
            id,
            dir: Some(dir),
            path,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a fresh path inside the workspace. The file is not created.
    ///
    /// `name` is sanitized and prefixed with a sequence number, so two
    /// uploads called `report.pdf` never share a path.
    pub fn allocate(&self, name: &str) -> PathBuf {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        self.path.join(format!("{seq:03}_{}", sanitize_filename(name)))
    }

    /// Creates a fresh, empty directory inside the workspace.
    pub fn subdir(&self, name: &str) -> anyhow::Result<PathBuf> {
        let dir = self.allocate(name);
        std::fs::create_dir(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(dir)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let id = self.id;
        let path = std::mem::take(&mut self.path);
        let release = move || match dir.close() {
            Ok(()) => tracing::debug!(request_id = %id, "released workspace"),
            Err(err) => tracing::warn!(
                request_id = %id,
                dir = %path.display(),
                "failed to remove workspace: {err}"
            ),
        };

        // An unexecuted closure still drops the TempDir, which removes it.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(release);
            }
            Err(_) => release(),
        }
    }
}

/// Polls until `root` has no entries left or two seconds pass. Returns what remains.
#[cfg(test)]
pub(crate) async fn settle(root: &Path) -> usize {
    let count = || std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0);
    for _ in 0..200 {
        if count() == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    count()
}

/// Reduces a client-supplied filename to a safe, single path component.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
/// Leading dots are stripped so the result is never hidden or `..`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Lower-cased extension of a filename, without the dot.
pub fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn workspace_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        let staged = ws.allocate("input.pdf");
        std::fs::write(&staged, b"%PDF-1.5").unwrap();
        let nested = ws.subdir("out").unwrap();
        std::fs::write(nested.join("x.txt"), b"x").unwrap();
        assert!(staged.exists());

        drop(ws);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn drop_inside_runtime_removes_off_thread() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        std::fs::write(ws.allocate("big.bin"), vec![0u8; 4096]).unwrap();

        drop(ws);
        assert_eq!(settle(root.path()).await, 0);
    }

    #[test]
    fn request_span_carries_workspace_id() {
        #[derive(Clone)]
        struct Capture(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let captured = Capture(Arc::new(Mutex::new(Vec::new())));
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let root = tempfile::tempdir().unwrap();
        let id = tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!(
                "request",
                path = "/merge",
                request_id = tracing::field::Empty
            );
            let _entered = span.enter();
            let ws = Workspace::create(root.path()).unwrap();
            tracing::error!("Unexpected error: disk full");
            ws.id()
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|line| line.contains("Unexpected error: disk full"))
            .unwrap();
        assert!(line.contains(&format!("request_id={id}")), "{line}");
    }

    #[test]
    fn workspaces_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(root.path()).unwrap();
        let b = Workspace::create(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
        assert_ne!(a.id(), b.id());
        assert_ne!(a.allocate("same.pdf"), a.allocate("same.pdf"));
    }

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\my report.pdf"), "my_report.pdf");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename("\"quote\";.docx"), "_quote__.docx");
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension("Photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension("noext"), None);
    }
}
