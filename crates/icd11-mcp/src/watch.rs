use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{recommended_watcher, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use crate::session::Session;

/// Watch the directory holding the catalog source and drop the cached
/// catalog whenever the source file is created, modified or removed.
///
/// The returned watcher must be kept alive for as long as events matter.
pub fn watch_source(session: Arc<Session>) -> notify::Result<RecommendedWatcher> {
    let source = session.source().to_path_buf();
    let dir = source_dir(&source);
    let file_name = source.file_name().map(|n| n.to_os_string());

    let mut watcher = recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        let Ok(event) = res else { return };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        if event
            .paths
            .iter()
            .any(|p| p.file_name() == file_name.as_deref())
        {
            debug!(kind = ?event.kind, "catalog source changed on disk");
            session.invalidate_source();
        }
    })?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Parent directory of the source; a bare file name lives in ".".
fn source_dir(source: &Path) -> PathBuf {
    source
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::{Duration, Instant};

    use icd11_core::Settings;

    /// Poll `cond` until it holds or `timeout` elapses.
    fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(25));
        }
        cond()
    }

    #[test]
    fn source_change_invalidates_but_export_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("icd11_codes.csv");
        fs::write(&source, "Code,Title\n1A00,Cholera\n").unwrap();
        let session = Arc::new(Session::new(Settings {
            source_path: source.clone(),
            export_dir: Some(dir.path().to_path_buf()),
            ..Settings::default()
        }));

        let _watcher = watch_source(Arc::clone(&session)).unwrap();
        assert_eq!(session.load().catalog.len(), 1);
        assert!(session.is_loaded());

        // An export next to the source must leave the cache alone.
        session.export("", None).unwrap();
        thread::sleep(Duration::from_millis(300));
        assert!(session.is_loaded());

        fs::write(&source, "Code,Title\n1A00,Cholera\n1A00.1,El Tor\n").unwrap();
        assert!(wait_for(Duration::from_secs(5), || !session.is_loaded()));
        assert_eq!(session.load().catalog.len(), 2);
    }

    #[test]
    fn bare_file_name_watches_working_dir() {
        assert_eq!(source_dir(Path::new("icd11_codes.csv")), PathBuf::from("."));
        assert_eq!(
            source_dir(Path::new("/data/icd11_codes.csv")),
            PathBuf::from("/data")
        );
    }
}
