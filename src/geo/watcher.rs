//! MaxMind database file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use super::maxmind::MaxMindDatabase;

/// Reloads MaxMind databases when their files change on disk.
pub struct DatabaseWatcher {
    databases: Vec<Arc<MaxMindDatabase>>,
}

impl DatabaseWatcher {
    pub fn new(databases: Vec<Arc<MaxMindDatabase>>) -> Self {
        Self { databases }
    }

    /// Start watching in a background thread. Dropping the returned watcher
    /// stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let databases = self.databases.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    for db in &databases {
                        if !event.paths.iter().any(|p| same_file(p, db.path())) {
                            continue;
                        }
                        tracing::info!(path = %db.path().display(), "Database change detected, reloading...");
                        if let Err(e) = db.reload() {
                            tracing::error!("Failed to reload database: {}. Keeping current reader.", e);
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        // Watch the directory: database updates usually land via rename,
        // which would detach a watch on the file itself.
        for dir in watched_dirs(&self.databases) {
            watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            tracing::info!(path = ?dir, "Database watcher started");
        }
        Ok(watcher)
    }
}

fn watched_dirs(databases: &[Arc<MaxMindDatabase>]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = databases
        .iter()
        .map(|db| parent_dir(db.path()))
        .collect();
    dirs.sort();
    dirs.dedup();
    dirs
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn same_file(event_path: &Path, db_path: &Path) -> bool {
    if event_path == db_path {
        return true;
    }
    // Events carry absolute paths; configured paths may be relative.
    match (event_path.file_name(), db_path.file_name()) {
        (Some(a), Some(b)) if a == b => {
            let event_dir = event_path.parent().and_then(|p| p.canonicalize().ok());
            let db_dir = parent_dir(db_path).canonicalize().ok();
            event_dir.is_some() && event_dir == db_dir
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        assert_eq!(parent_dir(Path::new("geoip_db.mmdb")), PathBuf::from("."));
        assert_eq!(
            parent_dir(Path::new("/var/lib/geoip/city.mmdb")),
            PathBuf::from("/var/lib/geoip")
        );
    }

    #[test]
    fn test_same_file() {
        let dir = std::env::temp_dir();
        let absolute = dir.join("city.mmdb");
        assert!(same_file(&absolute, &absolute));
        assert!(!same_file(&dir.join("asn.mmdb"), &absolute));
    }
}
