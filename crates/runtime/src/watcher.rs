//! # Location File Watching
//!
//! Watches a text file holding a location fragment. Whenever the file is
//! written, its contents are forwarded to the main loop, which moves the
//! camera there. This is the headless counterpart of following the page
//! fragment in a browser.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that replace the file on save are picked up too. The returned
//! [`LocationWatcher`] must be kept alive; dropping it stops the watch.

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub struct LocationWatcher {
    _watcher: RecommendedWatcher,
    updates: Receiver<String>,
    path: PathBuf,
}

impl LocationWatcher {
    /// Starts watching `path`. The file need not exist yet, its directory
    /// must.
    ///
    /// # Errors
    ///
    /// Fails when the watcher cannot be created or the directory cannot be
    /// watched.
    pub fn start(path: &Path) -> Result<Self> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().context("failed to read current directory")?.join(path)
        };
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .context("location file has no parent directory")?;
        let (tx, rx) = unbounded();
        let target = path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => process_event(&event, &target, &tx),
            Err(e) => error!("location watcher error: {e:?}"),
        })
        .context("failed to create file watcher")?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;
        info!("watching location file {}", path.display());
        Ok(Self { _watcher: watcher, updates: rx, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Most recent fragment written since the last poll.
    #[must_use]
    pub fn poll(&self) -> Option<String> {
        self.updates.try_iter().last()
    }
}

fn process_event(event: &Event, target: &Path, tx: &Sender<String>) {
    if !event.kind.is_modify() && !event.kind.is_create() {
        return;
    }
    // Only the parent directory is watched, so the file name identifies it.
    if !event.paths.iter().any(|p| p.file_name() == target.file_name()) {
        return;
    }
    match std::fs::read_to_string(target) {
        Ok(text) => {
            let fragment = text.trim().to_owned();
            if fragment.is_empty() {
                return;
            }
            debug!(%fragment, "location file changed");
            // The receiver only goes away with the watcher itself.
            let _ = tx.send(fragment);
        }
        Err(e) => debug!("location file unreadable: {e}"),
    }
}
