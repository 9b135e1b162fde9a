use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use conclave_types::session_records::SessionEvent;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

/// Fans session change events out to subscribers. Primary signal is an
/// OS-level `notify` watcher; a `tokio::time::interval` poll loop runs
/// alongside it for filesystems where the OS watcher is unreliable. A
/// lagging subscriber drops the oldest events rather than blocking the
/// writer.
pub struct SessionWatcher {
    sender: broadcast::Sender<SessionEvent>,
    os_watcher: Option<RecommendedWatcher>,
    poll_task: Option<JoinHandle<()>>,
}

impl SessionWatcher {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            os_watcher: None,
            poll_task: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        // No active subscribers is not an error; the event is simply dropped.
        let _ = self.sender.send(event);
    }

    /// Starts the OS-level watcher and the polling fallback. Idempotent:
    /// calling `start` twice while already watching is a no-op.
    pub fn start(&mut self, root: &Path, poll_interval_ms: u64) {
        if self.os_watcher.is_some() || self.poll_task.is_some() {
            return;
        }

        let sender = self.sender.clone();
        let root_for_watcher = root.to_path_buf();
        let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                for path in event.paths {
                    let _ = sender.send(fallback_event(&path));
                }
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(error = %e, "failed to construct OS-level session watcher");
                return;
            }
        };
        if let Err(e) = watcher.watch(root, RecursiveMode::Recursive) {
            tracing::warn!(error = %e, path = %root.display(), "failed to start OS-level session watch");
        }
        self.os_watcher = Some(watcher);

        let sender = self.sender.clone();
        let root = root.to_path_buf();
        let interval = Duration::from_millis(poll_interval_ms.max(50));
        self.poll_task = Some(tokio::spawn(async move {
            poll_loop(root, interval, sender).await;
        }));
    }

    pub fn stop(&mut self) {
        self.os_watcher = None;
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }
}

impl Default for SessionWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn fallback_event(path: &Path) -> SessionEvent {
    use conclave_types::session_records::SessionEventType;
    SessionEvent {
        event_type: SessionEventType::ProgressUpdated,
        session_id: String::new(),
        worker_id: None,
        file_path: path.to_string_lossy().to_string(),
        data: serde_json::Value::Null,
        timestamp: chrono::Utc::now(),
    }
}

async fn poll_loop(root: PathBuf, interval: Duration, sender: broadcast::Sender<SessionEvent>) {
    let mut snapshot: HashMap<PathBuf, (SystemTime, u64)> = HashMap::new();
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let mut current = HashMap::new();
        collect_snapshot(&root, &mut current).await;

        for (path, (mtime, size)) in &current {
            match snapshot.get(path) {
                Some(prev) if prev == &(*mtime, *size) => {}
                _ => {
                    let _ = sender.send(fallback_event(path));
                }
            }
        }
        snapshot = current;
    }
}

async fn collect_snapshot(dir: &Path, out: &mut HashMap<PathBuf, (SystemTime, u64)>) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return,
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if let Ok(metadata) = entry.metadata().await {
            if metadata.is_dir() {
                Box::pin(collect_snapshot(&path, out)).await;
            } else {
                let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                out.insert(path, (mtime, metadata.len()));
            }
        }
    }
}
