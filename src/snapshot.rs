//! Last-known-good snapshot of the rendered dashboard

use std::sync::{Arc, RwLock};
use time::OffsetDateTime;

/// Served until the first refresh succeeds
pub const PLACEHOLDER_PAGE: &str = "<!DOCTYPE html>\n\
<html>\n\
<head><meta charset=\"utf-8\"><meta http-equiv=\"refresh\" content=\"10\"><title>Status</title></head>\n\
<body><h1>Initializing...</h1><p>The first data collection is still running. This page reloads automatically.</p></body>\n\
</html>\n";

/// Rendered dashboard content plus the time it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub content: String,
    /// `None` until a refresh has succeeded
    pub produced_at: Option<OffsetDateTime>,
}

impl Snapshot {
    pub fn placeholder() -> Self {
        Self {
            content: PLACEHOLDER_PAGE.to_string(),
            produced_at: None,
        }
    }
}

/// Holds the current snapshot behind a lock.
///
/// Readers clone an `Arc` under a short read lock, so a request never waits
/// for a refresh and never observes a partially replaced snapshot.
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::placeholder())),
        }
    }

    pub fn read(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the content and stamp it with the current time
    pub fn publish(&self, content: String) {
        let snapshot = Arc::new(Snapshot {
            content,
            produced_at: Some(OffsetDateTime::now_utc()),
        });

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = snapshot;
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_placeholder() {
        let store = SnapshotStore::new();
        let snapshot = store.read();

        assert_eq!(snapshot.content, PLACEHOLDER_PAGE);
        assert!(snapshot.produced_at.is_none());
    }

    #[test]
    fn test_publish_replaces_content() {
        let store = SnapshotStore::new();
        let before = OffsetDateTime::now_utc();

        store.publish("<html>A</html>".to_string());

        let snapshot = store.read();
        assert_eq!(snapshot.content, "<html>A</html>");
        assert!(snapshot.produced_at.unwrap() >= before);
    }

    #[test]
    fn test_reader_keeps_old_snapshot() {
        let store = SnapshotStore::new();
        store.publish("first".to_string());

        // A snapshot handed out earlier is unaffected by later publishes
        let held = store.read();
        store.publish("second".to_string());

        assert_eq!(held.content, "first");
        assert_eq!(store.read().content, "second");
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let store = Arc::new(SnapshotStore::new());
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    store.publish(format!("<html>{}</html>", i));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = store.read();
                        if snapshot.produced_at.is_some() {
                            assert!(snapshot.content.starts_with("<html>"));
                            assert!(snapshot.content.ends_with("</html>"));
                        } else {
                            assert_eq!(snapshot.content, PLACEHOLDER_PAGE);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.read().content, "<html>499</html>");
    }
}
