//! Snapshot poll loop and the shared read cache.
//!
//! The poll loop keeps a cached [`StateSnapshot`] warm so plain reads need
//! not pay a live round-trip through the serialized worker. Ticks never
//! overlap: a tick that fires while a snapshot build is still outstanding
//! is skipped entirely, never queued or run concurrently. One failed tick
//! is logged and polling continues.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use showctl_core::state::StateSnapshot;

use crate::daemon::worker::StudioHandle;

/// Last snapshot published by the poll loop.
///
/// Readers accept staleness up to one poll interval; writers are the poll
/// loop and any handler that just rebuilt a snapshot anyway.
pub struct StateCache {
    inner: RwLock<Option<StateSnapshot>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// The cached snapshot, if one has been published yet.
    pub async fn get(&self) -> Option<StateSnapshot> {
        *self.inner.read().await
    }

    pub async fn publish(&self, snapshot: StateSnapshot) {
        *self.inner.write().await = Some(snapshot);
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the poll loop.
///
/// The task holds only a weak reference to the cache and exits when the
/// cache owner (the server) is dropped, or when the worker goes away.
pub fn spawn_poller(
    studio: StudioHandle,
    cache: &Arc<StateCache>,
    period: Duration,
) -> JoinHandle<()> {
    let weak_cache = Arc::downgrade(cache);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // Skip, never queue: ticks that fire during a slow build are lost.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let Some(cache) = weak_cache.upgrade() else {
                debug!("state cache dropped, poller exiting");
                break;
            };

            // The await below completes before the next tick is taken, so
            // at most one snapshot build is ever outstanding.
            match studio.with_session(|session| session.snapshot()).await {
                Ok(Ok(snapshot)) => cache.publish(snapshot).await,
                Ok(Err(e)) => warn!("poll tick failed: {}", e),
                Err(_) => {
                    debug!("studio worker gone, poller exiting");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use showctl_core::layers::Layer;
    use showctl_core::testing::FakeStudio;

    #[tokio::test]
    async fn test_poller_publishes_snapshots() {
        let fake = FakeStudio::new();
        let camera = fake.add_shot(Layer::Normal, "Camera 1");
        fake.set_preview_shot(Layer::Normal, camera);
        fake.set_recording(true);

        let studio = StudioHandle::spawn(fake.boxed()).await.expect("spawn");
        let cache = Arc::new(StateCache::new());
        let poller = spawn_poller(studio, &cache, Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(80)).await;

        let snapshot = cache.get().await.expect("cache should be populated");
        assert!(snapshot.is_recording);
        assert_eq!(snapshot.preview_shot_id, camera);

        drop(cache);
        poller.await.expect("poller should exit when cache drops");
    }

    #[tokio::test]
    async fn test_slow_builds_are_never_concurrent_and_ticks_skip() {
        let fake = FakeStudio::new();
        let studio = StudioHandle::spawn(fake.boxed()).await.expect("spawn");
        // Each snapshot is four bridge calls; 30ms per call makes one build
        // take ~120ms against a 10ms tick.
        fake.set_call_delay(Duration::from_millis(30));

        let cache = Arc::new(StateCache::new());
        let poller = spawn_poller(studio, &cache, Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(400)).await;
        let builds = fake.call_count("PreviewShotID");
        drop(cache);
        let _ = poller.await;

        assert_eq!(fake.max_in_flight(), 1, "snapshot builds must not overlap");
        assert!(
            builds >= 1 && builds <= 5,
            "a 10ms ticker must degrade to one build at a time, got {} builds",
            builds
        );
    }

    #[tokio::test]
    async fn test_cache_starts_empty() {
        let cache = StateCache::new();
        assert_eq!(cache.get().await, None);
    }
}
