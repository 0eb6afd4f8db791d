//! Scoped lifecycle of intermediate rasters.
//!
//! A [`WorkingArea`] hands per-feature rasters to an [`ArtifactStore`]
//! according to the run's [`ArtifactPolicy`]. It must be
//! [`commit`](WorkingArea::commit)ted explicitly; dropping it any other way
//! (an early `?` return, a panic unwinding through the orchestrator)
//! discards whatever was stored.

use spi_core::{ArtifactError, ArtifactKind, ArtifactPolicy, ArtifactStore, FeatureId, Grid};
use tracing::{debug, warn};

/// Commit-or-discard guard around an optional artifact store.
pub struct WorkingArea<'a> {
    store: Option<&'a mut dyn ArtifactStore>,
    policy: ArtifactPolicy,
    stored: usize,
    committed: bool,
}

impl<'a> WorkingArea<'a> {
    /// Acquire a working area. Without a store every operation is a no-op.
    pub fn new(store: Option<&'a mut dyn ArtifactStore>, policy: ArtifactPolicy) -> Self {
        Self {
            store,
            policy,
            stored: 0,
            committed: false,
        }
    }

    /// A working area that keeps nothing.
    pub fn detached() -> Self {
        Self::new(None, ArtifactPolicy::Delete)
    }

    /// The policy this area applies.
    pub fn policy(&self) -> ArtifactPolicy {
        self.policy
    }

    /// Whether rasters handed to [`keep`](Self::keep) reach the store.
    pub fn is_keeping(&self) -> bool {
        self.store.is_some() && self.policy.keeps_artifacts()
    }

    /// Number of rasters stored so far.
    pub fn stored(&self) -> usize {
        self.stored
    }

    /// Hand one intermediate raster to the store if the policy keeps them.
    pub fn keep(
        &mut self,
        kind: ArtifactKind,
        feature: FeatureId,
        grid: &Grid,
    ) -> Result<(), ArtifactError> {
        if !self.policy.keeps_artifacts() {
            return Ok(());
        }
        if let Some(store) = self.store.as_deref_mut() {
            store.store(kind, feature, grid)?;
            self.stored += 1;
        }
        Ok(())
    }

    /// Finish the run's artifacts. On failure the area is still discarded
    /// when dropped.
    pub fn commit(mut self) -> Result<(), ArtifactError> {
        if let Some(store) = self.store.as_deref_mut() {
            store.commit(self.policy)?;
            debug!(policy = ?self.policy, stored = self.stored, "working area committed");
        }
        self.committed = true;
        Ok(())
    }
}

impl Drop for WorkingArea<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Some(store) = self.store.as_deref_mut() {
            if self.stored > 0 {
                warn!(stored = self.stored, "discarding intermediate rasters");
            }
            store.discard();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spi_test_utils::{uniform_surface, MemoryArtifactStore};

    #[test]
    fn commit_forwards_policy() {
        let mut store = MemoryArtifactStore::new();
        let log = store.log();
        let g = uniform_surface(2, 2, 1.0);
        {
            let mut area = WorkingArea::new(Some(&mut store), ArtifactPolicy::Retain);
            area.keep(ArtifactKind::CostDistance, FeatureId(1), &g).unwrap();
            area.keep(ArtifactKind::Influence, FeatureId(1), &g).unwrap();
            assert_eq!(area.stored(), 2);
            area.commit().unwrap();
        }
        let log = log.lock().unwrap();
        assert_eq!(log.committed, Some(ArtifactPolicy::Retain));
        assert!(!log.discarded);
        assert_eq!(
            log.stored,
            vec![
                (ArtifactKind::CostDistance, FeatureId(1)),
                (ArtifactKind::Influence, FeatureId(1)),
            ]
        );
    }

    #[test]
    fn drop_without_commit_discards() {
        let mut store = MemoryArtifactStore::new();
        let log = store.log();
        let g = uniform_surface(1, 1, 1.0);
        {
            let mut area = WorkingArea::new(Some(&mut store), ArtifactPolicy::Zip);
            area.keep(ArtifactKind::CostDistance, FeatureId(7), &g).unwrap();
        }
        let log = log.lock().unwrap();
        assert!(log.discarded);
        assert!(log.stored.is_empty());
        assert_eq!(log.committed, None);
    }

    #[test]
    fn delete_policy_stores_nothing() {
        let mut store = MemoryArtifactStore::new();
        let log = store.log();
        let g = uniform_surface(1, 1, 1.0);
        let mut area = WorkingArea::new(Some(&mut store), ArtifactPolicy::Delete);
        assert!(!area.is_keeping());
        area.keep(ArtifactKind::Influence, FeatureId(0), &g).unwrap();
        area.commit().unwrap();
        let log = log.lock().unwrap();
        assert!(log.stored.is_empty());
        assert_eq!(log.committed, Some(ArtifactPolicy::Delete));
    }

    #[test]
    fn store_failure_propagates() {
        let mut store = MemoryArtifactStore::failing_after(1);
        let log = store.log();
        let g = uniform_surface(1, 1, 1.0);
        {
            let mut area = WorkingArea::new(Some(&mut store), ArtifactPolicy::Zip);
            area.keep(ArtifactKind::CostDistance, FeatureId(0), &g).unwrap();
            assert!(area.keep(ArtifactKind::CostDistance, FeatureId(1), &g).is_err());
        }
        assert!(log.lock().unwrap().discarded);
    }

    #[test]
    fn detached_area_is_inert() {
        let g = uniform_surface(1, 1, 1.0);
        let mut area = WorkingArea::detached();
        area.keep(ArtifactKind::Influence, FeatureId(0), &g).unwrap();
        assert_eq!(area.stored(), 0);
        area.commit().unwrap();
    }
}
