//! Generic ROHC context management.
//!
//! Provides the `ContextManager` responsible for storing, retrieving, and
//! managing the lifecycle of compressor and decompressor contexts. It
//! operates on trait objects to remain independent of specific profile
//! implementations. The CID space is bounded: when the table is full, the
//! least-recently-used context is evicted to make room for a new flow.

use std::collections::HashMap;
use std::fmt::Debug;

use tracing::debug;

use crate::error::RohcError;
use crate::traits::{RohcCompressorContext, RohcDecompressorContext};
use crate::types::ContextId;

/// Manages compressor and decompressor contexts indexed by CID.
///
/// Context creation is delegated to a `ProfileHandler` (driven by the
/// engine); this manager only stores, looks up, evicts, and removes.
#[derive(Debug)]
pub struct ContextManager {
    compressor_contexts: HashMap<ContextId, Box<dyn RohcCompressorContext>>,
    decompressor_contexts: HashMap<ContextId, Box<dyn RohcDecompressorContext>>,
    /// Upper bound on live contexts per direction (`max_cid + 1` slots).
    capacity: usize,
}

impl ContextManager {
    /// Creates an empty manager bounded to `capacity` contexts per direction.
    pub fn new(capacity: usize) -> Self {
        Self {
            compressor_contexts: HashMap::new(),
            decompressor_contexts: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Adds a compressor context, evicting the least-recently-used context
    /// first if the table is full. An existing context with the same CID is
    /// overwritten.
    pub fn add_compressor_context(
        &mut self,
        cid: ContextId,
        context: Box<dyn RohcCompressorContext>,
    ) {
        if !self.compressor_contexts.contains_key(&cid)
            && self.compressor_contexts.len() >= self.capacity
        {
            if let Some(victim) = lru_key(self.compressor_contexts.iter().map(|(k, v)| (*k, v.last_accessed()))) {
                debug!(%victim, %cid, "evicting LRU compressor context");
                self.compressor_contexts.remove(&victim);
            }
        }
        self.compressor_contexts.insert(cid, context);
    }

    /// Adds a decompressor context, evicting the least-recently-used context
    /// first if the table is full.
    pub fn add_decompressor_context(
        &mut self,
        cid: ContextId,
        context: Box<dyn RohcDecompressorContext>,
    ) {
        if !self.decompressor_contexts.contains_key(&cid)
            && self.decompressor_contexts.len() >= self.capacity
        {
            if let Some(victim) = lru_key(self.decompressor_contexts.iter().map(|(k, v)| (*k, v.last_accessed()))) {
                debug!(%victim, %cid, "evicting LRU decompressor context");
                self.decompressor_contexts.remove(&victim);
            }
        }
        self.decompressor_contexts.insert(cid, context);
    }

    /// Mutable access to a compressor context.
    ///
    /// # Errors
    /// - [`RohcError::ContextNotFound`] - no context exists for the CID
    pub fn get_compressor_context_mut(
        &mut self,
        cid: ContextId,
    ) -> Result<&mut Box<dyn RohcCompressorContext>, RohcError> {
        self.compressor_contexts
            .get_mut(&cid)
            .ok_or(RohcError::ContextNotFound(cid))
    }

    /// Mutable access to a decompressor context.
    ///
    /// # Errors
    /// - [`RohcError::ContextNotFound`] - no context exists for the CID
    pub fn get_decompressor_context_mut(
        &mut self,
        cid: ContextId,
    ) -> Result<&mut Box<dyn RohcDecompressorContext>, RohcError> {
        self.decompressor_contexts
            .get_mut(&cid)
            .ok_or(RohcError::ContextNotFound(cid))
    }

    /// Shared access to a compressor context.
    ///
    /// # Errors
    /// - [`RohcError::ContextNotFound`] - no context exists for the CID
    pub fn get_compressor_context(
        &self,
        cid: ContextId,
    ) -> Result<&dyn RohcCompressorContext, RohcError> {
        self.compressor_contexts
            .get(&cid)
            .map(|boxed| &**boxed)
            .ok_or(RohcError::ContextNotFound(cid))
    }

    /// Shared access to a decompressor context.
    ///
    /// # Errors
    /// - [`RohcError::ContextNotFound`] - no context exists for the CID
    pub fn get_decompressor_context(
        &self,
        cid: ContextId,
    ) -> Result<&dyn RohcDecompressorContext, RohcError> {
        self.decompressor_contexts
            .get(&cid)
            .map(|boxed| &**boxed)
            .ok_or(RohcError::ContextNotFound(cid))
    }

    /// Removes a compressor context, returning it if it existed.
    pub fn remove_compressor_context(
        &mut self,
        cid: ContextId,
    ) -> Option<Box<dyn RohcCompressorContext>> {
        self.compressor_contexts.remove(&cid)
    }

    /// Removes a decompressor context, returning it if it existed.
    pub fn remove_decompressor_context(
        &mut self,
        cid: ContextId,
    ) -> Option<Box<dyn RohcDecompressorContext>> {
        self.decompressor_contexts.remove(&cid)
    }

    /// Removes all contexts of both kinds.
    pub fn clear_all_contexts(&mut self) {
        self.compressor_contexts.clear();
        self.decompressor_contexts.clear();
    }

    /// Number of active compressor contexts.
    pub fn compressor_context_count(&self) -> usize {
        self.compressor_contexts.len()
    }

    /// Number of active decompressor contexts.
    pub fn decompressor_context_count(&self) -> usize {
        self.decompressor_contexts.len()
    }

    /// Iterates over compressor contexts (used for stale-context pruning).
    pub fn compressor_contexts_iter(
        &self,
    ) -> impl Iterator<Item = (&ContextId, &Box<dyn RohcCompressorContext>)> {
        self.compressor_contexts.iter()
    }

    /// Iterates over decompressor contexts (used for stale-context pruning).
    pub fn decompressor_contexts_iter(
        &self,
    ) -> impl Iterator<Item = (&ContextId, &Box<dyn RohcDecompressorContext>)> {
        self.decompressor_contexts.iter()
    }

    /// Iterates mutably over compressor contexts (feedback fan-out).
    pub(crate) fn compressor_contexts_iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&ContextId, &mut Box<dyn RohcCompressorContext>)> {
        self.compressor_contexts.iter_mut()
    }
}

fn lru_key(entries: impl Iterator<Item = (ContextId, std::time::Instant)>) -> Option<ContextId> {
    entries.min_by_key(|(_, at)| *at).map(|(cid, _)| cid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet_defs::RohcProfile;
    use std::any::Any;
    use std::time::{Duration, Instant};

    #[derive(Debug)]
    struct MockCompressorCtx {
        cid: ContextId,
        last_accessed: Instant,
    }

    impl RohcCompressorContext for MockCompressorCtx {
        fn profile_id(&self) -> RohcProfile {
            RohcProfile::Uncompressed
        }
        fn cid(&self) -> ContextId {
            self.cid
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn last_accessed(&self) -> Instant {
            self.last_accessed
        }
        fn update_access_time(&mut self, now: Instant) {
            self.last_accessed = now;
        }
    }

    #[derive(Debug)]
    struct MockDecompressorCtx {
        cid: ContextId,
        last_accessed: Instant,
    }

    impl RohcDecompressorContext for MockDecompressorCtx {
        fn profile_id(&self) -> RohcProfile {
            RohcProfile::RtpUdpIp
        }
        fn cid(&self) -> ContextId {
            self.cid
        }
        fn assign_cid(&mut self, new_cid: ContextId) {
            self.cid = new_cid;
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn last_accessed(&self) -> Instant {
            self.last_accessed
        }
        fn update_access_time(&mut self, now: Instant) {
            self.last_accessed = now;
        }
    }

    fn comp_ctx(cid: u16, at: Instant) -> Box<dyn RohcCompressorContext> {
        Box::new(MockCompressorCtx {
            cid: cid.into(),
            last_accessed: at,
        })
    }

    #[test]
    fn context_manager_new_is_empty() {
        let manager = ContextManager::new(16);
        assert_eq!(manager.compressor_context_count(), 0);
        assert_eq!(manager.decompressor_context_count(), 0);
    }

    #[test]
    fn add_and_get_contexts() {
        let mut manager = ContextManager::new(16);
        let t0 = Instant::now();
        manager.add_compressor_context(1.into(), comp_ctx(1, t0));
        manager.add_decompressor_context(
            2.into(),
            Box::new(MockDecompressorCtx {
                cid: 2.into(),
                last_accessed: t0,
            }),
        );

        assert_eq!(manager.get_compressor_context(1.into()).unwrap().cid(), 1);
        assert_eq!(
            manager.get_decompressor_context(2.into()).unwrap().cid(),
            2
        );

        let missing = manager.get_compressor_context_mut(99.into());
        assert!(matches!(missing, Err(RohcError::ContextNotFound(cid)) if cid == 99));
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let mut manager = ContextManager::new(2);
        let t0 = Instant::now();
        manager.add_compressor_context(0.into(), comp_ctx(0, t0));
        manager.add_compressor_context(1.into(), comp_ctx(1, t0 + Duration::from_secs(1)));

        // CID 0 is oldest; inserting a third flow evicts it.
        manager.add_compressor_context(2.into(), comp_ctx(2, t0 + Duration::from_secs(2)));
        assert_eq!(manager.compressor_context_count(), 2);
        assert!(manager.get_compressor_context(0.into()).is_err());
        assert!(manager.get_compressor_context(1.into()).is_ok());
        assert!(manager.get_compressor_context(2.into()).is_ok());
    }

    #[test]
    fn overwriting_same_cid_does_not_evict() {
        let mut manager = ContextManager::new(2);
        let t0 = Instant::now();
        manager.add_compressor_context(0.into(), comp_ctx(0, t0));
        manager.add_compressor_context(1.into(), comp_ctx(1, t0));
        manager.add_compressor_context(1.into(), comp_ctx(1, t0 + Duration::from_secs(3)));

        assert_eq!(manager.compressor_context_count(), 2);
        assert!(manager.get_compressor_context(0.into()).is_ok());
    }

    #[test]
    fn remove_and_clear_contexts() {
        let mut manager = ContextManager::new(16);
        let t0 = Instant::now();
        manager.add_compressor_context(1.into(), comp_ctx(1, t0));
        manager.add_decompressor_context(
            2.into(),
            Box::new(MockDecompressorCtx {
                cid: 2.into(),
                last_accessed: t0,
            }),
        );

        let removed = manager.remove_compressor_context(1.into());
        assert!(removed.is_some());
        assert!(manager.remove_compressor_context(1.into()).is_none());

        manager.clear_all_contexts();
        assert_eq!(manager.decompressor_context_count(), 0);
    }
}
