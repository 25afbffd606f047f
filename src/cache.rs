//! Spec cache - build once per (descriptor shape, target), hand out clones
//!
//! Each lookup returns a private [`CallSpec`], so concurrent callers never
//! share the per-call base address.

use crate::descriptor::{ArgumentStruct, Descriptor, StaticLayout};
use crate::error::Result;
use crate::logging;
use crate::spec::{CallSpec, Fingerprint, NativeFn};
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CacheKey {
    Type(TypeId, usize),
    Layout(Fingerprint, usize),
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Concurrent cache of built specs
#[derive(Debug, Default)]
pub struct SpecCache {
    specs: DashMap<CacheKey, CallSpec>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SpecCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spec for argument struct `D` calling `target`
    pub fn get<D: ArgumentStruct>(&self, target: NativeFn) -> Result<CallSpec> {
        self.lookup(CacheKey::Type(TypeId::of::<D>(), target.addr()), target, &StaticLayout::<D>::new())
    }

    /// Spec for a runtime layout, keyed by its fingerprint
    pub fn get_dynamic<D: Descriptor + ?Sized>(&self, target: NativeFn, desc: &D) -> Result<CallSpec> {
        self.lookup(CacheKey::Layout(Fingerprint::of(desc), target.addr()), target, desc)
    }

    fn lookup<D: Descriptor + ?Sized>(&self, key: CacheKey, target: NativeFn, desc: &D) -> Result<CallSpec> {
        if let Some(spec) = self.specs.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            logging::log_cache_lookup(desc.type_name(), target.addr(), true);
            return Ok(spec.value().clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        logging::log_cache_lookup(desc.type_name(), target.addr(), false);

        // Errors are not cached; a bad descriptor fails on every lookup
        let spec = CallSpec::build(target, desc)?;
        Ok(self.specs.entry(key).or_insert(spec).value().clone())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn clear(&self) {
        self.specs.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.specs.len(),
        }
    }
}
