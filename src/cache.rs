// src/cache.rs
//! # Cache Gate
//! Single-slot, process-lifetime cache for the latest `AlertReading`.
//!
//! `put` replaces the slot unconditionally (last writer wins). Entries are
//! never evicted: a stale entry stays readable until the next `put`, so callers
//! can serve it while a refresh is in flight. Nothing is persisted.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::clock::Clock;
use crate::ingest::types::AlertReading;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub reading: AlertReading,
    pub computed_at: DateTime<Utc>,
}

pub struct CacheGate {
    slot: RwLock<Option<CacheEntry>>,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl CacheGate {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            window,
            clock,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn get(&self) -> Option<CacheEntry> {
        self.slot
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Store `reading`, stamped with the clock's current time.
    pub fn put(&self, reading: AlertReading) {
        let entry = CacheEntry {
            reading,
            computed_at: self.clock.now(),
        };
        *self.slot.write().unwrap_or_else(|p| p.into_inner()) = Some(entry);
    }

    /// Fresh while strictly younger than the window.
    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        let age = self.clock.now().signed_duration_since(entry.computed_at);
        match age.to_std() {
            Ok(age) => age < self.window,
            // computed in the "future" (clock skew): treat as fresh
            Err(_) => true,
        }
    }

    pub fn fresh(&self) -> Option<CacheEntry> {
        self.get().filter(|e| self.is_fresh(e))
    }
}
