/*!
 * Allocation Aggregator
 * Folds allocation samples and type metadata into per-type totals
 *
 * The two event kinds arrive independently and in any relative order: a
 * counter may exist long before its type name is known, or forever without
 * one. Names are resolved only when a snapshot is taken.
 */

use crate::core::limits::UNKNOWN_TYPE_PREFIX;
use crate::core::types::{Bytes, TypeId};
use crate::diagnoser::results::AllocationRow;
use ahash::RandomState;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Running totals for one type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationCounter {
    pub type_id: TypeId,
    pub count: u64,
    pub total_bytes: Bytes,
}

#[derive(Debug)]
struct CounterSlot {
    first_seen: u64,
    count: u64,
    total_bytes: Bytes,
}

#[derive(Debug)]
struct Tables {
    counters: HashMap<TypeId, CounterSlot, RandomState>,
    names: HashMap<TypeId, String, RandomState>,
    next_sequence: u64,
}

/// Per-type allocation table plus type-name table
///
/// Written only from the pump thread; the mutex keeps the tables intact
/// when a reporting thread reads after the stream has stopped.
#[derive(Debug)]
pub struct AllocationAggregator {
    tables: Mutex<Tables>,
}

impl AllocationAggregator {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                counters: HashMap::with_hasher(RandomState::new()),
                names: HashMap::with_hasher(RandomState::new()),
                next_sequence: 0,
            }),
        }
    }

    /// Count one sample of `type_id` totalling `sample_total_size` bytes
    #[inline]
    pub fn record_allocation(&self, type_id: TypeId, sample_total_size: Bytes) {
        let mut tables = self.tables.lock();
        let sequence = tables.next_sequence;
        let slot = tables.counters.entry(type_id).or_insert_with(|| CounterSlot {
            first_seen: sequence,
            count: 0,
            total_bytes: 0,
        });
        let created = slot.count == 0;
        slot.count = slot.count.saturating_add(1);
        slot.total_bytes = slot.total_bytes.saturating_add(sample_total_size);
        if created {
            tables.next_sequence += 1;
        }
    }

    /// Store (or overwrite) the name for `type_id`
    #[inline]
    pub fn record_type_name(&self, type_id: TypeId, name: impl Into<String>) {
        self.tables.lock().names.insert(type_id, name.into());
    }

    /// Counter for one type, if any sample was recorded
    pub fn counter(&self, type_id: TypeId) -> Option<AllocationCounter> {
        self.tables
            .lock()
            .counters
            .get(&type_id)
            .map(|slot| AllocationCounter {
                type_id,
                count: slot.count,
                total_bytes: slot.total_bytes,
            })
    }

    pub fn type_name(&self, type_id: TypeId) -> Option<String> {
        self.tables.lock().names.get(&type_id).cloned()
    }

    /// Number of types with at least one sample
    pub fn len(&self) -> usize {
        self.tables.lock().counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows sorted by total bytes descending, ties by first-seen order
    ///
    /// Only meaningful once the producing stream has stopped.
    pub fn snapshot(&self) -> Vec<AllocationRow> {
        let tables = self.tables.lock();

        let mut slots: Vec<(&TypeId, &CounterSlot)> = tables.counters.iter().collect();
        slots.sort_by(|(_, a), (_, b)| {
            b.total_bytes
                .cmp(&a.total_bytes)
                .then(a.first_seen.cmp(&b.first_seen))
        });

        slots
            .into_iter()
            .map(|(type_id, slot)| AllocationRow {
                name: tables
                    .names
                    .get(type_id)
                    .cloned()
                    .unwrap_or_else(|| unknown_type_name(*type_id)),
                count: slot.count,
                total_bytes: slot.total_bytes,
            })
            .collect()
    }
}

impl Default for AllocationAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholder rendered for a type whose metadata never arrived
#[inline]
pub fn unknown_type_name(type_id: TypeId) -> String {
    format!("{}{}>", UNKNOWN_TYPE_PREFIX, type_id)
}
