//! Novelty filtering against persisted state
//!
//! A record is novel when its identity is absent from the state snapshot and
//! it is the first record in the batch carrying that identity. Survivors keep
//! their relative input order.

use novo_common::types::{RawRecord, StateSnapshot};
use novo_common::Identity;
use serde::Serialize;
use std::collections::BTreeSet;

/// A raw record paired with its identity
///
/// Pairing them up front keeps identities and records from drifting apart
/// between hashing and filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct HashedRecord {
    pub identity: Identity,
    pub record: RawRecord,
}

impl HashedRecord {
    pub fn new(identity: Identity, record: RawRecord) -> Self {
        Self { identity, record }
    }
}

/// Counters describing why records were dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NoveltyStats {
    pub already_seen: usize,
    pub duplicates_in_batch: usize,
}

/// Output of [`partition`]
#[derive(Debug, Clone, Default)]
pub struct NoveltyPartition {
    /// Novel records in input order
    pub novel: Vec<HashedRecord>,
    /// Identities of `novel`, exactly one per record
    pub novel_identities: BTreeSet<Identity>,
    pub stats: NoveltyStats,
}

impl NoveltyPartition {
    pub fn is_empty(&self) -> bool {
        self.novel.is_empty()
    }

    pub fn len(&self) -> usize {
        self.novel.len()
    }

    pub fn into_records(self) -> Vec<RawRecord> {
        self.novel.into_iter().map(|h| h.record).collect()
    }
}

/// Split `records` into the novel subset, keeping the first occurrence of each
/// unseen identity
pub fn partition(records: Vec<HashedRecord>, seen: &StateSnapshot) -> NoveltyPartition {
    let mut result = NoveltyPartition::default();

    for hashed in records {
        if seen.contains(&hashed.identity) {
            result.stats.already_seen += 1;
        } else if !result.novel_identities.insert(hashed.identity) {
            result.stats.duplicates_in_batch += 1;
        } else {
            result.novel.push(hashed);
        }
    }

    result
}
