//! Tracks how far the wallet has synced and which recent block hashes it
//! has seen, so a reorg can be detected and pinned to the exact height it
//! diverged at. Two windows are kept:
//!
//! - a dense, recent window (`last_known_block_hashes`) — every height the
//!   wallet has processed in roughly the last
//!   [`Config::last_known_block_hashes_size`] blocks;
//! - a sparse, long-lived window (`checkpoints`) — one hash every
//!   [`Config::block_hash_checkpoints_interval`] blocks, bounded to
//!   [`Config::max_block_hash_checkpoints`] entries, so a wallet that's
//!   been offline for a long reorg can still find a shared ancestor
//!   without keeping every hash it has ever seen.

use crate::common::config::Config;
use crate::model::Hash32;
use std::collections::VecDeque;

#[derive(Clone, Debug, Default)]
pub struct SynchronizationStatus {
    last_known_block_hashes: VecDeque<(u64, Hash32)>,
    checkpoints: VecDeque<(u64, Hash32)>,
    /// Height a fresh wallet was told to start scanning from. Only
    /// meaningful while `last_known_block_hashes` is still empty; once a
    /// block is stored, [`Self::get_height`] tracks actual progress instead.
    start_height: u64,
    start_timestamp: u64,
}

impl SynchronizationStatus {
    pub fn new() -> Self {
        SynchronizationStatus {
            last_known_block_hashes: VecDeque::new(),
            checkpoints: VecDeque::new(),
            start_height: 0,
            start_timestamp: 0,
        }
    }

    /// Restore the two hash windows and the starting point exactly as
    /// they were persisted, bypassing `store_block_hash`'s trimming.
    pub fn from_parts(
        last_known_block_hashes: Vec<(u64, Hash32)>,
        checkpoints: Vec<(u64, Hash32)>,
        start_height: u64,
        start_timestamp: u64,
    ) -> Self {
        SynchronizationStatus {
            last_known_block_hashes: last_known_block_hashes.into_iter().collect(),
            checkpoints: checkpoints.into_iter().collect(),
            start_height,
            start_timestamp,
        }
    }

    /// Seed the starting point a fresh wallet resumes from if it hasn't
    /// synced anything yet. A no-op in terms of stored hashes.
    pub fn seed_start(&mut self, start_height: u64, start_timestamp: u64) {
        self.start_height = start_height;
        self.start_timestamp = start_timestamp;
    }

    pub fn start_height(&self) -> u64 {
        self.start_height
    }

    pub fn start_timestamp(&self) -> u64 {
        self.start_timestamp
    }

    pub fn has_synced_any_block(&self) -> bool {
        !self.last_known_block_hashes.is_empty()
    }

    pub fn dense_hashes(&self) -> Vec<(u64, Hash32)> {
        self.last_known_block_hashes.iter().copied().collect()
    }

    pub fn sparse_checkpoints(&self) -> Vec<(u64, Hash32)> {
        self.checkpoints.iter().copied().collect()
    }

    /// The last height this wallet has recorded a hash for, or
    /// `start_height - 1` (so the next fetch resumes at `start_height`) if
    /// nothing has been stored yet.
    pub fn get_height(&self) -> u64 {
        self.last_known_block_hashes
            .back()
            .map(|(h, _)| *h)
            .unwrap_or_else(|| self.start_height.saturating_sub(1))
    }

    /// The hash this wallet has on record for `height`, from either
    /// window, if any.
    pub fn known_hash_at(&self, height: u64) -> Option<Hash32> {
        self.last_known_block_hashes
            .iter()
            .chain(self.checkpoints.iter())
            .find(|(h, _)| *h == height)
            .map(|(_, hash)| *hash)
    }

    pub fn store_block_hash(&mut self, height: u64, hash: Hash32, config: &Config) {
        self.last_known_block_hashes.push_back((height, hash));
        while self.last_known_block_hashes.len() > config.last_known_block_hashes_size {
            self.last_known_block_hashes.pop_front();
        }

        if height % config.block_hash_checkpoints_interval == 0 {
            self.checkpoints.push_back((height, hash));
            while self.checkpoints.len() > config.max_block_hash_checkpoints {
                self.checkpoints.pop_front();
            }
        }
    }

    /// Every height/hash pair this wallet would offer a daemon to resolve
    /// where a shared ancestor lies, newest first: the dense window, then
    /// the sparse checkpoints older than it.
    pub fn get_block_checkpoints(&self) -> Vec<(u64, Hash32)> {
        let oldest_dense = self.last_known_block_hashes.front().map(|(h, _)| *h);
        let mut result: Vec<(u64, Hash32)> = self
            .last_known_block_hashes
            .iter()
            .rev()
            .copied()
            .collect();
        result.extend(
            self.checkpoints
                .iter()
                .rev()
                .filter(|(h, _)| oldest_dense.map(|d| *h < d).unwrap_or(true))
                .copied(),
        );
        result
    }

    /// Given the heights/hashes the daemon still recognizes (a subset of
    /// what [`get_block_checkpoints`] offered), find the highest height at
    /// which this wallet's view and the daemon's view agree. A reorg
    /// happened at `found + 1` if `found < get_height()`.
    pub fn find_highest_agreeing_height(&self, daemon_confirms: &[(u64, Hash32)]) -> Option<u64> {
        let mut known: Vec<&(u64, Hash32)> = self.last_known_block_hashes.iter().collect();
        known.extend(self.checkpoints.iter());
        known.sort_by_key(|(h, _)| *h);

        daemon_confirms
            .iter()
            .filter(|pair| known.contains(pair))
            .map(|(h, _)| *h)
            .max()
    }

    /// Drop every stored hash at or after `fork_height` so resyncing from
    /// there doesn't re-offer now-orphaned hashes as checkpoints.
    pub fn remove_forked_hashes(&mut self, fork_height: u64) {
        self.last_known_block_hashes.retain(|(h, _)| *h < fork_height);
        self.checkpoints.retain(|(h, _)| *h < fork_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_windows(dense: usize, interval: u64, sparse: usize) -> Config {
        let mut c = Config::default();
        c.last_known_block_hashes_size = dense;
        c.block_hash_checkpoints_interval = interval;
        c.max_block_hash_checkpoints = sparse;
        c
    }

    #[test]
    fn dense_window_trims_to_configured_size() {
        let config = config_with_windows(3, 1000, 10);
        let mut status = SynchronizationStatus::new();
        for h in 1..=5u64 {
            status.store_block_hash(h, [h as u8; 32], &config);
        }
        assert_eq!(status.last_known_block_hashes.len(), 3);
        assert_eq!(status.get_height(), 5);
    }

    #[test]
    fn checkpoints_captured_only_on_interval() {
        let config = config_with_windows(100, 5, 10);
        let mut status = SynchronizationStatus::new();
        for h in 1..=12u64 {
            status.store_block_hash(h, [h as u8; 32], &config);
        }
        let heights: Vec<u64> = status.checkpoints.iter().map(|(h, _)| *h).collect();
        assert_eq!(heights, vec![5, 10]);
    }

    #[test]
    fn find_highest_agreeing_height_locates_divergence() {
        let config = config_with_windows(100, 5, 10);
        let mut status = SynchronizationStatus::new();
        for h in 1..=10u64 {
            status.store_block_hash(h, [h as u8; 32], &config);
        }

        // the daemon agrees through height 7, diverges after.
        let daemon_view: Vec<(u64, Hash32)> = (1..=7u64).map(|h| (h, [h as u8; 32])).collect();
        assert_eq!(status.find_highest_agreeing_height(&daemon_view), Some(7));
    }

    #[test]
    fn get_height_resumes_from_seeded_start_height_before_anything_is_synced() {
        let mut status = SynchronizationStatus::new();
        status.seed_start(2_000_000, 1_650_000_000);
        assert_eq!(status.get_height(), 1_999_999);
        assert_eq!(status.start_timestamp(), 1_650_000_000);
        assert!(!status.has_synced_any_block());
    }

    #[test]
    fn known_hash_at_finds_hashes_in_either_window() {
        let config = config_with_windows(2, 5, 10);
        let mut status = SynchronizationStatus::new();
        for h in 1..=10u64 {
            status.store_block_hash(h, [h as u8; 32], &config);
        }
        assert_eq!(status.known_hash_at(10), Some([10u8; 32]));
        assert_eq!(status.known_hash_at(5), Some([5u8; 32]));
        assert_eq!(status.known_hash_at(3), None);
    }

    #[test]
    fn from_parts_round_trips_both_windows_and_the_start_fields() {
        let dense = vec![(9u64, [9u8; 32]), (10u64, [10u8; 32])];
        let sparse = vec![(5u64, [5u8; 32])];
        let status = SynchronizationStatus::from_parts(dense.clone(), sparse.clone(), 3, 42);
        assert_eq!(status.dense_hashes(), dense);
        assert_eq!(status.sparse_checkpoints(), sparse);
        assert_eq!(status.start_height(), 3);
        assert_eq!(status.start_timestamp(), 42);
        assert_eq!(status.get_height(), 10);
    }

    #[test]
    fn remove_forked_hashes_drops_at_and_after_fork_height() {
        let config = config_with_windows(100, 5, 10);
        let mut status = SynchronizationStatus::new();
        for h in 1..=10u64 {
            status.store_block_hash(h, [h as u8; 32], &config);
        }
        status.remove_forked_hashes(8);
        assert_eq!(status.get_height(), 7);
    }
}
