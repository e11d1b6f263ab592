//! The `DaemonClient` capability boundary: wire transport to a remote
//! chain source, out of scope beyond this trait. Two concrete providers
//! are anticipated by real deployments — a conventional node
//! (authoritative, higher latency) and a blockchain-cache accelerator
//! (faster, possibly lossy on global indexes) — neither is implemented
//! here; only an in-memory test double is, used by this crate's own tests.
//! One trait, no inline business logic.

use crate::model::{Block, Hash32};
use async_trait::async_trait;
use failure::Fail;
use std::collections::HashMap;

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum DaemonError {
    #[fail(display = "daemon request timed out")]
    Timeout,
    #[fail(display = "daemon is offline or unreachable: {}", _0)]
    Offline(String),
    #[fail(display = "daemon fee status was not OK: {}", _0)]
    FeeNotOk(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DaemonInfo {
    pub height: u64,
    pub network_height: u64,
    pub incoming_connections_count: u32,
    pub outgoing_connections_count: u32,
    pub difficulty: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeeInfo {
    pub address: Option<String>,
    pub amount: u64,
}

#[derive(Clone, Debug, Default)]
pub struct SyncDataRequest {
    pub block_hash_checkpoints: Vec<Hash32>,
    pub start_height: u64,
    pub start_timestamp: u64,
}

/// Encapsulates all wallet-node communication. No code outside this trait
/// boundary should know how a block batch is actually transported.
#[async_trait]
pub trait DaemonClient: Send + Sync {
    async fn info(&self) -> Result<DaemonInfo, DaemonError>;
    async fn fee(&self) -> Result<FeeInfo, DaemonError>;
    async fn get_wallet_sync_data(
        &self,
        request: SyncDataRequest,
    ) -> Result<Vec<Block>, DaemonError>;
    async fn get_global_indexes_for_range(
        &self,
        start_height: u64,
        end_height: u64,
    ) -> Result<HashMap<Hash32, Vec<u64>>, DaemonError>;
    /// Hashes from `transaction_hashes` the daemon has never seen.
    async fn get_transactions_status(
        &self,
        transaction_hashes: &[Hash32],
    ) -> Result<Vec<Hash32>, DaemonError>;
    /// Hashes from `locked_hashes` the daemon reports as unknown — i.e.
    /// cancelled, so the caller can drop them from its locked-transaction
    /// set instead of waiting on them forever.
    async fn get_cancelled_transactions(
        &self,
        locked_hashes: &[Hash32],
    ) -> Result<Vec<Hash32>, DaemonError>;
}
