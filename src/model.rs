//! The chain-facing data model. `RawTx` collapses what a coinbase and a
//! standard transaction share into one tagged enum rather than two
//! structs related by inheritance, since a coinbase transaction is just
//! a standard one with no inputs and a different unlock rule.

use crate::common::config::Config;
use crate::common::now_seconds;
use crate::crypto::{KeyImage, PublicKey};
use std::collections::HashMap;

/// A block or transaction hash.
pub type Hash32 = [u8; 32];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawOutput {
    pub key: PublicKey,
    pub amount: u64,
    /// Position in the chain-wide output table for this amount
    /// denomination. Not always supplied by the daemon inline; callers
    /// missing it fetch the range in bulk rather than one output at a
    /// time.
    pub global_index: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawInput {
    pub amount: u64,
    pub key_image: KeyImage,
    pub output_offsets: Vec<u64>,
}

/// A transaction as reported by the daemon. Outputs within a transaction
/// keep a stable order; a received output's `transactionIndex` is its
/// position in `outputs`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawTx {
    Coinbase {
        hash: Hash32,
        tx_public_key: PublicKey,
        unlock_time: u64,
        outputs: Vec<RawOutput>,
    },
    Standard {
        hash: Hash32,
        tx_public_key: PublicKey,
        unlock_time: u64,
        outputs: Vec<RawOutput>,
        inputs: Vec<RawInput>,
        payment_id: Option<Hash32>,
    },
}

impl RawTx {
    pub fn hash(&self) -> Hash32 {
        match self {
            RawTx::Coinbase { hash, .. } => *hash,
            RawTx::Standard { hash, .. } => *hash,
        }
    }

    pub fn tx_public_key(&self) -> PublicKey {
        match self {
            RawTx::Coinbase { tx_public_key, .. } => *tx_public_key,
            RawTx::Standard { tx_public_key, .. } => *tx_public_key,
        }
    }

    pub fn unlock_time(&self) -> u64 {
        match self {
            RawTx::Coinbase { unlock_time, .. } => *unlock_time,
            RawTx::Standard { unlock_time, .. } => *unlock_time,
        }
    }

    pub fn outputs(&self) -> &[RawOutput] {
        match self {
            RawTx::Coinbase { outputs, .. } => outputs,
            RawTx::Standard { outputs, .. } => outputs,
        }
    }

    pub fn inputs(&self) -> &[RawInput] {
        match self {
            RawTx::Coinbase { .. } => &[],
            RawTx::Standard { inputs, .. } => inputs,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self, RawTx::Coinbase { .. })
    }

    pub fn payment_id(&self) -> Option<Hash32> {
        match self {
            RawTx::Coinbase { .. } => None,
            RawTx::Standard { payment_id, .. } => *payment_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub height: u64,
    pub hash: Hash32,
    pub timestamp: u64,
    pub coinbase_tx: RawTx,
    pub txs: Vec<RawTx>,
}

/// An output recognized as belonging to the wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedInput {
    pub key_image: KeyImage,
    pub amount: u64,
    pub block_height: u64,
    pub tx_public_key: PublicKey,
    pub transaction_index: u32,
    pub global_output_index: Option<u64>,
    pub key: PublicKey,
    /// `0` means unspent.
    pub spend_height: u64,
    pub unlock_time: u64,
    pub parent_tx_hash: Hash32,
}

impl ReceivedInput {
    pub fn is_spent(&self) -> bool {
        self.spend_height != 0
    }
}

/// Change from a locally issued, not-yet-observed-on-chain send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnconfirmedInput {
    pub amount: u64,
    pub key: PublicKey,
    pub parent_tx_hash: Hash32,
}

/// Whether an output with the given `unlockTime` is spendable at
/// `current_height`. `unlockTime` is overloaded: below the threshold it's a
/// block height, at/above it's Unix seconds.
pub fn is_input_unlocked(unlock_time: u64, current_height: u64, config: &Config) -> bool {
    if unlock_time == 0 {
        return true;
    }
    if unlock_time < config.unlock_time_as_block_height_threshold {
        current_height >= unlock_time
    } else {
        now_seconds() >= unlock_time
    }
}

/// A wallet-level view of a transaction: the net effect on each subwallet's
/// balance. `transfers` sums to the net delta per subwallet; an entry may
/// be negative (spend) or positive (receive).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub hash: Hash32,
    pub fee: u64,
    pub block_height: u64,
    pub timestamp: u64,
    pub payment_id: String,
    pub unlock_time: u64,
    pub is_coinbase: bool,
    pub transfers: HashMap<PublicKey, i64>,
}

impl Transaction {
    /// A zero-fee, non-coinbase transaction — typically a self-transfer
    /// consolidating many small outputs into fewer large ones.
    pub fn fusion(&self) -> bool {
        self.fee == 0 && !self.is_coinbase
    }

    /// `timestamp` rendered as RFC 3339, for logging and display.
    pub fn formatted_time(&self) -> String {
        use chrono::{TimeZone, Utc};
        match Utc.timestamp_opt(self.timestamp as i64, 0) {
            chrono::LocalResult::Single(dt) => dt.to_rfc3339(),
            _ => String::from("invalid timestamp"),
        }
    }
}
