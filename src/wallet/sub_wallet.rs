//! A single (publicSpendKey, privateSpendKey?) address sharing the
//! wallet's private view key. A plain data struct with small
//! status-transition methods: `SubWallet` never holds a back-reference
//! to [`super::sub_wallets::SubWallets`] — every whole-wallet operation
//! lives there instead.

use crate::common::config::Config;
use crate::crypto::{CryptoOps, Derivation, KeyImage, PrivateKey, PublicKey, ZERO_KEY_IMAGE};
use crate::model::{is_input_unlocked, Hash32, ReceivedInput, UnconfirmedInput};
use crate::wallet::error::ErrorKind;
use std::collections::HashSet;

#[derive(Clone, Debug)]
pub struct SubWallet {
    pub address: String,
    pub public_spend_key: PublicKey,
    /// `None` for a view-only subwallet.
    pub private_spend_key: Option<PrivateKey>,
    pub scan_height: u64,
    pub creation_timestamp: u64,
    pub inputs: Vec<ReceivedInput>,
    pub locked_inputs: Vec<UnconfirmedInput>,
    pub key_images: HashSet<KeyImage>,
}

impl SubWallet {
    pub fn new(
        address: String,
        public_spend_key: PublicKey,
        private_spend_key: Option<PrivateKey>,
        scan_height: u64,
        creation_timestamp: u64,
    ) -> Self {
        SubWallet {
            address,
            public_spend_key,
            private_spend_key,
            scan_height,
            creation_timestamp,
            inputs: Vec::new(),
            locked_inputs: Vec::new(),
            key_images: HashSet::new(),
        }
    }

    pub fn is_view_only(&self) -> bool {
        self.private_spend_key.is_none()
    }

    /// Append a newly recognized output. The caller (the synchronizer)
    /// guarantees no duplicate `(parentTxHash, transactionIndex)` pair is
    /// ever stored twice.
    pub fn store_input(&mut self, input: ReceivedInput) {
        if !self.is_view_only() {
            self.key_images.insert(input.key_image);
        }
        self.inputs.push(input);
    }

    pub fn mark_input_as_spent(&mut self, key_image: &KeyImage, spend_height: u64) -> Result<(), ErrorKind> {
        let input = self
            .inputs
            .iter_mut()
            .find(|i| &i.key_image == key_image)
            .ok_or(ErrorKind::InvalidKey)?;
        input.spend_height = spend_height;
        Ok(())
    }

    /// `(unlocked, locked)`, summed over unspent inputs only.
    pub fn get_balance(&self, current_height: u64, config: &Config) -> (u64, u64) {
        let mut unlocked = 0u64;
        let mut locked = 0u64;
        for input in &self.inputs {
            if input.is_spent() {
                continue;
            }
            if is_input_unlocked(input.unlock_time, current_height, config) {
                unlocked += input.amount;
            } else {
                locked += input.amount;
            }
        }
        (unlocked, locked)
    }

    /// Drop inputs introduced at or after `fork_height`; re-open inputs
    /// spent at or after `fork_height`, since a reorg can un-confirm a
    /// spend without un-confirming the output it spent.
    pub fn remove_forked_transactions(&mut self, fork_height: u64) {
        self.inputs.retain(|i| i.block_height < fork_height);
        for input in &mut self.inputs {
            if input.spend_height >= fork_height {
                input.spend_height = 0;
            }
        }
        if !self.is_view_only() {
            self.key_images = self.inputs.iter().map(|i| i.key_image).collect();
        }
    }

    /// Drop locked, unconfirmed inputs belonging to a cancelled send.
    pub fn remove_cancelled_transaction(&mut self, hash: &Hash32) {
        self.locked_inputs.retain(|i| &i.parent_tx_hash != hash);
    }

    /// If `creationTimestamp` still equals `ts` (i.e. it hasn't already
    /// been converted), replace it with a height so future sync decisions
    /// use height instead of a wall-clock timestamp.
    pub fn convert_sync_timestamp_to_height(&mut self, ts: u64, height: u64) {
        if self.creation_timestamp == ts {
            self.creation_timestamp = 0;
            self.scan_height = height;
        }
    }

    pub fn has_key_image(&self, key_image: &KeyImage) -> bool {
        self.key_images.contains(key_image)
    }

    /// Delegates to `CryptoOps` with this subwallet's private spend key;
    /// view-only subwallets get the zero-image placeholder instead.
    pub fn get_tx_input_key_image(
        &self,
        derivation: &Derivation,
        output_index: u64,
        crypto_ops: &dyn CryptoOps,
    ) -> Result<KeyImage, ErrorKind> {
        match self.private_spend_key {
            None => Ok(ZERO_KEY_IMAGE),
            Some(private_spend_key) => crypto_ops
                .generate_key_image(
                    &self.public_spend_key,
                    &private_spend_key,
                    derivation,
                    output_index,
                )
                .map_err(|_| ErrorKind::InvalidKey),
        }
    }
}
