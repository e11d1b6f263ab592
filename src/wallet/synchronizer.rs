//! The output-recognition and spend-recognition algorithm, the heart of
//! the engine: for every transaction in a fetched block, decide which
//! outputs belong to this wallet's subwallets and which of its
//! previously-owned outputs this transaction just spent, then fold both
//! into one [`crate::model::Transaction`] record per chain transaction.
//!
//! One pass per block, accumulate deltas, hand them to the owning
//! collection rather than mutating it mid-scan.

use crate::crypto::{CryptoOps, Derivation};
use crate::model::{is_input_unlocked, Block, Hash32, RawTx, ReceivedInput};
use crate::wallet::error::ErrorKind;
use crate::wallet::sub_wallets::SubWallets;
use crate::common::config::Config;
use crate::crypto::{KeyImage, PublicKey};
use std::collections::HashMap;

/// The deltas one call to [`WalletSynchronizer::process_block`] produces.
/// The caller (`MainLoop`) applies `inputs_to_add` before
/// `key_images_to_mark_spent`, so a spend of an output recognized
/// earlier in the very same block is resolved correctly: within one
/// block, recognized outputs are visible to that block's own spend
/// recognition.
#[derive(Default)]
pub struct ProcessedBlock {
    pub inputs_to_add: Vec<(PublicKey, ReceivedInput)>,
    pub key_images_to_mark_spent: Vec<(PublicKey, KeyImage)>,
    pub transactions_to_add: Vec<crate::model::Transaction>,
}

pub struct WalletSynchronizer<C: CryptoOps> {
    crypto_ops: std::sync::Arc<C>,
}

impl<C: CryptoOps> WalletSynchronizer<C> {
    pub fn new(crypto_ops: std::sync::Arc<C>) -> Self {
        WalletSynchronizer { crypto_ops }
    }

    /// Scans one block against `sub_wallets`' current membership. Does
    /// not mutate `sub_wallets` itself — the caller applies the returned
    /// deltas, so an in-progress scan is never visible half-applied.
    pub fn process_block(&self, block: &Block, sub_wallets: &SubWallets, config: &Config) -> ProcessedBlock {
        let mut result = ProcessedBlock::default();
        // Key images belonging to outputs recognized earlier in this very
        // block, so a same-block spend still resolves (see doc comment).
        let mut locally_known_key_images: HashMap<KeyImage, PublicKey> = HashMap::new();

        let mut txs: Vec<&RawTx> = Vec::with_capacity(block.txs.len() + 1);
        if config.scan_coinbase {
            txs.push(&block.coinbase_tx);
        }
        txs.extend(block.txs.iter());

        for tx in txs {
            if let Some(tx_result) = self.process_transaction(tx, block, sub_wallets, config, &locally_known_key_images) {
                for (owner, input) in &tx_result.inputs_to_add {
                    locally_known_key_images.insert(input.key_image, *owner);
                }
                result.inputs_to_add.extend(tx_result.inputs_to_add);
                result.key_images_to_mark_spent.extend(tx_result.key_images_to_mark_spent);
                result.transactions_to_add.push(tx_result.transaction);
            }
        }

        result
    }

    fn process_transaction(
        &self,
        tx: &RawTx,
        block: &Block,
        sub_wallets: &SubWallets,
        config: &Config,
        locally_known_key_images: &HashMap<KeyImage, PublicKey>,
    ) -> Option<SingleTxResult> {
        let derivation = self
            .crypto_ops
            .generate_key_derivation(&tx.tx_public_key(), &sub_wallets.private_view_key())
            .ok()?;

        let mut inputs_to_add = Vec::new();
        let mut transfers: HashMap<PublicKey, i64> = HashMap::new();

        for (index, output) in tx.outputs().iter().enumerate() {
            if let Some(owner) = self.recognize_output(&derivation, index as u64, output.key, sub_wallets) {
                let key_image = match sub_wallets.get(&owner) {
                    Some(w) => w
                        .get_tx_input_key_image(&derivation, index as u64, self.crypto_ops.as_ref())
                        .unwrap_or_else(|_| self.crypto_ops.zero_key_image()),
                    None => self.crypto_ops.zero_key_image(),
                };
                let received = ReceivedInput {
                    key_image,
                    amount: output.amount,
                    block_height: block.height,
                    tx_public_key: tx.tx_public_key(),
                    transaction_index: index as u32,
                    global_output_index: output.global_index,
                    key: output.key,
                    spend_height: 0,
                    unlock_time: tx.unlock_time(),
                    parent_tx_hash: tx.hash(),
                };
                *transfers.entry(owner).or_insert(0) += output.amount as i64;
                inputs_to_add.push((owner, received));
            }
        }

        let mut key_images_to_mark_spent = Vec::new();
        let mut total_input_amount = 0u64;
        let total_output_amount: u64 = tx.outputs().iter().map(|o| o.amount).sum();
        let mut spent_something = false;

        for input in tx.inputs() {
            total_input_amount += input.amount;
            let owner = sub_wallets
                .get_key_image_owner(&input.key_image)
                .or_else(|| locally_known_key_images.get(&input.key_image).copied());
            if let Some(owner) = owner {
                spent_something = true;
                *transfers.entry(owner).or_insert(0) -= input.amount as i64;
                key_images_to_mark_spent.push((owner, input.key_image));
            }
        }

        if inputs_to_add.is_empty() && !spent_something {
            return None;
        }

        let fee = if tx.is_coinbase() {
            0
        } else {
            total_input_amount.saturating_sub(total_output_amount)
        };

        let transaction = crate::model::Transaction {
            hash: tx.hash(),
            fee,
            block_height: block.height,
            timestamp: block.timestamp,
            payment_id: tx
                .payment_id()
                .map(|p| hex::encode(p))
                .unwrap_or_default(),
            unlock_time: tx.unlock_time(),
            is_coinbase: tx.is_coinbase(),
            transfers,
        };

        Some(SingleTxResult {
            inputs_to_add,
            key_images_to_mark_spent,
            transaction,
        })
    }

    fn recognize_output(
        &self,
        derivation: &Derivation,
        output_index: u64,
        output_key: PublicKey,
        sub_wallets: &SubWallets,
    ) -> Option<PublicKey> {
        let candidate = self
            .crypto_ops
            .underive_public_key(derivation, output_index, &output_key)
            .ok()?;
        sub_wallets
            .public_spend_keys()
            .find(|&&k| k == candidate)
            .copied()
    }
}

struct SingleTxResult {
    inputs_to_add: Vec<(PublicKey, ReceivedInput)>,
    key_images_to_mark_spent: Vec<(PublicKey, KeyImage)>,
    transaction: crate::model::Transaction,
}

/// Whether `hash` should be treated as locked-and-pending rather than
/// confirmed, given the owning transaction's reported unlock time. Used
/// by `MainLoop`'s locked-transaction reconciliation.
pub fn is_transaction_confirmed(unlock_time: u64, current_height: u64, config: &Config) -> bool {
    is_input_unlocked(unlock_time, current_height, config)
}

pub type SynchronizerResult<T> = Result<T, ErrorKind>;
pub type SynchronizerHash = Hash32;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ReferenceCryptoOps;
    use crate::model::{RawOutput, RawInput};
    use crate::wallet::sub_wallet::SubWallet;

    fn keypairs(ops: &ReferenceCryptoOps, entropy: &[u8]) -> (PublicKey, PublicKey, crate::crypto::PrivateKey, crate::crypto::PrivateKey) {
        // (public_spend, public_view, private_spend, private_view)
        let (pub_spend, priv_spend, pub_view, priv_view) = ops.keys_from_entropy(entropy).unwrap();
        (pub_spend, pub_view, priv_spend, priv_view)
    }

    fn coinbase_block(height: u64, tx_public_key: PublicKey, outputs: Vec<RawOutput>) -> Block {
        Block {
            height,
            hash: [height as u8; 32],
            timestamp: 1000 + height,
            coinbase_tx: RawTx::Coinbase {
                hash: [height as u8; 32],
                tx_public_key,
                unlock_time: 0,
                outputs,
            },
            txs: Vec::new(),
        }
    }

    #[test]
    fn an_arbitrary_output_key_is_not_recognized_as_owned() {
        let ops = ReferenceCryptoOps::new();
        let (pub_spend, _pub_view, priv_spend, priv_view) = keypairs(&ops, b"alice");
        let wallet = SubWallet::new("alice".into(), pub_spend, Some(priv_spend), 0, 0);
        let sub_wallets = SubWallets::new(priv_view, wallet);

        let tx_keys = ops.keys_from_entropy(b"tx-one").unwrap();
        let block = coinbase_block(
            10,
            tx_keys.0,
            vec![RawOutput { key: [42u8; 32], amount: 500, global_index: Some(0) }],
        );

        let synchronizer = WalletSynchronizer::new(std::sync::Arc::new(ops));
        let mut config = Config::default();
        config.scan_coinbase = true;
        let processed = synchronizer.process_block(&block, &sub_wallets, &config);
        assert!(processed.inputs_to_add.is_empty());
    }

    #[test]
    fn recognizes_a_genuinely_owned_output_and_its_key_image() {
        use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
        use curve25519_dalek::scalar::Scalar;

        let ops = ReferenceCryptoOps::new();
        let (pub_spend, _pub_view, priv_spend, priv_view) = keypairs(&ops, b"dave");
        let wallet = SubWallet::new("dave".into(), pub_spend, Some(priv_spend), 0, 0);
        let sub_wallets = SubWallets::new(priv_view, wallet);

        // Build a transaction public key and the matching one-time output
        // key the same way a sender would, so the receiver-side derivation
        // in `process_block` actually recognizes it.
        let tx_priv = Scalar::from_bytes_mod_order_wide(&[11u8; 64]);
        let tx_pub = (&tx_priv * RISTRETTO_BASEPOINT_TABLE).compress().to_bytes();
        let derivation = ops.generate_key_derivation(&tx_pub, &priv_view).unwrap();
        let hash_scalar = {
            use sha3::{Digest, Sha3_512};
            let mut hasher = Sha3_512::new();
            hasher.update(&derivation.0);
            hasher.update(&0u64.to_le_bytes());
            Scalar::from_bytes_mod_order_wide(&hasher.finalize().into())
        };
        let spend_point = curve25519_dalek::ristretto::CompressedRistretto(pub_spend)
            .decompress()
            .unwrap();
        let output_key = (spend_point + &hash_scalar * RISTRETTO_BASEPOINT_TABLE)
            .compress()
            .to_bytes();

        let block = coinbase_block(7, tx_pub, vec![RawOutput { key: output_key, amount: 750, global_index: Some(3) }]);

        let synchronizer = WalletSynchronizer::new(std::sync::Arc::new(ops));
        let mut config = Config::default();
        config.scan_coinbase = true;
        let processed = synchronizer.process_block(&block, &sub_wallets, &config);

        assert_eq!(processed.inputs_to_add.len(), 1);
        let (owner, received) = &processed.inputs_to_add[0];
        assert_eq!(*owner, pub_spend);
        assert_eq!(received.amount, 750);
        assert_eq!(processed.transactions_to_add[0].transfers[&pub_spend], 750);
    }

    #[test]
    fn coinbase_is_skipped_when_scan_coinbase_is_off() {
        let ops = ReferenceCryptoOps::new();
        let (pub_spend, _pub_view, priv_spend, priv_view) = keypairs(&ops, b"bob");
        let wallet = SubWallet::new("bob".into(), pub_spend, Some(priv_spend), 0, 0);
        let sub_wallets = SubWallets::new(priv_view, wallet);

        let tx_keys = ops.keys_from_entropy(b"tx-two").unwrap();
        let block = coinbase_block(
            5,
            tx_keys.0,
            vec![RawOutput { key: pub_spend, amount: 500, global_index: Some(0) }],
        );

        let synchronizer = WalletSynchronizer::new(std::sync::Arc::new(ops));
        let config = Config::default(); // scan_coinbase defaults to false
        let processed = synchronizer.process_block(&block, &sub_wallets, &config);
        assert!(processed.transactions_to_add.is_empty());
    }

    #[test]
    fn spend_recognition_nets_against_owned_input_amount() {
        let ops = ReferenceCryptoOps::new();
        let (pub_spend, _pub_view, priv_spend, priv_view) = keypairs(&ops, b"carol");
        let mut wallet = SubWallet::new("carol".into(), pub_spend, Some(priv_spend), 0, 0);
        let owned_key_image = [77u8; 32];
        wallet.store_input(ReceivedInput {
            key_image: owned_key_image,
            amount: 1000,
            block_height: 1,
            tx_public_key: [1u8; 32],
            transaction_index: 0,
            global_output_index: Some(0),
            key: [2u8; 32],
            spend_height: 0,
            unlock_time: 0,
            parent_tx_hash: [3u8; 32],
        });
        let sub_wallets = SubWallets::new(priv_view, wallet);

        let tx_keys = ops.keys_from_entropy(b"tx-three").unwrap();
        let block = Block {
            height: 20,
            hash: [20u8; 32],
            timestamp: 2000,
            coinbase_tx: RawTx::Coinbase { hash: [0u8; 32], tx_public_key: [0u8; 32], unlock_time: 0, outputs: vec![] },
            txs: vec![RawTx::Standard {
                hash: [9u8; 32],
                tx_public_key: tx_keys.0,
                unlock_time: 0,
                outputs: vec![RawOutput { key: [55u8; 32], amount: 400, global_index: Some(1) }],
                inputs: vec![RawInput { amount: 1000, key_image: owned_key_image, output_offsets: vec![] }],
                payment_id: None,
            }],
        };

        let synchronizer = WalletSynchronizer::new(std::sync::Arc::new(ops));
        let config = Config::default();
        let processed = synchronizer.process_block(&block, &sub_wallets, &config);

        assert_eq!(processed.key_images_to_mark_spent.len(), 1);
        assert_eq!(processed.key_images_to_mark_spent[0], (pub_spend, owned_key_image));
        assert_eq!(processed.transactions_to_add.len(), 1);
        assert_eq!(processed.transactions_to_add[0].transfers[&pub_spend], -1000);
    }
}
