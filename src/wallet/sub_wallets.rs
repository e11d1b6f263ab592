//! The whole-wallet aggregate: every [`SubWallet`] keyed by its public
//! spend key, plus the one private view key shared across all of them.
//! This is the only place that owns subwallets; nothing below this layer
//! reaches back up to it. A single collection type fans
//! `mark_spent`/balance queries out to many individual entries rather
//! than each entry tracking its siblings.

use crate::common::config::Config;
use crate::crypto::{KeyImage, PrivateKey, PublicKey};
use crate::model::{Hash32, ReceivedInput, Transaction};
use crate::wallet::error::ErrorKind;
use crate::wallet::sub_wallet::SubWallet;
use std::collections::HashMap;

pub struct SubWallets {
    private_view_key: PrivateKey,
    /// The first subwallet ever created; the one new transactions without
    /// an explicit destination subwallet fall back to.
    primary_address: PublicKey,
    subwallets: HashMap<PublicKey, SubWallet>,
    /// Creation order, element 0 always the primary. `subwallets` itself
    /// is a `HashMap` and has no stable iteration order of its own.
    order: Vec<PublicKey>,
    confirmed_txs: Vec<Transaction>,
    locked_txs: Vec<Transaction>,
    tx_private_keys: HashMap<Hash32, PrivateKey>,
}

impl SubWallets {
    pub fn new(private_view_key: PrivateKey, primary: SubWallet) -> Self {
        let primary_address = primary.public_spend_key;
        let mut subwallets = HashMap::new();
        subwallets.insert(primary_address, primary);
        SubWallets {
            private_view_key,
            primary_address,
            subwallets,
            order: vec![primary_address],
            confirmed_txs: Vec::new(),
            locked_txs: Vec::new(),
            tx_private_keys: HashMap::new(),
        }
    }

    pub fn private_view_key(&self) -> PrivateKey {
        self.private_view_key
    }

    pub fn is_view_wallet(&self) -> bool {
        self.get_primary_sub_wallet().is_view_only()
    }

    pub fn add_sub_wallet(&mut self, subwallet: SubWallet) {
        self.order.push(subwallet.public_spend_key);
        self.subwallets.insert(subwallet.public_spend_key, subwallet);
    }

    pub fn get(&self, public_spend_key: &PublicKey) -> Option<&SubWallet> {
        self.subwallets.get(public_spend_key)
    }

    pub fn get_mut(&mut self, public_spend_key: &PublicKey) -> Option<&mut SubWallet> {
        self.subwallets.get_mut(public_spend_key)
    }

    /// The subwallet every unattributed receive or change output lands
    /// in. Panics if it is somehow missing — every `SubWallets` is built
    /// with one, so this is a programmer invariant, not a runtime error.
    pub fn get_primary_sub_wallet(&self) -> &SubWallet {
        self.subwallets
            .get(&self.primary_address)
            .expect("SubWallets invariant violated: primary subwallet missing")
    }

    /// In creation order, element 0 always the primary.
    pub fn public_spend_keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.order.iter()
    }

    pub fn confirmed_transactions(&self) -> &[Transaction] {
        &self.confirmed_txs
    }

    pub fn locked_transactions(&self) -> &[Transaction] {
        &self.locked_txs
    }

    pub fn tx_private_keys(&self) -> &HashMap<Hash32, PrivateKey> {
        &self.tx_private_keys
    }

    pub fn store_tx_private_key(&mut self, tx_hash: Hash32, private_key: PrivateKey) {
        self.tx_private_keys.insert(tx_hash, private_key);
    }

    /// Record a transaction the daemon hasn't confirmed yet (e.g. a
    /// just-broadcast send). Recorded separately from `confirmedTxs` so a
    /// later `addTransaction` for the same hash can promote it instead of
    /// producing a duplicate.
    pub fn add_locked_transaction(&mut self, tx: Transaction) {
        self.locked_txs.push(tx);
    }

    /// Record a confirmed transaction. If a locked transaction with the
    /// same hash exists, it is promoted (removed from `lockedTxs`) rather
    /// than left as a stale duplicate. A hash already present in
    /// `confirmedTxs` is a programmer error — the caller (the synchronizer)
    /// guarantees each chain transaction is only ever processed once.
    pub fn add_transaction(&mut self, tx: Transaction) {
        assert!(
            !self.confirmed_txs.iter().any(|t| t.hash == tx.hash),
            "SubWallets invariant violated: transaction {} already confirmed",
            hex::encode(tx.hash)
        );
        self.locked_txs.retain(|t| t.hash != tx.hash);
        self.confirmed_txs.push(tx);
    }

    /// Record a newly recognized output against its owning subwallet.
    /// Panics if `public_spend_key` names no subwallet — the caller (the
    /// synchronizer) derived it from this very collection.
    pub fn store_input(&mut self, public_spend_key: &PublicKey, input: ReceivedInput) {
        self.subwallets
            .get_mut(public_spend_key)
            .expect("SubWallets invariant violated: output attributed to unknown subwallet")
            .store_input(input);
    }

    /// Find which subwallet, if any, owns `key_image`, then mark that
    /// input spent there. A key image with no owner across every
    /// subwallet means it is not ours; the caller treats that as "not a
    /// spend of any output we recognize" rather than an error.
    pub fn get_key_image_owner(&self, key_image: &KeyImage) -> Option<PublicKey> {
        self.subwallets
            .values()
            .find(|w| w.has_key_image(key_image))
            .map(|w| w.public_spend_key)
    }

    pub fn mark_input_as_spent(
        &mut self,
        public_spend_key: &PublicKey,
        key_image: &KeyImage,
        spend_height: u64,
    ) -> Result<(), ErrorKind> {
        self.subwallets
            .get_mut(public_spend_key)
            .ok_or_else(|| ErrorKind::AddressNotInWallet(hex::encode(public_spend_key)))?
            .mark_input_as_spent(key_image, spend_height)
    }

    /// `(unlocked, locked)` summed over every subwallet, or over just
    /// `subset` when given.
    pub fn get_balance(&self, current_height: u64, config: &Config, subset: Option<&[PublicKey]>) -> (u64, u64) {
        let wallets: Box<dyn Iterator<Item = &SubWallet>> = match subset {
            Some(keys) => Box::new(keys.iter().map(move |k| {
                self.subwallets
                    .get(k)
                    .unwrap_or_else(|| panic!("getBalance: '{}' is not a subwallet of this wallet", hex::encode(k)))
            })),
            None => Box::new(self.subwallets.values()),
        };
        wallets.fold((0, 0), |(u, l), w| {
            let (wu, wl) = w.get_balance(current_height, config);
            (u + wu, l + wl)
        })
    }

    pub fn remove_forked_transactions(&mut self, fork_height: u64) {
        for wallet in self.subwallets.values_mut() {
            wallet.remove_forked_transactions(fork_height);
        }
        self.confirmed_txs.retain(|t| t.block_height < fork_height);
        self.locked_txs.retain(|t| t.block_height < fork_height);
    }

    pub fn remove_cancelled_transaction(&mut self, hash: &Hash32) {
        for wallet in self.subwallets.values_mut() {
            wallet.remove_cancelled_transaction(hash);
        }
    }

    pub fn convert_sync_timestamp_to_height(&mut self, ts: u64, height: u64) {
        for wallet in self.subwallets.values_mut() {
            wallet.convert_sync_timestamp_to_height(ts, height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary() -> SubWallet {
        SubWallet::new("primary-addr".into(), [1u8; 32], Some([2u8; 32]), 0, 0)
    }

    fn received(key_image: KeyImage, amount: u64, block_height: u64) -> ReceivedInput {
        ReceivedInput {
            key_image,
            amount,
            block_height,
            tx_public_key: [9u8; 32],
            transaction_index: 0,
            global_output_index: None,
            key: [4u8; 32],
            spend_height: 0,
            unlock_time: 0,
            parent_tx_hash: [5u8; 32],
        }
    }

    #[test]
    fn primary_sub_wallet_is_reachable_by_address() {
        let wallets = SubWallets::new([7u8; 32], primary());
        assert_eq!(wallets.get_primary_sub_wallet().public_spend_key, [1u8; 32]);
        assert!(wallets.get(&[1u8; 32]).is_some());
    }

    #[test]
    fn key_image_owner_is_found_across_subwallets() {
        let mut wallets = SubWallets::new([7u8; 32], primary());
        wallets.add_sub_wallet(SubWallet::new("second".into(), [3u8; 32], Some([4u8; 32]), 0, 0));
        wallets.store_input(&[3u8; 32], received([8u8; 32], 100, 10));

        assert_eq!(wallets.get_key_image_owner(&[8u8; 32]), Some([3u8; 32]));
        assert_eq!(wallets.get_key_image_owner(&[0u8; 32]), None);
    }

    #[test]
    fn balance_aggregates_across_all_subwallets_by_default() {
        let mut wallets = SubWallets::new([7u8; 32], primary());
        wallets.add_sub_wallet(SubWallet::new("second".into(), [3u8; 32], Some([4u8; 32]), 0, 0));
        wallets.store_input(&[1u8; 32], received([8u8; 32], 100, 10));
        wallets.store_input(&[3u8; 32], received([9u8; 32], 50, 10));

        let config = Config::default();
        assert_eq!(wallets.get_balance(20, &config, None), (150, 0));
        assert_eq!(wallets.get_balance(20, &config, Some(&[[1u8; 32]])), (100, 0));
    }

    #[test]
    fn mark_input_as_spent_requires_known_subwallet() {
        let mut wallets = SubWallets::new([7u8; 32], primary());
        assert!(wallets.mark_input_as_spent(&[9u8; 32], &[8u8; 32], 1).is_err());
    }

    #[test]
    #[should_panic(expected = "is not a subwallet")]
    fn get_balance_panics_on_an_unknown_key_in_a_subset() {
        let wallets = SubWallets::new([7u8; 32], primary());
        wallets.get_balance(20, &Config::default(), Some(&[[99u8; 32]]));
    }

    #[test]
    fn public_spend_keys_preserve_creation_order_with_primary_first() {
        let mut wallets = SubWallets::new([7u8; 32], primary());
        wallets.add_sub_wallet(SubWallet::new("second".into(), [3u8; 32], Some([4u8; 32]), 0, 0));
        wallets.add_sub_wallet(SubWallet::new("third".into(), [5u8; 32], Some([6u8; 32]), 0, 0));

        let keys: Vec<PublicKey> = wallets.public_spend_keys().copied().collect();
        assert_eq!(keys, vec![[1u8; 32], [3u8; 32], [5u8; 32]]);
    }

    fn transaction(hash: Hash32, block_height: u64) -> Transaction {
        Transaction {
            hash,
            fee: 10,
            block_height,
            timestamp: 1000,
            payment_id: String::new(),
            unlock_time: 0,
            is_coinbase: false,
            transfers: HashMap::new(),
        }
    }

    #[test]
    fn add_transaction_promotes_a_matching_locked_transaction_instead_of_duplicating_it() {
        let mut wallets = SubWallets::new([7u8; 32], primary());
        wallets.add_locked_transaction(transaction([1u8; 32], 0));
        assert_eq!(wallets.locked_transactions().len(), 1);

        wallets.add_transaction(transaction([1u8; 32], 50));

        assert_eq!(wallets.locked_transactions().len(), 0);
        assert_eq!(wallets.confirmed_transactions().len(), 1);
        assert_eq!(wallets.confirmed_transactions()[0].block_height, 50);
    }

    #[test]
    #[should_panic(expected = "already confirmed")]
    fn add_transaction_panics_on_a_hash_already_confirmed() {
        let mut wallets = SubWallets::new([7u8; 32], primary());
        wallets.add_transaction(transaction([1u8; 32], 10));
        wallets.add_transaction(transaction([1u8; 32], 11));
    }

    #[test]
    fn remove_forked_transactions_drops_confirmed_and_locked_txs_at_or_after_fork_height() {
        let mut wallets = SubWallets::new([7u8; 32], primary());
        wallets.add_transaction(transaction([1u8; 32], 40));
        wallets.add_transaction(transaction([2u8; 32], 60));
        wallets.add_locked_transaction(transaction([3u8; 32], 0));

        wallets.remove_forked_transactions(50);

        assert_eq!(wallets.confirmed_transactions().len(), 1);
        assert_eq!(wallets.confirmed_transactions()[0].hash, [1u8; 32]);
        assert_eq!(wallets.locked_transactions().len(), 1);
    }

    #[test]
    fn tx_private_keys_are_tracked_by_hash() {
        let mut wallets = SubWallets::new([7u8; 32], primary());
        wallets.store_tx_private_key([1u8; 32], [9u8; 32]);
        assert_eq!(wallets.tx_private_keys().get(&[1u8; 32]), Some(&[9u8; 32]));
    }
}
