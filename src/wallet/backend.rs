//! `WalletBackend`: the one type library consumers construct and hold
//! onto. It owns the shared wallet state, wires up a [`MainLoop`], and
//! exposes the read surface plus the wallet lifecycle entry points
//! (create, import, open, save).
//!
//! One struct bundling the synchronizer, the daemon client, and the
//! keychain behind a single `Arc<Mutex<_>>` that every caller shares,
//! with explicit construction paths for each way a wallet can come into
//! being: new wallet vs. seed import vs. key import vs. view-only import
//! vs. load from disk.

use crate::common::config::Config;
use crate::common::{now_seconds, Arc, Mutex};
use crate::crypto::{CryptoOps, PrivateKey, PublicKey};
use crate::daemon::DaemonClient;
use crate::wallet::error::ErrorKind;
use crate::wallet::events::WalletEvents;
use crate::wallet::json;
use crate::wallet::main_loop::MainLoop;
use crate::wallet::sub_wallet::SubWallet;
use crate::wallet::sub_wallets::SubWallets;
use crate::wallet::sync_status::SynchronizationStatus;
use std::path::Path;

pub struct WalletBackend<C: CryptoOps> {
    config: Config,
    crypto_ops: Arc<C>,
    sub_wallets: Arc<Mutex<SubWallets>>,
    sync_status: Arc<Mutex<SynchronizationStatus>>,
    main_loop: Arc<MainLoop<C>>,
    main_loop_shutdown: tokio::sync::watch::Sender<bool>,
}

impl<C: CryptoOps + 'static> WalletBackend<C> {
    /// If `sync_status` hasn't been given an explicit starting point (the
    /// common case: a freshly created `SynchronizationStatus`), seed it
    /// from the primary subwallet's `scanHeight`/`creationTimestamp` so the
    /// first fetch resumes from where the caller asked the wallet to
    /// start scanning, not from height 1.
    fn assemble(
        config: Config,
        daemon: Arc<dyn DaemonClient>,
        crypto_ops: Arc<C>,
        sub_wallets: SubWallets,
        mut sync_status: SynchronizationStatus,
    ) -> Self {
        if sync_status.start_height() == 0 && sync_status.start_timestamp() == 0 {
            let primary = sub_wallets.get_primary_sub_wallet();
            sync_status.seed_start(primary.scan_height, primary.creation_timestamp);
        }
        let sub_wallets = Arc::new(Mutex::new(sub_wallets));
        let sync_status = Arc::new(Mutex::new(sync_status));
        let events = WalletEvents::new();
        let main_loop = Arc::new(MainLoop::new(
            config.clone(),
            daemon,
            sub_wallets.clone(),
            sync_status.clone(),
            crypto_ops.clone(),
            events,
        ));
        let (main_loop_shutdown, _) = tokio::sync::watch::channel(false);
        WalletBackend {
            config,
            crypto_ops,
            sub_wallets,
            sync_status,
            main_loop,
            main_loop_shutdown,
        }
    }

    /// A brand-new wallet: a fresh entropy-derived key quadruple, one
    /// primary subwallet, synced from `scan_height`.
    pub fn create(
        config: Config,
        daemon: Arc<dyn DaemonClient>,
        crypto_ops: Arc<C>,
        entropy: &[u8],
        scan_height: u64,
    ) -> Result<Self, ErrorKind> {
        let (public_spend, private_spend, public_view, private_view) = crypto_ops
            .keys_from_entropy(entropy)
            .map_err(|_| ErrorKind::InvalidKey)?;
        let address = crypto_ops.encode_address(&public_spend, &public_view);
        let primary = SubWallet::new(address, public_spend, Some(private_spend), scan_height, now_seconds());
        let sub_wallets = SubWallets::new(private_view, primary);
        Ok(Self::assemble(config, daemon, crypto_ops, sub_wallets, SynchronizationStatus::new()))
    }

    /// Recover a wallet from a mnemonic seed phrase.
    pub fn import_from_seed(
        config: Config,
        daemon: Arc<dyn DaemonClient>,
        crypto_ops: Arc<C>,
        mnemonic: &str,
        scan_height: u64,
    ) -> Result<Self, ErrorKind> {
        let entropy = crypto_ops
            .mnemonic_to_entropy(mnemonic)
            .map_err(|_| ErrorKind::InvalidMnemonic)?;
        Self::create(config, daemon, crypto_ops, &entropy, scan_height)
    }

    /// Recover a wallet from its raw spend key (the view key is derived
    /// the same deterministic way `create` derives it, since this crate
    /// does not support independently-chosen view keys).
    pub fn import_from_keys(
        config: Config,
        daemon: Arc<dyn DaemonClient>,
        crypto_ops: Arc<C>,
        private_spend_key: PrivateKey,
        scan_height: u64,
    ) -> Result<Self, ErrorKind> {
        Self::create(config, daemon, crypto_ops, &private_spend_key, scan_height)
    }

    /// A view-only wallet: can see incoming outputs and balances but
    /// cannot compute key images for real spends.
    pub fn import_view_wallet(
        config: Config,
        daemon: Arc<dyn DaemonClient>,
        crypto_ops: Arc<C>,
        public_spend_key: PublicKey,
        private_view_key: PrivateKey,
        public_view_key: PublicKey,
        scan_height: u64,
    ) -> Result<Self, ErrorKind> {
        let address = crypto_ops.encode_address(&public_spend_key, &public_view_key);
        let primary = SubWallet::new(address, public_spend_key, None, scan_height, now_seconds());
        let sub_wallets = SubWallets::new(private_view_key, primary);
        Ok(Self::assemble(config, daemon, crypto_ops, sub_wallets, SynchronizationStatus::new()))
    }

    pub fn open_from_file(
        config: Config,
        daemon: Arc<dyn DaemonClient>,
        crypto_ops: Arc<C>,
        path: &Path,
    ) -> Result<Self, ErrorKind> {
        let (sub_wallets, sync_status) = json::load_from_file(path)?;
        Ok(Self::assemble(config, daemon, crypto_ops, sub_wallets, sync_status))
    }

    pub fn load_from_json(
        config: Config,
        daemon: Arc<dyn DaemonClient>,
        crypto_ops: Arc<C>,
        contents: &str,
    ) -> Result<Self, ErrorKind> {
        let (sub_wallets, sync_status) = json::deserialize(contents)?;
        Ok(Self::assemble(config, daemon, crypto_ops, sub_wallets, sync_status))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ErrorKind> {
        let sub_wallets = self.sub_wallets.lock();
        let sync_status = self.sync_status.lock();
        json::save_to_file(path, &sub_wallets, &sync_status)
    }

    pub fn to_json(&self) -> String {
        json::serialize(&self.sub_wallets.lock(), &self.sync_status.lock())
    }

    /// Starts the background sync loop. Idempotent: calling it again
    /// while already running just keeps the existing task.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        self.main_loop.clone().spawn(self.main_loop_shutdown.subscribe())
    }

    pub fn stop(&self) {
        let _ = self.main_loop_shutdown.send(true);
    }

    pub fn events(&self) -> &WalletEvents {
        self.main_loop.events()
    }

    pub fn get_sync_status(&self) -> u64 {
        self.sync_status.lock().get_height()
    }

    /// `(unlocked, locked)` across every subwallet.
    pub fn get_balance(&self) -> (u64, u64) {
        let height = self.get_sync_status();
        self.sub_wallets.lock().get_balance(height, &self.config, None)
    }

    pub fn get_primary_address(&self) -> String {
        self.sub_wallets.lock().get_primary_sub_wallet().address.clone()
    }

    pub fn get_spend_keys(&self) -> (PublicKey, Option<PrivateKey>) {
        let sub_wallets = self.sub_wallets.lock();
        let primary = sub_wallets.get_primary_sub_wallet();
        (primary.public_spend_key, primary.private_spend_key)
    }

    pub fn get_private_view_key(&self) -> PrivateKey {
        self.sub_wallets.lock().private_view_key()
    }

    pub fn get_mnemonic_seed(&self) -> Result<String, ErrorKind> {
        let (_, private_spend_key) = self.get_spend_keys();
        let private_spend_key = private_spend_key.ok_or(ErrorKind::InvalidKey)?;
        self.crypto_ops
            .generate_mnemonic(&private_spend_key)
            .map_err(|_| ErrorKind::InvalidMnemonic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ReferenceCryptoOps;
    use crate::daemon::test_double::InMemoryDaemonClient;

    fn backend() -> WalletBackend<ReferenceCryptoOps> {
        WalletBackend::create(
            Config::default(),
            Arc::new(InMemoryDaemonClient::new()),
            Arc::new(ReferenceCryptoOps::new()),
            b"backend test entropy",
            0,
        )
        .unwrap()
    }

    #[test]
    fn create_yields_a_usable_primary_address() {
        let backend = backend();
        assert!(!backend.get_primary_address().is_empty());
        assert_eq!(backend.get_balance(), (0, 0));
    }

    #[test]
    fn json_round_trip_preserves_the_primary_address() {
        let backend = backend();
        let address = backend.get_primary_address();
        let json = backend.to_json();

        let reopened = WalletBackend::load_from_json(
            Config::default(),
            Arc::new(InMemoryDaemonClient::new()),
            Arc::new(ReferenceCryptoOps::new()),
            &json,
        )
        .unwrap();
        assert_eq!(reopened.get_primary_address(), address);
    }

    #[test]
    fn create_with_a_future_scan_height_seeds_sync_status_to_resume_there() {
        let backend = WalletBackend::create(
            Config::default(),
            Arc::new(InMemoryDaemonClient::new()),
            Arc::new(ReferenceCryptoOps::new()),
            b"scan height test entropy",
            2_000_000,
        )
        .unwrap();
        assert_eq!(backend.get_sync_status(), 1_999_999);
    }

    #[test]
    fn view_wallet_has_no_private_spend_key() {
        let ops = ReferenceCryptoOps::new();
        let (public_spend, _private_spend, public_view, private_view) =
            ops.keys_from_entropy(b"view wallet entropy").unwrap();
        let backend = WalletBackend::import_view_wallet(
            Config::default(),
            Arc::new(InMemoryDaemonClient::new()),
            Arc::new(ops),
            public_spend,
            private_view,
            public_view,
            0,
        )
        .unwrap();
        assert!(backend.get_spend_keys().1.is_none());
        assert!(backend.get_mnemonic_seed().is_err());
    }
}
