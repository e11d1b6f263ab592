//! The periodic fetch/process tick: ask the daemon for new blocks, run
//! them through the synchronizer, apply the resulting deltas, reconcile
//! locked sends against the daemon's view, and fire `sync`/`desync`
//! events on state transitions.
//!
//! A background loop owning an `Arc<Mutex<_>>` to shared wallet state,
//! woken on a timer via `tokio::time::interval`.

use crate::common::config::Config;
use crate::common::{Arc, Mutex};
use crate::crypto::CryptoOps;
use crate::daemon::{DaemonClient, SyncDataRequest};
use crate::model::Transaction;
use crate::wallet::events::{HeightPair, WalletEvents};
use crate::wallet::sub_wallets::SubWallets;
use crate::wallet::sync_status::SynchronizationStatus;
use crate::wallet::synchronizer::WalletSynchronizer;
use log::{debug, warn};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Fire `transaction`, then exactly one of `incoming_tx`/`outgoing_tx`/
/// `fusion_tx`: fusion transactions (self-transfers consolidating dust,
/// zero fee, non-coinbase) never carry a meaningful net direction, so
/// `Transaction::fusion` is checked first. Otherwise the net of
/// `transfers` across every subwallet decides the direction; a net of
/// zero (e.g. every subwallet sees its spend exactly offset by its own
/// change) fires neither extra event.
fn classify_and_emit(events: &WalletEvents, transaction: Transaction) {
    events.emit_transaction(transaction.clone());
    if transaction.fusion() {
        events.emit_fusion_tx(transaction);
        return;
    }
    let net: i64 = transaction.transfers.values().sum();
    if net > 0 {
        events.emit_incoming_tx(transaction);
    } else if net < 0 {
        events.emit_outgoing_tx(transaction);
    }
}

pub struct MainLoop<C: CryptoOps> {
    config: Config,
    daemon: Arc<dyn DaemonClient>,
    sub_wallets: Arc<Mutex<SubWallets>>,
    sync_status: Arc<Mutex<SynchronizationStatus>>,
    synchronizer: WalletSynchronizer<C>,
    events: WalletEvents,
    was_synced: Mutex<bool>,
}

impl<C: CryptoOps> MainLoop<C> {
    pub fn new(
        config: Config,
        daemon: Arc<dyn DaemonClient>,
        sub_wallets: Arc<Mutex<SubWallets>>,
        sync_status: Arc<Mutex<SynchronizationStatus>>,
        crypto_ops: Arc<C>,
        events: WalletEvents,
    ) -> Self {
        MainLoop {
            config,
            daemon,
            sub_wallets,
            sync_status,
            synchronizer: WalletSynchronizer::new(crypto_ops),
            events,
            was_synced: Mutex::new(false),
        }
    }

    pub fn events(&self) -> &WalletEvents {
        &self.events
    }

    /// One fetch+process+reconcile cycle. Transport failures are logged
    /// and swallowed: the wallet just fails to advance this tick and
    /// tries again next time.
    pub async fn tick(&self) {
        if let Err(e) = self.fetch_and_process().await {
            warn!("main loop tick failed to fetch/process: {}", e);
        }
        if let Err(e) = self.reconcile_locked_transactions().await {
            warn!("main loop tick failed to reconcile locked transactions: {}", e);
        }
        self.update_sync_state().await;
    }

    async fn fetch_and_process(&self) -> Result<(), crate::daemon::DaemonError> {
        let request = {
            let sync_status = self.sync_status.lock();
            let checkpoints = sync_status.get_block_checkpoints();
            SyncDataRequest {
                block_hash_checkpoints: checkpoints.into_iter().map(|(_, hash)| hash).collect(),
                // `get_height()` is the last height already processed (or
                // `startHeight - 1` if nothing has been processed yet), so
                // ask for the one after it.
                start_height: sync_status.get_height() + 1,
                start_timestamp: if sync_status.has_synced_any_block() {
                    0
                } else {
                    sync_status.start_timestamp()
                },
            }
        };

        let mut blocks = self.daemon.get_wallet_sync_data(request).await?;
        blocks.sort_by_key(|b| b.height);
        blocks.truncate(self.config.blocks_per_tick);

        // A reorg shows up as the daemon handing back a batch whose first
        // block lands on a height this wallet already has a hash for, but
        // with a different hash: the daemon resumed from the last height
        // it and this wallet still agree on.
        if let Some(first) = blocks.first() {
            let fork_height = {
                let sync_status = self.sync_status.lock();
                sync_status
                    .known_hash_at(first.height)
                    .filter(|known_hash| *known_hash != first.hash)
                    .map(|_| first.height)
            };
            if let Some(fork_height) = fork_height {
                warn!("chain reorganization detected at height {}", fork_height);
                self.sub_wallets.lock().remove_forked_transactions(fork_height);
                self.sync_status.lock().remove_forked_hashes(fork_height);
            }
        }

        for block in blocks {
            let mut processed = {
                let sub_wallets = self.sub_wallets.lock();
                self.synchronizer.process_block(&block, &sub_wallets, &self.config)
            };
            let height = block.height;

            if processed.inputs_to_add.iter().any(|(_, input)| input.global_output_index.is_none()) {
                match self.daemon.get_global_indexes_for_range(height, height + 1).await {
                    Ok(indexes) => {
                        for (_, input) in processed.inputs_to_add.iter_mut() {
                            if input.global_output_index.is_none() {
                                if let Some(list) = indexes.get(&input.parent_tx_hash) {
                                    input.global_output_index = list.get(input.transaction_index as usize).copied();
                                }
                            }
                        }
                    }
                    Err(e) => debug!("global index backfill failed for height {}: {}", height, e),
                }
            }

            {
                let mut sub_wallets = self.sub_wallets.lock();
                for (owner, input) in processed.inputs_to_add {
                    sub_wallets.store_input(&owner, input);
                }
                for (owner, key_image) in processed.key_images_to_mark_spent {
                    if let Err(e) = sub_wallets.mark_input_as_spent(&owner, &key_image, height) {
                        debug!("spend recognized for an input we don't track: {}", e);
                    }
                }
                for transaction in &processed.transactions_to_add {
                    sub_wallets.add_transaction(transaction.clone());
                }
            }

            for transaction in processed.transactions_to_add {
                classify_and_emit(&self.events, transaction);
            }

            self.sync_status.lock().store_block_hash(block.height, block.hash, &self.config);
            self.events.emit_height_change(block.height);
        }

        Ok(())
    }

    async fn reconcile_locked_transactions(&self) -> Result<(), crate::daemon::DaemonError> {
        let locked_hashes: Vec<_> = {
            let sub_wallets = self.sub_wallets.lock();
            sub_wallets
                .public_spend_keys()
                .filter_map(|k| sub_wallets.get(k))
                .flat_map(|w| w.locked_inputs.iter().map(|i| i.parent_tx_hash))
                .collect()
        };
        if locked_hashes.is_empty() {
            return Ok(());
        }

        let cancelled = self.daemon.get_cancelled_transactions(&locked_hashes).await?;
        if cancelled.is_empty() {
            return Ok(());
        }

        let mut sub_wallets = self.sub_wallets.lock();
        for hash in cancelled {
            sub_wallets.remove_cancelled_transaction(&hash);
        }
        Ok(())
    }

    async fn update_sync_state(&self) {
        let info = match self.daemon.info().await {
            Ok(info) => info,
            Err(_) => return,
        };
        let wallet_height = self.sync_status.lock().get_height();
        let pair = HeightPair { wallet_height, network_height: info.network_height };
        let caught_up = wallet_height >= info.network_height;

        let mut was_synced = self.was_synced.lock();
        if caught_up && !*was_synced {
            self.events.emit_sync(pair);
        } else if !caught_up && *was_synced {
            self.events.emit_desync(pair);
        }
        *was_synced = caught_up;
    }

    /// Runs [`Self::tick`] every `config.main_loop_interval_ms` until
    /// `shutdown` fires. Intended to be spawned onto a `tokio` runtime.
    pub fn spawn(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) -> JoinHandle<()>
    where
        C: 'static,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(self.config.main_loop_interval_ms));
            loop {
                tokio::select! {
                    _ = interval.tick() => self.tick().await,
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}
