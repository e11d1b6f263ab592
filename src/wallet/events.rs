//! One `tokio::sync::broadcast` channel per event name: a generic
//! `emit(name, payload)` emitter would lose the payload type at the call
//! site, so `WalletBackend` instead owns one strongly-typed bus per event
//! kind. `EventBus<T>` is a thin, `Clone`-able wrapper around a
//! `broadcast::Sender<T>` — `subscribe()` only sees events emitted after
//! it is called, never a backlog.

use crate::model::Transaction;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct EventBus<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        EventBus::new()
    }
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        EventBus { sender }
    }

    /// A no-op if nothing is currently subscribed — the common case.
    pub fn emit(&self, event: T) {
        let _ = self.sender.send(event);
    }

    /// Only events emitted after this call are observed.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}

/// `(wallet height, network height)` at the moment sync state changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeightPair {
    pub wallet_height: u64,
    pub network_height: u64,
}

/// A synchronous alternative to subscribing on one of [`WalletEvents`]'s
/// channels, for callers who'd rather register a callback than hold a
/// receiver and poll it: one `on_*` method per event name, each with a
/// no-op default so implementors only override what they care about.
pub trait EventHandler: Send + Sync {
    fn on_sync(&self, _pair: HeightPair) {}
    fn on_desync(&self, _pair: HeightPair) {}
    fn on_height_change(&self, _height: u64) {}
    fn on_transaction(&self, _transaction: &Transaction) {}
    fn on_incoming_tx(&self, _transaction: &Transaction) {}
    fn on_outgoing_tx(&self, _transaction: &Transaction) {}
    fn on_fusion_tx(&self, _transaction: &Transaction) {}
}

/// The event names `WalletBackend` publishes: a wallet becomes `sync`'d
/// when it catches up to the network height it last observed, and
/// `desync`'d when a new tick reveals it has fallen behind again. A
/// processed transaction always fires on `transaction`, then additionally
/// on exactly one of `incoming_tx`/`outgoing_tx`/`fusion_tx` depending on
/// its classification (see `classify` in `wallet::main_loop`). Every
/// emission both broadcasts on the matching channel and fans out to any
/// registered [`EventHandler`]s.
#[derive(Default, Clone)]
pub struct WalletEvents {
    pub sync: EventBus<HeightPair>,
    pub desync: EventBus<HeightPair>,
    pub height_change: EventBus<u64>,
    pub transaction: EventBus<Transaction>,
    pub incoming_tx: EventBus<Transaction>,
    pub outgoing_tx: EventBus<Transaction>,
    pub fusion_tx: EventBus<Transaction>,
    handlers: std::sync::Arc<parking_lot::Mutex<Vec<std::sync::Arc<dyn EventHandler>>>>,
}

impl WalletEvents {
    pub fn new() -> Self {
        WalletEvents::default()
    }

    pub fn register_handler(&self, handler: std::sync::Arc<dyn EventHandler>) {
        self.handlers.lock().push(handler);
    }

    pub fn emit_sync(&self, pair: HeightPair) {
        self.sync.emit(pair);
        for handler in self.handlers.lock().iter() {
            handler.on_sync(pair);
        }
    }

    pub fn emit_desync(&self, pair: HeightPair) {
        self.desync.emit(pair);
        for handler in self.handlers.lock().iter() {
            handler.on_desync(pair);
        }
    }

    pub fn emit_height_change(&self, height: u64) {
        self.height_change.emit(height);
        for handler in self.handlers.lock().iter() {
            handler.on_height_change(height);
        }
    }

    pub fn emit_transaction(&self, transaction: Transaction) {
        for handler in self.handlers.lock().iter() {
            handler.on_transaction(&transaction);
        }
        self.transaction.emit(transaction);
    }

    pub fn emit_incoming_tx(&self, transaction: Transaction) {
        for handler in self.handlers.lock().iter() {
            handler.on_incoming_tx(&transaction);
        }
        self.incoming_tx.emit(transaction);
    }

    pub fn emit_outgoing_tx(&self, transaction: Transaction) {
        for handler in self.handlers.lock().iter() {
            handler.on_outgoing_tx(&transaction);
        }
        self.outgoing_tx.emit(transaction);
    }

    pub fn emit_fusion_tx(&self, transaction: Transaction) {
        for handler in self.handlers.lock().iter() {
            handler.on_fusion_tx(&transaction);
        }
        self.fusion_tx.emit(transaction);
    }
}
