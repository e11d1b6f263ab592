//! Light-wallet synchronization and output-discovery engine for a
//! CryptoNote-family chain: scans blocks fetched through a
//! [`daemon::DaemonClient`] for outputs owned by a set of subwallets,
//! tracks balances and spends, and persists the result to a JSON wallet
//! file. Address decoding, key derivation, and signing live behind the
//! [`crypto::CryptoOps`] trait and are out of scope for this crate beyond
//! the reference implementation used by its own tests.
//!
//! [`wallet::WalletBackend`] is the entry point: construct one with
//! `create`, `import_from_seed`, `import_from_keys`, `import_view_wallet`,
//! `open_from_file`, or `load_from_json`, call `start()` to begin
//! background synchronization, and read `get_balance`/`get_sync_status`/
//! the event bus as it runs.

pub mod common;
pub mod crypto;
pub mod daemon;
pub mod model;
pub mod wallet;

pub use common::config::Config;
pub use crypto::CryptoOps;
pub use daemon::DaemonClient;
pub use wallet::WalletBackend;
