pub mod backend;
pub mod error;
pub mod events;
pub mod json;
pub mod main_loop;
pub mod sub_wallet;
pub mod sub_wallets;
pub mod sync_status;
pub mod synchronizer;

pub use backend::WalletBackend;
pub use error::ErrorKind;
pub use events::{EventHandler, WalletEvents};
