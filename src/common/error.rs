//! Infrastructure-level errors (config/IO), distinct from the wallet
//! `ErrorKind` contract in [`crate::wallet::error`].

pub use failure::Error;
use failure::Fail;

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "could not read config file: {}", _0)]
    ConfigRead(String),
    #[fail(display = "could not parse config file: {}", _0)]
    ConfigParse(String),
    #[fail(display = "could not write config file: {}", _0)]
    ConfigWrite(String),
}
