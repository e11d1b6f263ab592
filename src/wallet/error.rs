//! The wallet error contract: a tagged variant, never an exception. A
//! `#[derive(Fail)]` enum, converted into `failure::Error` via `.into()`
//! at call sites.
//!
//! Propagation policy:
//! - Validation returns an error value; it never panics.
//! - Programmer-violated invariants (unknown `publicSpendKey` passed to an
//!   internal mutator, duplicate confirmed transaction, no primary
//!   subwallet) are fatal — they panic rather than returning `ErrorKind`,
//!   since no caller can recover from them.
//! - Transport failures inside `MainLoop` are logged and swallowed; they
//!   surface only as the wallet failing to advance (`getSyncStatus`) and,
//!   eventually, a `desync` event.
//! - A single transaction's output-recognition failure is logged and that
//!   transaction is skipped; block processing continues.

use failure::Fail;

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "address is not valid")]
    AddressNotValid,
    #[fail(display = "address is an integrated address; a plain address is required here")]
    AddressIsIntegrated,
    #[fail(display = "address '{}' is not in this wallet", _0)]
    AddressNotInWallet(String),
    #[fail(display = "no destinations given")]
    NoDestinationsGiven,
    #[fail(display = "amount is zero")]
    AmountIsZero,
    #[fail(display = "negative value given")]
    NegativeValueGiven,
    #[fail(display = "non-integer amount given")]
    NonIntegerGiven,
    #[fail(display = "conflicting payment IDs given")]
    ConflictingPaymentIds,
    #[fail(display = "fee {} is smaller than the minimum {}", given, minimum)]
    FeeTooSmall { given: u64, minimum: u64 },
    #[fail(
        display = "not enough balance: needed {}, available {}",
        needed, available
    )]
    NotEnoughBalance { needed: u64, available: u64 },
    #[fail(display = "amount will overflow")]
    WillOverflow,
    #[fail(display = "mixin {} is smaller than the minimum {}", given, minimum)]
    MixinTooSmall { given: u64, minimum: u64 },
    #[fail(display = "mixin {} is larger than the maximum {}", given, maximum)]
    MixinTooBig { given: u64, maximum: u64 },
    #[fail(display = "payment ID is the wrong length")]
    PaymentIdWrongLength,
    #[fail(display = "payment ID is invalid")]
    PaymentIdInvalid,
    #[fail(display = "mnemonic is invalid")]
    InvalidMnemonic,
    #[fail(display = "key is invalid")]
    InvalidKey,
    #[fail(display = "daemon is offline")]
    DaemonOffline,
    #[fail(display = "block not found")]
    BlockNotFound,
}
