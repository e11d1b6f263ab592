//! The `CryptoOps` capability boundary.
//!
//! Everything CryptoNote-specific — address decoding, key derivation,
//! key-image generation, mnemonic handling — lives behind this trait and is
//! explicitly out of scope for the synchronization engine itself (the engine
//! only ever calls through `CryptoOps`, never touches curve arithmetic
//! directly). `ReferenceCryptoOps` is a self-consistent stand-in used by this
//! crate's own tests: it is internally consistent (derive/underive/key-image
//! round-trip correctly) but is not a byte-for-byte CryptoNote
//! implementation. Production callers are expected to supply their own.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use failure::Fail;
use rand::{thread_rng, RngCore};
use sha3::{Digest, Sha3_512};

/// Fresh entropy suitable for [`CryptoOps::keys_from_entropy`] or
/// [`CryptoOps::generate_mnemonic`], for callers creating a brand-new
/// wallet rather than importing an existing one.
pub fn random_entropy() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// A CryptoNote public key (spend or view), 32 bytes.
pub type PublicKey = [u8; 32];
/// A CryptoNote private key (spend or view), 32 bytes.
pub type PrivateKey = [u8; 32];
/// A key image: a unique per-output marker used for double-spend detection.
pub type KeyImage = [u8; 32];

/// All-zero key image, stored by view-only subwallets in place of a real one.
pub const ZERO_KEY_IMAGE: KeyImage = [0u8; 32];

/// The shared secret between sender and receiver, derived from a
/// transaction's public key and the wallet's private view key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Derivation(pub [u8; 32]);

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum CryptoError {
    #[fail(display = "point is not a valid curve point")]
    InvalidPoint,
    #[fail(display = "scalar could not be decoded")]
    InvalidScalar,
    #[fail(display = "mnemonic is malformed or has a bad checksum")]
    InvalidMnemonic,
    #[fail(display = "address string is malformed")]
    InvalidAddress,
}

/// Address decode, key derivation, key-image computation, and mnemonic
/// handling, treated as a pure capability. See module docs.
pub trait CryptoOps: Send + Sync {
    /// `derivation = 8 * r * A` in real CryptoNote terms; here, a
    /// deterministic group-element product of `tx_public_key` and
    /// `private_view_key`.
    fn generate_key_derivation(
        &self,
        tx_public_key: &PublicKey,
        private_view_key: &PrivateKey,
    ) -> Result<Derivation, CryptoError>;

    /// Recover the candidate public spend key an output was sent to, given
    /// the shared derivation and the output's position in the transaction.
    /// Callers compare the result byte-for-byte against known public spend
    /// keys to decide whether an output belongs to the wallet.
    fn underive_public_key(
        &self,
        derivation: &Derivation,
        output_index: u64,
        output_key: &PublicKey,
    ) -> Result<PublicKey, CryptoError>;

    /// Compute the key image for a received output, given the owning
    /// subwallet's public/private spend key pair. View-only wallets (no
    /// private spend key) must call [`Self::zero_key_image`] instead.
    fn generate_key_image(
        &self,
        public_spend_key: &PublicKey,
        private_spend_key: &PrivateKey,
        derivation: &Derivation,
        output_index: u64,
    ) -> Result<KeyImage, CryptoError>;

    /// Key image placeholder stored by view-only subwallets.
    fn zero_key_image(&self) -> KeyImage {
        ZERO_KEY_IMAGE
    }

    /// Derive a (public spend, private spend, public view, private view)
    /// key quadruple from raw entropy (a seed, e.g. decoded from a
    /// mnemonic).
    fn keys_from_entropy(
        &self,
        entropy: &[u8],
    ) -> Result<(PublicKey, PrivateKey, PublicKey, PrivateKey), CryptoError>;

    fn generate_mnemonic(&self, entropy: &[u8]) -> Result<String, CryptoError>;
    fn mnemonic_to_entropy(&self, mnemonic: &str) -> Result<Vec<u8>, CryptoError>;

    fn encode_address(&self, public_spend_key: &PublicKey, public_view_key: &PublicKey) -> String;
    fn decode_address(&self, address: &str) -> Result<(PublicKey, PublicKey), CryptoError>;
}

fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha3_512::new();
    for part in parts {
        hasher.update(part);
    }
    Scalar::from_bytes_mod_order_wide(&hasher.finalize().into())
}

fn hash_to_point(parts: &[&[u8]]) -> RistrettoPoint {
    let mut hasher = Sha3_512::new();
    for part in parts {
        hasher.update(part);
    }
    RistrettoPoint::from_uniform_bytes(&hasher.finalize().into())
}

fn decompress(bytes: &[u8; 32]) -> Result<RistrettoPoint, CryptoError> {
    CompressedRistretto(*bytes)
        .decompress()
        .ok_or(CryptoError::InvalidPoint)
}

/// Reference implementation of [`CryptoOps`] built on `curve25519-dalek`'s
/// Ristretto group. See module docs: self-consistent, not a CryptoNote
/// reference implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceCryptoOps;

impl ReferenceCryptoOps {
    pub fn new() -> Self {
        ReferenceCryptoOps
    }
}

impl CryptoOps for ReferenceCryptoOps {
    fn generate_key_derivation(
        &self,
        tx_public_key: &PublicKey,
        private_view_key: &PrivateKey,
    ) -> Result<Derivation, CryptoError> {
        let point = decompress(tx_public_key)?;
        let scalar: Option<Scalar> = Scalar::from_canonical_bytes(*private_view_key).into();
        let scalar = scalar.ok_or(CryptoError::InvalidScalar)?;
        Ok(Derivation((point * scalar).compress().to_bytes()))
    }

    fn underive_public_key(
        &self,
        derivation: &Derivation,
        output_index: u64,
        output_key: &PublicKey,
    ) -> Result<PublicKey, CryptoError> {
        let scalar = hash_to_scalar(&[&derivation.0, &output_index.to_le_bytes()]);
        let output_point = decompress(output_key)?;
        let candidate = output_point - &scalar * RISTRETTO_BASEPOINT_TABLE;
        Ok(candidate.compress().to_bytes())
    }

    fn generate_key_image(
        &self,
        public_spend_key: &PublicKey,
        private_spend_key: &PrivateKey,
        derivation: &Derivation,
        output_index: u64,
    ) -> Result<KeyImage, CryptoError> {
        let scalar = hash_to_scalar(&[&derivation.0, &output_index.to_le_bytes()]);
        let spend_priv: Option<Scalar> = Scalar::from_canonical_bytes(*private_spend_key).into();
        let spend_priv = spend_priv.ok_or(CryptoError::InvalidScalar)?;
        let spend_pub = decompress(public_spend_key)?;

        let one_time_priv = spend_priv + scalar;
        let one_time_pub = spend_pub + &scalar * RISTRETTO_BASEPOINT_TABLE;

        let h_p = hash_to_point(&[&one_time_pub.compress().to_bytes()]);
        Ok((one_time_priv * h_p).compress().to_bytes())
    }

    fn keys_from_entropy(
        &self,
        entropy: &[u8],
    ) -> Result<(PublicKey, PrivateKey, PublicKey, PrivateKey), CryptoError> {
        let spend_priv = hash_to_scalar(&[b"spend", entropy]);
        let view_priv = hash_to_scalar(&[b"view", spend_priv.as_bytes()]);
        let spend_pub = (&spend_priv * RISTRETTO_BASEPOINT_TABLE).compress().to_bytes();
        let view_pub = (&view_priv * RISTRETTO_BASEPOINT_TABLE).compress().to_bytes();
        Ok((spend_pub, spend_priv.to_bytes(), view_pub, view_priv.to_bytes()))
    }

    fn generate_mnemonic(&self, entropy: &[u8]) -> Result<String, CryptoError> {
        Ok(entropy
            .chunks(2)
            .map(hex::encode)
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn mnemonic_to_entropy(&self, mnemonic: &str) -> Result<Vec<u8>, CryptoError> {
        mnemonic
            .split_whitespace()
            .map(|word| hex::decode(word).map_err(|_| CryptoError::InvalidMnemonic))
            .collect::<Result<Vec<Vec<u8>>, _>>()
            .map(|chunks| chunks.concat())
    }

    fn encode_address(&self, public_spend_key: &PublicKey, public_view_key: &PublicKey) -> String {
        format!("TRTL{}{}", hex::encode(public_spend_key), hex::encode(public_view_key))
    }

    fn decode_address(&self, address: &str) -> Result<(PublicKey, PublicKey), CryptoError> {
        let body = address.strip_prefix("TRTL").ok_or(CryptoError::InvalidAddress)?;
        if body.len() != 128 {
            return Err(CryptoError::InvalidAddress);
        }
        let spend = hex::decode(&body[..64]).map_err(|_| CryptoError::InvalidAddress)?;
        let view = hex::decode(&body[64..]).map_err(|_| CryptoError::InvalidAddress)?;
        let mut spend_key = [0u8; 32];
        let mut view_key = [0u8; 32];
        spend_key.copy_from_slice(&spend);
        view_key.copy_from_slice(&view);
        Ok((spend_key, view_key))
    }
}
