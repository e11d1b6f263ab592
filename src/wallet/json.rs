//! The on-disk wallet file format and its loader.
//!
//! A `serde`-derived schema plus a hand-rolled validation pass: a
//! malformed key, wrong-length hash, or unknown format version is
//! rejected before a single [`SubWallet`] is constructed, instead of
//! surfacing as a panic deep inside key-image computation later. Field
//! names are a stable, external contract (`#[serde(rename_all =
//! "camelCase")]` throughout) — this loader, and anything else that reads
//! a saved wallet file, depends on them not moving around.

use crate::crypto::{PrivateKey, PublicKey};
use crate::model::{Hash32, ReceivedInput, Transaction, UnconfirmedInput};
use crate::wallet::error::ErrorKind;
use crate::wallet::sub_wallet::SubWallet;
use crate::wallet::sub_wallets::SubWallets;
use crate::wallet::sync_status::SynchronizationStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// The only format version this crate knows how to load. Bumped whenever
/// [`WalletFile`]'s shape changes in a way that breaks old files.
pub const WALLET_FILE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletFile {
    wallet_file_format_version: u32,
    sub_wallets: SubWalletsFile,
    synchronization_status: SyncStatusFile,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubWalletsFile {
    /// Creation order, element 0 always the primary.
    public_spend_keys: Vec<String>,
    private_view_key: String,
    is_view_wallet: bool,
    sub_wallet: Vec<SubWalletFile>,
    transactions: Vec<TransactionFile>,
    locked_transactions: Vec<TransactionFile>,
    tx_private_keys: Vec<TxPrivateKeyFile>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubWalletFile {
    address: String,
    public_spend_key: String,
    private_spend_key: Option<String>,
    scan_height: u64,
    creation_timestamp: u64,
    inputs: Vec<ReceivedInputFile>,
    locked_inputs: Vec<UnconfirmedInputFile>,
    /// Derivable from `inputs` plus whether this subwallet is view-only;
    /// written for external readers but not trusted back on load (see
    /// `file_to_sub_wallet`).
    key_images: Vec<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceivedInputFile {
    key_image: String,
    amount: u64,
    block_height: u64,
    tx_public_key: String,
    transaction_index: u32,
    global_output_index: Option<u64>,
    key: String,
    spend_height: u64,
    unlock_time: u64,
    parent_tx_hash: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnconfirmedInputFile {
    amount: u64,
    key: String,
    parent_tx_hash: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionFile {
    hash: String,
    fee: u64,
    block_height: u64,
    timestamp: u64,
    payment_id: String,
    unlock_time: u64,
    is_coinbase: bool,
    transfers: Vec<TransferFile>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferFile {
    public_key: String,
    amount: i64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxPrivateKeyFile {
    transaction_hash: String,
    tx_private_key: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncStatusFile {
    /// The sparse, long-lived checkpoint window.
    block_hash_checkpoints: Vec<CheckpointFile>,
    /// The dense, recent checkpoint window.
    last_known_block_hashes: Vec<CheckpointFile>,
    last_known_block_height: u64,
    start_height: u64,
    start_timestamp: u64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckpointFile {
    height: u64,
    hash: String,
}

fn hex32(label: &'static str, value: &str) -> Result<[u8; 32], ErrorKind> {
    let bytes = hex::decode(value).map_err(|_| invalid_field(label))?;
    if bytes.len() != 32 {
        return Err(invalid_field(label));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn invalid_field(label: &'static str) -> ErrorKind {
    ErrorKind::AddressNotInWallet(format!("malformed wallet file field: {}", label))
}

pub fn serialize(sub_wallets: &SubWallets, sync_status: &SynchronizationStatus) -> String {
    let file = WalletFile {
        wallet_file_format_version: WALLET_FILE_VERSION,
        sub_wallets: sub_wallets_to_file(sub_wallets),
        synchronization_status: sync_status_to_file(sync_status),
    };
    serde_json::to_string_pretty(&file).expect("WalletFile serialization cannot fail")
}

fn sub_wallets_to_file(sub_wallets: &SubWallets) -> SubWalletsFile {
    SubWalletsFile {
        public_spend_keys: sub_wallets.public_spend_keys().map(hex::encode).collect(),
        private_view_key: hex::encode(sub_wallets.private_view_key()),
        is_view_wallet: sub_wallets.is_view_wallet(),
        sub_wallet: sub_wallets
            .public_spend_keys()
            .filter_map(|k| sub_wallets.get(k))
            .map(sub_wallet_to_file)
            .collect(),
        transactions: sub_wallets.confirmed_transactions().iter().map(transaction_to_file).collect(),
        locked_transactions: sub_wallets.locked_transactions().iter().map(transaction_to_file).collect(),
        tx_private_keys: sub_wallets
            .tx_private_keys()
            .iter()
            .map(|(hash, key)| TxPrivateKeyFile {
                transaction_hash: hex::encode(hash),
                tx_private_key: hex::encode(key),
            })
            .collect(),
    }
}

fn sub_wallet_to_file(wallet: &SubWallet) -> SubWalletFile {
    let mut key_images: Vec<String> = wallet.key_images.iter().map(hex::encode).collect();
    key_images.sort();
    SubWalletFile {
        address: wallet.address.clone(),
        public_spend_key: hex::encode(wallet.public_spend_key),
        private_spend_key: wallet.private_spend_key.map(hex::encode),
        scan_height: wallet.scan_height,
        creation_timestamp: wallet.creation_timestamp,
        inputs: wallet.inputs.iter().map(received_input_to_file).collect(),
        locked_inputs: wallet.locked_inputs.iter().map(unconfirmed_to_file).collect(),
        key_images,
    }
}

fn received_input_to_file(input: &ReceivedInput) -> ReceivedInputFile {
    ReceivedInputFile {
        key_image: hex::encode(input.key_image),
        amount: input.amount,
        block_height: input.block_height,
        tx_public_key: hex::encode(input.tx_public_key),
        transaction_index: input.transaction_index,
        global_output_index: input.global_output_index,
        key: hex::encode(input.key),
        spend_height: input.spend_height,
        unlock_time: input.unlock_time,
        parent_tx_hash: hex::encode(input.parent_tx_hash),
    }
}

fn unconfirmed_to_file(input: &UnconfirmedInput) -> UnconfirmedInputFile {
    UnconfirmedInputFile {
        amount: input.amount,
        key: hex::encode(input.key),
        parent_tx_hash: hex::encode(input.parent_tx_hash),
    }
}

fn transaction_to_file(tx: &Transaction) -> TransactionFile {
    TransactionFile {
        hash: hex::encode(tx.hash),
        fee: tx.fee,
        block_height: tx.block_height,
        timestamp: tx.timestamp,
        payment_id: tx.payment_id.clone(),
        unlock_time: tx.unlock_time,
        is_coinbase: tx.is_coinbase,
        transfers: tx
            .transfers
            .iter()
            .map(|(key, amount)| TransferFile { public_key: hex::encode(key), amount: *amount })
            .collect(),
    }
}

fn sync_status_to_file(sync_status: &SynchronizationStatus) -> SyncStatusFile {
    SyncStatusFile {
        block_hash_checkpoints: sync_status.sparse_checkpoints().into_iter().map(checkpoint_to_file).collect(),
        last_known_block_hashes: sync_status.dense_hashes().into_iter().map(checkpoint_to_file).collect(),
        last_known_block_height: sync_status.get_height(),
        start_height: sync_status.start_height(),
        start_timestamp: sync_status.start_timestamp(),
    }
}

fn checkpoint_to_file((height, hash): (u64, Hash32)) -> CheckpointFile {
    CheckpointFile { height, hash: hex::encode(hash) }
}

pub fn deserialize(contents: &str) -> Result<(SubWallets, SynchronizationStatus), ErrorKind> {
    let file: WalletFile =
        serde_json::from_str(contents).map_err(|_| invalid_field("wallet file is not valid JSON"))?;
    if file.wallet_file_format_version != WALLET_FILE_VERSION {
        return Err(invalid_field("unsupported wallet file version"));
    }

    let sub_wallets = file_to_sub_wallets(file.sub_wallets)?;
    let sync_status = file_to_sync_status(file.synchronization_status)?;
    Ok((sub_wallets, sync_status))
}

fn file_to_sub_wallets(file: SubWalletsFile) -> Result<SubWallets, ErrorKind> {
    let private_view_key: PrivateKey = hex32("subWallets.privateViewKey", &file.private_view_key)?;

    if file.public_spend_keys.is_empty() {
        return Err(invalid_field("subWallets.publicSpendKeys must contain at least one entry"));
    }

    let mut by_key: HashMap<PublicKey, SubWalletFile> = HashMap::new();
    for entry in file.sub_wallet {
        let key = hex32("subWallets.subWallet[].publicSpendKey", &entry.public_spend_key)?;
        by_key.insert(key, entry);
    }

    let mut ordered_keys = Vec::with_capacity(file.public_spend_keys.len());
    for hex_key in &file.public_spend_keys {
        ordered_keys.push(hex32("subWallets.publicSpendKeys[]", hex_key)?);
    }

    let primary_key = ordered_keys[0];
    let primary_file = by_key
        .remove(&primary_key)
        .ok_or_else(|| invalid_field("subWallets.publicSpendKeys[0] names no subWallet entry"))?;
    let primary = file_to_sub_wallet(primary_file)?;

    let mut sub_wallets = SubWallets::new(private_view_key, primary);
    for key in &ordered_keys[1..] {
        let entry = by_key
            .remove(key)
            .ok_or_else(|| invalid_field("subWallets.publicSpendKeys[] names no subWallet entry"))?;
        sub_wallets.add_sub_wallet(file_to_sub_wallet(entry)?);
    }

    for tx in file.locked_transactions {
        sub_wallets.add_locked_transaction(file_to_transaction(tx)?);
    }
    for tx in file.transactions {
        sub_wallets.add_transaction(file_to_transaction(tx)?);
    }
    for entry in file.tx_private_keys {
        let hash = hex32("subWallets.txPrivateKeys[].transactionHash", &entry.transaction_hash)?;
        let key = hex32("subWallets.txPrivateKeys[].txPrivateKey", &entry.tx_private_key)?;
        sub_wallets.store_tx_private_key(hash, key);
    }

    Ok(sub_wallets)
}

fn file_to_sub_wallet(file: SubWalletFile) -> Result<SubWallet, ErrorKind> {
    let public_spend_key = hex32("subWallet[].publicSpendKey", &file.public_spend_key)?;
    let private_spend_key = match file.private_spend_key {
        Some(hex) => Some(hex32("subWallet[].privateSpendKey", &hex)?),
        None => None,
    };
    let mut wallet = SubWallet::new(
        file.address,
        public_spend_key,
        private_spend_key,
        file.scan_height,
        file.creation_timestamp,
    );
    for input in file.inputs {
        wallet.store_input(file_to_received_input(input)?);
    }
    for input in file.locked_inputs {
        wallet.locked_inputs.push(file_to_unconfirmed(input)?);
    }
    Ok(wallet)
}

fn file_to_received_input(file: ReceivedInputFile) -> Result<ReceivedInput, ErrorKind> {
    Ok(ReceivedInput {
        key_image: hex32("inputs[].keyImage", &file.key_image)?,
        amount: file.amount,
        block_height: file.block_height,
        tx_public_key: hex32("inputs[].txPublicKey", &file.tx_public_key)?,
        transaction_index: file.transaction_index,
        global_output_index: file.global_output_index,
        key: hex32("inputs[].key", &file.key)?,
        spend_height: file.spend_height,
        unlock_time: file.unlock_time,
        parent_tx_hash: hex32("inputs[].parentTxHash", &file.parent_tx_hash)?,
    })
}

fn file_to_unconfirmed(file: UnconfirmedInputFile) -> Result<UnconfirmedInput, ErrorKind> {
    Ok(UnconfirmedInput {
        amount: file.amount,
        key: hex32("lockedInputs[].key", &file.key)?,
        parent_tx_hash: hex32("lockedInputs[].parentTxHash", &file.parent_tx_hash)?,
    })
}

fn file_to_transaction(file: TransactionFile) -> Result<Transaction, ErrorKind> {
    let mut transfers = HashMap::with_capacity(file.transfers.len());
    for transfer in file.transfers {
        let key = hex32("transfers[].publicKey", &transfer.public_key)?;
        transfers.insert(key, transfer.amount);
    }
    Ok(Transaction {
        hash: hex32("transactions[].hash", &file.hash)?,
        fee: file.fee,
        block_height: file.block_height,
        timestamp: file.timestamp,
        payment_id: file.payment_id,
        unlock_time: file.unlock_time,
        is_coinbase: file.is_coinbase,
        transfers,
    })
}

fn file_to_sync_status(file: SyncStatusFile) -> Result<SynchronizationStatus, ErrorKind> {
    let dense = file
        .last_known_block_hashes
        .into_iter()
        .map(file_to_checkpoint)
        .collect::<Result<Vec<_>, _>>()?;
    let sparse = file
        .block_hash_checkpoints
        .into_iter()
        .map(file_to_checkpoint)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SynchronizationStatus::from_parts(dense, sparse, file.start_height, file.start_timestamp))
}

fn file_to_checkpoint(file: CheckpointFile) -> Result<(u64, Hash32), ErrorKind> {
    Ok((file.height, hex32("synchronizationStatus checkpoint hash", &file.hash)?))
}

pub fn save_to_file(
    path: &Path,
    sub_wallets: &SubWallets,
    sync_status: &SynchronizationStatus,
) -> Result<(), ErrorKind> {
    fs::write(path, serialize(sub_wallets, sync_status))
        .map_err(|e| invalid_field_owned(format!("could not write wallet file: {}", e)))
}

pub fn load_from_file(path: &Path) -> Result<(SubWallets, SynchronizationStatus), ErrorKind> {
    let contents = fs::read_to_string(path)
        .map_err(|e| invalid_field_owned(format!("could not read wallet file: {}", e)))?;
    deserialize(&contents)
}

fn invalid_field_owned(message: String) -> ErrorKind {
    ErrorKind::AddressNotInWallet(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_wallet_with_one_owned_input() {
        let primary = SubWallet::new("addr".into(), [1u8; 32], Some([2u8; 32]), 0, 0);
        let mut sub_wallets = SubWallets::new([3u8; 32], primary);
        sub_wallets.store_input(
            &[1u8; 32],
            ReceivedInput {
                key_image: [4u8; 32],
                amount: 500,
                block_height: 10,
                tx_public_key: [5u8; 32],
                transaction_index: 0,
                global_output_index: Some(9),
                key: [6u8; 32],
                spend_height: 0,
                unlock_time: 0,
                parent_tx_hash: [7u8; 32],
            },
        );
        let mut sync_status = SynchronizationStatus::new();
        let config = crate::common::config::Config::default();
        sync_status.store_block_hash(10, [8u8; 32], &config);

        let json = serialize(&sub_wallets, &sync_status);
        let (loaded_wallets, loaded_status) = deserialize(&json).unwrap();

        assert_eq!(loaded_wallets.private_view_key(), [3u8; 32]);
        assert_eq!(loaded_wallets.get_primary_sub_wallet().inputs.len(), 1);
        assert_eq!(loaded_wallets.get_primary_sub_wallet().inputs[0].amount, 500);
        assert_eq!(loaded_status.get_height(), 10);
    }

    #[test]
    fn round_trips_confirmed_and_locked_transactions_and_tx_private_keys() {
        let primary = SubWallet::new("addr".into(), [1u8; 32], Some([2u8; 32]), 0, 0);
        let mut sub_wallets = SubWallets::new([3u8; 32], primary);
        let mut transfers = HashMap::new();
        transfers.insert([1u8; 32], 500i64);
        sub_wallets.add_transaction(Transaction {
            hash: [9u8; 32],
            fee: 10,
            block_height: 20,
            timestamp: 1000,
            payment_id: "deadbeef".into(),
            unlock_time: 0,
            is_coinbase: false,
            transfers: transfers.clone(),
        });
        sub_wallets.add_locked_transaction(Transaction {
            hash: [10u8; 32],
            fee: 5,
            block_height: 0,
            timestamp: 1001,
            payment_id: String::new(),
            unlock_time: 0,
            is_coinbase: false,
            transfers,
        });
        sub_wallets.store_tx_private_key([9u8; 32], [11u8; 32]);
        let sync_status = SynchronizationStatus::new();

        let json = serialize(&sub_wallets, &sync_status);
        let (loaded, _) = deserialize(&json).unwrap();

        assert_eq!(loaded.confirmed_transactions().len(), 1);
        assert_eq!(loaded.confirmed_transactions()[0].transfers[&[1u8; 32]], 500);
        assert_eq!(loaded.locked_transactions().len(), 1);
        assert_eq!(loaded.tx_private_keys().get(&[9u8; 32]), Some(&[11u8; 32]));
    }

    #[test]
    fn round_trips_multiple_subwallets_preserving_creation_order() {
        let primary = SubWallet::new("addr-1".into(), [1u8; 32], Some([2u8; 32]), 0, 0);
        let mut sub_wallets = SubWallets::new([3u8; 32], primary);
        sub_wallets.add_sub_wallet(SubWallet::new("addr-2".into(), [4u8; 32], Some([5u8; 32]), 0, 0));
        sub_wallets.add_sub_wallet(SubWallet::new("addr-3".into(), [6u8; 32], Some([7u8; 32]), 0, 0));

        let json = serialize(&sub_wallets, &SynchronizationStatus::new());
        let (loaded, _) = deserialize(&json).unwrap();

        let keys: Vec<PublicKey> = loaded.public_spend_keys().copied().collect();
        assert_eq!(keys, vec![[1u8; 32], [4u8; 32], [6u8; 32]]);
    }

    #[test]
    fn round_trips_the_two_block_hash_windows_and_the_start_fields() {
        let primary = SubWallet::new("addr".into(), [1u8; 32], Some([2u8; 32]), 0, 0);
        let sub_wallets = SubWallets::new([3u8; 32], primary);
        let mut config = crate::common::config::Config::default();
        config.last_known_block_hashes_size = 2;
        config.block_hash_checkpoints_interval = 5;
        let mut sync_status = SynchronizationStatus::new();
        for h in 1..=10u64 {
            sync_status.store_block_hash(h, [h as u8; 32], &config);
        }

        let json = serialize(&sub_wallets, &sync_status);
        let (_, loaded_status) = deserialize(&json).unwrap();

        assert_eq!(loaded_status.dense_hashes(), sync_status.dense_hashes());
        assert_eq!(loaded_status.sparse_checkpoints(), sync_status.sparse_checkpoints());
        assert_eq!(loaded_status.get_height(), 10);
    }

    #[test]
    fn view_wallet_flag_reflects_the_absence_of_a_private_spend_key() {
        let primary = SubWallet::new("addr".into(), [1u8; 32], None, 0, 0);
        let sub_wallets = SubWallets::new([3u8; 32], primary);
        let json = serialize(&sub_wallets, &SynchronizationStatus::new());
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["subWallets"]["isViewWallet"], serde_json::json!(true));

        let (loaded, _) = deserialize(&json).unwrap();
        assert!(loaded.is_view_wallet());
    }

    #[test]
    fn rejects_wrong_format_version() {
        let primary = SubWallet::new("addr".into(), [1u8; 32], Some([2u8; 32]), 0, 0);
        let sub_wallets = SubWallets::new([3u8; 32], primary);
        let sync_status = SynchronizationStatus::new();
        let mut json: serde_json::Value = serde_json::from_str(&serialize(&sub_wallets, &sync_status)).unwrap();
        json["walletFileFormatVersion"] = serde_json::json!(9999);
        assert!(deserialize(&json.to_string()).is_err());
    }

    #[test]
    fn rejects_malformed_hex_keys() {
        let primary = SubWallet::new("addr".into(), [1u8; 32], Some([2u8; 32]), 0, 0);
        let sub_wallets = SubWallets::new([3u8; 32], primary);
        let sync_status = SynchronizationStatus::new();
        let mut json: serde_json::Value = serde_json::from_str(&serialize(&sub_wallets, &sync_status)).unwrap();
        json["subWallets"]["privateViewKey"] = serde_json::json!("zz");
        assert!(deserialize(&json.to_string()).is_err());
    }
}
