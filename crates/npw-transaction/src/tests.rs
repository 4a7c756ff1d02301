//! Tests for the npw-transaction crate.
//!
//! Covers wire parsing against historical transactions, the assembler's
//! fee and change computation, serialization checks, signing of the npw
//! fixture, lock time, canonical ordering and the field-map form.

use crate::config::FeePolicy;
use crate::input::{Input, InputKind, DEFAULT_SEQUENCE_NUMBER};
use crate::output::TransactionOutput;
use crate::sighash::SIGHASH_ALL;
use crate::transaction::{LockTime, SerializeOptions, Transaction, TransactionObject};
use crate::unspent::UnspentOutput;
use crate::TransactionError;
use npw_primitives::ec::PrivateKey;
use npw_script::{Address, Network, Script};

// -----------------------------------------------------------------------
// Fixtures
// -----------------------------------------------------------------------

/// Block 170: the first transaction spending a coinbase output.
const BLOCK_170_TX: &str = "0100000001c997a5e56e104102fa209c6a852dd90660a20b2d9c352423edce25857fcd3704000000004847304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c61548ab5fb8cd410220181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d0901ffffffff0200ca9a3b00000000434104ae1a62fe09c5f51b13905f07f06b99a2f7159b2225f374cd378d71302fa28414e7aab37397f554a7df5f142c21c1b7303b8a0626f1baded5c72a704f7e6cd84cac00286bee0000000043410411db93e1dcdb8a016b49840f8c53bc1eb68a382e97b1482ecad7b148a6909a5cb2e0eaddfb84ccf9744464f82e160bfa9b8b64f9d4c03f999b8643f656b412a3ac00000000";
const BLOCK_170_ID: &str = "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16";

/// The genesis coinbase.
const GENESIS_TX: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";
const GENESIS_ID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

const WIF: &str = "YMx7NHhRHZr7khqwarzFhgz4tVuuTereTeYRneQxG7eqRAzuHWGq";
const UTXO_ID: &str = "66e64ef8a3b384164b78453fa8c8194de9a473ba14f89485a0e433699daec140";
const TO_ADDRESS: &str = "6GhRctxkEzLP8tz3akYech9PMs5J3DZEL9";

fn key() -> PrivateKey {
    PrivateKey::from_wif(WIF).unwrap().0
}

fn from_address() -> Address {
    Address::from_public_key(&key().pub_key(), &Network::mainnet())
}

fn to_address() -> Address {
    Address::from_string(TO_ADDRESS).unwrap()
}

/// The 1,000,000 satoshi output owned by the fixture key.
fn utxo() -> UnspentOutput {
    UnspentOutput::from_hex_id(UTXO_ID, 0, from_address().to_script(), 1_000_000).unwrap()
}

fn funded() -> Transaction {
    let mut tx = Transaction::new();
    tx.from(&utxo()).unwrap();
    tx
}

// -----------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------

/// Parse and re-serialize block 170 byte for byte.
#[test]
fn test_from_hex_roundtrip() {
    let tx = Transaction::from_hex(BLOCK_170_TX).expect("should parse block 170 tx");
    assert_eq!(tx.version(), 1);
    assert_eq!(tx.input_count(), 1);
    assert_eq!(tx.output_count(), 2);
    assert_eq!(tx.lock_time(), 0);
    assert_eq!(tx.outputs()[0].satoshis, 1_000_000_000);
    assert_eq!(tx.outputs()[1].satoshis, 4_000_000_000);
    assert_eq!(tx.inputs()[0].kind(), &InputKind::Unclassified);
    assert_eq!(tx.inputs()[0].sequence_number, DEFAULT_SEQUENCE_NUMBER);

    assert_eq!(tx.to_hex(), BLOCK_170_TX);
    assert_eq!(tx.to_string(), BLOCK_170_TX);
    assert_eq!(tx.size(), BLOCK_170_TX.len() / 2);
}

#[test]
fn test_tx_id() {
    let tx = Transaction::from_hex(BLOCK_170_TX).unwrap();
    assert_eq!(tx.id(), BLOCK_170_ID);
    assert!(!tx.is_coinbase());
}

/// The genesis coinbase has a null outpoint and pays no fee.
#[test]
fn test_is_coinbase() {
    let tx = Transaction::from_hex(GENESIS_TX).unwrap();
    assert!(tx.is_coinbase());
    assert!(tx.inputs()[0].is_null());
    assert_eq!(tx.id(), GENESIS_ID);
    assert_eq!(tx.get_fee(), 0);
    assert!(tx.verify().is_ok());
    assert_eq!(tx.serialize(SerializeOptions::default()).unwrap(), GENESIS_TX);
}

#[test]
fn test_trailing_bytes_error() {
    let mut bytes = hex::decode(BLOCK_170_TX).unwrap();
    bytes.push(0x00);
    assert!(matches!(
        Transaction::from_bytes(&bytes),
        Err(TransactionError::MalformedEncoding(_))
    ));
}

#[test]
fn test_invalid_hex_error() {
    assert!(matches!(
        Transaction::from_hex("zz"),
        Err(TransactionError::MalformedEncoding(_))
    ));
}

#[test]
fn test_truncated_and_empty_bytes_error() {
    assert!(Transaction::from_bytes(&[]).is_err());
    let bytes = hex::decode(BLOCK_170_TX).unwrap();
    assert!(Transaction::from_bytes(&bytes[..bytes.len() - 1]).is_err());
}

/// A count far larger than the remaining bytes fails cleanly.
#[test]
fn test_huge_input_count_is_malformed() {
    let bytes = hex::decode("01000000ffffffffffffffffff").unwrap();
    assert!(matches!(
        Transaction::from_bytes(&bytes),
        Err(TransactionError::MalformedEncoding(_))
    ));
}

#[test]
fn test_empty_transaction_serialization() {
    let tx = Transaction::new();
    assert_eq!(tx.to_hex(), "01000000000000000000");
    assert_eq!(tx.size(), 10);
}

// -----------------------------------------------------------------------
// Hash cache
// -----------------------------------------------------------------------

/// Every mutation drops the cached id.
#[test]
fn test_id_follows_mutations() {
    let mut tx = funded();
    tx.to(&to_address(), 990_000);
    let before = tx.id();

    tx.set_lock_time(7);
    let locked = tx.id();
    assert_ne!(before, locked);

    tx.set_lock_time(0);
    assert_eq!(tx.id(), before);

    tx.add_output(TransactionOutput::new(1, Script::from_hex("51").unwrap()));
    assert_ne!(tx.id(), before);
}

#[test]
fn test_clone_and_eq_ignore_cache() {
    let tx = Transaction::from_hex(BLOCK_170_TX).unwrap();
    let fresh = Transaction::from_hex(BLOCK_170_TX).unwrap();
    let _ = tx.id();
    assert_eq!(tx, fresh);
    assert_eq!(tx.clone().id(), fresh.id());
}

// -----------------------------------------------------------------------
// Building, fees and change
// -----------------------------------------------------------------------

#[test]
fn test_new_transaction() {
    let tx = Transaction::new();
    assert_eq!(tx.version(), 1);
    assert_eq!(tx.input_count(), 0);
    assert_eq!(tx.output_count(), 0);
    assert_eq!(tx.lock_time(), 0);
    assert_eq!(tx.fee_policy(), &FeePolicy::default());
    assert!(tx.locked_until().is_none());
}

/// Spending the same outpoint twice is a no-op.
#[test]
fn test_duplicate_from_ignored() {
    let mut tx = funded();
    tx.from(&utxo()).unwrap();
    tx.from_many(&[utxo(), utxo()]).unwrap();
    assert_eq!(tx.input_count(), 1);
    assert_eq!(tx.input_amount().unwrap(), 1_000_000);
}

/// 26 bytes of framing, one 148 byte signed input and one 34 byte output.
#[test]
fn test_estimate_size_and_fee() {
    let mut tx = funded();
    tx.to(&to_address(), 500_000);
    assert_eq!(tx.estimate_size(), 26 + 148 + 34);
    assert_eq!(tx.estimate_fee(), 10_000);
    // no change address: the whole remainder is fee
    assert_eq!(tx.get_fee(), 500_000);
}

/// Inputs always equal outputs plus the fee once change is computed.
#[test]
fn test_change_output_conserves_value() {
    let mut tx = funded();
    tx.to(&to_address(), 500_000).change(&from_address());

    assert_eq!(tx.output_count(), 2);
    assert_eq!(tx.change_index(), Some(1));
    let change = tx.change_output().unwrap();
    assert_eq!(change.satoshis, 490_000);
    assert_eq!(change.locking_script, from_address().to_script());
    assert_eq!(tx.get_fee(), 10_000);
    assert_eq!(tx.input_amount().unwrap(), tx.output_amount() + tx.get_fee());
}

#[test]
fn test_change_follows_explicit_fee_and_rate() {
    let mut tx = funded();
    tx.to(&to_address(), 500_000).change(&from_address());

    tx.fee(20_000);
    assert_eq!(tx.change_output().unwrap().satoshis, 480_000);
    assert_eq!(tx.output_count(), 2);

    let mut by_rate = funded();
    by_rate
        .to(&to_address(), 500_000)
        .change(&from_address())
        .set_fee_policy(FeePolicy::new().with_fee_per_kb(30_000));
    assert_eq!(by_rate.change_output().unwrap().satoshis, 470_000);

    by_rate.fee_per_kb(5_000);
    assert_eq!(by_rate.change_output().unwrap().satoshis, 495_000);
}

/// A change amount below the dust threshold is left to the fee.
#[test]
fn test_dust_change_omitted() {
    let mut tx = funded();
    tx.to(&to_address(), 989_700).change(&from_address());
    assert_eq!(tx.output_count(), 1);
    assert!(tx.change_output().is_none());
    assert!(tx.change_index().is_none());

    // the dropped change is part of the fee
    assert_eq!(tx.get_fee(), 10_300);
    assert_eq!(
        tx.input_amount().unwrap(),
        tx.output_amount() + tx.get_fee()
    );

    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    assert_eq!(tx.get_fee(), 10_300);
    assert!(tx.serialize(SerializeOptions::default()).is_ok());
}

/// Without a change address the whole remainder is fee.
#[test]
fn test_fee_without_change_is_remainder() {
    let mut tx = funded();
    tx.to(&to_address(), 985_000);
    assert_eq!(tx.get_fee(), 15_000);
    assert_eq!(Transaction::new().get_fee(), 0);
}

/// Change is recomputed when outputs are added or removed.
#[test]
fn test_change_recomputed_on_output_changes() {
    let mut tx = funded();
    tx.to(&to_address(), 500_000).change(&from_address());

    tx.to(&to_address(), 100_000);
    assert_eq!(tx.output_count(), 3);
    assert_eq!(tx.change_index(), Some(2));
    assert_eq!(tx.change_output().unwrap().satoshis, 390_000);

    tx.remove_output(0).unwrap();
    assert_eq!(tx.output_count(), 2);
    assert_eq!(tx.outputs()[0].satoshis, 100_000);
    assert_eq!(tx.change_output().unwrap().satoshis, 890_000);

    tx.clear_outputs();
    assert_eq!(tx.output_count(), 1);
    assert_eq!(tx.change_output().unwrap().satoshis, 990_000);

    assert!(tx.remove_output(5).is_err());
}

#[test]
fn test_data_output() {
    let mut tx = funded();
    tx.add_data(b"hello").unwrap().change(&from_address());
    assert_eq!(tx.outputs()[0].satoshis, 0);
    assert!(tx.outputs()[0].locking_script.is_data_out());
    assert_eq!(tx.change_output().unwrap().satoshis, 990_000);

    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    assert!(tx.serialize(SerializeOptions::default()).is_ok());
}

#[test]
fn test_remove_input_clears_signatures() {
    let mut tx = funded();
    let mut second = utxo();
    second.output_index = 1;
    tx.from(&second).unwrap().to(&to_address(), 1_990_000);
    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    assert!(tx.is_fully_signed());

    tx.remove_input(1).unwrap();
    assert_eq!(tx.input_count(), 1);
    assert!(!tx.is_fully_signed());
    assert!(tx.remove_input(3).is_err());
}

// -----------------------------------------------------------------------
// Serialization checks
// -----------------------------------------------------------------------

#[test]
fn test_insufficient_funds() {
    let mut tx = funded();
    tx.to(&to_address(), 1_000_001);
    match tx.serialize(SerializeOptions::default()) {
        Err(TransactionError::InsufficientFunds { inputs, outputs }) => {
            assert_eq!(inputs, 1_000_000);
            assert_eq!(outputs, 1_000_001);
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }
}

#[test]
fn test_missing_signatures() {
    let mut tx = funded();
    tx.to(&to_address(), 990_000);
    match tx.serialize(SerializeOptions::default()) {
        Err(TransactionError::MissingSignatures(indices)) => assert_eq!(indices, vec![0]),
        other => panic!("expected MissingSignatures, got {:?}", other),
    }
    assert!(tx.serialize(SerializeOptions::partial()).is_ok());
}

#[test]
fn test_dust_output_rejected() {
    let mut tx = funded();
    tx.to(&to_address(), 500).to(&to_address(), 989_500);
    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    match tx.serialize(SerializeOptions::default()) {
        Err(TransactionError::DustOutput {
            index,
            satoshis,
            threshold,
        }) => {
            assert_eq!(index, 0);
            assert_eq!(satoshis, 500);
            assert_eq!(threshold, 546);
        }
        other => panic!("expected DustOutput, got {:?}", other),
    }
    let opts = SerializeOptions {
        disable_dust_outputs: true,
        ..SerializeOptions::default()
    };
    assert!(tx.serialize(opts).is_ok());
}

#[test]
fn test_large_fee_without_change() {
    let mut tx = funded();
    tx.to(&to_address(), 1_000).fee_per_kb(1_000);
    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    match tx.serialize(SerializeOptions::default()) {
        Err(TransactionError::FeeError(msg)) => assert!(msg.contains("no change address")),
        other => panic!("expected FeeError, got {:?}", other),
    }
    let opts = SerializeOptions {
        disable_large_fees: true,
        ..SerializeOptions::default()
    };
    assert!(tx.serialize(opts).is_ok());
}

#[test]
fn test_explicit_fee_must_match_unspent() {
    let mut tx = funded();
    tx.to(&to_address(), 990_000).fee(5_000);
    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    assert!(matches!(
        tx.serialize(SerializeOptions::default()),
        Err(TransactionError::FeeError(_))
    ));
    tx.fee(10_000);
    assert!(tx.serialize(SerializeOptions::default()).is_ok());
}

#[test]
fn test_invalid_amount_rejected() {
    let mut tx = funded();
    tx.add_output(TransactionOutput::new(
        crate::MAX_MONEY + 1,
        to_address().to_script(),
    ));
    assert!(matches!(
        tx.serialize(SerializeOptions::default()),
        Err(TransactionError::InvalidAmount(_))
    ));
    assert!(tx.serialize(SerializeOptions::unchecked()).is_ok());
    assert_eq!(tx.unchecked_serialize(), tx.to_hex());
}

/// Fee checks need the amounts of the spent outputs.
#[test]
fn test_checks_require_utxo_info() {
    let tx = Transaction::from_hex(BLOCK_170_TX).unwrap();
    assert!(!tx.has_all_utxo_info());
    assert!(matches!(
        tx.input_amount(),
        Err(TransactionError::InvalidTransaction(_))
    ));
    assert!(matches!(
        tx.serialize(SerializeOptions::default()),
        Err(TransactionError::InvalidTransaction(_))
    ));
    let opts = SerializeOptions {
        disable_more_output_than_input: true,
        disable_large_fees: true,
        disable_small_fees: true,
        ..SerializeOptions::default()
    };
    assert_eq!(tx.serialize(opts).unwrap(), BLOCK_170_TX);
}

// -----------------------------------------------------------------------
// Signing the npw fixture
// -----------------------------------------------------------------------

/// Spend the whole fixture output with no fee, sign, and parse it back.
#[test]
fn test_fixture_end_to_end() {
    let mut tx = funded();
    tx.to(&to_address(), 1_000_000).fee(0);
    assert!(!tx.is_fully_signed());

    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    assert!(tx.is_fully_signed());
    let input = &tx.inputs()[0];
    assert!(input.unlocking_script().is_public_key_hash_in());
    assert!(input.unlocking_script().len() <= 107);
    assert!(tx.size() <= tx.estimate_size());

    // a zero fee is below the minimum relay fee
    assert!(matches!(
        tx.serialize(SerializeOptions::default()),
        Err(TransactionError::FeeError(_))
    ));
    let opts = SerializeOptions {
        disable_small_fees: true,
        ..SerializeOptions::default()
    };
    let hex_str = tx.serialize(opts).unwrap();

    let parsed = Transaction::from_hex(&hex_str).unwrap();
    assert_eq!(parsed.id(), tx.id());
    assert_eq!(parsed.inputs()[0].unlocking_script(), input.unlocking_script());
    assert_eq!(parsed.outputs(), tx.outputs());
}

/// A P2PKH unlocking script never exceeds 107 bytes, and reaches it when
/// the signature's r has its high bit set and needs a padding byte.
#[test]
fn test_signed_size_bound_is_tight() {
    let mut largest = 0;
    for n in 0..32u64 {
        let mut tx = funded();
        tx.to(&to_address(), 990_000 - n).fee(10_000 + n);
        tx.sign(&[key()], SIGHASH_ALL).unwrap();
        let len = tx.inputs()[0].unlocking_script().len();
        assert!(len <= 107, "unlocking script of {} bytes", len);
        assert!(tx.size() <= tx.estimate_size());
        largest = largest.max(len);
    }
    assert_eq!(largest, 107);
}

#[test]
fn test_signed_with_change_serializes() {
    let mut tx = funded();
    tx.to(&to_address(), 500_000).change(&from_address());
    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    assert!(tx.is_fully_signed());
    assert!(tx.serialize(SerializeOptions::default()).is_ok());
    assert!(tx.verify().is_ok());
}

/// Resetting the change address clears signatures; they no longer commit
/// to the outputs.
#[test]
fn test_change_update_clears_signatures() {
    let mut tx = funded();
    tx.to(&to_address(), 500_000).change(&from_address());
    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    tx.change(&to_address());
    assert!(!tx.is_fully_signed());
}

/// Adding an output after signing drops the signatures it invalidates.
#[test]
fn test_output_after_signing_clears_signatures() {
    let mut tx = funded();
    tx.to(&to_address(), 500_000);
    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    assert!(tx.is_fully_signed());

    tx.to(&to_address(), 480_000);
    assert!(!tx.is_fully_signed());
    assert!(tx.inputs()[0].unlocking_script().is_empty());
    assert!(matches!(
        tx.serialize(SerializeOptions::default()),
        Err(TransactionError::MissingSignatures(_))
    ));

    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    assert!(tx.serialize(SerializeOptions::default()).is_ok());
    assert!(tx.verify().is_ok());
}

#[test]
fn test_removing_output_after_signing_clears_signatures() {
    let mut tx = funded();
    tx.to(&to_address(), 500_000).to(&to_address(), 480_000);
    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    tx.remove_output(1).unwrap();
    assert!(!tx.is_fully_signed());

    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    tx.clear_outputs();
    assert!(!tx.is_fully_signed());
}

#[test]
fn test_header_changes_after_signing_clear_signatures() {
    let mut tx = funded();
    tx.to(&to_address(), 990_000);
    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    tx.lock_until_block_height(100).unwrap();
    assert!(!tx.is_fully_signed());
    assert!(matches!(
        tx.serialize(SerializeOptions::default()),
        Err(TransactionError::MissingSignatures(_))
    ));

    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    tx.set_version(2);
    assert!(!tx.is_fully_signed());

    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    tx.set_lock_time(0);
    assert!(!tx.is_fully_signed());

    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    let mut second = utxo();
    second.output_index = 1;
    tx.from(&second).unwrap();
    assert!(tx.inputs().iter().all(|i| i.unlocking_script().is_empty()));
}

/// Fee settings that leave the bytes unchanged keep signatures.
#[test]
fn test_fee_settings_without_change_keep_signatures() {
    let mut tx = funded();
    tx.to(&to_address(), 990_000);
    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    tx.fee_per_kb(20_000).fee(10_000);
    assert!(tx.is_fully_signed());
    assert!(tx.serialize(SerializeOptions::default()).is_ok());
}

/// Opaque unlocking scripts of unclassified inputs survive mutations.
#[test]
fn test_unclassified_scripts_survive_mutation() {
    let mut tx = Transaction::new();
    tx.add_input(Input::new([7; 32], 0, Script::from_hex("51").unwrap()));
    tx.add_output(TransactionOutput::new(1_000, Script::from_hex("51").unwrap()));
    tx.set_lock_time(5);
    assert_eq!(tx.inputs()[0].unlocking_script().to_hex(), "51");
}

#[test]
fn test_foreign_key_signs_nothing() {
    let mut tx = funded();
    tx.to(&to_address(), 990_000);
    let other = PrivateKey::from_hex(
        "0000000000000000000000000000000000000000000000000000000000000002",
    )
    .unwrap();
    assert!(tx.get_signatures(&other, SIGHASH_ALL).unwrap().is_empty());
    tx.sign(&[other], SIGHASH_ALL).unwrap();
    assert!(!tx.is_fully_signed());
}

#[test]
fn test_apply_signature_checks() {
    let mut tx = funded();
    tx.to(&to_address(), 990_000);
    let mut sigs = tx.get_signatures(&key(), SIGHASH_ALL).unwrap();
    assert_eq!(sigs.len(), 1);
    assert!(tx.is_valid_signature(&sigs[0]));

    let input = tx.inputs()[0].clone();
    let subscript = input.subscript().unwrap();
    assert!(tx.verify_signature(&sigs[0].signature, &sigs[0].public_key, 0, subscript, SIGHASH_ALL));

    let mut stray = sigs[0].clone();
    stray.input_index = 4;
    assert!(!tx.is_valid_signature(&stray));
    assert!(matches!(
        tx.apply_signature(stray),
        Err(TransactionError::InvalidTransaction(_))
    ));

    tx.apply_signature(sigs.remove(0)).unwrap();
    assert!(tx.is_fully_signed());
}

// -----------------------------------------------------------------------
// Lock time
// -----------------------------------------------------------------------

#[test]
fn test_lock_until_block_height() {
    let mut tx = funded();
    tx.lock_until_block_height(1_000).unwrap();
    assert_eq!(tx.lock_time(), 1_000);
    assert_eq!(tx.locked_until(), Some(LockTime::BlockHeight(1_000)));
    assert_eq!(tx.inputs()[0].sequence_number, 0xFFFF_FFFE);
    assert!(tx.lock_until_block_height(500_000_000).is_err());
}

#[test]
fn test_lock_until_date() {
    let mut tx = funded();
    tx.lock_until_date(1_600_000_000).unwrap();
    assert_eq!(tx.locked_until(), Some(LockTime::Timestamp(1_600_000_000)));
    assert!(tx.lock_until_date(1_000).is_err());
}

// -----------------------------------------------------------------------
// Consensus checks
// -----------------------------------------------------------------------

#[test]
fn test_verify() {
    assert!(Transaction::new().verify().is_err());

    let mut tx = funded();
    assert!(tx.verify().is_err(), "no outputs");
    tx.to(&to_address(), 990_000);
    assert!(tx.verify().is_ok());

    let duplicate = tx.inputs()[0].clone();
    tx.add_input(duplicate);
    assert!(matches!(tx.verify(), Err(TransactionError::InvalidTransaction(_))));
}

#[test]
fn test_verify_rejects_null_input_in_regular_tx() {
    let mut tx = funded();
    tx.add_input(Input::new([0; 32], 0xFFFF_FFFF, Script::from_hex("51").unwrap()))
        .to(&to_address(), 1_000);
    assert!(tx.verify().is_err());
}

// -----------------------------------------------------------------------
// Canonical ordering
// -----------------------------------------------------------------------

/// Inputs sort by displayed id, outputs by amount; change is tracked.
#[test]
fn test_sort() {
    let script = from_address().to_script();
    let mut first = [0u8; 32];
    first[0] = 1;
    let mut last = [0u8; 32];
    last[31] = 1;

    let mut tx = Transaction::new();
    tx.from(&UnspentOutput::new(last, 0, script.clone(), 600_000))
        .unwrap()
        .from(&UnspentOutput::new(first, 0, script, 400_000))
        .unwrap()
        .to(&to_address(), 500_000)
        .change(&from_address());
    assert_eq!(tx.change_index(), Some(1));
    tx.sign(&[key()], SIGHASH_ALL).unwrap();

    tx.sort();
    // displayed ids: "00..01" sorts before "01..00"
    assert_eq!(tx.inputs()[0].prev_tx_id, first);
    assert_eq!(tx.inputs()[1].prev_tx_id, last);
    assert_eq!(tx.outputs()[0].satoshis, 490_000);
    assert_eq!(tx.outputs()[1].satoshis, 500_000);
    assert_eq!(tx.change_index(), Some(0));
    assert!(!tx.is_fully_signed());

    tx.sign(&[key()], SIGHASH_ALL).unwrap();
    assert!(tx.serialize(SerializeOptions::default()).is_ok());
}

// -----------------------------------------------------------------------
// Field map and JSON
// -----------------------------------------------------------------------

#[test]
fn test_json_roundtrip() {
    let mut tx = funded();
    tx.to(&to_address(), 500_000).change(&from_address());
    tx.sign(&[key()], SIGHASH_ALL).unwrap();

    let json = tx.to_json().unwrap();
    assert!(json.contains("\"nLockTime\""));
    assert!(json.contains("\"changeScript\""));
    assert!(json.contains(&tx.id()));

    let restored = Transaction::from_json(&json).unwrap();
    assert_eq!(restored, tx);
    assert!(restored.is_fully_signed());
    assert_eq!(restored.change_index(), Some(1));

    let via_serde: Transaction = serde_json::from_str(&serde_json::to_string(&tx).unwrap()).unwrap();
    assert_eq!(via_serde.id(), tx.id());
}

#[test]
fn test_object_rejects_inconsistent_state() {
    let mut tx = funded();
    tx.to(&to_address(), 500_000).change(&from_address());

    let mut wrong_hash: TransactionObject = tx.to_object();
    wrong_hash.hash = "00".repeat(32);
    assert!(matches!(
        Transaction::from_object(&wrong_hash),
        Err(TransactionError::MalformedEncoding(_))
    ));

    let mut wrong_index = tx.to_object();
    wrong_index.change_index = Some(0);
    assert!(matches!(
        Transaction::from_object(&wrong_index),
        Err(TransactionError::MalformedEncoding(_))
    ));

    let mut no_hash = tx.to_object();
    no_hash.hash.clear();
    assert_eq!(Transaction::from_object(&no_hash).unwrap(), tx);
}

/// An explicit fee survives the field map.
#[test]
fn test_object_keeps_fee() {
    let mut tx = funded();
    tx.to(&to_address(), 990_000).fee(10_000);
    let obj = tx.to_object();
    assert_eq!(obj.fee, Some(serde_json::Number::from(10_000u64)));
    let restored = Transaction::from_object(&obj).unwrap();
    assert_eq!(restored.get_fee(), 10_000);
}
