use proptest::prelude::*;

use npw_script::chunk::decode_script;
use npw_script::{Script, ScriptKind};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn script_hex_roundtrip(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let script = Script::from_bytes(&data);
        let script2 = Script::from_hex(&script.to_hex()).unwrap();
        prop_assert_eq!(script.to_bytes(), script2.to_bytes());
    }

    #[test]
    fn push_roundtrip(data in prop::collection::vec(any::<u8>(), 1..700)) {
        let mut script = Script::new();
        script.append_push_data(&data).unwrap();
        let chunks = script.chunks().unwrap();
        prop_assert_eq!(chunks.len(), 1);
        prop_assert_eq!(chunks[0].data(), Some(&data[..]));
        prop_assert!(script.is_push_only());
    }

    #[test]
    fn parsed_chunks_reencode_to_same_bytes(data in prop::collection::vec(any::<u8>(), 0..256)) {
        // Only scripts that parse; truncated pushes are rejected by decode.
        if let Ok(chunks) = decode_script(&data) {
            let script = Script::from_chunks(&chunks);
            prop_assert_eq!(script.to_bytes(), &data[..]);
        }
    }

    #[test]
    fn classify_never_panics(data in prop::collection::vec(any::<u8>(), 0..128)) {
        let kind = Script::from_bytes(&data).classify();
        if kind == ScriptKind::PublicKeyHashOut {
            prop_assert!(Script::from_bytes(&data).public_key_hash().is_some());
        }
    }

    #[test]
    fn remove_codeseparators_is_idempotent(data in prop::collection::vec(any::<u8>(), 0..128)) {
        let once = Script::from_bytes(&data).remove_codeseparators();
        prop_assert_eq!(once.remove_codeseparators(), once);
    }
}
