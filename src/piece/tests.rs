use super::*;
use bytes::Bytes;

#[test]
fn test_piece_set_basics() {
    let mut set = PieceSet::empty(100);
    assert!(!set.has(0));
    assert_eq!(set.held(), 0);

    set.mark_acquired(0);
    set.mark_acquired(99);
    assert!(set.has(0));
    assert!(set.has(99));
    assert_eq!(set.held(), 2);

    // out of range is silently ignored
    set.mark_acquired(100);
    assert_eq!(set.held(), 2);
    assert!(!set.has(100));
}

#[test]
fn test_marking_is_idempotent() {
    let mut set = PieceSet::empty(8);
    set.mark_acquired(3);
    set.mark_acquired(3);
    assert_eq!(set.held(), 1);
}

#[test]
fn test_full_clears_spare_bits() {
    let set = PieceSet::full(10);
    assert!(set.is_complete());
    assert_eq!(set.held(), 10);
    assert_eq!(set.missing().count(), 0);
}

#[test]
fn test_missing_ascending() {
    let mut set = PieceSet::empty(5);
    set.mark_acquired(1);
    set.mark_acquired(3);
    let missing: Vec<u32> = set.missing().collect();
    assert_eq!(missing, vec![0, 2, 4]);
}

#[test]
fn test_encode_decode_round_trip() {
    let mut set = PieceSet::empty(12);
    for piece in [0, 4, 7, 11] {
        set.mark_acquired(piece);
    }

    let blob = set.encode();
    assert_eq!(blob.len(), 12);
    assert_eq!(blob[0], 1);
    assert_eq!(blob[1], 0);

    let decoded = PieceSet::decode(&blob, 12).unwrap();
    assert_eq!(decoded, set);
}

#[test]
fn test_decode_rejects_wrong_length() {
    let err = PieceSet::decode(&[1, 0, 1], 4).unwrap_err();
    assert_eq!(
        err,
        PieceError::LengthMismatch {
            expected: 4,
            actual: 3
        }
    );
}

#[test]
fn test_decode_rejects_bad_symbol() {
    let err = PieceSet::decode(&[1, 0, 2], 3).unwrap_err();
    assert_eq!(err, PieceError::InvalidSymbol(2));
}

#[test]
fn test_memory_store() {
    let store = MemoryStore::empty(3);
    assert_eq!(store.capacity(), 3);
    assert!(!store.contains(1));
    assert!(store.get(1).is_none());

    store.put(1, Bytes::from_static(b"payload"));
    assert!(store.contains(1));
    assert_eq!(store.get(1).unwrap(), Bytes::from_static(b"payload"));
    assert_eq!(store.held(), 1);

    // out of range put is ignored
    store.put(9, Bytes::from_static(b"nope"));
    assert_eq!(store.held(), 1);
}

#[test]
fn test_seeded_store_is_complete() {
    let payloads = vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")];
    let store = MemoryStore::seeded(payloads);
    assert_eq!(store.held(), 2);
    assert_eq!(store.get(0).unwrap(), Bytes::from_static(b"a"));
}

#[test]
fn test_store_clones_share_state() {
    let store = MemoryStore::empty(2);
    let view = store.clone();
    store.put(0, Bytes::from_static(b"x"));
    assert!(view.contains(0));
}
