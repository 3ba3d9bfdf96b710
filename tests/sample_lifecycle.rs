//! End-to-end sample lifecycle tests
//!
//! Create, stream, read back, replace and delete samples through the public API

use sample_store::{
    Layout, RamDevice, SampleHandle, SampleStore, SampleStoreBuilder, SampleType, StoreError,
    BLOCK_SIZE,
};

fn store() -> SampleStore<RamDevice> {
    SampleStoreBuilder::new().build_in_memory().unwrap()
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

fn write_sample(store: &mut SampleStore<RamDevice>, id: u8, data: &[u8]) -> SampleHandle {
    let mut handle = SampleHandle::new();
    store
        .new_sample(&mut handle, id, SampleType::Raw, data.len() as u32)
        .unwrap();
    for &byte in data {
        store.write_serial(&mut handle, byte).unwrap();
    }
    handle
}

#[test]
fn test_index_entry_round_trip() {
    let mut store = store();

    let mut handle = SampleHandle::new();
    store
        .new_sample(&mut handle, 17, SampleType::Dpcm, 123_456)
        .unwrap();

    let mut loaded = SampleHandle::new();
    store.load(&mut loaded, 17).unwrap();
    assert_eq!(loaded.sample_type(), SampleType::Dpcm);
    assert_eq!(loaded.size(), 123_456);
    assert_eq!(loaded.first_block(), handle.first_block());
    assert_eq!(loaded.current_block(), handle.first_block());
    assert_eq!(loaded.bytes_done(), 0);
}

#[test]
fn test_byte_stream_fidelity() {
    for len in [1usize, BLOCK_SIZE, 2500] {
        let mut store = store();
        let data = pattern(len, len as u8);
        let mut handle = write_sample(&mut store, 0, &data);

        store.reset(&mut handle);
        let read: Vec<u8> = (0..len).map(|_| store.read_byte(&mut handle).unwrap()).collect();
        assert_eq!(read, data, "mismatch for {} bytes", len);
    }
}

#[test]
fn test_load_then_read_matches_write() {
    let mut store = store();
    let data = pattern(5000, 3);
    write_sample(&mut store, 42, &data);

    let mut handle = SampleHandle::new();
    store.load(&mut handle, 42).unwrap();
    let read: Vec<u8> = (0..data.len())
        .map(|_| store.read_byte(&mut handle).unwrap())
        .collect();
    assert_eq!(read, data);
}

#[test]
fn test_2500_byte_scenario() {
    let mut store = store();
    let free_before = store.free_blocks().unwrap();

    let data = pattern(2500, 9);
    let handle = write_sample(&mut store, 7, &data);

    let chain = store.chain(7).unwrap();
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[0], handle.first_block());
    assert_eq!(handle.current_block(), chain[2]);
    assert_eq!(handle.current_position(), 452);
    assert!(store.occupied(7).unwrap());
    assert_eq!(store.free_blocks().unwrap(), free_before - 3);

    store.delete(7).unwrap();
    assert!(!store.occupied(7).unwrap());
    for block in chain {
        assert!(!store.is_allocated(block).unwrap());
    }
    assert_eq!(store.free_blocks().unwrap(), free_before);
}

#[test]
fn test_delete_exactness() {
    for size in [1usize, 1023, 1024, 1025, 4096, 10_000] {
        let mut store = store();
        let free_before = store.free_blocks().unwrap();

        write_sample(&mut store, 1, &pattern(size, 0));
        let expected_blocks = (size + BLOCK_SIZE - 1) / BLOCK_SIZE;
        assert_eq!(
            (free_before - store.free_blocks().unwrap()) as usize,
            expected_blocks,
            "size {}",
            size
        );

        store.delete(1).unwrap();
        assert_eq!(store.free_blocks().unwrap(), free_before, "size {}", size);
    }
}

#[test]
fn test_implicit_replace_does_not_leak() {
    let mut store = store();
    let free_before = store.free_blocks().unwrap();

    write_sample(&mut store, 5, &pattern(6000, 1));
    assert_eq!(free_before - store.free_blocks().unwrap(), 6);

    let replacement = pattern(1500, 2);
    write_sample(&mut store, 5, &replacement);
    assert_eq!(free_before - store.free_blocks().unwrap(), 2);

    let mut handle = SampleHandle::new();
    store.load(&mut handle, 5).unwrap();
    assert_eq!(handle.size(), 1500);
    let read: Vec<u8> = (0..1500).map(|_| store.read_byte(&mut handle).unwrap()).collect();
    assert_eq!(read, replacement);
}

#[test]
fn test_interleaved_writers() {
    let mut store = store();
    let a = pattern(3000, 11);
    let b = pattern(2000, 77);

    let mut ha = SampleHandle::new();
    let mut hb = SampleHandle::new();
    store
        .new_sample(&mut ha, 0, SampleType::Raw, a.len() as u32)
        .unwrap();
    store
        .new_sample(&mut hb, 1, SampleType::Raw, b.len() as u32)
        .unwrap();

    for i in 0..a.len().max(b.len()) {
        if let Some(&byte) = a.get(i) {
            store.write_serial(&mut ha, byte).unwrap();
        }
        if let Some(&byte) = b.get(i) {
            store.write_serial(&mut hb, byte).unwrap();
        }
    }

    store.reset(&mut ha);
    store.reset(&mut hb);
    let read_a: Vec<u8> = (0..a.len()).map(|_| store.read_byte(&mut ha).unwrap()).collect();
    let read_b: Vec<u8> = (0..b.len()).map(|_| store.read_byte(&mut hb).unwrap()).collect();
    assert_eq!(read_a, a);
    assert_eq!(read_b, b);
}

#[test]
fn test_clear_all_frees_everything() {
    let mut store = store();
    for id in 0..10 {
        write_sample(&mut store, id, &pattern(3000, id));
    }
    assert_eq!(store.list().unwrap().len(), 10);

    store.clear_all().unwrap();
    assert!(store.list().unwrap().is_empty());
    assert_eq!(store.free_blocks().unwrap(), store.data_blocks());
}

#[test]
fn test_api_boundary_checks() {
    let mut store = store();
    let mut handle = SampleHandle::new();

    assert!(matches!(
        store.new_sample(&mut handle, 100, SampleType::Raw, 0),
        Err(StoreError::InvalidSampleId(100))
    ));
    assert!(matches!(
        store.occupied(200),
        Err(StoreError::InvalidSampleId(200))
    ));
    assert!(matches!(store.delete(3), Err(StoreError::EmptySlot(3))));
    assert!(matches!(
        store.free_block(1023),
        Err(StoreError::InvalidBlock(1023))
    ));
}

#[test]
fn test_store_fills_up_cleanly() {
    let layout = Layout::new(0, 2848 + 4 * 1024).unwrap();
    let mut store = SampleStore::new(RamDevice::new(layout.capacity()), layout).unwrap();
    store.clear_all().unwrap();

    write_sample(&mut store, 0, &pattern(3 * BLOCK_SIZE, 0));
    write_sample(&mut store, 1, &pattern(10, 0));

    let mut handle = SampleHandle::new();
    assert!(matches!(
        store.new_sample(&mut handle, 2, SampleType::Raw, 10),
        Err(StoreError::OutOfSpace)
    ));
    assert!(!store.occupied(2).unwrap());

    // Replacing an existing slot frees its blocks first
    store
        .new_sample(&mut handle, 1, SampleType::Raw, 10)
        .unwrap();
    assert!(store.occupied(1).unwrap());
}
