//! The C surface over the real program break. Everything lives in a single
//! test so nothing else in this binary races on the process heap.

use std::slice;

use wilderness::{externc::*, HEADER_SIZE};

#[test]
fn c_surface_round_trip() {
    assert_eq!(wl_header_size(), HEADER_SIZE);
    assert!(wl_malloc(0).is_null());
    assert!(wl_malloc(100_000_001).is_null());
    assert!(wl_calloc(usize::MAX, 2).is_null());

    let blocks = wl_allocated_blocks();
    let p = wl_malloc(100).cast::<u8>();
    assert!(!p.is_null());
    assert_eq!(p as usize % 8, 0);
    assert_eq!(wl_allocated_blocks(), blocks + 1);
    assert_eq!(wl_metadata_bytes(), wl_allocated_blocks() * HEADER_SIZE);

    unsafe {
        p.write_bytes(0x5a, 100);
        let q = wl_realloc(p.cast(), 3000).cast::<u8>();
        assert!(!q.is_null());
        assert!(slice::from_raw_parts(q, 100).iter().all(|&b| b == 0x5a));

        let z = wl_calloc(16, 16).cast::<u8>();
        assert!(!z.is_null());
        assert!(slice::from_raw_parts(z, 256).iter().all(|&b| b == 0));

        let big_blocks = wl_allocated_blocks();
        let big = wl_malloc(200_000);
        assert!(!big.is_null());
        assert_eq!(wl_allocated_blocks(), big_blocks + 1);
        wl_free(big);
        assert_eq!(wl_allocated_blocks(), big_blocks);

        wl_free(z.cast());
        wl_free(q.cast());
        wl_free(std::ptr::null_mut());
        // `p` started out in the break, so something there is free now
        assert!(wl_free_blocks() >= 1);
        assert!(wl_free_bytes() > 0);
    }
}
