use std::slice;

use proptest::prelude::*;
use wilderness::{BlockState, Heap, ReservedBreak};

#[derive(Debug, Clone)]
enum Op {
    Allocate(usize),
    AllocateZeroed(usize, usize),
    Release(usize),
    Reallocate(usize, usize),
}

fn size() -> impl Strategy<Value = usize> {
    prop_oneof![
        8 => 1usize..512,
        3 => 512usize..16_384,
        1 => 100_000usize..300_000,
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => size().prop_map(Op::Allocate),
        1 => (1usize..64, 1usize..64).prop_map(|(n, s)| Op::AllocateZeroed(n, s)),
        3 => any::<usize>().prop_map(Op::Release),
        2 => (any::<usize>(), size()).prop_map(|(i, s)| Op::Reallocate(i, s)),
    ]
}

struct Live {
    ptr: *mut u8,
    len: usize,
    tag: u8,
}

fn stamp(live: &Live) {
    unsafe { live.ptr.write_bytes(live.tag, live.len) };
}

fn intact(live: &Live, len: usize) -> bool {
    let bytes = unsafe { slice::from_raw_parts(live.ptr, len) };
    bytes.iter().all(|&b| b == live.tag)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_workloads_keep_the_heap_consistent(ops in prop::collection::vec(op(), 1..120)) {
        let mut heap = Heap::new(ReservedBreak::new(64 << 20).unwrap());
        let mut live: Vec<Live> = Vec::new();
        let mut tag = 0u8;

        for op in ops {
            tag = tag.wrapping_add(1);
            match op {
                Op::Allocate(len) => {
                    let ptr = heap.allocate(len).unwrap().as_ptr();
                    let block = Live { ptr, len, tag };
                    stamp(&block);
                    live.push(block);
                }
                Op::AllocateZeroed(n, s) => {
                    let ptr = heap.allocate_zeroed(n, s).unwrap().as_ptr();
                    let bytes = unsafe { slice::from_raw_parts(ptr, n * s) };
                    prop_assert!(bytes.iter().all(|&b| b == 0));
                    let block = Live { ptr, len: n * s, tag };
                    stamp(&block);
                    live.push(block);
                }
                Op::Release(i) if !live.is_empty() => {
                    let block = live.swap_remove(i % live.len());
                    prop_assert!(intact(&block, block.len));
                    unsafe { heap.release(block.ptr) };
                }
                Op::Reallocate(i, len) if !live.is_empty() => {
                    let i = i % live.len();
                    let kept = live[i].len.min(len);
                    let ptr = unsafe { heap.reallocate(live[i].ptr, len).unwrap().as_ptr() };
                    live[i].ptr = ptr;
                    prop_assert!(intact(&live[i], kept));
                    live[i].len = len;
                    live[i].tag = tag;
                    stamp(&live[i]);
                }
                _ => {}
            }
            prop_assert_eq!(heap.verify(), Ok(()));
            for block in &live {
                prop_assert!(intact(block, block.len));
            }
        }

        let free: Vec<_> = heap.free_index().collect();
        prop_assert_eq!(free.len(), heap.free_blocks());
        prop_assert_eq!(free.iter().map(|b| b.size).sum::<usize>(), heap.free_bytes());
        prop_assert!(free.iter().all(|b| b.state == BlockState::Free && !b.mapped));

        for block in live.drain(..) {
            unsafe { heap.release(block.ptr) };
        }
        prop_assert_eq!(heap.verify(), Ok(()));
        prop_assert_eq!(heap.mapped().count(), 0);
        prop_assert_eq!(heap.free_bytes() + heap.free_blocks() * heap.header_size(),
            heap.snapshot().break_footprint());
    }

    #[test]
    fn granted_sizes_are_rounded_to_eight(len in 1usize..100_000) {
        let mut heap = Heap::new(ReservedBreak::new(1 << 20).unwrap());
        let ptr = heap.allocate(len).unwrap();
        let granted = unsafe { heap.usable_size(ptr) };
        prop_assert_eq!(granted % 8, 0);
        prop_assert!(granted >= len && granted < len + 8);
        prop_assert_eq!(ptr.as_ptr() as usize % 8, 0);
    }
}
