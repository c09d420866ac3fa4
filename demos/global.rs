//! Run ordinary std collections on top of the program-break heap.

use std::collections::BTreeMap;

use wilderness::{GlobalHeap, WILDERNESS};

#[global_allocator]
static GLOBAL: &GlobalHeap = &WILDERNESS;

fn main() {
    let mut words: BTreeMap<String, usize> = BTreeMap::new();
    let text = "the quick brown fox jumps over the lazy dog the end";
    for word in text.split_whitespace() {
        *words.entry(word.to_owned()).or_default() += 1;
    }

    let mut squares: Vec<u64> = Vec::new();
    for i in 0..50_000 {
        squares.push(i * i);
    }
    let total: u64 = squares.iter().sum();
    drop(squares);

    let stats = WILDERNESS.stats();
    println!("{words:?}");
    println!("sum of squares: {total}");
    println!(
        "blocks: {} ({} free), bytes: {} ({} free), metadata: {}",
        stats.allocated_blocks,
        stats.free_blocks,
        stats.allocated_bytes,
        stats.free_bytes,
        stats.metadata_bytes
    );
}
