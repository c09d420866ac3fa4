pub mod block;
pub mod config;
pub mod error;
pub mod global;
pub mod heap;
mod index;
pub mod stats;
pub mod walk;
