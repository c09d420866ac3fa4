pub mod serde_ptr;
