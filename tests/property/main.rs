//! Property-based and exhaustive soundness tests.
//!
//! Run with: `cargo test --test property`

mod search_soundness;
