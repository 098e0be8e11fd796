//! One-time initialization primitives.
//!
//! This module provides synchronization primitives for one-time initialization:
//!
//! - [`Once`] - Ensures a piece of code is executed exactly once (from `parking_lot`)
//! - [`OnceCell`] - A cell that can be written to only once (from `std::sync::OnceLock`)
//!
//! **Note:** `Once` is re-exported from the `parking_lot` crate for high performance.
//! `OnceCell` is re-exported from `std::sync::OnceLock` since `parking_lot` does not
//! provide a `OnceCell` type. Both provide thread-safe one-time initialization.
//!
//! These primitives are useful for:
//! - Global configuration initialization
//! - Singleton pattern implementation
//! - Lazy static values
//! - One-time setup operations
//!
//! # Examples
//!
//! ## Using `Once` for one-time initialization
//!
//! ```
//! use taskloom::Once;
//!
//! static INIT: Once = Once::new();
//!
//! INIT.call_once(|| {
//!     // This code runs only once, even if called from multiple threads
//!     println!("Initializing...");
//! });
//! ```
//!
//! ## Using `OnceCell` for lazy initialization
//!
//! ```
//! use taskloom::OnceCell;
//!
//! let cell = OnceCell::new();
//!
//! // First access initializes the value
//! let value = cell.get_or_init(|| {
//!     expensive_computation()
//! });
//!
//! // Subsequent accesses return the same value
//! let same_value = cell.get().unwrap();
//! # fn expensive_computation() -> i32 { 42 }
//! ```

// Re-export Once from parking_lot
pub use parking_lot::Once;

// Re-export std::sync::OnceLock as OnceCell
// Note: parking_lot does not provide OnceCell, so we use std::sync::OnceLock (Rust 1.70+)
// which provides equivalent thread-safe lazy initialization functionality.
pub use std::sync::OnceLock as OnceCell;
