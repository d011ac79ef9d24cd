//! File-backed record store.
//!
//! # Responsibility
//! - Map `(collection, resource)` keys onto `<root>/<collection>/<resource>.json`.
//! - Persist records atomically and serialize mutations per collection.
//!
//! # Invariants
//! - Store root and lock registry are owned by exactly one `Driver`.
//! - Callers keep ownership of their values; the driver only (de)serializes.

mod driver;
pub mod error;
pub mod lock;
pub mod options;
pub mod path;

pub use driver::Driver;
pub use error::{IoOp, NameKind, StoreError, StoreResult};
pub use options::DriverOptions;
