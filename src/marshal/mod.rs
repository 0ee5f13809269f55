//! Object ⇄ record conversion
//!
//! - `marshaller.rs` - object to [`NativeEntity`](crate::core::NativeEntity),
//!   including key construction and audit fields
//! - `unmarshaller.rs` - record back to an object through the class's
//!   construction strategy

pub mod marshaller;
pub mod unmarshaller;

pub use marshaller::Marshaller;
pub use unmarshaller::Unmarshaller;

use serde::{Deserialize, Serialize};

/// Why an object is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Insert,
    Update,
    /// Insert when the identifier is unset, update otherwise.
    Upsert,
}
