// SPDX-License-Identifier: MIT

//! Document loading and structural validation.

pub mod loader;
pub mod schema;
pub mod types;

pub use loader::{load, parse_str, DocumentFormat};
pub use schema::validate_schema;
pub use types::RawDocument;
