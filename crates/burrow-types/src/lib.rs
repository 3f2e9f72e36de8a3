//! Foundation types for burrow.
//!
//! This crate contains the types shared by all burrow crates: the
//! Gopherspace item model, gopher URL parsing, client options, and
//! error types.

pub mod error;
pub mod item;
pub mod options;
pub mod url;

pub use error::{BurrowError, Result};
pub use item::{DEFAULT_PORT, Item, ItemType, looks_like_url};
pub use options::{ClientOptions, OPTION_KEYS};
pub use url::{url_to_item, url_to_item_with_default};
