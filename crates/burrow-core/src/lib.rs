//! Session logic for the burrow gopher client.
//!
//! Everything between the wire and the prompt lives here: the menu
//! codec, response text decoding, mirror failover, handler resolution,
//! and the navigation engine that ties them together. Nothing in this
//! crate prints to a terminal or spawns a process.

pub mod handler;
pub mod menu;
pub mod mirror;
pub mod nav;
pub mod text;

pub use handler::HandlerResolver;
pub use menu::{Menu, MenuEntry};
pub use mirror::MirrorRegistry;
pub use nav::{HistoryPolicy, NavOutcome, NavigationEngine};
