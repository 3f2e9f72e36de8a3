//! Networking for burrow.
//!
//! Blocking gopher transport over TCP, with optional TLS (`gophers://`)
//! via rustls. Address resolution honors the client's IPv6 preference;
//! requests are a single selector line and responses are read to EOF.

pub mod tls;
pub mod transport;

pub use tls::TlsConnector;
pub use transport::Transport;
