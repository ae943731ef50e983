//! Directory client implementations.

mod static_client;

pub use static_client::StaticDirectoryClient;
