//! Infrastructure adapters: sea-orm persistence and directory clients.

pub mod directory;
pub mod storage;
