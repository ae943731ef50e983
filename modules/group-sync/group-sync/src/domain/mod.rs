pub mod clock;
pub mod enrich;
pub mod error;
pub mod lease;
pub mod reconcile;
pub mod repo;
pub mod service;
pub mod status;
pub mod visibility;

#[cfg(test)]
mod lease_test;
