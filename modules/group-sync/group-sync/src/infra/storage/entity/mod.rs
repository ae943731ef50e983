pub mod group;
pub mod managed_group_config;
pub mod membership;
pub mod sync_config;
pub mod sync_lease;
pub mod user;
