pub mod dispatcher;
pub mod health;
pub mod provisioning;
pub mod sessions;
