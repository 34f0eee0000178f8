pub mod config;
pub mod delivery;
pub mod logger;
pub mod validation;
