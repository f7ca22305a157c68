pub mod app;
pub mod config;
pub mod credentials;
pub mod environment;
pub mod privilege;
pub mod profile;
pub mod reconcile;
pub mod shared;
pub mod steps;
