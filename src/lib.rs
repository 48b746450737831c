pub mod alerts;
pub mod api;
pub mod config;
pub mod models;
pub mod monitor;
pub mod response_store;
pub mod rooms;
pub mod snapshot_cache;
pub mod tuya;
