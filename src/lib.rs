pub mod client;
pub mod config;
pub mod db;
pub mod extract;
pub mod pipeline;
pub mod records;
pub mod transform;

/// Application name for XDG paths
pub const APP_NAME: &str = "paddock";
