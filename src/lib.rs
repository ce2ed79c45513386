pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;

pub use self::config::Config;
