pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod rate_limit;
pub mod state;
