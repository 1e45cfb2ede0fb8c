pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod model;
pub mod models;
pub mod services;
