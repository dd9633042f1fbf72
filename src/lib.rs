pub mod app;
pub mod auth;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod rows;
pub mod seed;
pub mod sql;
pub mod store;
pub mod tenant;
pub mod tls;
pub mod wire;
