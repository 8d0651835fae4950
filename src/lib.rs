//! Sweet Shop Manager: catalog, purchasing, inventory, orders, users and settings
//! for a sweet shop, served over HTTP by actix-web.

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod state;
pub mod storage;
pub mod store;
