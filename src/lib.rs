pub mod config;
pub mod error;
pub mod link;
pub mod model;
pub mod registry;
pub mod routes;
pub mod server;
