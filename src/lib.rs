pub mod capture;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod ingest;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_utils;
