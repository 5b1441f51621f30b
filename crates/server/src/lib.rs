//! HTTP API for the FTSO price service
//!
//! Serves the multi-source price endpoint consumed by the landing page and
//! the oracle feed state used by the dashboard charts

pub mod conversions;
pub mod server;
pub mod service;

pub use server::{HttpServer, HttpServerBuilder, HttpServerConfig};
pub use service::PriceServiceImpl;
