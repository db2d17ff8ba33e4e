pub mod analyzers;
pub mod config;
pub mod congestion;
pub mod error;
pub mod loader;
pub mod outliers;
pub mod output;
pub mod parser;
pub mod record;
pub mod stats;
