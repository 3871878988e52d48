//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod correlation;
pub mod error;
pub mod freshness;
pub mod health;
pub mod indicator;
pub mod log;
pub mod resilience;
pub mod service;

// Re-export main types for cleaner imports
pub use error::ProviderError;
pub use indicator::{IndicatorProvider, IndicatorSpec, MetricDataPoint, MetricValue};
pub use service::DataService;
