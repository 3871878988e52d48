//! Concrete data providers.
//!
//! Each provider implements [`crate::core::indicator::IndicatorProvider`]
//! for data access and [`crate::core::health::ProviderProbe`] for the
//! health board. Provider selection happens per indicator in the
//! [`crate::core::service::DataService`], keyed by the registry entry's
//! source.

pub mod fred;
pub mod quotes;
