//! AdPricing Library
//!
//! Ad spend analytics and next-step bid forecasting:
//! CSV table → one-hot + min-max encoding → sliding windows → time split →
//! sequence model lifecycle → regression metrics.

pub mod analytics;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod preprocessing;

#[cfg(feature = "dashboard")]
pub mod dashboard;
