//! Dashboard API Types
//!
//! DTOs for the JSON endpoints. Aggregate payloads reuse the
//! [`crate::analytics`] structs directly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// `?start=YYYY-MM-DD&end=YYYY-MM-DD`; missing bounds default to the data's range
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RangeQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// GET /api/range payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRangeResponse {
    pub path: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub rows: usize,
    pub loaded_at: i64,
    /// Last load failure, if the data on display is stale or missing
    pub load_error: Option<String>,
}

/// POST /api/reload payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub rows: usize,
    pub loaded_at: i64,
}

// ─────────────────────────────────────────────────────────────────
// API Response wrapper
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
