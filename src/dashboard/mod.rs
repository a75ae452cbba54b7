//! Dashboard Module
//!
//! JSON API over the loaded ad table. The table lives in an explicit
//! [`DashboardContext`] handed to every handler; `reload` swaps it in place.
//! Only compiled when the `dashboard` feature is enabled.

mod api;
mod types;

pub use api::create_router;
pub use types::*;

use crate::analytics::DateRange;
use crate::data::{AdRecord, Table};
use crate::error::DataError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Records currently on display plus the outcome of the last load
#[derive(Debug, Default)]
pub struct LoadedData {
    pub records: Vec<AdRecord>,
    pub loaded_at: i64,
    pub load_error: Option<String>,
}

#[derive(Debug)]
pub struct DashboardContext {
    path: PathBuf,
    data: RwLock<LoadedData>,
}

fn read_records(path: &Path) -> Result<Vec<AdRecord>, DataError> {
    Table::load(path)?.records()
}

impl DashboardContext {
    /// Load `path`. A failed load leaves the context empty with the error
    /// recorded; the server still starts.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match read_records(&path) {
            Ok(records) => LoadedData {
                records,
                loaded_at: chrono::Utc::now().timestamp_millis(),
                load_error: None,
            },
            Err(e) => {
                warn!("⚠️ Dashboard data unavailable ({}): {}", path.display(), e);
                LoadedData {
                    load_error: Some(e.to_string()),
                    ..LoadedData::default()
                }
            }
        };
        Self {
            path,
            data: RwLock::new(data),
        }
    }

    /// Context over records already in memory
    pub fn from_records(path: impl Into<PathBuf>, records: Vec<AdRecord>) -> Self {
        Self {
            path: path.into(),
            data: RwLock::new(LoadedData {
                records,
                loaded_at: chrono::Utc::now().timestamp_millis(),
                load_error: None,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the source file. On failure the previous records stay in
    /// place and the error is recorded.
    pub async fn reload(&self) -> Result<ReloadResponse, DataError> {
        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || read_records(&path))
            .await
            .unwrap_or_else(|join| {
                Err(DataError::Io {
                    path: self.path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, join.to_string()),
                })
            });

        let mut data = self.data.write().await;
        match result {
            Ok(records) => {
                data.records = records;
                data.loaded_at = chrono::Utc::now().timestamp_millis();
                data.load_error = None;
                info!("🔄 Dashboard reloaded {} rows", data.records.len());
                Ok(ReloadResponse {
                    rows: data.records.len(),
                    loaded_at: data.loaded_at,
                })
            }
            Err(e) => {
                warn!("⚠️ Dashboard reload failed: {}", e);
                data.load_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn data_range(&self) -> DataRangeResponse {
        let data = self.data.read().await;
        let range = DateRange::covering(&data.records);
        DataRangeResponse {
            path: self.path.display().to_string(),
            start: range.map(|r| r.start),
            end: range.map(|r| r.end),
            rows: data.records.len(),
            loaded_at: data.loaded_at,
            load_error: data.load_error.clone(),
        }
    }

    /// Run `f` over the records in the requested range.
    pub async fn query<T>(
        &self,
        query: RangeQuery,
        f: impl FnOnce(&[AdRecord], &DateRange) -> T,
    ) -> Result<T, String> {
        let data = self.data.read().await;
        let Some(full) = DateRange::covering(&data.records) else {
            return Err(data
                .load_error
                .clone()
                .unwrap_or_else(|| "no data loaded".to_string()));
        };
        let range = DateRange::new(
            query.start.unwrap_or(full.start),
            query.end.unwrap_or(full.end),
        );
        if range.start > range.end {
            return Err(format!("start {} is after end {}", range.start, range.end));
        }
        Ok(f(data.records.as_slice(), &range))
    }
}

/// Start the dashboard server
pub async fn start_server(context: Arc<DashboardContext>, bind: &str) -> anyhow::Result<()> {
    let app = create_router(context);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    info!("🖥️ Dashboard API starting on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("🛑 Dashboard shutting down");
        })
        .await?;

    Ok(())
}
