//! Tabular Loader
//!
//! Reads the ad events CSV into a column-oriented [`Table`]. Only the `date`
//! column is validated at load time; every other column is typed by
//! inspection (numeric when every cell parses as `f64`, text otherwise) and
//! looked up by name later, so a missing column surfaces where it is used.

use crate::error::DataError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub const DATE_COLUMN: &str = "date";

/// Categorical columns of the ad dataset
pub const CATEGORICAL_COLUMNS: [&str; 3] = ["platform", "format", "target_audience"];

/// Numeric columns of the ad dataset
pub const NUMERIC_COLUMNS: [&str; 6] = [
    "bid_amount",
    "impressions",
    "clicks",
    "conversions",
    "spend",
    "revenue",
];

/// A single column of values, typed at load time
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(rows.iter().map(|&i| v[i]).collect()),
            Column::Text(v) => Column::Text(rows.iter().map(|&i| v[i].clone()).collect()),
        }
    }

    fn infer(cells: Vec<String>) -> Column {
        let parsed: Option<Vec<f64>> = cells.iter().map(|c| c.trim().parse().ok()).collect();
        match parsed {
            Some(values) => Column::Numeric(values),
            None => Column::Text(cells),
        }
    }
}

/// In-memory table: parsed dates plus named columns, in file order
#[derive(Debug, Clone, Default)]
pub struct Table {
    dates: Vec<NaiveDateTime>,
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    /// Load a delimited file with a header row.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(file)?;
        info!(
            "📂 Loaded {} rows x {} columns from {}",
            table.len(),
            table.names.len() + 1,
            path.display()
        );
        Ok(table)
    }

    /// Parse CSV from any reader (header row required).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = reader.headers()?.clone();

        let date_idx = headers
            .iter()
            .position(|h| h.trim() == DATE_COLUMN)
            .ok_or_else(|| DataError::MissingColumn(DATE_COLUMN.to_string()))?;

        let names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != date_idx)
            .map(|(_, h)| h.trim().to_string())
            .collect();

        let mut dates = Vec::new();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let raw_date = record.get(date_idx).unwrap_or_default();
            let date = parse_date(raw_date).ok_or_else(|| DataError::InvalidDate {
                row,
                value: raw_date.to_string(),
            })?;
            dates.push(date);

            let mut col = 0;
            for (i, value) in record.iter().enumerate() {
                if i == date_idx {
                    continue;
                }
                if let Some(column) = cells.get_mut(col) {
                    column.push(value.to_string());
                }
                col += 1;
            }
        }

        let columns = cells.into_iter().map(Column::infer).collect();
        debug!("Parsed {} rows", dates.len());

        Ok(Self {
            dates,
            names,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Column names excluding `date`
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn dates(&self) -> &[NaiveDateTime] {
        &self.dates
    }

    fn column(&self, name: &str) -> Result<&Column, DataError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))
    }

    /// Numeric view of a column
    pub fn numeric(&self, name: &str) -> Result<&[f64], DataError> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values),
            Column::Text(values) => {
                let (row, value) = values
                    .iter()
                    .enumerate()
                    .find(|(_, v)| v.trim().parse::<f64>().is_err())
                    .map(|(i, v)| (i, v.clone()))
                    .unwrap_or_default();
                Err(DataError::NotNumeric {
                    column: name.to_string(),
                    row,
                    value,
                })
            }
        }
    }

    /// Text view of a column; numeric cells are rendered with `Display`
    pub fn text(&self, name: &str) -> Result<Vec<String>, DataError> {
        Ok(match self.column(name)? {
            Column::Text(values) => values.clone(),
            Column::Numeric(values) => values.iter().map(|v| v.to_string()).collect(),
        })
    }

    /// First and last calendar date present, if any
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.dates.iter().min()?;
        let max = self.dates.iter().max()?;
        Some((min.date(), max.date()))
    }

    /// Rows whose calendar date lies in `[start, end]`
    pub fn filter_dates(&self, start: NaiveDate, end: NaiveDate) -> Table {
        let rows: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                let day = d.date();
                day >= start && day <= end
            })
            .map(|(i, _)| i)
            .collect();
        self.select_rows(&rows)
    }

    /// Stable sort by date
    pub fn sorted_by_date(&self) -> Table {
        let mut rows: Vec<usize> = (0..self.len()).collect();
        rows.sort_by_key(|&i| self.dates[i]);
        self.select_rows(&rows)
    }

    fn select_rows(&self, rows: &[usize]) -> Table {
        Table {
            dates: rows.iter().map(|&i| self.dates[i]).collect(),
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
        }
    }

    /// Typed view over the ad schema.
    pub fn records(&self) -> Result<Vec<AdRecord>, DataError> {
        let ad_id = self.text("ad_id")?;
        let platform = self.text("platform")?;
        let format = self.text("format")?;
        let target_audience = self.text("target_audience")?;
        let bid_amount = self.numeric("bid_amount")?;
        let impressions = self.numeric("impressions")?;
        let clicks = self.numeric("clicks")?;
        let conversions = self.numeric("conversions")?;
        let spend = self.numeric("spend")?;
        let revenue = self.numeric("revenue")?;

        Ok((0..self.len())
            .map(|i| AdRecord {
                date: self.dates[i],
                ad_id: ad_id[i].clone(),
                platform: platform[i].clone(),
                format: format[i].clone(),
                target_audience: target_audience[i].clone(),
                bid_amount: bid_amount[i],
                impressions: impressions[i],
                clicks: clicks[i],
                conversions: conversions[i],
                spend: spend[i],
                revenue: revenue[i],
            })
            .collect())
    }

    #[cfg(test)]
    pub(crate) fn column_len(&self, name: &str) -> Option<usize> {
        self.column(name).ok().map(Column::len)
    }
}

/// One ad event row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdRecord {
    pub date: NaiveDateTime,
    pub ad_id: String,
    pub platform: String,
    pub format: String,
    pub target_audience: String,
    pub bid_amount: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub conversions: f64,
    pub spend: f64,
    pub revenue: f64,
}

/// Parse the date formats seen in exports: plain dates, naive timestamps and RFC 3339.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(ts);
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
date,ad_id,platform,format,target_audience,bid_amount,impressions,clicks,conversions,spend,revenue
2024-01-02,AD002,Google,Display,25-34,1.2,2000,40,4,80,120
2024-01-01,AD001,Facebook,Video,18-25,0.8,1000,50,5,100,150
2024-01-03,AD003,Facebook,Display,18-25,1.0,1500,0,0,90,0
";

    fn sample() -> Table {
        Table::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn loads_and_types_columns() {
        let table = sample();
        assert_eq!(table.len(), 3);
        assert_eq!(table.column_names().len(), 10);
        assert_eq!(table.numeric("clicks").unwrap(), &[40.0, 50.0, 0.0]);
        assert_eq!(table.text("platform").unwrap()[1], "Facebook");
        assert_eq!(table.column_len("revenue"), Some(3));
    }

    #[test]
    fn loader_keeps_file_order() {
        let table = sample();
        let first = table.dates()[0].date();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());

        let sorted = table.sorted_by_date();
        assert_eq!(sorted.text("ad_id").unwrap(), vec!["AD001", "AD002", "AD003"]);
    }

    #[test]
    fn bad_date_is_a_parse_error() {
        let csv = "date,spend\n2024-01-01,1\nnot-a-date,2\n";
        let err = Table::from_reader(csv.as_bytes()).unwrap_err();
        match err {
            DataError::InvalidDate { row, value } => {
                assert_eq!(row, 1);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_columns_surface_on_access() {
        let csv = "date,spend\n2024-01-01,1\n";
        let table = Table::from_reader(csv.as_bytes()).unwrap();
        assert!(matches!(
            table.numeric("revenue"),
            Err(DataError::MissingColumn(c)) if c == "revenue"
        ));
        assert!(table.records().is_err());
    }

    #[test]
    fn text_column_is_not_numeric() {
        let table = sample();
        let err = table.numeric("platform").unwrap_err();
        assert!(matches!(err, DataError::NotNumeric { row: 0, .. }));
    }

    #[test]
    fn unreadable_path_is_io_error() {
        let err = Table::load("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, DataError::Io { .. }));
    }

    #[test]
    fn date_filter_is_inclusive() {
        let table = sample();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let filtered = table.filter_dates(start, end);
        assert_eq!(filtered.len(), 2);
        assert_eq!(table.date_range(), Some((start, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap())));
    }

    #[test]
    fn parses_common_date_forms() {
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("2024-03-01 12:30:00").is_some());
        assert!(parse_date("2024-03-01T12:30:00").is_some());
        assert!(parse_date("2024-03-01T12:30:00Z").is_some());
        assert!(parse_date("03/01/2024").is_none());
    }

    #[test]
    fn typed_records() {
        let records = sample().records().unwrap();
        assert_eq!(records[1].ad_id, "AD001");
        assert_eq!(records[1].revenue, 150.0);
    }
}
