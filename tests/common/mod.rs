//! Synthetic ad exports shared by the integration tests

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};

const PLATFORMS: [&str; 3] = ["Facebook", "Google", "Instagram"];
const FORMATS: [&str; 3] = ["banner", "carousel", "video"];
const AUDIENCES: [&str; 3] = ["18-24", "25-34", "35-44"];

pub const HEADER: &str =
    "date,ad_id,platform,format,target_audience,bid_amount,impressions,clicks,conversions,spend,revenue";

/// One CSV row per day starting 2023-01-01, every category cycling early.
pub fn ad_csv(rows: usize) -> String {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let mut out = String::from(HEADER);
    out.push('\n');
    for i in 0..rows {
        let date = start + Duration::days(i as i64);
        let spend = 50.0 + ((i * 53) % 200) as f64;
        let revenue = spend * (0.5 + ((i * 29) % 30) as f64 / 10.0);
        out.push_str(&format!(
            "{},ad_{},{},{},{},{:.2},{},{},{},{:.2},{:.2}\n",
            date,
            i,
            PLATFORMS[i % 3],
            FORMATS[(i / 2) % 3],
            AUDIENCES[(i / 3) % 3],
            0.5 + ((i * 37) % 100) as f64 / 50.0,
            1000 + (i * 131) % 500,
            10 + (i * 17) % 90,
            1 + (i * 7) % 9,
            spend,
            revenue,
        ));
    }
    out
}

/// Rewrite one field of every data row; `value(row, current)` returns the new cell.
pub fn replace_field<F>(csv: &str, field: usize, value: F) -> String
where
    F: Fn(usize, &str) -> String,
{
    let mut lines = csv.lines();
    let mut out = String::new();
    if let Some(header) = lines.next() {
        out.push_str(header);
        out.push('\n');
    }
    for (row, line) in lines.enumerate() {
        let mut cells: Vec<String> = line.split(',').map(str::to_string).collect();
        cells[field] = value(row, &cells[field]);
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}
