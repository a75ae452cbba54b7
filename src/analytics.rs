//! Analytics - date-filtered aggregates over ad records
//!
//! Every aggregate takes an inclusive [`DateRange`]. Means skip rows whose
//! ratio is undefined (zero denominator); a group with no defined value
//! reports `None`. Groups come out ordered by key.

use crate::data::AdRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inclusive calendar-date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Smallest range covering every record, `None` when empty.
    pub fn covering(records: &[AdRecord]) -> Option<Self> {
        let dates = records.iter().map(|r| r.date.date());
        let start = dates.clone().min()?;
        let end = dates.max()?;
        Some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn within<'a>(records: &'a [AdRecord], range: &'a DateRange) -> impl Iterator<Item = &'a AdRecord> {
    records.iter().filter(move |r| range.contains(r.date.date()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenuePoint {
    pub date: NaiveDate,
    pub revenue: f64,
}

/// Revenue summed per calendar date, ascending
pub fn revenue_over_time(records: &[AdRecord], range: &DateRange) -> Vec<RevenuePoint> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for r in within(records, range) {
        *by_date.entry(r.date.date()).or_default() += r.revenue;
    }
    by_date
        .into_iter()
        .map(|(date, revenue)| RevenuePoint { date, revenue })
        .collect()
}

/// Average CTR in the range against the average over all records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub average_ctr: Option<f64>,
    pub reference_ctr: Option<f64>,
    /// `(average - reference) / reference`
    pub relative_delta: Option<f64>,
    pub ads: usize,
}

pub fn performance_summary(records: &[AdRecord], range: &DateRange) -> PerformanceSummary {
    let mut selected = Mean::default();
    let mut reference = Mean::default();
    let mut ads = 0;
    for r in records {
        reference.push(r.ctr());
        if range.contains(r.date.date()) {
            selected.push(r.ctr());
            ads += 1;
        }
    }
    let (average_ctr, reference_ctr) = (selected.value(), reference.value());
    let relative_delta = match (average_ctr, reference_ctr) {
        (Some(avg), Some(base)) if base != 0.0 => Some((avg - base) / base),
        _ => None,
    };
    PerformanceSummary {
        average_ctr,
        reference_ctr,
        relative_delta,
        ads,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformPerformance {
    pub platform: String,
    pub revenue: f64,
    pub mean_roas: Option<f64>,
    pub ads: usize,
}

/// Per platform: summed revenue and mean ROAS
pub fn platform_performance(records: &[AdRecord], range: &DateRange) -> Vec<PlatformPerformance> {
    let mut groups: BTreeMap<&str, (f64, Mean, usize)> = BTreeMap::new();
    for r in within(records, range) {
        let entry = groups.entry(r.platform.as_str()).or_default();
        entry.0 += r.revenue;
        entry.1.push(r.roas());
        entry.2 += 1;
    }
    groups
        .into_iter()
        .map(|(platform, (revenue, roas, ads))| PlatformPerformance {
            platform: platform.to_string(),
            revenue,
            mean_roas: roas.value(),
            ads,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatEffectiveness {
    pub format: String,
    pub mean_ctr: Option<f64>,
    pub mean_cvr: Option<f64>,
}

/// Per ad format: mean CTR and mean CVR
pub fn format_effectiveness(records: &[AdRecord], range: &DateRange) -> Vec<FormatEffectiveness> {
    let mut groups: BTreeMap<&str, (Mean, Mean)> = BTreeMap::new();
    for r in within(records, range) {
        let entry = groups.entry(r.format.as_str()).or_default();
        entry.0.push(r.ctr());
        entry.1.push(r.cvr());
    }
    groups
        .into_iter()
        .map(|(format, (ctr, cvr))| FormatEffectiveness {
            format: format.to_string(),
            mean_ctr: ctr.value(),
            mean_cvr: cvr.value(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidRoasPoint {
    pub ad_id: String,
    pub platform: String,
    pub bid_amount: f64,
    pub roas: f64,
}

/// One point per row with a defined ROAS, in record order
pub fn bid_roas_points(records: &[AdRecord], range: &DateRange) -> Vec<BidRoasPoint> {
    within(records, range)
        .filter_map(|r| {
            Some(BidRoasPoint {
                ad_id: r.ad_id.clone(),
                platform: r.platform.clone(),
                bid_amount: r.bid_amount,
                roas: r.roas()?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudiencePerformance {
    pub target_audience: String,
    pub mean_ctr: Option<f64>,
    pub mean_cvr: Option<f64>,
    pub mean_roas: Option<f64>,
    pub revenue: f64,
}

pub fn audience_analysis(records: &[AdRecord], range: &DateRange) -> Vec<AudiencePerformance> {
    #[derive(Default)]
    struct Acc {
        ctr: Mean,
        cvr: Mean,
        roas: Mean,
        revenue: f64,
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for r in within(records, range) {
        let acc = groups.entry(r.target_audience.as_str()).or_default();
        acc.ctr.push(r.ctr());
        acc.cvr.push(r.cvr());
        acc.roas.push(r.roas());
        acc.revenue += r.revenue;
    }
    groups
        .into_iter()
        .map(|(audience, acc)| AudiencePerformance {
            target_audience: audience.to_string(),
            mean_ctr: acc.ctr.value(),
            mean_cvr: acc.cvr.value(),
            mean_roas: acc.roas.value(),
            revenue: acc.revenue,
        })
        .collect()
}

pub const GENERIC_SUGGESTIONS: [&str; 3] = [
    "Increase budget for top-performing ads",
    "Adjust targeting for underperforming ads",
    "Optimize bid amounts based on ROAS",
];

/// Correlation strength below which bids are considered irrelevant to ROAS
const BID_CORRELATION_THRESHOLD: f64 = 0.3;

/// Rule-based pricing suggestions for the range.
///
/// Falls back to [`GENERIC_SUGGESTIONS`] when the data is too thin to say
/// anything specific.
pub fn optimization_suggestions(records: &[AdRecord], range: &DateRange) -> Vec<String> {
    let mut suggestions = Vec::new();

    let mut ranked: Vec<(String, f64)> = platform_performance(records, range)
        .into_iter()
        .filter_map(|p| Some((p.platform, p.mean_roas?)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    if let [best, .., worst] = ranked.as_slice() {
        suggestions.push(format!(
            "Increase budget for {} (mean ROAS {:.2})",
            best.0, best.1
        ));
        suggestions.push(format!(
            "Adjust targeting on {} (mean ROAS {:.2})",
            worst.0, worst.1
        ));
    }

    let points = bid_roas_points(records, range);
    let bids: Vec<f64> = points.iter().map(|p| p.bid_amount).collect();
    let roas: Vec<f64> = points.iter().map(|p| p.roas).collect();
    if let Some(r) = pearson(&bids, &roas) {
        let advice = if r >= BID_CORRELATION_THRESHOLD {
            format!("Raise bids where budget allows: ROAS grows with bid amount (r = {r:.2})")
        } else if r <= -BID_CORRELATION_THRESHOLD {
            format!("Lower bid amounts: ROAS falls as bids rise (r = {r:.2})")
        } else {
            format!("Bid amount barely moves ROAS (r = {r:.2}); hold bids and tune creatives")
        };
        suggestions.push(advice);
    }

    if suggestions.is_empty() {
        suggestions = GENERIC_SUGGESTIONS.iter().map(|s| s.to_string()).collect();
    }
    suggestions
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 3 {
        return None;
    }
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx.sqrt() * syy.sqrt()))
}
