use crate::ranking::sort_descending_by;
use crate::summary::ItemSummary;
use serde::{Deserialize, Serialize};

/// Percentile of `values` using linear interpolation between closest ranks.
///
/// `q` is a fraction in `[0, 1]`. The position `q * (n - 1)` is taken over
/// the sorted values, matching the common "linear" definition. `NaN`
/// values are ignored; returns `None` when nothing is left.
///
/// # Examples
/// ```
/// use sales_dashboard::anomaly::percentile;
///
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 0.75), Some(3.25));
/// assert_eq!(percentile(&[], 0.5), None);
/// ```
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Items sold in high volume but earning little profit.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct AnomalyReport {
    /// Quantity at or above which an item counts as high volume.
    pub qty_threshold: Option<f64>,
    /// Profit at or below which an item counts as low profit.
    pub profit_threshold: Option<f64>,
    /// Flagged items, highest quantity first.
    pub items: Vec<ItemSummary>,
}

impl AnomalyReport {
    /// `true` when no item was flagged. This is a normal outcome.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of flagged items.
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Flag items with `qty_sold >= P(qty_percentile)` and
/// `total_profit <= P(profit_percentile)`.
///
/// Percentiles are taken over the whole `summary`. Items whose `GP%` is
/// undefined stay in the population: quantity and profit are always
/// finite after aggregation.
///
/// # Arguments
/// * `summary` - Per-item rows
/// * `qty_percentile` - Quantile in `[0, 1]` for the quantity threshold
/// * `profit_percentile` - Quantile in `[0, 1]` for the profit threshold
///
/// # Returns
/// * `AnomalyReport` - Thresholds and flagged items; both thresholds are
///   `None` for an empty summary
pub fn find_anomalies(
    summary: &[ItemSummary],
    qty_percentile: f64,
    profit_percentile: f64,
) -> AnomalyReport {
    let quantities: Vec<f64> = summary.iter().map(|s| s.qty_sold).collect();
    let profits: Vec<f64> = summary.iter().map(|s| s.total_profit).collect();

    let (Some(qty_threshold), Some(profit_threshold)) = (
        percentile(&quantities, qty_percentile),
        percentile(&profits, profit_percentile),
    ) else {
        return AnomalyReport::default();
    };

    let mut items: Vec<ItemSummary> = summary
        .iter()
        .filter(|s| s.qty_sold >= qty_threshold && s.total_profit <= profit_threshold)
        .cloned()
        .collect();
    sort_descending_by(&mut items, |s| s.qty_sold);

    log::debug!(
        "Anomaly thresholds: qty >= {:.2}, profit <= {:.2}; {} item(s) flagged",
        qty_threshold,
        profit_threshold,
        items.len()
    );

    AnomalyReport {
        qty_threshold: Some(qty_threshold),
        profit_threshold: Some(profit_threshold),
        items,
    }
}
