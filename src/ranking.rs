use crate::summary::ItemSummary;
use crate::transaction::{COL_QTY_SOLD, COL_TOTAL_PROFIT, COL_TOTAL_SALES};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Numeric column an item summary can be ranked by.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    QtySold,
    TotalSales,
    TotalProfit,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::TotalSales, Metric::TotalProfit, Metric::QtySold];

    /// Display column header for this metric.
    pub fn column(&self) -> &'static str {
        match self {
            Metric::QtySold => COL_QTY_SOLD,
            Metric::TotalSales => COL_TOTAL_SALES,
            Metric::TotalProfit => COL_TOTAL_PROFIT,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = String;

    /// Accepts short names (`sales`, `profit`, `qty`) as well as the column
    /// headers, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qty" | "quantity" | "qty sold" | "qty_sold" => Ok(Metric::QtySold),
            "sales" | "total sales" | "total_sales" => Ok(Metric::TotalSales),
            "profit" | "total profit" | "total_profit" => Ok(Metric::TotalProfit),
            other => Err(format!("Unknown metric: {}", other)),
        }
    }
}

/// Descending comparison with `NaN` pushed to the end.
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Stable descending sort of `items` by `value`.
pub(crate) fn sort_descending_by<F>(items: &mut [ItemSummary], value: F)
where
    F: Fn(&ItemSummary) -> f64,
{
    items.sort_by(|a, b| descending(value(a), value(b)));
}

/// The `n` highest items by `metric`.
///
/// The sort is stable, so items with equal values keep their order from
/// `summary`. The result length is `min(n, summary.len())`.
///
/// # Examples
/// ```
/// use sales_dashboard::ranking::{Metric, top_n};
/// use sales_dashboard::summary::summarize;
/// use sales_dashboard::transaction::Transaction;
///
/// let summary = summarize(&[
///     Transaction::create("A", "Apples", Some(15.0), Some(150.0), Some(30.0)),
///     Transaction::create("B", "Bananas", Some(1.0), Some(10.0), Some(5.0)),
/// ]);
/// let top = top_n(&summary, Metric::TotalSales, 1);
/// assert_eq!(top[0].item_code, "A");
/// ```
pub fn top_n(summary: &[ItemSummary], metric: Metric, n: usize) -> Vec<ItemSummary> {
    let mut ranked = summary.to_vec();
    sort_descending_by(&mut ranked, |item| item.metric(metric));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::summarize;
    use crate::transaction::Transaction;

    fn item(code: &str, qty: f64, sales: f64, profit: f64) -> Transaction {
        Transaction::create(code, format!("Item {}", code), Some(qty), Some(sales), Some(profit))
    }

    fn summary() -> Vec<ItemSummary> {
        summarize(&[
            item("A", 5.0, 100.0, 10.0),
            item("B", 9.0, 300.0, -4.0),
            item("C", 5.0, 200.0, 40.0),
            item("D", 1.0, 300.0, 7.0),
        ])
    }

    #[test]
    fn top_n_is_sorted_descending() {
        let top = top_n(&summary(), Metric::TotalSales, 10);
        let values: Vec<f64> = top.iter().map(|s| s.total_sales).collect();
        assert_eq!(values, vec![300.0, 300.0, 200.0, 100.0]);
    }

    #[test]
    fn top_n_length_is_capped() {
        assert_eq!(top_n(&summary(), Metric::TotalProfit, 2).len(), 2);
        assert_eq!(top_n(&summary(), Metric::TotalProfit, 99).len(), 4);
        assert!(top_n(&summary(), Metric::TotalProfit, 0).is_empty());
        assert!(top_n(&[], Metric::TotalProfit, 5).is_empty());
    }

    #[test]
    fn ties_keep_summary_order() {
        let top = top_n(&summary(), Metric::QtySold, 3);
        let codes: Vec<&str> = top.iter().map(|s| s.item_code.as_str()).collect();
        assert_eq!(codes, vec!["B", "A", "C"]);

        let by_sales = top_n(&summary(), Metric::TotalSales, 2);
        assert_eq!(by_sales[0].item_code, "B");
        assert_eq!(by_sales[1].item_code, "D");
    }

    #[test]
    fn top_n_is_idempotent() {
        let once = top_n(&summary(), Metric::TotalProfit, 3);
        let twice = top_n(&once, Metric::TotalProfit, 3);
        assert_eq!(once, twice);
    }

    #[test]
    fn nan_values_rank_last() {
        let mut items = summary();
        sort_descending_by(&mut items, |s| {
            if s.item_code == "B" { f64::NAN } else { s.total_sales }
        });
        assert_eq!(items.last().map(|s| s.item_code.as_str()), Some("B"));
    }

    #[test]
    fn metric_parses_short_and_column_names() {
        assert_eq!("sales".parse::<Metric>(), Ok(Metric::TotalSales));
        assert_eq!("Total Profit".parse::<Metric>(), Ok(Metric::TotalProfit));
        assert_eq!("QTY".parse::<Metric>(), Ok(Metric::QtySold));
        assert!("margin".parse::<Metric>().is_err());
    }
}
