use crate::ranking::Metric;
use crate::transaction::{Transaction, gross_profit_pct};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-item aggregate of every transaction sharing `(item_code, item_name)`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ItemSummary {
    pub item_code: String,
    pub item_name: String,
    pub qty_sold: f64,
    pub total_sales: f64,
    pub total_profit: f64,
    /// Gross profit percentage recomputed from the sums, `NaN` when
    /// `total_sales` is zero.
    pub gp_pct: f64,
}

impl ItemSummary {
    /// Value of the given ranking metric for this item.
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::QtySold => self.qty_sold,
            Metric::TotalSales => self.total_sales,
            Metric::TotalProfit => self.total_profit,
        }
    }
}

#[derive(Default)]
struct Acc {
    qty_sold: f64,
    total_sales: f64,
    total_profit: f64,
}

/// Group transactions by `(item_code, item_name)` and sum the numeric
/// columns.
///
/// Missing values count as zero. The result is ordered by key so that
/// ranking ties resolve the same way on every run.
///
/// # Examples
/// ```
/// use sales_dashboard::summary::summarize;
/// use sales_dashboard::transaction::Transaction;
///
/// let rows = vec![
///     Transaction::create("A", "Apples", Some(10.0), Some(100.0), Some(20.0)),
///     Transaction::create("A", "Apples", Some(5.0), Some(50.0), Some(10.0)),
/// ];
/// let summary = summarize(&rows);
/// assert_eq!(summary.len(), 1);
/// assert_eq!(summary[0].qty_sold, 15.0);
/// assert_eq!(summary[0].gp_pct, 20.0);
/// ```
pub fn summarize(transactions: &[Transaction]) -> Vec<ItemSummary> {
    let mut groups: BTreeMap<(String, String), Acc> = BTreeMap::new();

    for row in transactions {
        let acc = groups
            .entry((row.item_code.clone(), row.item_name.clone()))
            .or_default();
        acc.qty_sold += row.qty_sold.unwrap_or(0.0);
        acc.total_sales += row.total_sales.unwrap_or(0.0);
        acc.total_profit += row.total_profit.unwrap_or(0.0);
    }

    log::debug!(
        "Summarised {} transaction rows into {} items",
        transactions.len(),
        groups.len()
    );

    groups
        .into_iter()
        .map(|((item_code, item_name), acc)| ItemSummary {
            item_code,
            item_name,
            qty_sold: acc.qty_sold,
            total_sales: acc.total_sales,
            total_profit: acc.total_profit,
            gp_pct: gross_profit_pct(acc.total_profit, acc.total_sales),
        })
        .collect()
}

/// Headline figures over the whole summary.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Totals {
    pub total_sales: f64,
    pub total_profit: f64,
    pub total_qty: f64,
}

impl Totals {
    /// Sum every item of the summary.
    ///
    /// # Arguments
    /// * `summary` - Per-item rows from [`summarize`]
    ///
    /// # Returns
    /// * `Totals` - Overall sales, profit and quantity; all zero for an
    ///   empty summary
    pub fn of(summary: &[ItemSummary]) -> Self {
        summary.iter().fold(Totals::default(), |acc, item| Totals {
            total_sales: acc.total_sales + item.total_sales,
            total_profit: acc.total_profit + item.total_profit,
            total_qty: acc.total_qty + item.qty_sold,
        })
    }

    /// Overall total for one metric.
    ///
    /// # Arguments
    /// * `metric` - The column to read
    ///
    /// # Returns
    /// * `f64` - `total_sales`, `total_profit` or `total_qty`
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::QtySold => self.total_qty,
            Metric::TotalSales => self.total_sales,
            Metric::TotalProfit => self.total_profit,
        }
    }

    /// Fraction of the overall total held by `items`.
    ///
    /// # Arguments
    /// * `items` - The rows whose combined value is measured, usually a Top-N
    /// * `metric` - The column to compare
    ///
    /// # Returns
    /// * `Option<f64>` - `sum(items) / total`, or `None` when the overall
    ///   total is zero
    pub fn share(&self, items: &[ItemSummary], metric: Metric) -> Option<f64> {
        let total = self.get(metric);
        if total == 0.0 || !total.is_finite() {
            return None;
        }
        let part: f64 = items.iter().map(|item| item.metric(metric)).sum();
        Some(part / total)
    }
}

/// Convenience wrapper for [`Totals::of`].
pub fn totals(summary: &[ItemSummary]) -> Totals {
    Totals::of(summary)
}
