use crate::anomaly::{AnomalyReport, find_anomalies};
use crate::config::DashboardConfig;
use crate::downloader;
use crate::error::Result;
use crate::ranking::{Metric, top_n};
use crate::summary::{ItemSummary, Totals, summarize};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four ranked views shown on the dashboard.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ViewKind {
    TopSales,
    TopProfit,
    TopQty,
    HighQtyLowProfit,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [
        ViewKind::TopSales,
        ViewKind::TopProfit,
        ViewKind::TopQty,
        ViewKind::HighQtyLowProfit,
    ];

    /// URL / command line slug.
    pub fn slug(&self) -> &'static str {
        match self {
            ViewKind::TopSales => "top-sales",
            ViewKind::TopProfit => "top-profit",
            ViewKind::TopQty => "top-qty",
            ViewKind::HighQtyLowProfit => "high-qty-low-profit",
        }
    }

    /// Worksheet name used in the exported workbook.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            ViewKind::TopSales => "Top Sales",
            ViewKind::TopProfit => "Top Profit",
            ViewKind::TopQty => "Top Qty Sold",
            ViewKind::HighQtyLowProfit => "High Sales Low Profit",
        }
    }

    /// Heading shown above the view's chart.
    ///
    /// # Arguments
    /// * `n` - The Top-N size; ignored by the anomaly view
    ///
    /// # Returns
    /// * `String` - e.g. `Top 50 Items by Sales`
    pub fn title(&self, n: usize) -> String {
        match self {
            ViewKind::TopSales => format!("Top {} Items by Sales", n),
            ViewKind::TopProfit => format!("Top {} Items by Profit", n),
            ViewKind::TopQty => format!("Top {} Items by Quantity Sold", n),
            ViewKind::HighQtyLowProfit => "High Sales, Low Profit Items".to_string(),
        }
    }

    /// Metric the view is ranked by; the bar length in its chart.
    pub fn metric(&self) -> Metric {
        match self {
            ViewKind::TopSales => Metric::TotalSales,
            ViewKind::TopProfit => Metric::TotalProfit,
            ViewKind::TopQty | ViewKind::HighQtyLowProfit => Metric::QtySold,
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ViewKind::ALL
            .into_iter()
            .find(|kind| kind.slug().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown view: {}", s))
    }
}

/// Headline observations for a metric view.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Insight {
    pub metric: Metric,
    /// Name of the leading item.
    pub leader: String,
    pub leader_value: f64,
    /// How many leading items `leaders_share` covers.
    pub leaders: usize,
    /// Fraction of the overall total held by the leading items, `None` when
    /// the overall total is zero.
    pub leaders_share: Option<f64>,
}

impl Insight {
    fn for_view(ranked: &[ItemSummary], metric: Metric, totals: &Totals, leaders: usize) -> Option<Self> {
        let first = ranked.first()?;
        let head = &ranked[..leaders.min(ranked.len())];
        Some(Insight {
            metric,
            leader: first.item_name.clone(),
            leader_value: first.metric(metric),
            leaders,
            leaders_share: totals.share(head, metric),
        })
    }

    /// One line about the leading item.
    pub fn leader_line(&self) -> String {
        let value = format_thousands(self.leader_value);
        match self.metric {
            Metric::TotalSales => format!("{} is the highest with {} sales.", self.leader, value),
            Metric::TotalProfit => format!("{} generated the most profit ({}).", self.leader, value),
            Metric::QtySold => format!("{} is the most sold item ({} units).", self.leader, value),
        }
    }

    /// One line about the share held by the leading items.
    pub fn share_line(&self) -> String {
        let what = match self.metric {
            Metric::TotalSales => "overall sales",
            Metric::TotalProfit => "total profit",
            Metric::QtySold => "total quantity sold",
        };
        match self.leaders_share {
            Some(share) => format!(
                "Top {} items contribute {:.1}% of {}.",
                self.leaders,
                share * 100.0,
                what
            ),
            None => format!("Share of {} is undefined: the total is zero.", what),
        }
    }
}

/// One ranked view with both display projections.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RankedView {
    pub kind: ViewKind,
    pub title: String,
    /// Rows drawn as bars, capped at `top_n`.
    pub chart: Vec<ItemSummary>,
    /// Rows listed in the table, capped at `table_capacity`.
    pub table: Vec<ItemSummary>,
    pub insight: Option<Insight>,
}

impl RankedView {
    fn build(kind: ViewKind, ranked: Vec<ItemSummary>, config: &DashboardConfig, totals: &Totals) -> Self {
        let insight = match kind {
            ViewKind::HighQtyLowProfit => None,
            _ => Insight::for_view(&ranked, kind.metric(), totals, config.share_leaders),
        };
        let chart = ranked[..config.top_n.min(ranked.len())].to_vec();
        let mut table = ranked;
        table.truncate(config.table_capacity);

        RankedView {
            kind,
            title: kind.title(config.top_n),
            chart,
            table,
            insight,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Everything the dashboard shows, computed in one pass.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Dashboard {
    pub summary: Vec<ItemSummary>,
    pub totals: Totals,
    pub views: Vec<RankedView>,
    pub anomalies: AnomalyReport,
}

impl Dashboard {
    /// Run the aggregation and ranking pipeline over `transactions`.
    pub fn build(transactions: &[Transaction], config: &DashboardConfig) -> Self {
        let summary = summarize(transactions);
        let totals = Totals::of(&summary);
        let anomalies = find_anomalies(&summary, config.qty_percentile, config.profit_percentile);
        let deepest = config.top_n.max(config.table_capacity);

        let views = ViewKind::ALL
            .into_iter()
            .map(|kind| {
                let ranked = match kind {
                    ViewKind::HighQtyLowProfit => anomalies.items.clone(),
                    _ => top_n(&summary, kind.metric(), deepest),
                };
                RankedView::build(kind, ranked, config, &totals)
            })
            .collect();

        log::info!(
            "Dashboard built: {} items, {} anomalies",
            summary.len(),
            anomalies.len()
        );

        Dashboard {
            summary,
            totals,
            views,
            anomalies,
        }
    }

    /// The ranked view of the given kind, if it was built.
    pub fn view(&self, kind: ViewKind) -> Option<&RankedView> {
        self.views.iter().find(|view| view.kind == kind)
    }

    fn chart_rows(&self, kind: ViewKind) -> &[ItemSummary] {
        self.view(kind).map(|view| view.chart.as_slice()).unwrap_or(&[])
    }

    /// Export the chart-capped rankings and the full anomaly set as a
    /// workbook.
    pub fn export(&self) -> Result<Vec<u8>> {
        downloader::export_report(
            self.chart_rows(ViewKind::TopSales),
            self.chart_rows(ViewKind::TopProfit),
            self.chart_rows(ViewKind::TopQty),
            &self.anomalies.items,
        )
    }
}

/// `1234567.4` → `1,234,567`. Rounds to whole units.
pub fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0.0 {
        out.insert(0, '-');
    }
    out
}

/// `GP%` with two decimals, or `-` when undefined.
pub fn format_gp(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        "-".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Transaction> {
        vec![
            Transaction::create("A", "Apples", Some(10.0), Some(100.0), Some(20.0)),
            Transaction::create("A", "Apples", Some(5.0), Some(50.0), Some(10.0)),
            Transaction::create("B", "Bananas", Some(1.0), Some(10.0), Some(5.0)),
        ]
    }

    #[test]
    fn builds_all_views_in_order() {
        let dashboard = Dashboard::build(&rows(), &DashboardConfig::default());
        let kinds: Vec<ViewKind> = dashboard.views.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, ViewKind::ALL.to_vec());
        assert_eq!(dashboard.totals.total_sales, 160.0);
    }

    #[test]
    fn chart_and_table_caps_are_independent() {
        let many: Vec<Transaction> = (0..30)
            .map(|i| Transaction::create(format!("I{:02}", i), "Item", Some(i as f64), Some(10.0 * i as f64), Some(1.0)))
            .collect();
        let config = DashboardConfig {
            top_n: 5,
            table_capacity: 12,
            ..DashboardConfig::default()
        };
        let dashboard = Dashboard::build(&many, &config);
        let sales = dashboard.view(ViewKind::TopSales).unwrap();
        assert_eq!(sales.chart.len(), 5);
        assert_eq!(sales.table.len(), 12);
        assert_eq!(sales.chart[..], sales.table[..5]);
        assert_eq!(sales.title, "Top 5 Items by Sales");
    }

    #[test]
    fn insight_reports_leader_and_share() {
        let config = DashboardConfig {
            share_leaders: 1,
            ..DashboardConfig::default()
        };
        let dashboard = Dashboard::build(&rows(), &config);
        let insight = dashboard.view(ViewKind::TopSales).unwrap().insight.clone().unwrap();
        assert_eq!(insight.leader, "Apples");
        assert_eq!(insight.leader_value, 150.0);
        assert!((insight.leaders_share.unwrap() - 0.9375).abs() < 1e-12);
        assert!(insight.share_line().starts_with("Top 1 items contribute 93."));
        assert_eq!(insight.leader_line(), "Apples is the highest with 150 sales.");
        assert!(dashboard.view(ViewKind::HighQtyLowProfit).unwrap().insight.is_none());
    }

    #[test]
    fn share_is_undefined_when_total_is_zero() {
        let rows = vec![Transaction::create("Z", "Zero", Some(1.0), Some(0.0), Some(0.0))];
        let dashboard = Dashboard::build(&rows, &DashboardConfig::default());
        let insight = dashboard.view(ViewKind::TopProfit).unwrap().insight.clone().unwrap();
        assert_eq!(insight.leaders_share, None);
        assert!(insight.share_line().contains("undefined"));
    }

    #[test]
    fn empty_input_gives_empty_dashboard() {
        let dashboard = Dashboard::build(&[], &DashboardConfig::default());
        assert!(dashboard.summary.is_empty());
        assert_eq!(dashboard.totals, Totals::default());
        assert!(dashboard.anomalies.is_empty());
        assert!(dashboard.views.iter().all(|v| v.is_empty() && v.insight.is_none()));
    }

    #[test]
    fn view_kind_round_trips_through_slug() {
        for kind in ViewKind::ALL {
            assert_eq!(kind.slug().parse::<ViewKind>(), Ok(kind));
        }
        assert!("nope".parse::<ViewKind>().is_err());
    }

    #[test]
    fn thousands_formatting() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.4), "999");
        assert_eq!(format_thousands(1234567.0), "1,234,567");
        assert_eq!(format_thousands(-4500.0), "-4,500");
        assert_eq!(format_thousands(f64::NAN), "-");
        assert_eq!(format_thousands(1e20), "100,000,000,000,000,000,000");
        assert_eq!(format_thousands(-2.5e19), "-25,000,000,000,000,000,000");
        assert_eq!(format_gp(20.0), "20.00");
        assert_eq!(format_gp(f64::NAN), "-");
    }
}
