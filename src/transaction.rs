use serde::{Deserialize, Serialize};

pub const COL_ITEM_CODE: &str = "Item Code";
pub const COL_ITEMS: &str = "Items";
pub const COL_QTY_SOLD: &str = "Qty Sold";
pub const COL_TOTAL_SALES: &str = "Total Sales";
pub const COL_TOTAL_PROFIT: &str = "Total Profit";
pub const COL_GP_PCT: &str = "GP%";

/// Columns every input table must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    COL_ITEM_CODE,
    COL_ITEMS,
    COL_QTY_SOLD,
    COL_TOTAL_SALES,
    COL_TOTAL_PROFIT,
];

/// Columns shown in every table and exported sheet, in display order.
pub const DISPLAY_COLUMNS: [&str; 6] = [
    COL_ITEM_CODE,
    COL_ITEMS,
    COL_QTY_SOLD,
    COL_TOTAL_SALES,
    COL_TOTAL_PROFIT,
    COL_GP_PCT,
];

/// One item-level sales line as read from the source sheet.
///
/// Numeric fields are `None` when the cell was empty or could not be
/// coerced to a number.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Transaction {
    pub item_code: String,
    pub item_name: String,
    pub qty_sold: Option<f64>,
    pub total_sales: Option<f64>,
    pub total_profit: Option<f64>,
    /// Row-level gross profit percentage, `NaN` when undefined.
    pub gp_pct: f64,
}

impl Transaction {
    /// Build a row and derive its row-level `GP%`.
    pub fn create(
        item_code: impl Into<String>,
        item_name: impl Into<String>,
        qty_sold: Option<f64>,
        total_sales: Option<f64>,
        total_profit: Option<f64>,
    ) -> Self {
        let gp_pct = match (total_profit, total_sales) {
            (Some(profit), Some(sales)) => gross_profit_pct(profit, sales),
            _ => f64::NAN,
        };

        Transaction {
            item_code: item_code.into(),
            item_name: item_name.into(),
            qty_sold,
            total_sales,
            total_profit,
            gp_pct,
        }
    }

    /// Grouping key shared by every row of the same item.
    pub fn key(&self) -> (&str, &str) {
        (&self.item_code, &self.item_name)
    }
}

/// `profit / sales * 100`, or `NaN` when sales is zero or either side is
/// not finite.
///
/// # Examples
/// ```
/// use sales_dashboard::transaction::gross_profit_pct;
///
/// assert_eq!(gross_profit_pct(30.0, 150.0), 20.0);
/// assert!(gross_profit_pct(0.0, 0.0).is_nan());
/// ```
pub fn gross_profit_pct(profit: f64, sales: f64) -> f64 {
    if sales == 0.0 {
        return f64::NAN;
    }
    let pct = profit / sales * 100.0;
    if pct.is_finite() { pct } else { f64::NAN }
}

/// Coerce free text to a number.
///
/// Surrounding whitespace is ignored. Anything that does not parse as a
/// finite `f64` is treated as missing.
pub fn coerce_numeric(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}
