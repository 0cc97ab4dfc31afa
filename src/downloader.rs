use crate::dashboard::ViewKind;
use crate::error::Result;
use crate::summary::ItemSummary;
use crate::transaction::DISPLAY_COLUMNS;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

/// Write one view as a sheet: a bold header row, then one row per item.
fn write_view_sheet(worksheet: &mut Worksheet, name: &str, rows: &[ItemSummary]) -> Result<()> {
    let header = Format::new().set_bold();
    let whole = Format::new().set_num_format("#,##0");
    let pct = Format::new().set_num_format("0.00");

    worksheet.set_name(name)?;

    for (col, title) in DISPLAY_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    worksheet.set_column_width(1, 32.0)?;

    for (i, item) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        worksheet.write_string(row, 0, &item.item_code)?;
        worksheet.write_string(row, 1, &item.item_name)?;
        worksheet.write_number_with_format(row, 2, item.qty_sold, &whole)?;
        worksheet.write_number_with_format(row, 3, item.total_sales, &whole)?;
        worksheet.write_number_with_format(row, 4, item.total_profit, &whole)?;
        // An undefined GP% stays blank
        if item.gp_pct.is_finite() {
            worksheet.write_number_with_format(row, 5, item.gp_pct, &pct)?;
        }
    }

    Ok(())
}

/// Build the summary workbook.
///
/// Sheets, in order: `Top Qty Sold`, `Top Sales`, `Top Profit`,
/// `High Sales Low Profit`. Each carries the six display columns; empty
/// views produce a header-only sheet.
///
/// # Examples
/// ```
/// use sales_dashboard::downloader::export_report;
///
/// let bytes = export_report(&[], &[], &[], &[]).unwrap();
/// assert!(bytes.starts_with(b"PK"));
/// ```
pub fn export_report(
    top_sales: &[ItemSummary],
    top_profit: &[ItemSummary],
    top_qty: &[ItemSummary],
    anomalies: &[ItemSummary],
) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let sheets = [
        (ViewKind::TopQty, top_qty),
        (ViewKind::TopSales, top_sales),
        (ViewKind::TopProfit, top_profit),
        (ViewKind::HighQtyLowProfit, anomalies),
    ];

    for (kind, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        write_view_sheet(worksheet, kind.sheet_name(), rows)?;
    }

    let buffer = workbook.save_to_buffer()?;
    log::info!("Exported workbook ({} bytes)", buffer.len());
    Ok(buffer)
}

/// Render one view as CSV text with the display columns.
///
/// # Arguments
/// * `rows` - The ranked rows to write, in order
///
/// # Returns
/// * `Result<String>` - Header line plus one line per row; an undefined
///   `GP%` is an empty field
pub fn view_to_csv(rows: &[ItemSummary]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(DISPLAY_COLUMNS)?;

    for item in rows {
        let gp = if item.gp_pct.is_finite() {
            format!("{:.2}", item.gp_pct)
        } else {
            String::new()
        };
        writer.write_record([
            item.item_code.clone(),
            item.item_name.clone(),
            item.qty_sold.to_string(),
            item.total_sales.to_string(),
            item.total_profit.to_string(),
            gp,
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Download name for a workbook generated on `date`, e.g.
/// `sales_report_20240131.xlsx`.
pub fn report_filename(date: chrono::NaiveDate) -> String {
    format!("sales_report_{}.xlsx", date.format("%Y%m%d"))
}
