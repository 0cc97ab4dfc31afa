use crate::error::{DashboardError, Result};
use crate::transaction::{REQUIRED_COLUMNS, Transaction, coerce_numeric};
use calamine::{Data, Reader, Sheets};
use std::io::{Cursor, Read, Seek};
use std::path::Path;

/// A cell as read from a source file, before coercion.
#[derive(Clone, Debug, PartialEq)]
enum RawCell {
    Empty,
    Text(String),
    Number(f64),
}

impl RawCell {
    fn is_empty(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(text) => text.trim().is_empty(),
            RawCell::Number(_) => false,
        }
    }

    /// Identifier rendering: whole numbers lose their `.0`, text is trimmed.
    fn to_label(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(text) => text.trim().to_string(),
            RawCell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            RawCell::Number(n) => n.to_string(),
        }
    }

    fn to_number(&self) -> Option<f64> {
        match self {
            RawCell::Empty => None,
            RawCell::Text(text) => coerce_numeric(text),
            RawCell::Number(n) if n.is_finite() => Some(*n),
            RawCell::Number(_) => None,
        }
    }
}

impl From<&Data> for RawCell {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Int(i) => RawCell::Number(*i as f64),
            Data::Float(f) => RawCell::Number(*f),
            Data::Bool(b) => RawCell::Number(if *b { 1.0 } else { 0.0 }),
            Data::String(s) => RawCell::Text(s.clone()),
            // Dates, durations and error cells are not sales figures
            _ => RawCell::Empty,
        }
    }
}

/// Map each required column to its index in `headers`.
///
/// Matching trims whitespace and ignores ASCII case. Every missing column is
/// reported at once.
fn locate_columns(headers: &[String]) -> Result<[usize; 5]> {
    let mut indices = [0usize; 5];
    let mut missing = Vec::new();

    for (slot, wanted) in REQUIRED_COLUMNS.iter().enumerate() {
        match headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
        {
            Some(idx) => indices[slot] = idx,
            None => missing.push(wanted.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(indices)
    } else {
        Err(DashboardError::MissingColumns(missing))
    }
}

/// Turn a header row plus raw data rows into transactions.
fn build_transactions<I>(headers: &[String], rows: I) -> Result<Vec<Transaction>>
where
    I: IntoIterator<Item = Vec<RawCell>>,
{
    let [code, name, qty, sales, profit] = locate_columns(headers)?;
    let mut transactions = Vec::new();
    let mut coerced = 0usize;

    for row in rows {
        if row.iter().all(RawCell::is_empty) {
            continue;
        }
        let cell = |idx: usize| row.get(idx).cloned().unwrap_or(RawCell::Empty);

        let numbers = [cell(qty), cell(sales), cell(profit)];
        coerced += numbers
            .iter()
            .filter(|c| !c.is_empty() && c.to_number().is_none())
            .count();

        transactions.push(Transaction::create(
            cell(code).to_label(),
            cell(name).to_label(),
            numbers[0].to_number(),
            numbers[1].to_number(),
            numbers[2].to_number(),
        ));
    }

    if coerced > 0 {
        log::warn!("{} non-numeric cell(s) treated as missing", coerced);
    }
    log::info!("Loaded {} transaction rows", transactions.len());
    Ok(transactions)
}

/// Read transactions from CSV data with a header row.
///
/// # Examples
/// ```
/// use sales_dashboard::loader::from_csv_reader;
///
/// let data = "Item Code,Items,Qty Sold,Total Sales,Total Profit\nA,Apples,3,30,6\n";
/// let rows = from_csv_reader(data.as_bytes()).unwrap();
/// assert_eq!(rows[0].qty_sold, Some(3.0));
/// ```
pub fn from_csv_reader<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        RawCell::Empty
                    } else {
                        RawCell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    build_transactions(&headers, rows)
}

/// Load transactions from a CSV file.
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Vec<Transaction>> {
    let file = std::fs::File::open(filepath)?;
    from_csv_reader(file)
}

fn from_workbook<RS: Read + Seek>(
    mut workbook: Sheets<RS>,
    sheet: Option<&str>,
) -> Result<Vec<Transaction>> {
    let sheet_name = match sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(DashboardError::SheetNotFound(name.to_string()));
            }
            name.to_string()
        }
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| DashboardError::SheetNotFound("<first sheet>".to_string()))?,
    };

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();

    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| RawCell::from(cell).to_label())
            .collect(),
        None => Vec::new(),
    };

    log::debug!("Reading sheet '{}' ({} columns)", sheet_name, headers.len());
    build_transactions(
        &headers,
        rows.map(|row| row.iter().map(RawCell::from).collect::<Vec<_>>()),
    )
}

/// Load transactions from an Excel workbook file (xlsx, xlsm, xls, xlsb, ods).
///
/// Reads `sheet` when given, otherwise the first worksheet.
pub fn from_excel(filepath: impl AsRef<Path>, sheet: Option<&str>) -> Result<Vec<Transaction>> {
    let workbook = calamine::open_workbook_auto(filepath)?;
    from_workbook(workbook, sheet)
}

/// Load transactions from an in-memory Excel workbook, e.g. an upload.
pub fn from_excel_bytes(bytes: &[u8], sheet: Option<&str>) -> Result<Vec<Transaction>> {
    let workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;
    from_workbook(workbook, sheet)
}

/// Lower-cased extension of a file name, if it has one.
pub fn extension_of(name: impl AsRef<Path>) -> Option<String> {
    name.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn is_excel_extension(ext: &str) -> bool {
    matches!(ext, "xlsx" | "xlsm" | "xls" | "xlsb" | "ods")
}

/// Detect file type and load the appropriate format.
///
/// # Examples
/// ```no_run
/// use sales_dashboard::loader::load_transactions;
///
/// match load_transactions("sales.xlsx", None) {
///     Ok(rows) => println!("Loaded {} rows", rows.len()),
///     Err(e) => eprintln!("Error loading file: {}", e),
/// }
/// ```
pub fn load_transactions(
    filepath: impl AsRef<Path>,
    sheet: Option<&str>,
) -> Result<Vec<Transaction>> {
    let path = filepath.as_ref();
    log::info!("Loading transactions from {}", path.display());

    match extension_of(path).as_deref() {
        Some("csv") => from_csv(path),
        Some(ext) if is_excel_extension(ext) => from_excel(path, sheet),
        Some(ext) => Err(DashboardError::UnsupportedFormat(ext.to_string())),
        None => Err(DashboardError::UnsupportedFormat(format!(
            "{} has no extension",
            path.display()
        ))),
    }
}

/// Same as [`load_transactions`] for data already in memory; `filename`
/// only selects the format.
pub fn load_transactions_from_bytes(
    filename: &str,
    bytes: &[u8],
    sheet: Option<&str>,
) -> Result<Vec<Transaction>> {
    match extension_of(filename).as_deref() {
        Some("csv") => from_csv_reader(bytes),
        Some(ext) if is_excel_extension(ext) => from_excel_bytes(bytes, sheet),
        Some(ext) => Err(DashboardError::UnsupportedFormat(ext.to_string())),
        None => Err(DashboardError::UnsupportedFormat(format!(
            "{} has no extension",
            filename
        ))),
    }
}
