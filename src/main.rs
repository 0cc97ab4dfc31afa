use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL};
use sales_dashboard::config::load_config;
use sales_dashboard::dashboard::{Dashboard, ViewKind, format_gp, format_thousands};
use sales_dashboard::downloader::view_to_csv;
use sales_dashboard::loader::load_transactions;
use sales_dashboard::ranking::{Metric, top_n};
use sales_dashboard::summary::ItemSummary;
use sales_dashboard::transaction::DISPLAY_COLUMNS;
use std::path::PathBuf;

/// Per-item sales rankings, anomalies and Excel reports.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to dashboard.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a ranked summary of a sales file.
    Summary(SummaryArgs),
    /// Write the four-sheet Excel report.
    Export(ExportArgs),
    /// Render the chart of one ranked view to a PNG file.
    #[cfg(feature = "web")]
    Chart(ChartArgs),
}

#[derive(Parser)]
struct SummaryArgs {
    /// CSV or Excel sales file.
    input: PathBuf,

    /// Ranking metric: sales, profit or qty.
    #[arg(long, default_value = "sales")]
    metric: Metric,

    /// Number of rows to print (defaults to the configured top_n).
    #[arg(long)]
    limit: Option<usize>,

    /// Also print the high quantity / low profit items.
    #[arg(long)]
    anomalies: bool,

    /// Print the ranked rows as CSV instead of a table.
    #[arg(long)]
    csv: bool,
}

#[derive(Parser)]
struct ExportArgs {
    /// CSV or Excel sales file.
    input: PathBuf,

    /// Output path (defaults to sales_report_YYYYMMDD.xlsx).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[cfg(feature = "web")]
#[derive(Parser)]
struct ChartArgs {
    /// CSV or Excel sales file.
    input: PathBuf,

    /// One of top-sales, top-profit, top-qty, high-qty-low-profit.
    #[arg(long)]
    view: ViewKind,

    /// PNG output path.
    #[arg(long)]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let sheet = config.data.sheet.as_deref();

    match cli.command {
        Commands::Summary(args) => {
            let transactions = load_transactions(&args.input, sheet)
                .with_context(|| format!("Failed to load {}", args.input.display()))?;
            let dashboard = Dashboard::build(&transactions, &config.dashboard);
            let limit = args.limit.unwrap_or(config.dashboard.top_n);

            if args.csv {
                let ranked = top_n(&dashboard.summary, args.metric, limit);
                print!("{}", view_to_csv(&ranked).context("Failed to write CSV")?);
                return Ok(());
            }

            println!(
                "Total Sales: {}  Total Profit: {}  Total Qty Sold: {}",
                format_thousands(dashboard.totals.total_sales),
                format_thousands(dashboard.totals.total_profit),
                format_thousands(dashboard.totals.total_qty),
            );
            println!();
            let kind = match args.metric {
                Metric::TotalSales => ViewKind::TopSales,
                Metric::TotalProfit => ViewKind::TopProfit,
                Metric::QtySold => ViewKind::TopQty,
            };
            if let Some(insight) = dashboard.view(kind).and_then(|view| view.insight.as_ref()) {
                println!("{}", insight.leader_line());
                println!("{}", insight.share_line());
                println!();
            }
            println!("Top {} by {}", limit, args.metric);
            println!("{}", summary_table(&top_n(&dashboard.summary, args.metric, limit)));

            if args.anomalies {
                let report = &dashboard.anomalies;
                println!();
                println!(
                    "High Qty Sold / Low Profit ({} items, qty >= {}, profit <= {})",
                    report.len(),
                    threshold(report.qty_threshold),
                    threshold(report.profit_threshold),
                );
                if report.is_empty() {
                    println!("No items with high quantity sold and low profit.");
                } else {
                    println!("{}", summary_table(&report.items));
                }
            }
        }
        Commands::Export(args) => {
            let transactions = load_transactions(&args.input, sheet)
                .with_context(|| format!("Failed to load {}", args.input.display()))?;
            let dashboard = Dashboard::build(&transactions, &config.dashboard);
            let bytes = dashboard.export().context("Failed to build the report")?;

            let output = args.output.unwrap_or_else(|| {
                PathBuf::from(sales_dashboard::downloader::report_filename(
                    chrono::Local::now().date_naive(),
                ))
            });
            std::fs::write(&output, bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Report written to {}", output.display());
        }
        #[cfg(feature = "web")]
        Commands::Chart(args) => {
            use sales_dashboard::graph::{ChartOptions, render_bar_chart};

            let transactions = load_transactions(&args.input, sheet)
                .with_context(|| format!("Failed to load {}", args.input.display()))?;
            let dashboard = Dashboard::build(&transactions, &config.dashboard);
            let rows = dashboard
                .view(args.view)
                .map(|view| view.chart.as_slice())
                .unwrap_or(&[]);

            let options = ChartOptions::for_view(args.view, config.dashboard.top_n);
            let png = render_bar_chart(rows, args.view.metric(), &options)
                .context("Failed to render chart")?;
            std::fs::write(&args.output, png)
                .with_context(|| format!("Failed to write {}", args.output.display()))?;
            println!("Chart written to {}", args.output.display());
        }
    }

    Ok(())
}

fn threshold(value: Option<f64>) -> String {
    value.map(format_thousands).unwrap_or_else(|| "-".to_string())
}

fn summary_table(rows: &[ItemSummary]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(DISPLAY_COLUMNS.to_vec());

    for item in rows {
        table.add_row(vec![
            Cell::new(&item.item_code),
            Cell::new(&item.item_name),
            Cell::new(format_thousands(item.qty_sold)).set_alignment(CellAlignment::Right),
            Cell::new(format_thousands(item.total_sales)).set_alignment(CellAlignment::Right),
            Cell::new(format_thousands(item.total_profit)).set_alignment(CellAlignment::Right),
            Cell::new(format_gp(item.gp_pct)).set_alignment(CellAlignment::Right),
        ]);
    }

    table
}
