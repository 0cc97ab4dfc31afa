/*!
# Sales Dashboard

Per-item sales analytics over a tabular sales export, with ranked views,
an anomaly list and an Excel report, served from a small authenticated
web application or driven from the command line.

## Overview

A sales table (CSV or Excel) with the columns `Item Code`, `Items`,
`Qty Sold`, `Total Sales` and `Total Profit` is loaded, coerced and
aggregated into one summary row per item. From that summary the crate
derives:

- Top-N rankings by sales, profit and quantity sold
- Portfolio totals and the share of total held by the top items
- "High quantity, low profit" anomalies using linear-interpolated
  percentile thresholds
- A four-sheet `.xlsx` report of the ranked views and anomalies

## Architecture

### Core pipeline
- **transaction**: Raw row model and numeric coercion
- **loader**: CSV/Excel ingestion with header matching
- **summary**: Per-item aggregation, gross-profit percentage, totals and share
- **ranking**: Metric selection and stable descending Top-N
- **anomaly**: Percentile thresholds and the anomaly filter
- **dashboard**: Assembles views, insights and KPIs for a rendering layer
- **downloader**: Excel report and CSV export of ranked views
- **config**: Layered configuration (defaults, TOML file, environment)
- **error**: Crate-wide error type

### Web layer (`web` feature)
- **graph**: Horizontal bar charts rendered to PNG
- **login**: Single-user credential check and session store
- **app**: Routing, authentication middleware and handlers

## REST API Endpoints

- `GET /login`, `POST /login`, `GET /logout` - Authentication
- `GET /` - Dashboard page
- `GET /api/dashboard` - Dashboard as JSON
- `GET /chart/{view}` - PNG chart for one ranked view
- `GET /export` - Excel report download
- `POST /upload` - Replace the data source with an uploaded file
*/

pub mod anomaly;
pub mod config;
pub mod dashboard;
pub mod downloader;
pub mod error;
pub mod loader;
pub mod ranking;
pub mod summary;
pub mod transaction;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;
#[cfg(feature = "web")]
pub mod login;

pub use anomaly::{AnomalyReport, find_anomalies, percentile};
pub use config::{AppConfig, DashboardConfig, load_config};
pub use dashboard::{Dashboard, RankedView, ViewKind};
pub use downloader::export_report;
pub use error::{DashboardError, Result};
pub use loader::load_transactions;
pub use ranking::{Metric, top_n};
pub use summary::{ItemSummary, Totals, summarize, totals};
pub use transaction::Transaction;
