#![cfg(feature = "web")]
use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use handlebars::Handlebars;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::dashboard::{Dashboard, ViewKind, format_gp, format_thousands};
use crate::downloader;
use crate::error::{DashboardError, Result};
use crate::graph::{ChartOptions, render_bar_chart};
use crate::loader;
use crate::login::{AccessGate, SESSION_COOKIE, SessionStore, UserCredentials};
use crate::transaction::{DISPLAY_COLUMNS, Transaction};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Where the dashboard reads its transactions from.
#[derive(Clone, Debug)]
pub enum DataSource {
    File(PathBuf),
    Upload { filename: String, bytes: Arc<Vec<u8>> },
}

impl DataSource {
    /// Load a fresh copy of the transaction table.
    pub fn load(&self, sheet: Option<&str>) -> Result<Vec<Transaction>> {
        match self {
            DataSource::File(path) => loader::load_transactions(path, sheet),
            DataSource::Upload { filename, bytes } => {
                loader::load_transactions_from_bytes(filename, bytes, sheet)
            }
        }
    }

    /// Human-readable name shown on the dashboard.
    pub fn label(&self) -> String {
        match self {
            DataSource::File(path) => path.display().to_string(),
            DataSource::Upload { filename, .. } => format!("{} (uploaded)", filename),
        }
    }
}

/// Shared state behind every handler.
///
/// Each request reloads the data source; only the source descriptor,
/// sessions and templates are shared.
pub struct AppState {
    pub config: AppConfig,
    pub gate: AccessGate,
    pub sessions: SessionStore,
    templates: Handlebars<'static>,
    source: RwLock<Option<DataSource>>,
}

impl AppState {
    /// Prepare templates, the access gate and the initial data source.
    ///
    /// # Arguments
    /// * `config` - Loaded application configuration
    ///
    /// # Returns
    /// * `Result<AppState>` - The state, or an error when a template does not
    ///   parse or the credentials are empty
    pub fn new(config: AppConfig) -> Result<Self> {
        let mut templates = Handlebars::new();
        templates
            .register_template_string("login", include_str!("./static/login.hbs"))
            .map_err(|e| DashboardError::Template(e.to_string()))?;
        templates
            .register_template_string("dashboard", include_str!("./static/dashboard.hbs"))
            .map_err(|e| DashboardError::Template(e.to_string()))?;

        let source = config.data.path.clone().map(DataSource::File);

        Ok(Self {
            gate: AccessGate::from_config(&config.auth)?,
            sessions: SessionStore::from_config(&config.auth),
            templates,
            source: RwLock::new(source),
            config,
        })
    }

    fn source(&self) -> Option<DataSource> {
        self.source.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_source(&self, source: DataSource) {
        log::info!("Data source set to {}", source.label());
        *self.source.write().unwrap_or_else(|e| e.into_inner()) = Some(source);
    }

    /// Recompute the dashboard from the current source. `None` when no
    /// source has been configured or uploaded yet.
    fn dashboard(&self) -> Result<Option<Dashboard>> {
        let Some(source) = self.source() else {
            return Ok(None);
        };
        let transactions = source.load(self.config.data.sheet.as_deref())?;
        Ok(Some(Dashboard::build(&transactions, &self.config.dashboard)))
    }

    fn render(&self, name: &str, context: &serde_json::Value) -> Result<String> {
        self.templates
            .render(name, context)
            .map_err(|e| DashboardError::Template(e.to_string()))
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::MissingColumns(_)
            | DashboardError::UnsupportedFormat(_)
            | DashboardError::SheetNotFound(_)
            | DashboardError::Csv(_)
            | DashboardError::Excel(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        log::error!("Request failed ({}): {}", status, self);
        (
            status,
            Json(json!({ "status": "error", "message": self.to_string() })),
        )
            .into_response()
    }
}

/// Build the application router.
///
/// # Arguments
/// * `state` - Shared application state
///
/// # Returns
/// * `Router` - Public login routes plus the session-protected dashboard,
///   API, chart, export and upload routes
pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.server.upload_limit_mb * 1024 * 1024;

    let protected = Router::new()
        .route("/", get(serve_dashboard))
        .route("/api/dashboard", get(get_dashboard))
        .route("/chart/:view", get(get_chart))
        .route("/export", get(export_workbook))
        .route("/export/:view", get(export_view_csv))
        .route("/upload", post(upload_source))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/login", get(serve_login_page).post(handle_login))
        .route("/logout", get(handle_logout))
        .merge(protected)
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

/// Start the web server and serve until shutdown.
pub async fn run(config: AppConfig) -> Result<()> {
    let bind = config.server.bind.clone();
    let state = Arc::new(AppState::new(config)?);
    let app = build_router(state);

    let listener = TcpListener::bind(&bind).await?;
    log::info!("Listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Authentication middleware
///
/// Lets the request through with a live session; otherwise API calls get
/// `401` and pages are redirected to the login form.
///
/// # Arguments
/// * `state` - Application state holding the session store
/// * `jar` - Cookie jar containing session information
/// * `request` - The incoming request
/// * `next` - Next middleware in the chain
///
/// # Returns
/// * `Response` - Either the downstream response, a `401` or a redirect
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if state.sessions.validate(cookie.value()).is_some() {
            return next.run(request).await;
        }
    }

    if request.uri().path().starts_with("/api/") {
        StatusCode::UNAUTHORIZED.into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

#[derive(Deserialize)]
struct MessageQuery {
    error: Option<String>,
}

async fn serve_login_page(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MessageQuery>,
) -> Result<Html<String>> {
    let page = state.render("login", &json!({ "error": params.error }))?;
    Ok(Html(page))
}

/// Handle user login requests
///
/// Sets the session cookie and sends the user to the dashboard when the
/// credentials match.
async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<UserCredentials>,
) -> Response {
    if !state.gate.verify(&credentials) {
        log::warn!("Failed login attempt for '{}'", credentials.username);
        let target = format!(
            "/login?error={}",
            urlencoding::encode("Invalid username or password")
        );
        return Redirect::to(&target).into_response();
    }

    let session_id = state.sessions.create(&credentials.username);
    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true);
    log::info!("User '{}' logged in", credentials.username);

    (jar.add(cookie), Redirect::to("/")).into_response()
}

/// Handle user logout
///
/// Revokes the session and clears the cookie.
async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.revoke(cookie.value());
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/login"))
}

fn view_context(dashboard: &Dashboard, state: &AppState) -> Vec<serde_json::Value> {
    dashboard
        .views
        .iter()
        .map(|view| {
            let insights: Vec<String> = view
                .insight
                .iter()
                .flat_map(|insight| [insight.leader_line(), insight.share_line()])
                .collect();
            let rows: Vec<serde_json::Value> = view
                .table
                .iter()
                .map(|item| {
                    json!({
                        "code": item.item_code,
                        "name": item.item_name,
                        "qty": format_thousands(item.qty_sold),
                        "sales": format_thousands(item.total_sales),
                        "profit": format_thousands(item.total_profit),
                        "gp": format_gp(item.gp_pct),
                    })
                })
                .collect();
            let empty_message = match view.kind {
                ViewKind::HighQtyLowProfit => "No items with high quantity sold and low profit.",
                _ => "No data.",
            };
            json!({
                "slug": view.kind.slug(),
                "title": view.title,
                "empty": view.is_empty(),
                "empty_message": empty_message,
                "insights": insights,
                "table_capacity": state.config.dashboard.table_capacity,
                "rows": rows,
            })
        })
        .collect()
}

async fn serve_dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MessageQuery>,
) -> Result<Response> {
    let source = state.source().map(|s| s.label());
    let (dashboard, error) = match state.dashboard() {
        Ok(dashboard) => (dashboard, params.error),
        Err(e) => {
            log::error!("Failed to build dashboard: {}", e);
            (None, Some(e.to_string()))
        }
    };

    let context = match &dashboard {
        Some(dashboard) => json!({
            "has_data": true,
            "source": source,
            "error": error,
            "columns": DISPLAY_COLUMNS,
            "kpis": {
                "sales": format_thousands(dashboard.totals.total_sales),
                "profit": format_thousands(dashboard.totals.total_profit),
                "qty": format_thousands(dashboard.totals.total_qty),
            },
            "views": view_context(dashboard, &state),
        }),
        None => json!({
            "has_data": false,
            "source": source,
            "error": error,
            "columns": DISPLAY_COLUMNS,
        }),
    };

    let page = state.render("dashboard", &context)?;
    Ok(Html(page).into_response())
}

fn no_data() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "error", "message": "No sales data loaded" })),
    )
        .into_response()
}

async fn get_dashboard(State(state): State<Arc<AppState>>) -> Result<Response> {
    Ok(match state.dashboard()? {
        Some(dashboard) => Json(dashboard).into_response(),
        None => no_data(),
    })
}

async fn get_chart(
    State(state): State<Arc<AppState>>,
    Path(view): Path<String>,
) -> Result<Response> {
    let Ok(kind) = view.parse::<ViewKind>() else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let Some(dashboard) = state.dashboard()? else {
        return Ok(no_data());
    };
    let rows = dashboard
        .view(kind)
        .map(|view| view.chart.as_slice())
        .unwrap_or(&[]);

    let options = ChartOptions::for_view(kind, state.config.dashboard.top_n);
    let png = render_bar_chart(rows, kind.metric(), &options)?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn export_workbook(State(state): State<Arc<AppState>>) -> Result<Response> {
    let Some(dashboard) = state.dashboard()? else {
        return Ok(no_data());
    };
    let bytes = dashboard.export()?;
    let filename = downloader::report_filename(chrono::Local::now().date_naive());

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Download the table rows of one ranked view as CSV.
async fn export_view_csv(
    State(state): State<Arc<AppState>>,
    Path(view): Path<String>,
) -> Result<Response> {
    let Ok(kind) = view.parse::<ViewKind>() else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let Some(dashboard) = state.dashboard()? else {
        return Ok(no_data());
    };
    let rows = dashboard
        .view(kind)
        .map(|view| view.table.as_slice())
        .unwrap_or(&[]);
    let csv = downloader::view_to_csv(rows)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.csv\"", kind.slug()),
            ),
        ],
        csv,
    )
        .into_response())
}

fn back_with_error(message: &str) -> Response {
    Redirect::to(&format!("/?error={}", urlencoding::encode(message))).into_response()
}

/// Replace the data source with an uploaded file.
///
/// The file is parsed once before it is accepted, so a bad upload leaves
/// the previous source in place.
async fn upload_source(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut upload = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, bytes.to_vec())),
                    Err(e) => return back_with_error(&format!("Upload failed: {}", e)),
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return back_with_error(&format!("Upload failed: {}", e)),
        }
    }

    let Some((filename, bytes)) = upload.filter(|(_, bytes)| !bytes.is_empty()) else {
        return back_with_error("No file data received");
    };

    let sheet = state.config.data.sheet.as_deref();
    match loader::load_transactions_from_bytes(&filename, &bytes, sheet) {
        Ok(rows) => {
            log::info!("Accepted upload '{}' with {} rows", filename, rows.len());
            state.set_source(DataSource::Upload {
                filename,
                bytes: Arc::new(bytes),
            });
            Redirect::to("/").into_response()
        }
        Err(e) => {
            log::warn!("Rejected upload '{}': {}", filename, e);
            back_with_error(&e.to_string())
        }
    }
}
