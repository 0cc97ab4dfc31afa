use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use sales_dashboard::app::{AppState, build_router};
use sales_dashboard::config::AppConfig;
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt;

const SALES_CSV: &str = "\
Item Code,Items,Qty Sold,Total Sales,Total Profit
A,Widget,100,1000,10
B,Gadget,10,500,200
C,Gizmo,50,800,300
";

fn config_with_data(file: Option<&tempfile::NamedTempFile>) -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.username = "manager".to_string();
    config.auth.password = "letmein".to_string();
    config.data.path = file.map(|f| f.path().to_path_buf());
    config
}

fn sales_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(SALES_CSV.as_bytes()).unwrap();
    file
}

fn router(config: AppConfig) -> axum::Router {
    build_router(Arc::new(AppState::new(config).unwrap()))
}

async fn login(app: &axum::Router, password: &str) -> axum::response::Response {
    let body = format!("username=manager&password={}", password);
    app.clone()
        .oneshot(
            Request::post("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn session_cookie(app: &axum::Router) -> String {
    let response = login(app, "letmein").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn get(app: &axum::Router, uri: &str, cookie: Option<&str>) -> axum::response::Response {
    let mut request = Request::get(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn pages_redirect_to_login_without_session() {
    let app = router(config_with_data(None));
    let response = get(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
}

#[tokio::test]
async fn api_rejects_without_session() {
    let app = router(config_with_data(None));
    let response = get(&app, "/api/dashboard", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_page_is_public() {
    let app = router(config_with_data(None));
    let response = get(&app, "/login", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_goes_back_to_login() {
    let app = router(config_with_data(None));
    let response = login(&app, "nope").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("/login?error="));
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn dashboard_json_after_login() {
    let file = sales_file();
    let app = router(config_with_data(Some(&file)));
    let cookie = session_cookie(&app).await;

    let response = get(&app, "/api/dashboard", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["totals"]["total_sales"], 2300.0);
    assert_eq!(json["summary"].as_array().unwrap().len(), 3);
    assert_eq!(json["views"].as_array().unwrap().len(), 4);
    assert_eq!(json["views"][0]["chart"][0]["item_code"], "A");
}

#[tokio::test]
async fn dashboard_page_renders_after_login() {
    let file = sales_file();
    let app = router(config_with_data(Some(&file)));
    let cookie = session_cookie(&app).await;

    let response = get(&app, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("Total Sales"));
    assert!(html.contains("/chart/top-sales"));
    assert!(html.contains("Widget"));
}

#[tokio::test]
async fn export_downloads_a_workbook() {
    let file = sales_file();
    let app = router(config_with_data(Some(&file)));
    let cookie = session_cookie(&app).await;

    let response = get(&app, "/export", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("sales_report_"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.starts_with(b"PK"));
}

#[tokio::test]
async fn chart_is_served_as_png() {
    let file = sales_file();
    let app = router(config_with_data(Some(&file)));
    let cookie = session_cookie(&app).await;

    let response = get(&app, "/chart/top-sales", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.starts_with(&[0x89, b'P', b'N', b'G']));
}

#[tokio::test]
async fn view_downloads_as_csv() {
    let file = sales_file();
    let app = router(config_with_data(Some(&file)));
    let cookie = session_cookie(&app).await;

    let response = get(&app, "/export/top-profit", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv; charset=utf-8"
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(body.to_vec()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("Item Code,Items,Qty Sold,Total Sales,Total Profit,GP%"));
    assert_eq!(lines.next(), Some("C,Gizmo,50,800,300,37.50"));

    let response = get(&app, "/export/bottom-sales", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_chart_view_is_not_found() {
    let file = sales_file();
    let app = router(config_with_data(Some(&file)));
    let cookie = session_cookie(&app).await;

    let response = get(&app, "/chart/bottom-sales", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn no_source_is_not_found() {
    let app = router(config_with_data(None));
    let cookie = session_cookie(&app).await;

    let response = get(&app, "/api/dashboard", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = get(&app, "/export", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = router(config_with_data(None));
    let cookie = session_cookie(&app).await;

    let response = get(&app, "/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = get(&app, "/api/dashboard", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upload_replaces_the_source() {
    let app = router(config_with_data(None));
    let cookie = session_cookie(&app).await;

    let boundary = "X-SALES-BOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"week.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = boundary,
        csv = SALES_CSV
    );
    let response = app
        .clone()
        .oneshot(
            Request::post("/upload")
                .header(header::COOKIE, &cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let response = get(&app, "/api/dashboard", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}
