use axum::Json;
use axum::extract::{Query, State};
use axum::response::Html;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::entities::record::Record;
use crate::entities::search::{self, SearchFilters, SearchResults};
use crate::entities::stats::{self, FilterOptions, Stats};
use crate::server::AppState;

const FALLBACK_PAGE: &str = r#"<!DOCTYPE html>
<html>
    <head><meta charset="utf-8"><title>Pipeline Search</title></head>
    <body>
        <h1>Front-end not built yet</h1>
        <p>Run: cd frontend &amp;&amp; npm install &amp;&amp; npm run build</p>
        <p>Or for development: cd frontend &amp;&amp; npm start</p>
    </body>
</html>
"#;

#[derive(Debug, Serialize)]
pub(crate) struct DataResponse {
    pub total: usize,
    pub data: Vec<Record>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshResponse {
    pub status: &'static str,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub status: &'static str,
    /// True once the first refresh has published a snapshot.
    pub loaded: bool,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<String>,
}

pub(crate) async fn home(State(state): State<AppState>) -> Html<String> {
    let index = state.frontend_dir.join("index.html");
    match tokio::fs::read_to_string(&index).await {
        Ok(page) => Html(page),
        Err(err) => {
            debug!(path = %index.display(), "Front-end index unavailable: {err}");
            Html(FALLBACK_PAGE.to_string())
        }
    }
}

pub(crate) async fn search(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Json<SearchResults> {
    let filters: SearchFilters = pairs.into_iter().collect();
    let snapshot = state.refresher.store().current();
    Json(search::search(snapshot.records(), &filters))
}

pub(crate) async fn filters(State(state): State<AppState>) -> Json<FilterOptions> {
    let snapshot = state.refresher.store().current();
    Json(stats::filter_options(snapshot.records()))
}

pub(crate) async fn stats(State(state): State<AppState>) -> Json<Stats> {
    let snapshot = state.refresher.store().current();
    Json(stats::stats(snapshot.records()))
}

pub(crate) async fn data(State(state): State<AppState>) -> Json<DataResponse> {
    let snapshot = state.refresher.store().current();
    Json(DataResponse {
        total: snapshot.len(),
        data: snapshot.records().to_vec(),
    })
}

pub(crate) async fn refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let outcome = state.refresher.refresh().await;
    Json(RefreshResponse {
        status: "success",
        count: outcome.count,
    })
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.refresher.store().current();
    let refreshed_at = snapshot
        .refreshed_at()
        .and_then(|at| at.format(&Rfc3339).ok());
    Json(HealthResponse {
        status: "ok",
        loaded: refreshed_at.is_some(),
        records: snapshot.len(),
        refreshed_at,
    })
}
