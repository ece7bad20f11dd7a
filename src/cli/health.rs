use std::path::Path;
use std::time::Instant;

use crate::error::PipelineError;
use crate::sources::DocumentSource;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthRow {
    pub api: String,
    pub status: String,
    pub latency: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub total: usize,
    pub rows: Vec<HealthRow>,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.healthy == self.total
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Pipeline Search Health Check\n\n");
        out.push_str("| Check | Status | Latency |\n");
        out.push_str("|-------|--------|---------|\n");
        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                row.api, row.status, row.latency
            ));
        }
        out.push_str(&format!(
            "\nStatus: {}/{} checks healthy\n",
            self.healthy, self.total
        ));
        out
    }
}

async fn check_source(source: &dyn DocumentSource) -> HealthRow {
    let start = Instant::now();
    let result = source.probe().await;
    let elapsed = start.elapsed().as_millis();

    match result {
        Ok(()) => HealthRow {
            api: source.name().to_string(),
            status: "ok".into(),
            latency: format!("{elapsed}ms"),
        },
        Err(err) => {
            let reason = match &err {
                PipelineError::SourceUnavailable { reason, .. } => reason.clone(),
                PipelineError::Auth(_) => "auth".into(),
                PipelineError::HttpMiddleware(_) | PipelineError::Http(_) => "connect".into(),
                _ => err.to_string(),
            };
            HealthRow {
                api: source.name().to_string(),
                status: "error".into(),
                latency: format!("{elapsed}ms ({reason})"),
            }
        }
    }
}

async fn check_frontend(dir: &Path) -> HealthRow {
    let start = Instant::now();
    let index = dir.join("index.html");
    let status = match tokio::fs::metadata(&index).await {
        Ok(meta) if meta.is_file() => "ok",
        _ => "missing",
    };
    HealthRow {
        api: format!("Front-end ({})", dir.display()),
        status: status.into(),
        latency: format!("{}ms", start.elapsed().as_millis()),
    }
}

/// Probes the document source and the front-end build directory.
///
/// A missing front-end build does not count against health; the server falls back to a
/// placeholder page.
pub async fn check(source: &dyn DocumentSource, frontend_dir: &Path) -> HealthReport {
    let (source_row, frontend_row) =
        tokio::join!(check_source(source), check_frontend(frontend_dir));

    let healthy = usize::from(source_row.status == "ok") + 1;
    HealthReport {
        healthy,
        total: 2,
        rows: vec![source_row, frontend_row],
    }
}
