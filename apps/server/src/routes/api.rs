use actix_web::http::header;
use actix_web::{HttpResponse, get, post, web};
use egress::export::ExportFormat;
use egress::ranker::sorted_by_rank;
use egress::{EgressContext, RunRequest, RunSummary};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;

macros_utils::routes! {
    route list_endpoints,
    route start_test,
    route test_results,
    route export_results,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    test_id: Uuid,
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

/// Unparseable ids cannot name a run, so they are simply not found
fn parse_run_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(None))
}

/// Candidate endpoints, from the directory or the built-in list
#[get("/api/endpoints")]
async fn list_endpoints(context: web::Data<EgressContext>) -> HttpResponse {
    HttpResponse::Ok().json(context.directory.endpoints().await)
}

#[post("/api/test/start")]
async fn start_test(
    context: web::Data<EgressContext>,
    request: web::Json<RunRequest>,
) -> Result<HttpResponse, ApiError> {
    let test_id = context.runs.submit(request.into_inner()).await?;
    info!(run_id = %test_id, "Test submitted");
    Ok(HttpResponse::Ok().json(StartResponse { test_id }))
}

#[get("/api/test/results/{test_id}")]
async fn test_results(
    context: web::Data<EgressContext>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let run_id = parse_run_id(&path)?;
    let snapshot = context.runs.poll(run_id).await.ok_or(ApiError::NotFound(Some(run_id)))?;
    let summary = RunSummary::from_results(&snapshot.results);

    Ok(HttpResponse::Ok().json(json!({
        "results": snapshot.results,
        "progress": snapshot.progress,
        "summary": summary,
    })))
}

#[get("/api/test/results/{test_id}/export")]
async fn export_results(
    context: web::Data<EgressContext>,
    path: web::Path<String>,
    query: web::Query<ExportQuery>,
) -> Result<HttpResponse, ApiError> {
    let run_id = parse_run_id(&path)?;
    let format = match query.format.as_deref() {
        None => ExportFormat::Csv,
        Some(raw) => raw.parse::<ExportFormat>().map_err(ApiError::BadRequest)?,
    };

    let snapshot = context.runs.poll(run_id).await.ok_or(ApiError::NotFound(Some(run_id)))?;
    let body = format.render(&sorted_by_rank(&snapshot.results))?;
    let filename = format!("egress-results-{run_id}.{}", format.extension());

    Ok(HttpResponse::Ok()
        .content_type(format.content_type())
        .insert_header((header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")))
        .body(body))
}
