use actix_web::HttpResponse;
use serde_json::json;

/// Liveness only; dependencies are not checked
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
