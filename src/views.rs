use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};
use kube::core::admission::{AdmissionRequest, AdmissionReview};
use kube::core::DynamicObject;
use log::error;
use serde::Serialize;
use serde_json::json;

use crate::cluster::ReadinessGate;
use crate::AdmissionEngine;

pub struct AppState {
    pub engine: AdmissionEngine,
    pub gate: ReadinessGate,
}

#[derive(Serialize)]
struct JsonErr {
    err: String,
}

fn bad_request(err: String) -> HttpResponse {
    error!("Rejecting admission payload: {}", err);
    HttpResponse::BadRequest().json(JsonErr { err })
}

/// Register the webhook routes
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").to(health))
        .service(web::resource("/ready").to(ready))
        .service(web::resource("/mutate").route(web::post().to(mutate)));
}

// Simple health check endpoint
pub async fn health(_req: HttpRequest) -> HttpResponse {
    HttpResponse::new(StatusCode::OK)
}

// Whether reads are served from the synced snapshot yet
pub async fn ready(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "synced": data.gate.is_ready() }))
}

// Mutating admission webhook
pub async fn mutate(data: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let review: AdmissionReview<DynamicObject> = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(err) => return bad_request(format!("invalid JSON input: {}", err)),
    };
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(request) => request,
        Err(err) => return bad_request(err.to_string()),
    };

    let response = data.engine.review(&request).await;
    HttpResponse::Ok().json(response.into_review())
}
