//! Request handlers and shared state.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use housing_learning::{HousingInputs, InferenceError, Predictor};
use tracing::{info, warn};

use crate::page::{render_page, Outcome};

/// State shared by every handler; read-only after startup.
#[derive(Debug)]
pub struct AppState {
    /// Loaded artifact behind its prediction pipeline.
    pub predictor: Predictor,
}

/// `GET /`: the slider form at its defaults.
pub async fn index_handler() -> Html<String> {
    Html(render_page(&HousingInputs::default(), &Outcome::Empty))
}

/// `POST /predict`: form submission; re-renders the form with the result.
pub async fn form_predict_handler(
    State(state): State<Arc<AppState>>,
    Form(inputs): Form<HousingInputs>,
) -> Response {
    match state.predictor.predict_inputs(&inputs) {
        Ok(prediction) => {
            info!(value = prediction.value, "form prediction");
            Html(render_page(&inputs, &Outcome::Value(prediction.formatted))).into_response()
        }
        Err(err) => {
            warn!(error = %err, "form prediction rejected");
            let status = status_for(&err);
            (status, Html(render_page(&inputs, &Outcome::Error(err.to_string())))).into_response()
        }
    }
}

/// `POST /api/predict`: JSON inputs to `{raw, value, formatted}`.
pub async fn api_predict_handler(
    State(state): State<Arc<AppState>>,
    Json(inputs): Json<HousingInputs>,
) -> Response {
    match state.predictor.predict_inputs(&inputs) {
        Ok(prediction) => {
            info!(value = prediction.value, "api prediction");
            Json(prediction).into_response()
        }
        Err(err) => {
            warn!(error = %err, "api prediction rejected");
            let body = serde_json::json!({ "error": err.to_string() });
            (status_for(&err), Json(body)).into_response()
        }
    }
}

/// `GET /health`: which artifact is being served.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let artifact = state.predictor.artifact();
    Json(serde_json::json!({
        "status": "ok",
        "run_id": artifact.run_id(),
        "model": artifact.model().kind(),
        "created_at": artifact.created_at().to_rfc3339(),
    }))
}

fn status_for(err: &InferenceError) -> StatusCode {
    match err {
        InferenceError::Input(_) | InferenceError::Feature(_) => StatusCode::UNPROCESSABLE_ENTITY,
        InferenceError::NonFinite => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
