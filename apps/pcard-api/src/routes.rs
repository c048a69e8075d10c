use axum::{
	Json, Router,
	extract::State,
	http::{HeaderMap, StatusCode, header::AUTHORIZATION},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use pcard_service::{Error, InvalidationReport, LookupRequest, LookupResponse, ProductStateReport};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateRequest {
	pub product_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductActiveRequest {
	pub product_id: i64,
	pub active: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	message: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	details: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	raw: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	body: ErrorBody,
}
impl ApiError {
	fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
		Self {
			status,
			body: ErrorBody { error, message: Some(message.into()), details: None, raw: None },
		}
	}
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
			Error::NotFound { message } => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
			Error::Upstream { service, message } => {
				tracing::error!(service, error = %message, "Upstream call failed.");

				Self::new(
					StatusCode::INTERNAL_SERVER_ERROR,
					"UPSTREAM_FAILURE",
					format!("{service}: {message}"),
				)
			},
			Error::SchemaViolation { details, raw } => Self {
				status: StatusCode::BAD_GATEWAY,
				body: ErrorBody {
					error: "SCHEMA_VIOLATION",
					message: None,
					details: Some(details),
					raw: Some(raw),
				},
			},
			Error::Storage { message } => {
				tracing::error!(error = %message, "Storage failure.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", message)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status, Json(self.body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/cards/lookup", post(lookup))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/admin/cache/invalidate", post(invalidate_cache))
		.route("/v1/admin/products/active", post(set_product_active))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn lookup(
	State(state): State<AppState>,
	Json(payload): Json<LookupRequest>,
) -> Result<Json<LookupResponse>, ApiError> {
	let response = state.service.lookup(payload).await?;

	Ok(Json(response))
}

async fn invalidate_cache(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<InvalidateRequest>,
) -> Result<Json<InvalidationReport>, ApiError> {
	authorize_admin(&state, &headers)?;

	let report = state.service.invalidate_product(&payload.product_name).await?;

	Ok(Json(report))
}

async fn set_product_active(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<ProductActiveRequest>,
) -> Result<Json<ProductStateReport>, ApiError> {
	authorize_admin(&state, &headers)?;

	let report = state.service.set_product_active(payload.product_id, payload.active).await?;

	Ok(Json(report))
}

fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
	let Some(expected) = state.service.cfg.security.admin_auth_token.as_deref() else {
		return Ok(());
	};
	let presented = headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.map(str::trim);

	if presented == Some(expected) {
		Ok(())
	} else {
		Err(ApiError::new(
			StatusCode::UNAUTHORIZED,
			"UNAUTHORIZED",
			"Missing or invalid admin token.",
		))
	}
}
