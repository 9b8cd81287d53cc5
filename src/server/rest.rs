// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! REST handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};

use super::AppState;
use crate::dispatcher::CommandOutcome;
use crate::error::Error;
use crate::registry::DeviceSummary;
use crate::types::MacAddress;

/// Body of `GET /`.
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    app: &'static str,
    version: &'static str,
    devices: Vec<MacAddress>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

/// Maps crate errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(Error);

impl ApiError {
    /// Returns the status code for the error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            Error::UnsupportedParameter { .. } | Error::MalformedRequest(_) | Error::Value(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::DeviceCommandFailed { .. } | Error::Transport(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::Discovery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn parse_mac(raw: &str) -> Result<MacAddress, ApiError> {
    raw.parse().map_err(|e| ApiError(Error::Value(e)))
}

/// GET /
pub async fn index(State(state): State<AppState>) -> Json<IndexResponse> {
    Json(IndexResponse {
        app: "climate-hub",
        version: env!("CARGO_PKG_VERSION"),
        devices: state.manager.macs(),
    })
}

/// GET /devices
pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<DeviceSummary>> {
    Json(state.manager.devices())
}

/// GET /devices/:mac
pub async fn get_device(
    State(state): State<AppState>,
    Path(mac): Path<String>,
) -> Result<Json<DeviceSummary>, ApiError> {
    let mac = parse_mac(&mac)?;
    Ok(Json(state.manager.device(&mac)?))
}

/// PATCH /devices/:mac
///
/// Answers `204` when the device changed and `304` when it did not.
pub async fn update_device(
    State(state): State<AppState>,
    Path(mac): Path<String>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let mac = parse_mac(&mac)?;
    let Json(request) = body.map_err(|e| ApiError(Error::MalformedRequest(e.body_text())))?;

    match state.manager.apply(mac.as_str(), &request).await? {
        CommandOutcome::Changed(_) => Ok(StatusCode::NO_CONTENT),
        CommandOutcome::NotChanged => Ok(StatusCode::NOT_MODIFIED),
    }
}

/// POST /discover
pub async fn discover(State(state): State<AppState>) -> Json<Vec<MacAddress>> {
    let report = state.manager.rediscover().await;
    tracing::debug!(added = report.added.len(), "Rescan requested");
    Json(state.manager.macs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, ValueError};

    fn status(err: Error) -> StatusCode {
        ApiError::from(err).status()
    }

    #[test]
    fn maps_errors_to_statuses() {
        let mac: MacAddress = "aabbccddeeff".parse().unwrap();

        assert_eq!(status(Error::DeviceNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(Error::UnsupportedParameter {
                mac: mac.clone(),
                parameter: "volume".into()
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(Error::Value(ValueError::InvalidMac("x".into()))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(Error::DeviceCommandFailed {
                mac,
                source: TransportError::Timeout(2000)
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
