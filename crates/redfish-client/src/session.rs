/*
 * SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

use anvil_secrets::credentials::Credentials;
use model::redfish::{Chassis, Collection, Manager, Power, PowerSupply};
use serde::Deserialize;
use serde_json::json;

use crate::RedfishError;

const SESSIONS_PATH: &str = "/redfish/v1/SessionService/Sessions";
const CHASSIS_PATH: &str = "/redfish/v1/Chassis";
const MANAGERS_PATH: &str = "/redfish/v1/Managers";
const UPDATE_SERVICE_PATH: &str = "/redfish/v1/UpdateService";
const DEFAULT_PUSH_URI: &str = "/redfish/v1/UpdateService/update";

#[derive(Clone, Debug)]
pub struct RedfishClientConfig {
    /// PMCs live on trusted management networks and ship self-signed certs;
    /// verification is off unless a deployment overrides the TLS policy
    /// with a root CA.
    pub danger_accept_invalid_certs: bool,
    pub root_ca_pem: Option<Vec<u8>>,
}

impl Default for RedfishClientConfig {
    fn default() -> Self {
        RedfishClientConfig {
            danger_accept_invalid_certs: true,
            root_ca_pem: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PowerAction {
    On,
    Off,
    Reset,
}

impl PowerAction {
    /// The Redfish `ResetType` for the action, honoring the forced flag.
    pub fn reset_type(self, forced: bool) -> &'static str {
        match (self, forced) {
            (PowerAction::On, _) => "On",
            (PowerAction::Off, true) => "ForceOff",
            (PowerAction::Off, false) => "GracefulShutdown",
            (PowerAction::Reset, true) => "ForceRestart",
            (PowerAction::Reset, false) => "GracefulRestart",
        }
    }
}

/// An authenticated session against one PMC.
pub struct RedfishSession {
    http: reqwest::Client,
    base: String,
    token: String,
    session_uri: Option<String>,
}

impl RedfishSession {
    /// Opens a session by POSTing to the session service and retaining the
    /// `X-Auth-Token`. Fails `Unauthorized` when the PMC rejects the
    /// credentials and `Unreachable` when nothing answers.
    pub async fn open(
        endpoint: &str,
        credentials: &Credentials,
        config: &RedfishClientConfig,
    ) -> Result<Self, RedfishError> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.danger_accept_invalid_certs);
        if let Some(pem) = &config.root_ca_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| RedfishError::Unreachable(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| RedfishError::Unreachable(e.to_string()))?;

        let base = endpoint.trim_end_matches('/').to_string();
        let response = http
            .post(format!("{base}{SESSIONS_PATH}"))
            .json(&json!({
                "UserName": credentials.username(),
                "Password": credentials.password(),
            }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(RedfishError::Unauthorized(format!(
                "session create returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(other_error(response).await);
        }

        let token = response
            .headers()
            .get("x-auth-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                RedfishError::Unauthorized("session create returned no X-Auth-Token".to_string())
            })?;
        let session_uri = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(RedfishSession {
            http,
            base,
            token,
            session_uri,
        })
    }

    /// The first chassis of the shelf.
    pub async fn query_chassis(&self) -> Result<Chassis, RedfishError> {
        let collection: Collection = self.get_json(CHASSIS_PATH).await?;
        let member = collection.members.first().ok_or(RedfishError::Other {
            status: 200,
            body: "chassis collection is empty".to_string(),
        })?;
        self.get_json(&member.odata_id).await
    }

    /// The first manager, i.e. the PMC itself.
    pub async fn query_manager(&self) -> Result<Manager, RedfishError> {
        let collection: Collection = self.get_json(MANAGERS_PATH).await?;
        let member = collection.members.first().ok_or(RedfishError::Other {
            status: 200,
            body: "manager collection is empty".to_string(),
        })?;
        self.get_json(&member.odata_id).await
    }

    pub async fn list_power_supplies(&self) -> Result<Vec<PowerSupply>, RedfishError> {
        let chassis = self.query_chassis().await?;
        let power: Power = self.get_json(&format!("{}/Power", chassis.odata_id)).await?;
        Ok(power.power_supplies)
    }

    /// Issues a chassis reset for the requested power action.
    pub async fn power(&self, action: PowerAction, forced: bool) -> Result<(), RedfishError> {
        let chassis = self.query_chassis().await?;
        let response = self
            .http
            .post(format!(
                "{}{}/Actions/Chassis.Reset",
                self.base, chassis.odata_id
            ))
            .header("x-auth-token", &self.token)
            .json(&json!({ "ResetType": action.reset_type(forced) }))
            .send()
            .await
            .map_err(classify_transport)?;
        check_status(response).await?;
        Ok(())
    }

    /// Pushes a firmware image to the update service.
    ///
    /// The HTTP response is surfaced raw so the job manager can capture the
    /// task monitor / job identifiers the device hands back.
    pub async fn update_firmware(
        &self,
        body: reqwest::Body,
    ) -> Result<reqwest::Response, RedfishError> {
        let push_uri = self.push_uri().await?;
        let response = self
            .http
            .post(format!("{}{}", self.base, push_uri))
            .header("x-auth-token", &self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(classify_transport)?;
        check_status(response).await
    }

    /// Tears the session down. Consumes the session so a logged-out handle
    /// can't be reused.
    pub async fn logout(self) -> Result<(), RedfishError> {
        let Some(session_uri) = self.session_uri else {
            return Ok(());
        };
        let response = self
            .http
            .delete(format!("{}{}", self.base, session_uri))
            .header("x-auth-token", &self.token)
            .send()
            .await
            .map_err(classify_transport)?;
        // A session the device already expired is fine.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    async fn push_uri(&self) -> Result<String, RedfishError> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct UpdateService {
            #[serde(rename = "HttpPushUri")]
            http_push_uri: Option<String>,
        }

        let service: UpdateService = self.get_json(UPDATE_SERVICE_PATH).await?;
        Ok(service
            .http_push_uri
            .unwrap_or_else(|| DEFAULT_PUSH_URI.to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, RedfishError> {
        let response = self
            .http
            .get(format!("{}{}", self.base, path))
            .header("x-auth-token", &self.token)
            .send()
            .await
            .map_err(classify_transport)?;
        let response = check_status(response).await?;
        response.json().await.map_err(|e| RedfishError::Other {
            status: 200,
            body: format!("invalid JSON from {path}: {e}"),
        })
    }
}

fn classify_transport(err: reqwest::Error) -> RedfishError {
    RedfishError::Unreachable(err.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RedfishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(RedfishError::Unauthorized(format!("HTTP {status}")));
    }
    Err(match status {
        reqwest::StatusCode::CONFLICT => {
            RedfishError::DeviceBusy(body_text(response).await)
        }
        _ => RedfishError::Other {
            status: status.as_u16(),
            body: body_text(response).await,
        },
    })
}

async fn other_error(response: reqwest::Response) -> RedfishError {
    let status = response.status().as_u16();
    RedfishError::Other {
        status,
        body: body_text(response).await,
    }
}

async fn body_text(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{delete, get, post};
    use serde_json::json;

    use super::*;

    const TOKEN: &str = "test-session-token";

    #[derive(Clone, Default)]
    struct MockPmcState {
        busy: bool,
    }

    /// A minimal PMC serving the resource subset the adapter reads.
    async fn spawn_mock_pmc(state: MockPmcState) -> SocketAddr {
        async fn create_session(
            axum::Json(body): axum::Json<serde_json::Value>,
        ) -> impl IntoResponse {
            if body["UserName"] == "admin" && body["Password"] == "s3cret" {
                (
                    StatusCode::CREATED,
                    [
                        ("x-auth-token", TOKEN),
                        ("location", "/redfish/v1/SessionService/Sessions/1"),
                    ],
                )
                    .into_response()
            } else {
                StatusCode::UNAUTHORIZED.into_response()
            }
        }

        fn authed(headers: &HeaderMap) -> bool {
            headers
                .get("x-auth-token")
                .is_some_and(|t| t == TOKEN)
        }

        let app = Router::new()
            .route("/redfish/v1/SessionService/Sessions", post(create_session))
            .route(
                "/redfish/v1/SessionService/Sessions/1",
                delete(|| async { StatusCode::NO_CONTENT }),
            )
            .route(
                "/redfish/v1/Chassis",
                get(|headers: HeaderMap| async move {
                    if !authed(&headers) {
                        return StatusCode::UNAUTHORIZED.into_response();
                    }
                    axum::Json(json!({
                        "Members": [{ "@odata.id": "/redfish/v1/Chassis/1" }]
                    }))
                    .into_response()
                }),
            )
            .route(
                "/redfish/v1/Chassis/1",
                get(|| async {
                    axum::Json(json!({
                        "@odata.id": "/redfish/v1/Chassis/1",
                        "Id": "1",
                        "SerialNumber": "PSHELF-1",
                        "Model": "LiteOn-2kW",
                        "PowerState": "On",
                    }))
                }),
            )
            .route(
                "/redfish/v1/Chassis/1/Power",
                get(|| async {
                    axum::Json(json!({
                        "PowerSupplies": [
                            { "Name": "PSU0", "SerialNumber": "PSU-0", "FirmwareVersion": "r1.0.0" },
                            { "Name": "PSU1", "SerialNumber": "PSU-1", "FirmwareVersion": "r1.0.0" },
                        ]
                    }))
                }),
            )
            .route(
                "/redfish/v1/Chassis/1/Actions/Chassis.Reset",
                post(|axum::Json(body): axum::Json<serde_json::Value>| async move {
                    if body["ResetType"].as_str().is_some() {
                        StatusCode::NO_CONTENT
                    } else {
                        StatusCode::BAD_REQUEST
                    }
                }),
            )
            .route(
                "/redfish/v1/Managers",
                get(|| async {
                    axum::Json(json!({
                        "Members": [{ "@odata.id": "/redfish/v1/Managers/PMC" }]
                    }))
                }),
            )
            .route(
                "/redfish/v1/Managers/PMC",
                get(|| async {
                    axum::Json(json!({
                        "@odata.id": "/redfish/v1/Managers/PMC",
                        "Id": "PMC",
                        "FirmwareVersion": "r1.0.0",
                    }))
                }),
            )
            .route(
                "/redfish/v1/UpdateService",
                get(|| async {
                    axum::Json(json!({
                        "@odata.id": "/redfish/v1/UpdateService",
                        "HttpPushUri": "/redfish/v1/UpdateService/update",
                    }))
                }),
            )
            .route(
                "/redfish/v1/UpdateService/update",
                post(|State(state): State<MockPmcState>, _body: axum::body::Bytes| async move {
                    if state.busy {
                        (StatusCode::CONFLICT, "update already running").into_response()
                    } else {
                        (
                            StatusCode::ACCEPTED,
                            axum::Json(json!({ "Id": "job-42" })),
                        )
                            .into_response()
                    }
                }),
            )
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn credentials() -> Credentials {
        Credentials::username_password("admin", "s3cret")
    }

    async fn open(addr: SocketAddr) -> RedfishSession {
        RedfishSession::open(
            &format!("http://{addr}"),
            &credentials(),
            &RedfishClientConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_session_queries_and_logout() {
        let addr = spawn_mock_pmc(MockPmcState::default()).await;
        let session = open(addr).await;

        let chassis = session.query_chassis().await.unwrap();
        assert_eq!(chassis.serial_number.as_deref(), Some("PSHELF-1"));

        let manager = session.query_manager().await.unwrap();
        assert_eq!(manager.firmware_version.as_deref(), Some("r1.0.0"));

        let psus = session.list_power_supplies().await.unwrap();
        assert_eq!(psus.len(), 2);
        assert_eq!(psus[0].name.as_deref(), Some("PSU0"));

        session.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_credentials_are_unauthorized() {
        let addr = spawn_mock_pmc(MockPmcState::default()).await;
        let result = RedfishSession::open(
            &format!("http://{addr}"),
            &Credentials::username_password("admin", "wrong"),
            &RedfishClientConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(RedfishError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Nothing listens on this port.
        let result = RedfishSession::open(
            "http://127.0.0.1:1",
            &credentials(),
            &RedfishClientConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(RedfishError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_power_action() {
        let addr = spawn_mock_pmc(MockPmcState::default()).await;
        let session = open(addr).await;
        session.power(PowerAction::Off, true).await.unwrap();
        session.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_update_firmware_surfaces_raw_response() {
        let addr = spawn_mock_pmc(MockPmcState::default()).await;
        let session = open(addr).await;

        let response = session
            .update_firmware(reqwest::Body::from(&b"firmware-image"[..]))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 202);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["Id"], "job-42");
    }

    #[tokio::test]
    async fn test_busy_device_maps_to_device_busy() {
        let addr = spawn_mock_pmc(MockPmcState { busy: true }).await;
        let session = open(addr).await;

        let result = session
            .update_firmware(reqwest::Body::from(&b"firmware-image"[..]))
            .await;
        assert!(matches!(result, Err(RedfishError::DeviceBusy(_))));
    }

    #[test]
    fn test_reset_type_mapping() {
        assert_eq!(PowerAction::On.reset_type(false), "On");
        assert_eq!(PowerAction::On.reset_type(true), "On");
        assert_eq!(PowerAction::Off.reset_type(false), "GracefulShutdown");
        assert_eq!(PowerAction::Off.reset_type(true), "ForceOff");
        assert_eq!(PowerAction::Reset.reset_type(false), "GracefulRestart");
        assert_eq!(PowerAction::Reset.reset_type(true), "ForceRestart");
    }
}
