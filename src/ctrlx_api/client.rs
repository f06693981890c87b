use crate::ctrlx_api::config::ClientConfig;
use crate::ctrlx_api::nodes::{
    MotionChannel, MotionData, NodePath, DRIVE_VALUE_NODE, ETHERCAT_BROWSE_NODE,
};
use crate::ctrlx_api::token::TokenState;
use crate::ctrlx_api::types::{ApiError, CtrlxError, LoginRequest, NodeValue, Operation};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Identity manager route that exchanges credentials for a bearer token
pub const AUTH_TOKEN_ROUTE: &str = "/identity-manager/api/v2/auth/token";

/// HTTP client for the ctrlX CORE data-layer REST API
///
/// The client holds a bearer token and renews it transparently: every node
/// operation first makes sure a token is held whose lease has not run out,
/// logging in with the configured credentials when it is not.
///
/// Clones share the same token. Renewal is single-flight: when several tasks
/// find the token expired at once, one of them logs in and the others reuse
/// the new token.
#[derive(Debug, Clone)]
pub struct CtrlxClient {
    config: Arc<ClientConfig>,
    /// HTTP client for making requests
    client: reqwest::Client,
    token: Arc<RwLock<TokenState>>,
    /// Held for the duration of a renewal
    renewal: Arc<tokio::sync::Mutex<()>>,
}

impl CtrlxClient {
    /// Create a new client for the configured device
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ctrlx_sdk::{ClientConfig, CtrlxClient};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = CtrlxClient::new(ClientConfig::new("https://192.168.1.1"))?;
    /// let drives = client.list_drive_names().await?;
    /// println!("Found {} drives", drives.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: ClientConfig) -> Result<Self, CtrlxError> {
        config.validate()?;

        tracing::debug!(
            "Creating CtrlxClient with base URL: {}",
            config.base_url()
        );

        if !config.verify_ssl {
            tracing::warn!(
                "TLS certificate verification is disabled for {}; set verify_ssl = true to enable it",
                config.base_url()
            );
        }

        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(!config.verify_ssl);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            tracing::error!("Failed to build HTTP client: {}", e);
            CtrlxError::Config(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            token: Arc::new(RwLock::new(TokenState::new(config.token_lifetime()))),
            config: Arc::new(config),
            client,
            renewal: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Create a client for the default local device and factory credentials
    pub fn with_defaults() -> Result<Self, CtrlxError> {
        Self::new(ClientConfig::default())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the base URL for this client
    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    /// Check if a token is held and its lease has not run out
    pub fn is_token_valid(&self) -> bool {
        self.read_token().is_valid()
    }

    /// Expiry of the currently held token, if any
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.read_token().expires_at()
    }

    /// Drop the cached token; the next node operation logs in again
    pub fn invalidate_token(&self) {
        tracing::debug!("Invalidating cached bearer token");
        self.write_token().clear();
    }

    /// Log in unless a valid token is already held
    pub async fn ensure_valid_token(&self) -> Result<(), CtrlxError> {
        self.valid_token().await.map(|_| ())
    }

    /// Exchange credentials for a bearer token
    ///
    /// `username` and `password` override the configured credentials when
    /// given. On success the token from the `access_token` field is cached
    /// with a fresh lease. The decoded response body is returned whether or
    /// not it carried a token. On failure the cached token is left untouched.
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Value, CtrlxError> {
        let payload = LoginRequest {
            name: username
                .filter(|u| !u.is_empty())
                .unwrap_or(self.config.username.as_str())
                .to_string(),
            password: password
                .filter(|p| !p.is_empty())
                .unwrap_or(self.config.password.as_str())
                .to_string(),
        };

        let url = format!("{}{}", self.base_url(), AUTH_TOKEN_ROUTE);
        tracing::debug!("Sending authentication request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .query(&[("dryrun", "false")])
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send authentication request: {}", e);
                CtrlxError::request(Operation::Login, ApiError::from(e))
            })?;

        let response = check_status(&Operation::Login, response).await?;
        let body = decode_json(&Operation::Login, response).await?;

        match body.get("access_token").and_then(Value::as_str) {
            Some(token) => {
                let mut state = self.write_token();
                state.store(token, Utc::now());
                tracing::info!(
                    "Authenticated as {}: token valid until {}",
                    payload.name,
                    state
                        .expires_at()
                        .map(|e| e.to_rfc3339())
                        .unwrap_or_default()
                );
                tracing::debug!("Bearer token length: {}", token.len());
            }
            None => {
                tracing::warn!("Authentication response did not contain an access_token");
            }
        }

        Ok(body)
    }

    /// Headers carrying a valid bearer token, logging in first if needed
    pub async fn auth_headers(&self) -> Result<HeaderMap, CtrlxError> {
        let token = self.valid_token().await?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            CtrlxError::request(
                Operation::Login,
                ApiError::Request(format!("Token is not a valid header value: {}", e)),
            )
        })?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Read a data-layer node
    ///
    /// The path is percent-encoded as a single URL segment. Every call is a
    /// fresh round trip to the device.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ctrlx_sdk::CtrlxClient;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = CtrlxClient::with_defaults()?;
    /// let node = client.read_node("framework/metrics/system/cpu-utilisation-percent", None).await?;
    /// println!("CPU: {}", node["value"]);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn read_node(
        &self,
        path: impl Into<NodePath>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<Value, CtrlxError> {
        let path = path.into();
        let operation = Operation::ReadNode {
            path: path.to_string(),
        };
        self.read_node_as(&operation, &path, query).await
    }

    /// Write a data-layer node
    ///
    /// With `data` the request carries it as a JSON body; without it a
    /// bodyless PUT is sent, which some nodes expect. An empty response body
    /// yields `{"status": "success"}`.
    pub async fn write_node(
        &self,
        path: impl Into<NodePath>,
        data: Option<&Value>,
    ) -> Result<Value, CtrlxError> {
        let path = path.into();
        let operation = Operation::WriteNode {
            path: path.to_string(),
        };
        self.write_node_as(&operation, &path, data).await
    }

    /// List the drives attached to the EtherCAT master
    pub async fn list_drive_names(&self) -> Result<Vec<Value>, CtrlxError> {
        let operation = Operation::ListDriveNames;
        let body = self
            .read_node_as(
                &operation,
                &NodePath::new(ETHERCAT_BROWSE_NODE),
                Some(&[("type", "browse")][..]),
            )
            .await?;

        match extract_value(&operation, body)? {
            Value::Array(names) => Ok(names),
            other => Err(CtrlxError::request(
                operation,
                ApiError::Parse(format!("Expected an array of drive names, got {}", other)),
            )),
        }
    }

    /// Write the selected drive name to the drive string node
    pub async fn set_drive_value(&self, value: impl Into<String>) -> Result<Value, CtrlxError> {
        let payload = NodeValue::string(value);
        self.write_node_as(
            &Operation::SetDriveValue,
            &NodePath::new(DRIVE_VALUE_NODE),
            Some(&payload),
        )
        .await
    }

    /// Read motion data
    ///
    /// With a channel key (`couple`, `position`, `vitesse`, `temps`; case
    /// insensitive) only that channel is read and its bare value returned.
    /// Without one all four channels are read one after another; the first
    /// failure aborts the whole read.
    pub async fn get_motion_data(&self, data_type: Option<&str>) -> Result<MotionData, CtrlxError> {
        match data_type.map(str::trim).filter(|t| !t.is_empty()) {
            Some(key) => {
                let channel: MotionChannel = key.parse()?;
                let value = self.read_motion_channel(channel).await?;
                Ok(MotionData::Channel(value))
            }
            None => {
                let mut results = BTreeMap::new();
                for channel in MotionChannel::ALL {
                    let value = self.read_motion_channel(channel).await?;
                    results.insert(channel.key().to_string(), value);
                }
                Ok(MotionData::All(results))
            }
        }
    }

    /// Read the value of one motion-data channel
    pub async fn read_motion_channel(&self, channel: MotionChannel) -> Result<Value, CtrlxError> {
        let operation = Operation::GetMotionData {
            channel: channel.key().to_string(),
        };
        let body = self
            .read_node_as(&operation, &channel.node_path(), None)
            .await?;
        extract_value(&operation, body)
    }

    async fn read_node_as(
        &self,
        operation: &Operation,
        path: &NodePath,
        query: Option<&[(&str, &str)]>,
    ) -> Result<Value, CtrlxError> {
        let headers = self.auth_headers().await?;
        let url = path.url(self.base_url());

        tracing::debug!("Reading node {} from: {}", path, url);

        let mut request = self.client.get(&url).headers(headers);
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to read node {}: {}", path, e);
            CtrlxError::request(operation.clone(), ApiError::from(e))
        })?;

        let response = check_status(operation, response).await?;
        decode_json(operation, response).await
    }

    async fn write_node_as<T>(
        &self,
        operation: &Operation,
        path: &NodePath,
        data: Option<&T>,
    ) -> Result<Value, CtrlxError>
    where
        T: Serialize + ?Sized,
    {
        let headers = self.auth_headers().await?;
        let url = path.url(self.base_url());

        tracing::debug!(
            "Writing node {} at: {} (body: {})",
            path,
            url,
            data.is_some()
        );

        let mut request = self.client.put(&url).headers(headers);
        if let Some(data) = data {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .json(data);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to write node {}: {}", path, e);
            CtrlxError::request(operation.clone(), ApiError::from(e))
        })?;

        let response = check_status(operation, response).await?;
        let text = read_body(operation, response).await?;

        if text.trim().is_empty() {
            return Ok(json!({"status": "success"}));
        }

        parse_json(operation, &text)
    }

    /// Current token, logging in first when none is valid
    async fn valid_token(&self) -> Result<String, CtrlxError> {
        if let Some(token) = self.current_valid_token() {
            return Ok(token);
        }

        let _guard = self.renewal.lock().await;

        // Another task may have renewed while we waited.
        if let Some(token) = self.current_valid_token() {
            return Ok(token);
        }

        tracing::debug!("No valid bearer token held, logging in");
        self.login(None, None).await?;

        self.current_valid_token().ok_or_else(|| {
            tracing::error!("Login succeeded but no access_token was issued");
            CtrlxError::request(
                Operation::Login,
                ApiError::Parse("Response did not contain an access_token".to_string()),
            )
        })
    }

    fn current_valid_token(&self) -> Option<String> {
        let state = self.read_token();
        if state.is_valid() {
            state.token().map(str::to_string)
        } else {
            None
        }
    }

    fn read_token(&self) -> std::sync::RwLockReadGuard<'_, TokenState> {
        self.token.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_token(&self) -> std::sync::RwLockWriteGuard<'_, TokenState> {
        self.token.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Turn a non-2xx response into an HTTP error carrying the response body
async fn check_status(
    operation: &Operation,
    response: reqwest::Response,
) -> Result<reqwest::Response, CtrlxError> {
    let status = response.status();
    tracing::debug!("Received response with status: {}", status);

    if status.is_success() {
        return Ok(response);
    }

    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    tracing::error!(
        "{} failed: HTTP {} - {}",
        operation,
        status.as_u16(),
        error_body
    );

    Err(CtrlxError::request(
        operation.clone(),
        ApiError::Http {
            status: status.as_u16(),
            message: error_body,
        },
    ))
}

async fn read_body(operation: &Operation, response: reqwest::Response) -> Result<String, CtrlxError> {
    response.text().await.map_err(|e| {
        tracing::error!("Failed to read response body: {}", e);
        CtrlxError::request(
            operation.clone(),
            ApiError::Parse(format!("Failed to read response: {}", e)),
        )
    })
}

async fn decode_json(operation: &Operation, response: reqwest::Response) -> Result<Value, CtrlxError> {
    let text = read_body(operation, response).await?;
    parse_json(operation, &text)
}

fn parse_json(operation: &Operation, text: &str) -> Result<Value, CtrlxError> {
    serde_json::from_str(text).map_err(|e| {
        tracing::error!("Failed to parse response: {} - Response body: {}", e, text);
        CtrlxError::request(
            operation.clone(),
            ApiError::Parse(format!("Failed to parse response JSON: {}", e)),
        )
    })
}

/// Take the `value` field out of a node read result
fn extract_value(operation: &Operation, body: Value) -> Result<Value, CtrlxError> {
    match body {
        Value::Object(mut map) => map.remove("value").ok_or_else(|| {
            CtrlxError::request(
                operation.clone(),
                ApiError::Parse("Response has no 'value' field".to_string()),
            )
        }),
        other => Err(CtrlxError::request(
            operation.clone(),
            ApiError::Parse(format!("Expected a JSON object, got {}", other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = CtrlxClient::new(ClientConfig::new("https://10.0.0.5/")).unwrap();
        assert_eq!(client.base_url(), "https://10.0.0.5");
        assert!(!client.is_token_valid());
        assert!(client.token_expires_at().is_none());
    }

    #[test]
    fn test_client_with_defaults() {
        let client = CtrlxClient::with_defaults().unwrap();
        assert_eq!(client.base_url(), "https://localhost");
        assert!(!client.config().verify_ssl);
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let result = CtrlxClient::new(ClientConfig::new("localhost without scheme"));
        assert!(matches!(result, Err(CtrlxError::Config(_))));
    }

    #[test]
    fn test_clones_share_token() {
        let client = CtrlxClient::with_defaults().unwrap();
        let clone = client.clone();

        client.write_token().store("shared", Utc::now());
        assert!(clone.is_token_valid());

        clone.invalidate_token();
        assert!(!client.is_token_valid());
    }

    #[test]
    fn test_extract_value() {
        let op = Operation::ListDriveNames;
        let value = extract_value(&op, json!({"type": "arstring", "value": ["a", "b"]})).unwrap();
        assert_eq!(value, json!(["a", "b"]));

        let err = extract_value(&op, json!({"type": "arstring"})).unwrap_err();
        assert!(matches!(err.api_error(), Some(ApiError::Parse(_))));

        let err = extract_value(&op, json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("Listing EtherCAT drive names"));
    }

    #[test]
    fn test_parse_json_error_names_operation() {
        let op = Operation::ReadNode {
            path: "plc/x".to_string(),
        };
        let err = parse_json(&op, "not json").unwrap_err();
        assert!(err.to_string().contains("plc/x"));
    }
}
