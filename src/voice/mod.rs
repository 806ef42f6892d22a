//! Voice provider adapter.
//!
//! Places an outbound call through a conversational-voice API and reduces the
//! provider's responses to [`CallPlaced`] or a typed [`UpstreamError`]. The rest
//! of the gateway only sees the [`CallPlacer`] trait, so provider endpoint or
//! payload changes stay inside this module.
//!
//! @copyright 2025

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::VoiceConfig;
use crate::validation::mask_phone;

const OUTBOUND_CALL_PATH: &str = "/v1/convai/twilio/outbound-call";
const API_KEY_HEADER: &str = "xi-api-key";

/// A validated call to place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCall {
    pub to_number: String,
    pub business_name: String,
    pub owner_name: Option<String>,
}

/// Provider acknowledgement of a placed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlaced {
    pub conversation_id: String,
    pub call_sid: Option<String>,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Voice provider setting missing: {0}")]
    NotConfigured(&'static str),
    #[error("Voice provider rejected our API key")]
    InvalidProviderCredentials,
    #[error("Insufficient account balance")]
    InsufficientBalance,
    #[error("Voice provider rate limit exceeded")]
    RateLimited,
    #[error("{0}")]
    Rejected(String),
    #[error("Upstream error {0}")]
    Status(u16),
    #[error("Unexpected voice provider response: {0}")]
    MalformedResponse(String),
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Anything able to place an outbound demo call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallPlacer: Send + Sync {
    async fn place_call(&self, call: OutboundCall) -> Result<CallPlaced, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct OutboundCallRequest<'a> {
    agent_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_phone_number_id: Option<&'a str>,
    to_number: &'a str,
    conversation_initiation_client_data: ClientData<'a>,
}

#[derive(Debug, Serialize)]
struct ClientData<'a> {
    dynamic_variables: DynamicVariables<'a>,
}

#[derive(Debug, Serialize)]
struct DynamicVariables<'a> {
    business_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct OutboundCallResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default, rename = "callSid")]
    call_sid: Option<String>,
}

/// reqwest-backed [`CallPlacer`].
pub struct VoiceClient {
    config: VoiceConfig,
    client: Client,
}

impl VoiceClient {
    /// No request timeout is set; the transport default applies.
    pub fn new(config: VoiceConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder().build()?;

        info!(
            base_url = %config.base_url,
            api_key_set = config.api_key.is_some(),
            agent_set = config.agent_id.is_some(),
            "Voice client created"
        );

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.config.base_url, OUTBOUND_CALL_PATH)
    }
}

#[async_trait]
impl CallPlacer for VoiceClient {
    async fn place_call(&self, call: OutboundCall) -> Result<CallPlaced, UpstreamError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("voice.api_key"))?;
        let agent_id = self
            .config
            .agent_id
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("voice.agent_id"))?;

        let request = OutboundCallRequest {
            agent_id,
            agent_phone_number_id: self.config.agent_phone_number_id.as_deref(),
            to_number: &call.to_number,
            conversation_initiation_client_data: ClientData {
                dynamic_variables: DynamicVariables {
                    business_name: &call.business_name,
                    owner_name: call.owner_name.as_deref(),
                },
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to reach voice provider");
                UpstreamError::Transport(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = classify_failure(status, &body);
            error!(
                status = %status,
                to = %mask_phone(&call.to_number),
                error = %err,
                "Voice provider refused the call"
            );
            return Err(err);
        }

        let parsed: OutboundCallResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Failed to parse voice provider response");
            UpstreamError::MalformedResponse(e.to_string())
        })?;

        if parsed.success == Some(false) {
            let message = parsed.message.unwrap_or_else(|| "call not placed".to_string());
            warn!(message = %message, "Voice provider reported failure");
            return Err(UpstreamError::MalformedResponse(message));
        }

        let conversation_id = parsed
            .conversation_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| UpstreamError::MalformedResponse("missing conversation_id".into()))?;

        info!(
            conversation_id = %conversation_id,
            to = %mask_phone(&call.to_number),
            "Outbound call placed"
        );

        Ok(CallPlaced {
            conversation_id,
            call_sid: parsed.call_sid,
        })
    }
}

/// Maps a non-2xx provider response to an [`UpstreamError`].
pub fn classify_failure(status: StatusCode, body: &str) -> UpstreamError {
    match status.as_u16() {
        400 => UpstreamError::Rejected(
            extract_detail(body).unwrap_or_else(|| "Invalid request to voice provider".to_string()),
        ),
        401 => UpstreamError::InvalidProviderCredentials,
        402 => UpstreamError::InsufficientBalance,
        429 => UpstreamError::RateLimited,
        other => UpstreamError::Status(other),
    }
}

/// `detail` may be a plain string or an object carrying `message`.
fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let detail = match value.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    detail.filter(|s| !s.trim().is_empty())
}
