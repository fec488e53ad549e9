//! The telephony provider client seam and its Twilio implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Bounded timeout for every provider HTTP call. The provider imposes its
/// own webhook-response deadline, so nothing here may hang longer.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the telephony provider layer.
#[derive(Debug, Error)]
pub enum TelephonyError {
    /// Account sid or auth token missing from configuration.
    #[error("telephony credentials not configured")]
    MissingCredentials,

    /// The HTTP request itself failed (network, timeout, TLS).
    #[error("telephony transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with an error status.
    #[error("telephony provider error ({status}): {message}")]
    Api {
        /// HTTP status returned by the provider.
        status: u16,
        /// The provider's error message.
        message: String,
    },
}

/// Result of a successful call-creation request.
#[derive(Debug, Clone, Serialize)]
pub struct CallCreated {
    /// The provider call sid (`CA…`).
    pub call_sid: String,
    /// The provider's initial status, usually `queued` or `initiated`.
    pub status: String,
    /// Destination number.
    pub to: String,
    /// Originating number.
    pub from: String,
}

/// A call record as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub sid: String,
    pub status: String,
    pub duration: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub to: Option<String>,
    pub from: Option<String>,
}

/// The telephony provider's call API.
///
/// Injected as a trait object so handlers, the orchestrator, and tests can
/// share one interface with swappable real/fake implementations.
#[async_trait]
pub trait TelephonyClient: Send + Sync {
    /// Originates an outbound call executing the given call-control markup.
    async fn create_call(
        &self,
        to: &str,
        from: &str,
        twiml: &str,
    ) -> Result<CallCreated, TelephonyError>;

    /// Fetches the current state of one call.
    async fn fetch_call(&self, call_sid: &str) -> Result<CallRecord, TelephonyError>;

    /// Lists the provider's most recent calls.
    async fn list_calls(&self, limit: usize) -> Result<Vec<CallRecord>, TelephonyError>;
}

/// Twilio REST API client (2010-04-01 surface).
#[derive(Debug, Clone)]
pub struct TwilioClient {
    http: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct TwilioCall {
    sid: String,
    status: String,
    duration: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    to: Option<String>,
    from: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioCallList {
    calls: Vec<TwilioCall>,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: Option<String>,
}

impl TwilioClient {
    /// Creates a client for the given API base URL and credentials.
    ///
    /// # Errors
    ///
    /// Returns `TelephonyError::MissingCredentials` when either credential
    /// is empty, so a misconfigured deployment fails at startup rather than
    /// on the first call.
    pub fn new(
        base_url: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Result<Self, TelephonyError> {
        let account_sid = account_sid.into();
        let auth_token = auth_token.into();
        if account_sid.trim().is_empty() || auth_token.trim().is_empty() {
            return Err(TelephonyError::MissingCredentials);
        }

        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
        })
    }

    fn calls_url(&self, suffix: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls{}",
            self.base_url, self.account_sid, suffix
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TelephonyError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<TwilioErrorBody>(&body)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or(body);
        Err(TelephonyError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl From<TwilioCall> for CallRecord {
    fn from(call: TwilioCall) -> Self {
        Self {
            sid: call.sid,
            status: call.status,
            duration: call.duration,
            start_time: call.start_time,
            end_time: call.end_time,
            to: call.to,
            from: call.from,
        }
    }
}

#[async_trait]
impl TelephonyClient for TwilioClient {
    async fn create_call(
        &self,
        to: &str,
        from: &str,
        twiml: &str,
    ) -> Result<CallCreated, TelephonyError> {
        let response = self
            .http
            .post(self.calls_url(".json"))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", from), ("Twiml", twiml)])
            .send()
            .await?;

        let call: TwilioCall = Self::check(response).await?.json().await?;
        tracing::info!(call_sid = %call.sid, status = %call.status, "provider call created");

        Ok(CallCreated {
            call_sid: call.sid,
            status: call.status,
            to: call.to.unwrap_or_else(|| to.to_string()),
            from: call.from.unwrap_or_else(|| from.to_string()),
        })
    }

    async fn fetch_call(&self, call_sid: &str) -> Result<CallRecord, TelephonyError> {
        let response = self
            .http
            .get(self.calls_url(&format!("/{call_sid}.json")))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;

        let call: TwilioCall = Self::check(response).await?.json().await?;
        Ok(call.into())
    }

    async fn list_calls(&self, limit: usize) -> Result<Vec<CallRecord>, TelephonyError> {
        let response = self
            .http
            .get(self.calls_url(".json"))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .query(&[("PageSize", limit.to_string())])
            .send()
            .await?;

        let list: TwilioCallList = Self::check(response).await?.json().await?;
        Ok(list.calls.into_iter().map(CallRecord::from).collect())
    }
}

/// Stand-in client for deployments without provider credentials. The
/// server still boots and serves webhooks; every provider call fails with
/// `MissingCredentials`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTelephony;

#[async_trait]
impl TelephonyClient for UnconfiguredTelephony {
    async fn create_call(
        &self,
        _to: &str,
        _from: &str,
        _twiml: &str,
    ) -> Result<CallCreated, TelephonyError> {
        Err(TelephonyError::MissingCredentials)
    }

    async fn fetch_call(&self, _call_sid: &str) -> Result<CallRecord, TelephonyError> {
        Err(TelephonyError::MissingCredentials)
    }

    async fn list_calls(&self, _limit: usize) -> Result<Vec<CallRecord>, TelephonyError> {
        Err(TelephonyError::MissingCredentials)
    }
}
