use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReply {
    pub allowed: bool,
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawReply {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub retryable: Option<bool>,
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReply {
    pub status: String,
    pub ledger_reachable: bool,
}

/// Body returned with 4xx/5xx statuses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReply {
    pub error: String,
    pub error_kind: Option<String>,
    pub details: Option<String>,
}

/// A decoded body with the status it arrived with.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub status: u16,
    pub body: T,
}

#[derive(Debug)]
pub enum SdkError {
    /// The request never completed.
    Http(reqwest::Error),
    /// The service answered with an error body.
    Api { status: u16, body: ErrorReply },
    /// The body did not match the expected shape.
    Decode { status: u16, message: String },
}

impl std::fmt::Display for SdkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdkError::Http(e) => write!(f, "request failed: {}", e),
            SdkError::Api { status, body } => {
                write!(f, "faucet returned {}: {}", status, body.error)
            }
            SdkError::Decode { status, message } => {
                write!(f, "unexpected body with status {}: {}", status, message)
            }
        }
    }
}

impl std::error::Error for SdkError {}

impl From<reqwest::Error> for SdkError {
    fn from(e: reqwest::Error) -> Self {
        SdkError::Http(e)
    }
}

#[derive(Serialize)]
struct WithdrawBody<'a> {
    destination: &'a str,
}

pub struct FaucetClient {
    client: Client,
    base_url: String,
    forwarded_for: Option<String>,
}

impl FaucetClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            forwarded_for: None,
        }
    }

    /// Send `X-Forwarded-For`, for services configured to trust it.
    pub fn with_forwarded_for(mut self, identity: &str) -> Self {
        self.forwarded_for = Some(identity.to_string());
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.forwarded_for {
            Some(identity) => request.header("X-Forwarded-For", identity),
            None => request,
        }
    }

    /// Ask whether this caller may withdraw; an allowed answer starts the cooldown.
    pub async fn check_admission(&self) -> Result<Reply<AdmissionReply>, SdkError> {
        let resp = self.post("/validate-ip").send().await?;
        decode(resp, &[StatusCode::OK]).await
    }

    /// Request a withdrawal to `destination`.
    ///
    /// Relay failures come back as `Ok` with `success == false`; only
    /// malformed input and infrastructure failures are `SdkError::Api`.
    pub async fn withdraw(&self, destination: &str) -> Result<Reply<WithdrawReply>, SdkError> {
        let resp = self
            .post("/withdraw")
            .json(&WithdrawBody { destination })
            .send()
            .await?;
        decode(resp, &[StatusCode::OK, StatusCode::SERVICE_UNAVAILABLE]).await
    }

    pub async fn health(&self) -> Result<Reply<HealthReply>, SdkError> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        decode(resp, &[StatusCode::OK]).await
    }
}

async fn decode<T: DeserializeOwned>(
    resp: Response,
    expected: &[StatusCode],
) -> Result<Reply<T>, SdkError> {
    let status = resp.status();
    let text = resp.text().await?;

    if expected.contains(&status) {
        return serde_json::from_str::<T>(&text)
            .map(|body| Reply {
                status: status.as_u16(),
                body,
            })
            .map_err(|e| SdkError::Decode {
                status: status.as_u16(),
                message: e.to_string(),
            });
    }

    match serde_json::from_str::<ErrorReply>(&text) {
        Ok(body) => Err(SdkError::Api {
            status: status.as_u16(),
            body,
        }),
        Err(_) => Err(SdkError::Decode {
            status: status.as_u16(),
            message: text,
        }),
    }
}
