use crate::config::AppConfig;
use crate::domain::model::{LookupOutcome, NutritionRecord};
use crate::domain::ports::LookupService;
use crate::utils::error::{AppError, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Issues one GET per code against the nutrition service. Never retries.
#[derive(Debug, Clone)]
pub struct LookupClient {
    client: Client,
    endpoint: Url,
    app_id: String,
    app_key: String,
    timeout: Duration,
}

impl LookupClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let endpoint =
            Url::parse(&config.lookup.endpoint).map_err(|e| AppError::InvalidConfigValueError {
                field: "lookup.endpoint".to_string(),
                value: config.lookup.endpoint.clone(),
                reason: format!("Invalid URL format: {}", e),
            })?;
        let timeout = config.lookup.timeout();
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            app_id: config.credentials.nutrition_app_id.clone(),
            app_key: config.credentials.nutrition_app_key.clone(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn request_url(&self, code: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("upc", code)
            .append_pair("appId", &self.app_id)
            .append_pair("appKey", &self.app_key);
        url
    }

    fn redacted_url(&self, code: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("upc", code)
            .append_pair("appId", &self.app_id)
            .append_pair("appKey", "***");
        url
    }

    async fn fetch(&self, code: &str) -> LookupOutcome {
        tracing::debug!("Making lookup request to: {}", self.redacted_url(code));

        let response = match self.client.get(self.request_url(code)).send().await {
            Ok(response) => response,
            Err(e) => return self.transport_failure(&e),
        };

        let status = response.status();
        tracing::debug!("Lookup response status: {}", status);

        if !status.is_success() {
            return classify_status(status);
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return self.transport_failure(&e),
        };

        interpret_body(&body)
    }

    fn transport_failure(&self, error: &reqwest::Error) -> LookupOutcome {
        let reason = if error.is_timeout() {
            format!("request timed out after {}ms", self.timeout.as_millis())
        } else if error.is_connect() {
            format!("could not connect to nutrition service: {}", error)
        } else {
            format!("request failed: {}", error)
        };
        tracing::warn!("⚠️ Lookup failed: {}", reason);
        LookupOutcome::NetworkError(reason)
    }
}

#[async_trait::async_trait]
impl LookupService for LookupClient {
    async fn lookup(&self, code: &str) -> LookupOutcome {
        let outcome = self.fetch(code).await;
        tracing::info!("🔎 Lookup for {} finished: {}", code, outcome.kind());
        outcome
    }
}

/// 非 2xx 狀態：404 視為查無資料，暫時性錯誤交給使用者重試
fn classify_status(status: StatusCode) -> LookupOutcome {
    match status {
        StatusCode::NOT_FOUND => LookupOutcome::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            LookupOutcome::NetworkError(format!("service unavailable: HTTP {}", status))
        }
        s if s.is_server_error() => {
            LookupOutcome::NetworkError(format!("service unavailable: HTTP {}", s))
        }
        s => LookupOutcome::InvalidResponse(format!("unexpected HTTP status {}", s)),
    }
}

/// Maps a success body to an outcome. Accepts `{"hits": [...]}` or a bare
/// array; each hit is either the item itself or `{"fields": {...}}`.
pub fn interpret_body(body: &[u8]) -> LookupOutcome {
    let json: Value = match serde_json::from_slice(body) {
        Ok(json) => json,
        Err(e) => return LookupOutcome::InvalidResponse(format!("malformed JSON: {}", e)),
    };

    let items = match &json {
        Value::Array(items) => items,
        Value::Object(object) => match object.get("hits") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return LookupOutcome::InvalidResponse("'hits' is not an array".to_string())
            }
            None => return LookupOutcome::InvalidResponse("missing 'hits' array".to_string()),
        },
        _ => {
            return LookupOutcome::InvalidResponse(
                "expected a JSON object or array".to_string(),
            )
        }
    };

    let Some(first) = items.first() else {
        return LookupOutcome::NotFound;
    };

    let item = match first {
        Value::Object(hit) => match hit.get("fields") {
            Some(Value::Object(fields)) => fields,
            Some(_) => {
                return LookupOutcome::InvalidResponse("'fields' is not an object".to_string())
            }
            None => hit,
        },
        _ => return LookupOutcome::InvalidResponse("item is not an object".to_string()),
    };

    LookupOutcome::Success(NutritionRecord::from_json_object(item))
}
