//! Google Cloud Translation (v2 REST) backend.
//!
//! Requires the `google-translate` feature. Requests are blocking; the
//! pipeline worker is the only caller and the client timeout bounds how long a
//! stop can be delayed by an in-flight call.

use crate::defaults;
use crate::error::{LiveTransError, Result};
use crate::language;
use crate::translate::translator::Translator;
use serde_json::{Value, json};
use std::time::Duration;

const ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

/// Translator backed by the Google Translate v2 API.
pub struct GoogleTranslator {
    api_key: String,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for GoogleTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslator")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<set>" })
            .finish()
    }
}

impl GoogleTranslator {
    /// Create a translator with the given API key and request timeout.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LiveTransError::Translation {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            api_key: api_key.into(),
            client,
        })
    }

    /// Create a translator with the default request timeout.
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::new(
            api_key,
            Duration::from_secs(defaults::TRANSLATION_TIMEOUT_SECS),
        )
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// JSON body for one request. Auto-detect omits `source`.
fn request_body(text: &str, source: &str, target: &str) -> Value {
    let mut body = json!({
        "q": text,
        "target": language::resolve(target),
        "format": "text",
    });
    if !language::is_auto(source) {
        body["source"] = json!(language::resolve(source));
    }
    body
}

/// Extract `data.translations[0].translatedText`.
fn parse_response(body: &Value) -> Result<String> {
    body["data"]["translations"][0]["translatedText"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LiveTransError::Translation {
            message: "response has no data.translations[0].translatedText".to_string(),
        })
}

impl Translator for GoogleTranslator {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if !self.has_api_key() || text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let url = reqwest::Url::parse_with_params(ENDPOINT, &[("key", self.api_key.as_str())])
            .map_err(|e| LiveTransError::Translation {
                message: format!("Invalid endpoint URL: {}", e),
            })?;

        let response = self
            .client
            .post(url)
            .json(&request_body(text, source, target))
            .send()
            .map_err(|e| LiveTransError::Translation {
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(LiveTransError::Translation {
                message: format!("HTTP {}: {}", status, detail),
            });
        }

        let body: Value = response.json().map_err(|e| LiveTransError::Translation {
            message: format!("Invalid JSON response: {}", e),
        })?;
        parse_response(&body)
    }

    fn name(&self) -> &str {
        "google"
    }
}
