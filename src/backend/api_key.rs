//! Backend for the bearer API-key strategy.
//!
//! No live identity check: construction validates the key's shape only, and
//! every step request carries the key as a bearer token.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::backend::wire::{StepClient, JSON_CONTENT_TYPE};
use crate::backend::{ApiKeyEndpoints, Backend, Endpoints};
use crate::errors::ActError;
use crate::program::CallResult;
use crate::tools::ToolRegistry;
use crate::types::act::Act;
use crate::types::step::Step;
use crate::util::logging::warning_box;

#[derive(Debug)]
pub struct ApiKeyBackend {
    api_key: String,
    endpoints: ApiKeyEndpoints,
    client: StepClient,
}

impl ApiKeyBackend {
    /// All known stages for this strategy.
    pub fn available_endpoints() -> HashMap<&'static str, ApiKeyEndpoints> {
        HashMap::from([(
            "production",
            ApiKeyEndpoints {
                api: Endpoints::new("https://api.webpilot.ai"),
                keygen_url: "https://webpilot.ai/account/keys".into(),
                valid_api_key_length: 36,
            },
        )])
    }

    pub fn default_endpoints() -> ApiKeyEndpoints {
        Self::available_endpoints()["production"].clone()
    }

    pub fn new(api_key: impl Into<String>, enable_trace: bool) -> Result<Self, ActError> {
        let endpoints = Self::default_endpoints();
        let client = StepClient::new(&endpoints.api.api_url, enable_trace)?;
        Ok(Self {
            api_key: api_key.into(),
            endpoints,
            client,
        })
    }

    fn bearer_headers(&self) -> Vec<(String, String)> {
        vec![
            ("content-type".to_string(), JSON_CONTENT_TYPE.to_string()),
            (
                "authorization".to_string(),
                format!("Bearer {}", self.api_key),
            ),
        ]
    }
}

#[async_trait]
impl Backend for ApiKeyBackend {
    fn endpoints(&self) -> &Endpoints {
        &self.endpoints.api
    }

    async fn validate_auth(&self) -> Result<(), ActError> {
        if self.api_key.is_empty() {
            return Err(ActError::Auth(
                self.auth_remediation("API key not found."),
            ));
        }
        if self.api_key.len() != self.endpoints.valid_api_key_length {
            return Err(ActError::Auth(self.auth_remediation(&format!(
                "API key has unexpected length {} (expected {}).",
                self.api_key.len(),
                self.endpoints.valid_api_key_length
            ))));
        }
        Ok(())
    }

    async fn step(
        &self,
        act: &Act,
        call_results: &[CallResult],
        tools: &ToolRegistry,
    ) -> Result<Step, ActError> {
        let prepared = self.client.prepare(act, call_results, tools)?;
        let auth_warning = self.auth_remediation("Authentication failed.");
        self.client
            .send(prepared, self.bearer_headers(), &auth_warning)
            .await
    }

    fn auth_remediation(&self, message: &str) -> String {
        warning_box(&[
            message,
            "",
            &format!(
                "Please ensure you are using a key from: {}",
                self.endpoints.keygen_url
            ),
        ])
    }
}
