//! Backend for the delegated-credential strategy.
//!
//! Step requests are signed with the canonical-request scheme from
//! [`super::signing`]; construction verifies the credentials are bound to a
//! real identity by calling the identity endpoint once.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::backend::signing::{sign_request, SigningCredentials};
use crate::backend::wire::{StepClient, JSON_CONTENT_TYPE};
use crate::backend::{Backend, Endpoints};
use crate::errors::ActError;
use crate::program::CallResult;
use crate::tools::ToolRegistry;
use crate::types::act::Act;
use crate::types::step::Step;
use crate::util::logging::warning_box;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug)]
pub struct DelegatedBackend {
    credentials: SigningCredentials,
    endpoints: Endpoints,
    identity_url: String,
    client: StepClient,
}

impl DelegatedBackend {
    /// All known stages for this strategy.
    pub fn available_endpoints() -> HashMap<&'static str, Endpoints> {
        HashMap::from([(
            "production",
            Endpoints::new("https://planner.webpilot.ai"),
        )])
    }

    pub fn default_endpoints() -> Endpoints {
        Self::available_endpoints()["production"].clone()
    }

    pub fn new(credentials: SigningCredentials, enable_trace: bool) -> Result<Self, ActError> {
        let endpoints = Self::default_endpoints();
        let client = StepClient::new(&endpoints.api_url, enable_trace)?;
        let identity_url = format!("{}/identity", endpoints.api_url.trim_end_matches('/'));
        Ok(Self {
            credentials,
            endpoints,
            identity_url,
            client,
        })
    }

    /// One signed call to the identity endpoint to prove the credentials are
    /// bound to a live identity.
    async fn check_identity(&self) -> Result<(), ActError> {
        let headers = sign_request(
            &self.credentials,
            "GET",
            &self.identity_url,
            JSON_CONTENT_TYPE,
            "",
            Utc::now(),
        )
        .map_err(|error| {
            ActError::Auth(self.auth_remediation(&format!("Authentication error: {error}")))
        })?;

        let mut request = self.client.http().get(&self.identity_url);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|error| {
            ActError::Auth(self.auth_remediation(&format!("Identity check failed: {error}")))
        })?;

        if response.status().is_success() {
            debug!(url = %self.identity_url, "identity check passed");
            return Ok(());
        }

        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Err(ActError::Auth(self.auth_remediation_with_request_id(
            &format!("Identity check rejected with status {}.", response.status()),
            request_id.as_deref(),
        )))
    }
}

#[async_trait]
impl Backend for DelegatedBackend {
    fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn validate_auth(&self) -> Result<(), ActError> {
        if !self.credentials.is_configured() {
            return Err(ActError::Auth(self.auth_remediation(
                "Delegated credentials not found. Please configure an access key and secret.",
            )));
        }
        self.check_identity().await
    }

    async fn step(
        &self,
        act: &Act,
        call_results: &[CallResult],
        tools: &ToolRegistry,
    ) -> Result<Step, ActError> {
        let prepared = self.client.prepare(act, call_results, tools)?;

        let headers = sign_request(
            &self.credentials,
            "POST",
            self.client.step_url(),
            JSON_CONTENT_TYPE,
            &prepared.body,
            Utc::now(),
        )
        .map_err(|error| {
            ActError::Auth(self.auth_remediation(&format!("Authentication error: {error}")))
        })?;

        let auth_warning = self.auth_remediation("Authentication failed.");
        self.client.send(prepared, headers, &auth_warning).await
    }

    fn auth_remediation(&self, message: &str) -> String {
        warning_box(&[
            message,
            "",
            "Please ensure your delegated role is allowlisted for the planning",
            "service and that its policy carries the required permissions.",
            "To request access, contact your workspace administrator.",
        ])
    }
}
