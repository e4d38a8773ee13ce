//! Planning-service protocol clients.
//!
//! One backend per authentication strategy, selected by the
//! [`factory::BackendFactory`]. Backends are immutable after construction
//! (endpoints and credentials resolved once) and safe to share read-only
//! across concurrent acts.

pub mod api_key;
pub mod delegated;
pub mod factory;
pub mod signing;
pub mod wire;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ActError;
use crate::program::CallResult;
use crate::tools::ToolRegistry;
use crate::types::act::{Act, ActId, SessionId};
use crate::types::step::Step;

pub use api_key::ApiKeyBackend;
pub use delegated::DelegatedBackend;
pub use factory::{AuthConfig, AuthStrategy, BackendFactory};
pub use signing::SigningCredentials;

/// Resolved base URL of a backend stage. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub api_url: String,
}

impl Endpoints {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }
}

/// Endpoint set of the API-key stage, with key provisioning details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyEndpoints {
    pub api: Endpoints,
    /// Where users obtain a key; quoted in remediation messages.
    pub keygen_url: String,
    pub valid_api_key_length: usize,
}

/// Protocol client for the planning service.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The resolved endpoints this backend talks to.
    fn endpoints(&self) -> &Endpoints;

    /// Verify the authentication strategy can produce valid, identity-bound
    /// credentials. Called by the factory at construction; fails fast.
    async fn validate_auth(&self) -> Result<(), ActError>;

    /// Issue one signed step request and decode the response.
    ///
    /// Extracts the most recent observation and any propagated prior-step
    /// error from `call_results`. Does not mutate the act.
    async fn step(
        &self,
        act: &Act,
        call_results: &[CallResult],
        tools: &ToolRegistry,
    ) -> Result<Step, ActError>;

    /// Strategy-specific remediation text for authentication failures.
    fn auth_remediation(&self, message: &str) -> String;

    /// Remediation text annotated with a request id for support escalation.
    fn auth_remediation_with_request_id(
        &self,
        message: &str,
        request_id: Option<&str>,
    ) -> String {
        let mut warning = self.auth_remediation(message);
        if let Some(request_id) = request_id {
            warning.push_str(&format!(
                "\nIf the requirements above are satisfied and authentication still \
                 fails, please submit an issue with this request id: {request_id}"
            ));
        }
        warning
    }

    /// Mint a fresh opaque session identifier.
    fn create_session(&self) -> SessionId {
        SessionId::new()
    }

    /// Mint a fresh opaque act identifier.
    fn create_act_id(&self) -> ActId {
        ActId::new()
    }
}

/// The concrete backends the factory can produce.
#[derive(Debug)]
pub enum PlannerBackend {
    Delegated(DelegatedBackend),
    ApiKey(ApiKeyBackend),
}

#[async_trait]
impl Backend for PlannerBackend {
    fn endpoints(&self) -> &Endpoints {
        match self {
            Self::Delegated(backend) => backend.endpoints(),
            Self::ApiKey(backend) => backend.endpoints(),
        }
    }

    async fn validate_auth(&self) -> Result<(), ActError> {
        match self {
            Self::Delegated(backend) => backend.validate_auth().await,
            Self::ApiKey(backend) => backend.validate_auth().await,
        }
    }

    async fn step(
        &self,
        act: &Act,
        call_results: &[CallResult],
        tools: &ToolRegistry,
    ) -> Result<Step, ActError> {
        match self {
            Self::Delegated(backend) => backend.step(act, call_results, tools).await,
            Self::ApiKey(backend) => backend.step(act, call_results, tools).await,
        }
    }

    fn auth_remediation(&self, message: &str) -> String {
        match self {
            Self::Delegated(backend) => backend.auth_remediation(message),
            Self::ApiKey(backend) => backend.auth_remediation(message),
        }
    }

    fn create_session(&self) -> SessionId {
        match self {
            Self::Delegated(backend) => backend.create_session(),
            Self::ApiKey(backend) => backend.create_session(),
        }
    }

    fn create_act_id(&self) -> ActId {
        match self {
            Self::Delegated(backend) => backend.create_act_id(),
            Self::ApiKey(backend) => backend.create_act_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RemediationOnly;

    #[async_trait]
    impl Backend for RemediationOnly {
        fn endpoints(&self) -> &Endpoints {
            unimplemented!("not exercised")
        }

        async fn validate_auth(&self) -> Result<(), ActError> {
            Ok(())
        }

        async fn step(
            &self,
            _act: &Act,
            _call_results: &[CallResult],
            _tools: &ToolRegistry,
        ) -> Result<Step, ActError> {
            unimplemented!("not exercised")
        }

        fn auth_remediation(&self, message: &str) -> String {
            message.to_string()
        }
    }

    #[test]
    fn request_id_annotation_is_appended() {
        let backend = RemediationOnly;
        let plain = backend.auth_remediation_with_request_id("denied", None);
        assert_eq!(plain, "denied");

        let annotated = backend.auth_remediation_with_request_id("denied", Some("req-9"));
        assert!(annotated.starts_with("denied"));
        assert!(annotated.contains("req-9"));
    }

    #[test]
    fn default_ids_are_random() {
        let backend = RemediationOnly;
        assert_ne!(backend.create_session(), backend.create_session());
        assert_ne!(backend.create_act_id(), backend.create_act_id());
    }
}
