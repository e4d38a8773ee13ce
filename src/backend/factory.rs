//! Authentication-strategy selection and backend construction.

use std::fmt;

use crate::backend::api_key::ApiKeyBackend;
use crate::backend::delegated::DelegatedBackend;
use crate::backend::signing::SigningCredentials;
use crate::backend::{Backend, PlannerBackend};
use crate::errors::ActError;
use crate::util::logging::warning_box;

/// Authentication input: exactly one of the two strategies must be supplied.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub credentials: Option<SigningCredentials>,
    /// Whether step requests ask the service for trace output.
    pub enable_trace: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            credentials: None,
            enable_trace: true,
        }
    }
}

impl AuthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: authenticate with a bearer API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Builder: authenticate with delegated signing credentials.
    pub fn credentials(mut self, credentials: SigningCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Builder: set trace collection.
    pub fn trace(mut self, enabled: bool) -> Self {
        self.enable_trace = enabled;
        self
    }
}

/// The supported authentication strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    Delegated,
    ApiKey,
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delegated => write!(f, "delegated_credentials"),
            Self::ApiKey => write!(f, "api_key"),
        }
    }
}

/// Factory for constructing the backend matching the supplied credentials.
pub struct BackendFactory;

impl BackendFactory {
    /// Validate the auth parameters and pick the strategy.
    ///
    /// Fails before any network activity when zero or both strategies are
    /// configured.
    pub fn determine_strategy(config: &AuthConfig) -> Result<AuthStrategy, ActError> {
        match (config.credentials.is_some(), config.api_key.is_some()) {
            (true, false) => Ok(AuthStrategy::Delegated),
            (false, true) => Ok(AuthStrategy::ApiKey),
            (false, false) => Err(ActError::Auth(warning_box(&[
                "Authentication failed.",
                "",
                &format!(
                    "Please ensure you are using a key from: {}",
                    ApiKeyBackend::default_endpoints().keygen_url
                ),
                "or configure delegated signing credentials.",
            ]))),
            (true, true) => Err(ActError::Auth(format!(
                "only one auth strategy allowed, got: {}, {}",
                AuthStrategy::Delegated,
                AuthStrategy::ApiKey
            ))),
        }
    }

    /// Construct and auth-validate the backend for the supplied credentials.
    pub async fn create(config: AuthConfig) -> Result<PlannerBackend, ActError> {
        Self::determine_strategy(&config)?;
        let enable_trace = config.enable_trace;

        let backend = if let Some(credentials) = config.credentials {
            PlannerBackend::Delegated(DelegatedBackend::new(credentials, enable_trace)?)
        } else if let Some(api_key) = config.api_key {
            PlannerBackend::ApiKey(ApiKeyBackend::new(api_key, enable_trace)?)
        } else {
            return Err(ActError::Auth("no auth strategy configured".into()));
        };

        backend.validate_auth().await?;
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_strategies_fail_with_keygen_hint() {
        match BackendFactory::determine_strategy(&AuthConfig::new()) {
            Err(ActError::Auth(warning)) => {
                assert!(warning.contains("Authentication failed."));
                assert!(warning.contains("https://webpilot.ai/account/keys"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn both_strategies_fail_as_ambiguous() {
        let config = AuthConfig::new()
            .api_key("k")
            .credentials(SigningCredentials::new("akid", "secret"));
        match BackendFactory::determine_strategy(&config) {
            Err(ActError::Auth(message)) => {
                assert!(message.contains("only one auth strategy allowed"));
                assert!(message.contains("delegated_credentials"));
                assert!(message.contains("api_key"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn single_strategy_resolves() {
        let api = AuthConfig::new().api_key("k");
        assert_eq!(
            BackendFactory::determine_strategy(&api).unwrap(),
            AuthStrategy::ApiKey
        );

        let delegated = AuthConfig::new().credentials(SigningCredentials::new("a", "s"));
        assert_eq!(
            BackendFactory::determine_strategy(&delegated).unwrap(),
            AuthStrategy::Delegated
        );
    }

    #[tokio::test]
    async fn create_rejects_ambiguous_config_before_networking() {
        let config = AuthConfig::new()
            .api_key("k")
            .credentials(SigningCredentials::new("akid", "secret"));
        assert!(matches!(
            BackendFactory::create(config).await,
            Err(ActError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn create_rejects_malformed_api_key_without_networking() {
        let config = AuthConfig::new().api_key("way-too-short");
        assert!(matches!(
            BackendFactory::create(config).await,
            Err(ActError::Auth(_))
        ));
    }
}
