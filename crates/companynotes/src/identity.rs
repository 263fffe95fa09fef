//! Caller identity resolution.
//!
//! The note store only ever sees an optional user id. This module turns the
//! request's credentials into that id: a verified bearer token yields its
//! `sub` claim, and in development a caller-asserted header stands in when
//! no verifier is configured.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{AuthConfig, Environment, JwtConfig};
use crate::error::{Error, Result};

/// The resolved identity of a caller. `None` means anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requester(pub Option<String>);

impl Requester {
    /// An identified caller.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    /// An anonymous caller.
    #[must_use]
    pub fn anonymous() -> Self {
        Self(None)
    }

    /// The user id, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Verifies a bearer token and returns the user id it carries.
pub trait IdentityVerifier: Send + Sync + Debug {
    /// Verify `token`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] if the token is not acceptable.
    fn verify(&self, token: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Verifies JWTs signed with a shared secret (HS256) or an RSA key (RS256).
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    /// Build a verifier from configuration. Returns `Ok(None)` when no key is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyLoad`] if the public key file cannot be read or
    /// parsed.
    pub fn from_config(config: &JwtConfig) -> Result<Option<Self>> {
        let (key, algorithm) = if let Some(secret) = &config.secret {
            (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
        } else if let Some(path) = &config.public_key_path {
            (load_rsa_key(path)?, Algorithm::RS256)
        } else {
            return Ok(None);
        };

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Some(Self { key, validation }))
    }
}

fn load_rsa_key(path: &Path) -> Result<DecodingKey> {
    let pem = std::fs::read(path).map_err(|e| Error::KeyLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    DecodingKey::from_rsa_pem(&pem).map_err(|e| Error::KeyLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<String> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        if data.claims.sub.is_empty() {
            return Err(Error::InvalidToken("empty subject".to_string()));
        }
        Ok(data.claims.sub)
    }
}

/// Resolves the [`Requester`] for an incoming request.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    verifier: Option<Arc<dyn IdentityVerifier>>,
    dev_bypass: bool,
    user_header: String,
    dev_user: String,
}

impl IdentityResolver {
    /// Build a resolver from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the token verification key cannot be loaded.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let verifier = JwtVerifier::from_config(&config.jwt)?
            .map(|v| Arc::new(v) as Arc<dyn IdentityVerifier>);
        Ok(Self::new(verifier, config))
    }

    /// Build a resolver around an arbitrary verifier.
    #[must_use]
    pub fn new(verifier: Option<Arc<dyn IdentityVerifier>>, config: &AuthConfig) -> Self {
        let dev_bypass = config.allow_dev_bypass
            || (verifier.is_none() && config.environment != Environment::Production);
        if dev_bypass {
            warn!(
                "Development identity fallback is active; callers may assert any user via {}",
                config.user_header
            );
        }

        Self {
            verifier,
            dev_bypass,
            user_header: config.user_header.to_ascii_lowercase(),
            dev_user: config.dev_user.clone(),
        }
    }

    /// Whether caller-asserted identities are accepted.
    #[must_use]
    pub fn dev_bypass(&self) -> bool {
        self.dev_bypass
    }

    /// Name of the header carrying a caller-asserted user id.
    #[must_use]
    pub fn user_header(&self) -> &str {
        &self.user_header
    }

    /// Resolve the caller from the `Authorization` header value and the
    /// asserted user header value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] when a bearer token fails verification
    /// and the development fallback is off.
    pub fn resolve(&self, authorization: Option<&str>, asserted: Option<&str>) -> Result<Requester> {
        if let (Some(verifier), Some(token)) = (&self.verifier, authorization.and_then(bearer_token))
        {
            match verifier.verify(token) {
                Ok(user) => return Ok(Requester::user(user)),
                Err(e) if self.dev_bypass => debug!("Ignoring invalid token under dev fallback: {e}"),
                Err(e) => return Err(e),
            }
        }

        if !self.dev_bypass {
            return Ok(Requester::anonymous());
        }

        let user = asserted
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.dev_user);
        Ok(Requester::user(user))
    }
}

/// Extract the token from a `Bearer <token>` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
