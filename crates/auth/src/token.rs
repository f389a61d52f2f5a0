//! Bearer-token verification boundary.
//!
//! The identity provider is a collaborator: the guard only needs a verified
//! subject and an expiry. `Hs256TokenVerifier` covers the shared-secret case;
//! other providers plug in behind [`TokenVerifier`].

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use backoffice_core::SubjectId;

/// Output of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject_id: SubjectId,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    /// The provider could not be reached or answered garbage. Not a denial.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Verifies an opaque bearer credential.
///
/// Called on every request; implementations must not cache results across
/// requests so revocation takes effect immediately.
#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError>;
}

/// Claims carried by tokens this service accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject identifier assigned by the identity provider.
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Expiry, seconds since the epoch.
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// HS256 shared-secret verifier.
pub struct Hs256TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Also require the `iss` claim to equal `issuer`.
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self.validation
            .required_spec_claims
            .insert("iss".to_string());
        self
    }

    fn decode(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                other => TokenError::Invalid(format!("{other:?}")),
            })?;

        let claims = data.claims;
        let subject_id: SubjectId = claims
            .sub
            .parse()
            .map_err(|_| TokenError::Invalid("empty subject".to_string()))?;
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| TokenError::Invalid("exp out of range".to_string()))?;

        Ok(VerifiedToken {
            subject_id,
            email: claims.email.filter(|e| !e.trim().is_empty()),
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl TokenVerifier for Hs256TokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        self.decode(token)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    use super::*;

    fn mint(secret: &str, claims: &TokenClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(sub: &str, exp: DateTime<Utc>) -> TokenClaims {
        TokenClaims {
            sub: sub.to_string(),
            email: Some("admin@example.com".to_string()),
            exp: exp.timestamp(),
            iat: Some(Utc::now().timestamp()),
            iss: None,
        }
    }

    #[tokio::test]
    async fn valid_token_yields_subject_and_email() {
        let verifier = Hs256TokenVerifier::new(b"s3cret");
        let token = mint("s3cret", &claims("user_1", Utc::now() + Duration::minutes(5)));

        let verified = verifier.verify(&token).await.unwrap();
        assert_eq!(verified.subject_id.as_str(), "user_1");
        assert_eq!(verified.email.as_deref(), Some("admin@example.com"));
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid() {
        let verifier = Hs256TokenVerifier::new(b"s3cret");
        let token = mint("other", &claims("user_1", Utc::now() + Duration::minutes(5)));

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let verifier = Hs256TokenVerifier::new(b"s3cret");
        let token = mint("s3cret", &claims("user_1", Utc::now() - Duration::hours(1)));

        assert_eq!(verifier.verify(&token).await.unwrap_err(), TokenError::Expired);
    }

    #[tokio::test]
    async fn blank_subject_is_invalid() {
        let verifier = Hs256TokenVerifier::new(b"s3cret");
        let token = mint("s3cret", &claims("   ", Utc::now() + Duration::minutes(5)));

        assert!(matches!(verifier.verify(&token).await, Err(TokenError::Invalid(_))));
    }

    #[tokio::test]
    async fn issuer_is_enforced_when_configured() {
        let verifier = Hs256TokenVerifier::new(b"s3cret").with_issuer("https://idp.example.com");
        let mut c = claims("user_1", Utc::now() + Duration::minutes(5));
        let token = mint("s3cret", &c);
        assert!(verifier.verify(&token).await.is_err());

        c.iss = Some("https://idp.example.com".to_string());
        let token = mint("s3cret", &c);
        assert!(verifier.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn garbage_is_invalid() {
        let verifier = Hs256TokenVerifier::new(b"s3cret");
        assert!(matches!(
            verifier.verify("not.a.jwt").await,
            Err(TokenError::Invalid(_))
        ));
    }
}
