use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, Validation, decode};

use backoffice_types::api::Claims;

use crate::error::SessionError;

/// The signed-in staff member's access token and the claims read from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
    claims: Claims,
}

impl Session {
    /// Read the claims out of `access_token`. The signature is not checked
    /// here; the updates server rejects forged tokens at connect time.
    pub fn from_token(access_token: impl Into<String>) -> Result<Self, SessionError> {
        let access_token = access_token.into();

        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(&access_token, &DecodingKey::from_secret(&[]), &validation)?;
        Ok(Self {
            access_token,
            claims: data.claims,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Who this session authenticates. Two sessions with the same identity
    /// share subscriptions even when their tokens differ.
    pub fn identity(&self) -> &str {
        &self.claims.sub
    }

    pub fn is_expired_at(&self, unix_seconds: u64) -> bool {
        self.claims.exp.is_some_and(|exp| exp <= unix_seconds)
    }

    pub fn is_expired(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        self.is_expired_at(now)
    }
}
