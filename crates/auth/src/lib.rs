//! Bearer credential verification for incoming connections.
//!
//! Credentials are HS256 JSON Web Tokens minted by the marketplace's account
//! service. Verification checks the signature and expiry, then binds the
//! token subject to a known directory entry.

use gigboard_config::AuthConfig;
use gigboard_database::{DatabaseError, Party, PartyRepository};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, warn};

const CLOCK_SKEW_LEEWAY_SECONDS: u64 = 5;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    Missing,
    #[error("invalid credential: {0}")]
    Invalid(String),
    #[error("credential expired")]
    Expired,
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Token claims accepted at the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id of the bearer.
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// The verified party bound to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl From<Party> for Identity {
    fn from(party: Party) -> Self {
        Self {
            user_id: party.user_id,
            username: party.username,
            avatar_url: party.avatar_url,
        }
    }
}

#[derive(Clone)]
pub struct Authenticator {
    parties: PartyRepository,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY_SECONDS;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            parties: PartyRepository::new(pool),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Verify a bearer credential and resolve the identity it names.
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Missing)?;

        let claims = self.verify(token)?;

        let Some(party) = self.parties.find_by_id(&claims.sub).await? else {
            warn!(user_id = %claims.sub, "credential names an unknown user");
            return Err(AuthError::Invalid("unknown subject".into()));
        };

        debug!(user_id = %party.user_id, "connection authenticated");
        Ok(Identity::from(party))
    }

    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|error| match error.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(error.to_string()),
            })
    }
}
