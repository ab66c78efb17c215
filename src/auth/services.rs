pub(crate) use crate::auth::dto::{Claims, TokenKeys, AUTH_SCOPE};
use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{User, UserStore};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        let AuthConfig { secret } = state.config.auth.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl TokenKeys {
    pub fn sign(&self, user_id: Uuid, scope: &str) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            scope: scope.to_string(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, scope, "token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        // Tokens carry no exp claim; validity is membership in the
        // user's active list, checked by resolve_token.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, scope = %data.claims.scope, "token verified");
        Ok(data.claims)
    }
}

/// Sign a token for `user`, append it to the user's active list, and
/// persist the append. Save order is strict: the token is only handed
/// out once the store accepted it.
pub async fn issue_token(
    store: &dyn UserStore,
    keys: &TokenKeys,
    user: &User,
    scope: &str,
) -> Result<String, ApiError> {
    let token = keys
        .sign(user.id, scope)
        .map_err(|e| ApiError::Persistence(e.to_string()))?;
    store.push_token(user.id, scope, &token).await?;
    Ok(token)
}

/// Verify `token` and look up the user it belongs to. A token that
/// fails verification, was revoked, or belongs to no one resolves to
/// `None` — the caller cannot tell those cases apart.
pub async fn resolve_token(
    store: &dyn UserStore,
    keys: &TokenKeys,
    token: &str,
) -> Result<Option<User>, ApiError> {
    let claims = match keys.verify(token) {
        Ok(c) => c,
        Err(_) => return Ok(None),
    };
    let user = store.find_by_token(claims.sub, token, AUTH_SCOPE).await?;
    Ok(user)
}

/// Extracts the `x-auth` token and resolves it to a user. Any failure
/// short-circuits with 401 and an empty body.
#[derive(Debug)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("x-auth")
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let keys = TokenKeys::from_ref(state);
        let user = resolve_token(state.users.as_ref(), &keys, token)
            .await
            .map_err(|e| {
                warn!(error = %e, "token resolution failed");
                ApiError::Unauthenticated
            })?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(AuthUser {
            user,
            token: token.to_string(),
        })
    }
}
