use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::entities::users;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Claims carried by both token kinds. The staff flags ride along so the
/// frontend can route without an extra profile round-trip.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user id
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub token_type: String,
    pub exp: usize,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

fn issue_token(user: &users::Model, token_type: &str, lifetime: Duration, secret: &str) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(lifetime)
        .ok_or_else(|| anyhow!("token lifetime overflows timestamp"))?
        .timestamp();

    let claims = Claims {
        sub: user.id.clone(),
        username: user.username.clone(),
        is_staff: user.is_staff,
        is_superuser: user.is_superuser,
        token_type: token_type.to_owned(),
        exp: expiration as usize,
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

/// Short-lived access token only, used by the refresh endpoint.
pub fn issue_access_token(user: &users::Model, secret: &str, access_minutes: i64) -> Result<String> {
    issue_token(user, TOKEN_TYPE_ACCESS, Duration::minutes(access_minutes), secret)
}

/// Access + refresh pair issued at registration and login.
pub fn issue_token_pair(
    user: &users::Model,
    secret: &str,
    access_minutes: i64,
    refresh_days: i64,
) -> Result<TokenPair> {
    Ok(TokenPair {
        access: issue_token(user, TOKEN_TYPE_ACCESS, Duration::minutes(access_minutes), secret)?,
        refresh: issue_token(user, TOKEN_TYPE_REFRESH, Duration::days(refresh_days), secret)?,
    })
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}
