use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn issue_token(account_id: &str) -> crate::error::Result<String> {
    let config = crate::config::get_config();
    let claims = Claims {
        sub: account_id.to_string(),
        exp: (Utc::now() + Duration::days(7)).timestamp() as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| crate::error::Error::Internal(format!("Failed to sign token: {}", e)))
}

fn decode_token(token: &str) -> Option<Claims> {
    let config = crate::config::get_config();
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .ok()
}

fn bearer_token(req: &Request) -> Result<Option<String>, Response> {
    let Some(auth_header) = req.headers().get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"bad_authorization"})),
        )
            .into_response());
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"unsupported_scheme"})),
        )
            .into_response());
    };
    Ok(Some(token.to_string()))
}

/// History, stats and profile routes require an authenticated account.
pub async fn require_bearer_auth(mut req: Request, next: Next) -> Response {
    let token = match bearer_token(&req) {
        Ok(Some(token)) => token,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error":"missing_authorization"})),
            )
                .into_response()
        }
        Err(resp) => return resp,
    };

    match decode_token(&token) {
        Some(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"invalid_token"})),
        )
            .into_response(),
    }
}

/// Trainer routes accept guests: a missing Authorization header passes
/// through without claims, but a present-and-invalid token is still rejected
/// rather than silently downgraded to guest.
pub async fn optional_bearer_auth(mut req: Request, next: Next) -> Response {
    match bearer_token(&req) {
        Ok(Some(token)) => match decode_token(&token) {
            Some(claims) => {
                req.extensions_mut().insert(claims);
                next.run(req).await
            }
            None => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error":"invalid_token"})),
            )
                .into_response(),
        },
        Ok(None) => next.run(req).await,
        Err(resp) => resp,
    }
}
