// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::AppError,
    models::user::Role,
    utils::authz::{self, Capability, Identity, Viewer},
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// User's role, canonicalized at token issue time.
    pub role: Role,
    /// Display name.
    pub name: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    /// Turns verified claims into the identity handed to the core.
    /// A malformed subject is treated as an invalid token.
    fn into_identity(self) -> Result<Identity, AppError> {
        let id = self.sub.parse::<i64>().map_err(|_| AppError::Unauthenticated)?;
        Ok(Identity {
            id,
            role: self.role,
            name: self.name,
        })
    }
}

/// Signs a new JWT for the user.
pub fn sign_jwt(
    id: i64,
    name: &str,
    role: Role,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Storage(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_string(), // Store User ID in 'sub' claim
        role,
        name: name.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Storage(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthenticated)?;

    Ok(token_data.claims)
}

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
}

/// Axum Middleware: Authentication.
///
/// Intercepts requests, validates the 'Authorization: Bearer <token>' header.
/// If valid, injects `Identity` into the request extensions for handlers to use.
/// If missing or invalid, returns 401 Unauthorized.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req).ok_or(AppError::Unauthenticated)?;

    let identity = verify_jwt(token, &config.jwt_secret)?.into_identity()?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Axum Middleware: Optional Authentication.
///
/// For routes that serve anonymous viewers (public catalog). A missing header
/// yields an anonymous `Viewer`; a present-but-invalid token is still a 401.
pub async fn optional_auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let viewer = match bearer_token(&req) {
        Some(token) => Viewer(Some(
            verify_jwt(token, &config.jwt_secret)?.into_identity()?,
        )),
        None => Viewer(None),
    };

    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Runs the user-management capability
/// through the gate, so only admins proceed.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let identity = req.extensions().get::<Identity>();

    authz::authorize(identity, Capability::ManageUsers)?;

    Ok(next.run(req).await)
}
