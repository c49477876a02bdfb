//! Principal extraction.
//!
//! Credentials live with the auth service; this edge only consumes an
//! authenticated principal. The bearer JWT is decoded locally and, when an
//! introspection endpoint is configured, the session is confirmed remotely
//! under a 3 s deadline. A missed deadline degrades to JWT-only trust for
//! read-only consumer requests and fails closed everywhere else.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{request::Parts, Method, StatusCode};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use loco_rs::app::AppContext;
use once_cell::sync::Lazy;
use serde::Deserialize;
use uuid::Uuid;

use kirana_orders::types::CustomerContact;

use crate::common::response::ApiFailure;
use crate::common::settings::KiranaSettings;

static INTROSPECTION_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    phone: String,
    #[allow(dead_code)]
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: String,
    pub email: String,
    pub name: String,
    pub phone: String,
}

impl CurrentUser {
    pub fn contact(&self) -> CustomerContact {
        CustomerContact {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

async fn authenticate(parts: &mut Parts, ctx: &AppContext, fail_closed: bool) -> Result<CurrentUser, ApiFailure> {
    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, &())
            .await
            .map_err(|_| ApiFailure::unauthorized("missing or invalid bearer token"))?;

    let jwt_settings = ctx
        .config
        .auth
        .as_ref()
        .and_then(|auth| auth.jwt.as_ref())
        .ok_or_else(|| {
            ApiFailure::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "JWT secret not configured",
            )
        })?;

    let mut validation = Validation::default();
    validation.validate_exp = true;
    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(jwt_settings.secret.as_bytes()),
        &validation,
    )
    .map_err(|_| ApiFailure::unauthorized("invalid token"))?;

    let claims = token_data.claims;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiFailure::unauthorized("invalid subject in token"))?;

    let settings = KiranaSettings::from_settings(&ctx.config.settings).map_err(|error| {
        ApiFailure::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            format!("invalid settings: {error}"),
        )
    })?;

    if !settings.auth.introspect_url.is_empty() {
        let deadline = std::time::Duration::from_millis(settings.auth.timeout_ms);
        let check = INTROSPECTION_CLIENT
            .post(&settings.auth.introspect_url)
            .timeout(deadline)
            .json(&serde_json::json!({ "token": bearer.token() }))
            .send()
            .await;

        match check {
            Ok(response) if response.status().is_success() => {}
            Ok(response) if response.status() == reqwest::StatusCode::UNAUTHORIZED => {
                return Err(ApiFailure::unauthorized("session revoked"));
            }
            Ok(_) | Err(_) => {
                let read_only = parts.method == Method::GET || parts.method == Method::HEAD;
                if fail_closed || !(settings.auth.fail_open_reads && read_only) {
                    return Err(ApiFailure::new(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "DOWNSTREAM_UNAVAILABLE",
                        "auth service unavailable",
                    ));
                }
                tracing::warn!(user_id = %user_id, "auth introspection unavailable; JWT-only trust for read");
            }
        }
    }

    Ok(CurrentUser {
        id: user_id,
        role: claims.role,
        email: claims.email,
        name: claims.name,
        phone: claims.phone,
    })
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppContext: FromRef<S>,
{
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = AppContext::from_ref(state);
        authenticate(parts, &ctx, false).await
    }
}

/// Admin principal: requires the admin role and never degrades to
/// JWT-only trust.
pub struct AdminUser(pub CurrentUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AppContext: FromRef<S>,
{
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = AppContext::from_ref(state);
        let user = authenticate(parts, &ctx, true).await?;
        if !user.is_admin() {
            return Err(ApiFailure::forbidden("admin role required"));
        }
        Ok(AdminUser(user))
    }
}

/// Trusted sibling services authenticate with the shared internal key.
pub struct InternalService;

impl<S> FromRequestParts<S> for InternalService
where
    S: Send + Sync,
    AppContext: FromRef<S>,
{
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = AppContext::from_ref(state);
        let settings = KiranaSettings::from_settings(&ctx.config.settings).map_err(|error| {
            ApiFailure::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                format!("invalid settings: {error}"),
            )
        })?;
        if settings.internal_service_key.is_empty() {
            return Err(ApiFailure::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "internal service key not configured",
            ));
        }
        let provided = parts
            .headers
            .get("X-Internal-Service-Key")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if provided != settings.internal_service_key {
            return Err(ApiFailure::unauthorized("invalid internal service key"));
        }
        Ok(InternalService)
    }
}

/// Guest identity for anonymous carts: the `X-Session-Id` header.
pub struct GuestSession(pub String);

impl<S> FromRequestParts<S> for GuestSession
where
    S: Send + Sync,
{
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .headers
            .get("X-Session-Id")
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApiFailure::bad_request("missing X-Session-Id header"))?;
        Ok(GuestSession(session.to_string()))
    }
}

/// Cart endpoints accept either a bearer user or a guest session.
pub enum CartPrincipal {
    User(CurrentUser),
    Guest(String),
}

impl CartPrincipal {
    pub fn owner(&self) -> kirana_orders::dto::cart::CartOwner {
        match self {
            CartPrincipal::User(user) => kirana_orders::dto::cart::CartOwner::User(user.id),
            CartPrincipal::Guest(session) => {
                kirana_orders::dto::cart::CartOwner::Guest(session.clone())
            }
        }
    }
}

impl<S> FromRequestParts<S> for CartPrincipal
where
    S: Send + Sync,
    AppContext: FromRef<S>,
{
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.contains_key(axum::http::header::AUTHORIZATION) {
            let ctx = AppContext::from_ref(state);
            return Ok(CartPrincipal::User(authenticate(parts, &ctx, false).await?));
        }
        let GuestSession(session) = GuestSession::from_request_parts(parts, state).await?;
        Ok(CartPrincipal::Guest(session))
    }
}
