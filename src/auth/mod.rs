/*!
 * # Authentication and Authorization Module
 *
 * JWT access/refresh token pairs issued against the user accounts kept in
 * the document store, a role to permission mapping, token revocation and
 * the axum middleware that gates the API routes.
 */

use crate::{
    config::AppConfig,
    errors::{ErrorResponse, ServiceError},
    models::{user::UserView, Role},
    services::users::{NewUser, UserService},
};
use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

mod permissions;

pub use permissions::*;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    /// `access` or `refresh`
    pub typ: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Exact or wildcard grant
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|grant| grant_covers(grant, permission))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin.as_ref())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
        refresh_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
            refresh_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(config: &AppConfig) -> Self {
        Self::new(
            config.jwt_secret.clone(),
            config.auth_audience.clone(),
            config.auth_issuer.clone(),
            Duration::from_secs(config.jwt_expiration as u64),
            Duration::from_secs(config.refresh_token_expiration as u64),
        )
    }
}

/// Token blacklist entry
#[derive(Clone, Debug)]
struct BlacklistedToken {
    jti: String,
    expiry: DateTime<Utc>,
}

/// Issues and validates tokens for the accounts managed by [`UserService`]
#[derive(Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    users: UserService,
    blacklisted_tokens: Arc<RwLock<Vec<BlacklistedToken>>>,
    /// Live refresh tokens: jti -> user id. A refresh token is single use.
    refresh_tokens: Arc<DashMap<String, Uuid>>,
}

impl AuthService {
    pub fn new(config: AuthConfig, users: UserService) -> Self {
        Self {
            config,
            users,
            blacklisted_tokens: Arc::new(RwLock::new(Vec::new())),
            refresh_tokens: Arc::new(DashMap::new()),
        }
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Generate an access/refresh pair for a user
    pub fn generate_token(&self, user: &UserView) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let duration = |d: Duration| {
            ChronoDuration::from_std(d)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))
        };
        let access_exp = now + duration(self.config.access_token_expiration)?;
        let refresh_exp = now + duration(self.config.refresh_token_expiration)?;
        let refresh_jti = Uuid::new_v4().to_string();

        let access_claims = Claims {
            sub: user.id.to_string(),
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            roles: vec![user.role.to_string()],
            permissions: permissions_for(user.role),
            typ: ACCESS.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: access_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };
        let refresh_claims = Claims {
            sub: user.id.to_string(),
            name: None,
            email: None,
            roles: vec![],
            permissions: vec![],
            typ: REFRESH.to_string(),
            jti: refresh_jti.clone(),
            iat: now.timestamp(),
            exp: refresh_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = self.sign(&access_claims)?;
        let refresh_token = self.sign(&refresh_claims)?;
        self.refresh_tokens.insert(refresh_jti, user.id);

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            refresh_expires_in: self.config.refresh_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT token and extract the claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.is_token_blacklisted(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Checks credentials and issues a token pair
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<TokenPair, AuthError> {
        let user = self
            .users
            .authenticate(&credentials.email, &credentials.password)
            .await
            .map_err(AuthError::from)?;
        info!(user_id = %user.id, "User logged in");
        self.generate_token(&UserView::from(&user))
    }

    /// Exchange a refresh token for a new pair; the old refresh token is consumed
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.validate_token(refresh_token).await?;
        if claims.typ != REFRESH {
            return Err(AuthError::InvalidToken);
        }
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        match self.refresh_tokens.remove(&claims.jti) {
            Some((_, owner)) if owner == user_id => {}
            _ => return Err(AuthError::InvalidToken),
        }

        let user = self
            .users
            .get(user_id)
            .await
            .map_err(|_| AuthError::UserNotFound)?;
        if !user.active {
            return Err(AuthError::InvalidCredentials);
        }
        self.generate_token(&UserView::from(&user))
    }

    /// Revoke a token (add it to the blacklist)
    pub async fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.validate_token(token).await?;
        self.refresh_tokens.remove(&claims.jti);

        let expiry = DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
        let mut blacklist = self.blacklisted_tokens.write().await;
        blacklist.push(BlacklistedToken {
            jti: claims.jti,
            expiry,
        });
        Self::clean_blacklist(&mut blacklist);
        Ok(())
    }

    async fn is_token_blacklisted(&self, token_id: &str) -> bool {
        let blacklist = self.blacklisted_tokens.read().await;
        blacklist.iter().any(|t| t.jti == token_id)
    }

    fn clean_blacklist(blacklist: &mut Vec<BlacklistedToken>) {
        let now = Utc::now();
        blacklist.retain(|t| t.expiry > now);
    }
}

/// Token pair response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// Login credentials
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<ServiceError> for AuthError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthorized(_) => AuthError::InvalidCredentials,
            ServiceError::Forbidden(_) => AuthError::AccountDisabled,
            ServiceError::NotFound(_) => AuthError::UserNotFound,
            other => AuthError::InternalError(other.to_string()),
        }
    }
}

impl AuthError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            Self::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING_TOKEN",
                "No authentication token provided".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::RevokedToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REVOKED_TOKEN",
                "Authentication token has been revoked".to_string(),
            ),
            Self::TokenCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                "Token creation failed".to_string(),
            ),
            Self::UserNotFound => (
                StatusCode::NOT_FOUND,
                "AUTH_USER_NOT_FOUND",
                "User not found".to_string(),
            ),
            Self::AccountDisabled => (
                StatusCode::FORBIDDEN,
                "AUTH_ACCOUNT_DISABLED",
                "Account is disabled".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = %self, "authentication failure");
        } else {
            debug!(code = error_code, "request not authorized");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            details: Some(error_code.to_string()),
            request_id: crate::tracing::current_request_id().map(|r| r.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extract authentication info from request headers
async fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingAuth)?;
    let claims = auth_service.validate_token(token).await?;
    if claims.typ != ACCESS {
        return Err(AuthError::InvalidToken);
    }

    Ok(AuthUser {
        user_id: claims.sub,
        name: claims.name,
        email: claims.email,
        roles: claims.roles,
        permissions: claims.permissions,
        token_id: claims.jti,
    })
}

/// Authentication middleware; expects `Arc<AuthService>` as a request extension
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("authentication service not available".into())
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Permission middleware to check if a user has the required permission
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.is_admin() && !user.has_permission(&required_permission) {
        warn!(user_id = %user.user_id, permission = %required_permission, "Permission denied");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Role middleware to check if a user has the required role
pub async fn role_middleware(
    State(required_role): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_role(&required_role) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Authentication routes, mounted under `/auth`
pub fn auth_routes() -> Router<Arc<AuthService>> {
    let protected = Router::new()
        .route("/logout", post(logout_handler))
        .route("/me", get(me_handler))
        .with_auth();
    let admin = Router::new()
        .route("/users", get(list_users_handler).post(create_user_handler))
        .with_role(Role::Admin.as_ref());

    Router::new()
        .route("/login", post(login_handler))
        .route("/refresh", post(refresh_token_handler))
        .merge(protected)
        .merge(admin)
        .layer(DefaultBodyLimit::max(1024 * 64))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account disabled", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<TokenPair>, AuthError> {
    Ok(Json(auth_service.login(&credentials).await?))
}

/// Exchange a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Invalid refresh token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh_token_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(refresh_request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let token_pair = auth_service
        .refresh_token(&refresh_request.refresh_token)
        .await?;
    Ok(Json(token_pair))
}

/// Revoke the presented access token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn logout_handler(
    State(auth_service): State<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<StatusCode, AuthError> {
    let token = bearer_token(&headers).ok_or(AuthError::MissingToken)?;
    auth_service.revoke_token(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Identity behind the presented token
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = AuthUser),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn me_handler(user: AuthUser) -> Json<AuthUser> {
    Json(user)
}

/// List user accounts (admin)
#[utoipa::path(
    get,
    path = "/auth/users",
    responses(
        (status = 200, description = "User accounts", body = [UserView]),
        (status = 403, description = "Admin only", body = ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn list_users_handler(
    State(auth_service): State<Arc<AuthService>>,
) -> Result<Json<Vec<UserView>>, ServiceError> {
    Ok(Json(auth_service.users().list().await?))
}

/// Create a user account (admin)
#[utoipa::path(
    post,
    path = "/auth/users",
    request_body = NewUser,
    responses(
        (status = 201, description = "User created", body = UserView),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn create_user_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(input): Json<NewUser>,
) -> Result<(StatusCode, Json<UserView>), ServiceError> {
    let user = auth_service.users().create_user(input).await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
    fn with_role(self, role: &str) -> Self;
}

impl<S> AuthRouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }

    fn with_role(self, role: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            role.to_string(),
            role_middleware,
        ))
        .with_auth()
    }
}
