use axum::{
    extract::{FromRef, FromRequestParts, MatchedPath, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use cookie::{Cookie, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    AppState,
    config::AppConfig,
    error::AppError,
    models::{Role, User},
    policy::{self, Action, Resource},
    repository::RepositoryState,
};

/// Name of the refresh-token cookie set on login.
pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims
///
/// Payload of both session tokens. They differ only in `token_type` and lifetime;
/// only access tokens authenticate requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's numeric id, as a string.
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    /// Random token id, so two tokens issued in the same second still differ.
    pub jti: String,
    pub token_type: TokenKind,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token rejected: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("expected an {expected:?} token")]
    WrongKind { expected: TokenKind },

    #[error("token subject is not a user id")]
    BadSubject,
}

/// issue_token
///
/// Signs an HS256 token for `user_id` valid for the configured lifetime of `kind`.
pub fn issue_token(config: &AppConfig, user_id: i64, kind: TokenKind) -> Result<String, TokenError> {
    let ttl = match kind {
        TokenKind::Access => config.access_token_ttl_secs,
        TokenKind::Refresh => config.refresh_token_ttl_secs,
    };
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + ttl).max(0) as usize,
        iat: now.max(0) as usize,
        jti: Uuid::new_v4().to_string(),
        token_type: kind,
    };
    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    Ok(encode(&Header::default(), &claims, &key)?)
}

/// decode_token
///
/// Verifies signature and expiry, then checks the token is of the expected kind.
/// Returns the subject's user id.
pub fn decode_token(config: &AppConfig, token: &str, expected: TokenKind) -> Result<i64, TokenError> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let data = decode::<Claims>(token, &key, &validation)?;
    if data.claims.token_type != expected {
        return Err(TokenError::WrongKind { expected });
    }
    data.claims.sub.parse().map_err(|_| TokenError::BadSubject)
}

/// session_cookie
///
/// `Set-Cookie` value for a session token: HttpOnly, SameSite=Lax, scoped to `/`,
/// expiring with the token.
pub fn session_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    Cookie::build((name.to_string(), value.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .max_age(cookie::time::Duration::seconds(max_age_secs))
        .build()
        .to_string()
}

/// Issues both session tokens for `user_id` and renders their cookies
/// (access first, refresh second).
pub fn login_cookies(config: &AppConfig, user_id: i64) -> Result<[String; 2], TokenError> {
    let access = issue_token(config, user_id, TokenKind::Access)?;
    let refresh = issue_token(config, user_id, TokenKind::Refresh)?;
    Ok([
        session_cookie(&config.auth_cookie, &access, config.access_token_ttl_secs, config.cookie_secure),
        session_cookie(REFRESH_COOKIE, &refresh, config.refresh_token_ttl_secs, config.cookie_secure),
    ])
}

/// Value of the first cookie called `name` across all `Cookie` headers.
/// A cleared (empty) cookie counts as absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// CurrentUser
///
/// An authenticated, active user. Extracting it from a request that carries no
/// session yields 401 "not authenticated".
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }
}

/// Caller
///
/// The resolved identity of a request: `None` for anonymous callers. This is an
/// explicit per-request value; the policy middleware stores it in the request
/// extensions and handlers extract it from there.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<CurrentUser>);

impl Caller {
    pub fn role(&self) -> Option<Role> {
        self.0.as_ref().map(CurrentUser::role)
    }

    /// resolve
    ///
    /// 1. No access cookie: anonymous.
    /// 2. Cookie present: it must be a valid, unexpired access token whose subject
    ///    is an existing, active user. Anything else is an invalid token, never a
    ///    silent fallback to anonymous.
    pub async fn resolve(
        headers: &HeaderMap,
        repo: &RepositoryState,
        config: &AppConfig,
    ) -> Result<Caller, AppError> {
        let Some(token) = read_cookie(headers, &config.auth_cookie) else {
            return Ok(Caller(None));
        };

        let user_id = match decode_token(config, &token, TokenKind::Access) {
            Ok(id) => id,
            Err(TokenError::Jwt(e)) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                tracing::debug!("access token expired");
                return Err(AppError::InvalidToken);
            }
            Err(e) => {
                tracing::warn!(error = %e, "access token rejected");
                return Err(AppError::InvalidToken);
            }
        };

        match repo.get_user(user_id).await? {
            Some(user) if user.is_active => Ok(Caller(Some(CurrentUser(user)))),
            Some(_) => {
                tracing::warn!(user_id, "token presented for inactive user");
                Err(AppError::InvalidToken)
            }
            None => {
                tracing::warn!(user_id, "token subject no longer exists");
                Err(AppError::InvalidToken)
            }
        }
    }
}

/// Reuses the identity resolved by the policy middleware when present, and
/// resolves it from the cookie otherwise.
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(caller) = parts.extensions.get::<Caller>() {
            return Ok(caller.clone());
        }
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        let caller = Caller::resolve(&parts.headers, &repo, &config).await?;
        parts.extensions.insert(caller.clone());
        Ok(caller)
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Caller::from_request_parts(parts, state).await?.0.ok_or(AppError::NotAuthenticated)
    }
}

/// Guard
///
/// State of the policy middleware for one resource router.
#[derive(Clone)]
pub struct Guard {
    pub state: AppState,
    pub resource: Resource,
}

impl Guard {
    pub fn new(state: AppState, resource: Resource) -> Self {
        Self { state, resource }
    }
}

/// enforce
///
/// Route-layer middleware: resolves the caller, checks the access matrix for
/// (resource, action) and only then lets the request reach the handler, so a
/// rejected caller never sees body validation.
pub async fn enforce(State(guard): State<Guard>, mut request: Request, next: Next) -> Response {
    let targets_item = request
        .extensions()
        .get::<MatchedPath>()
        .is_some_and(|path| path.as_str().contains("{id}"));

    let Some(action) = Action::from_request(request.method(), targets_item) else {
        return next.run(request).await;
    };

    let caller =
        match Caller::resolve(request.headers(), &guard.state.repo, &guard.state.config).await {
            Ok(caller) => caller,
            Err(e) => return e.into_response(),
        };

    if let Err(e) = policy::authorize(caller.role(), guard.resource, action) {
        tracing::debug!(resource = ?guard.resource, ?action, "access denied");
        return e.into_response();
    }

    request.extensions_mut().insert(caller);
    next.run(request).await
}
