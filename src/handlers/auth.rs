use axum::{
    Json,
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
};
use serde_json::json;

use crate::{
    AppState,
    auth::{CurrentUser, login_cookies},
    error::{AppError, AppJson, AppResult, FieldErrors},
    models::{
        LoginRequest, NewUser, RegisterRequest, RegisteredUser, RegistrationResponse, Role,
        UserInfo,
    },
    password::{hash_password, validate_password, verify_password},
    repository::RepoError,
};

const USERNAME_TAKEN: &str = "A user with that username already exists.";

/// register_user
///
/// [Public Route] Creates a regular account (role `user`).
pub async fn register_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<Json<RegistrationResponse>> {
    register(&state, payload, Role::User).await.map(Json)
}

/// register_admin
///
/// [Public Route] Creates an administrator (role `admin`, staff flag set) in a
/// single insert.
pub async fn register_admin(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<Json<RegistrationResponse>> {
    register(&state, payload, Role::Admin).await.map(Json)
}

/// Shared registration flow. Shape, strength and uniqueness problems are all
/// collected before anything is rejected, and come back as one 409.
async fn register(
    state: &AppState,
    payload: RegisterRequest,
    role: Role,
) -> AppResult<RegistrationResponse> {
    let username = payload.username.clone().unwrap_or_default();
    let email = payload.email.clone().unwrap_or_default();
    let password = payload.password.clone().unwrap_or_default();

    let mut errors = FieldErrors::new();
    let registration = match payload.into_registration() {
        Ok(registration) => Some(registration),
        Err(shape) => {
            errors.merge(shape);
            None
        }
    };

    if !password.is_empty() {
        for problem in validate_password(&password, &username, &email) {
            errors.add("password", problem);
        }
    }
    if !username.is_empty() && state.repo.find_user_by_username(&username).await?.is_some() {
        errors.add("username", USERNAME_TAKEN);
    }

    let registration = match (errors.into_result(), registration) {
        (Ok(()), Some(registration)) => registration,
        (Err(errors), _) => {
            tracing::debug!(?errors, "registration rejected");
            return Err(AppError::Registration(errors));
        }
        (Ok(()), None) => return Err(AppError::Internal("registration lost its fields".into())),
    };

    let password_hash = hash_password(&registration.password)
        .map_err(|e| AppError::Internal(format!("password hashing: {e}")))?;

    let new_user = NewUser {
        username: registration.username,
        email: registration.email,
        password_hash,
        role,
        is_staff: role == Role::Admin,
    };

    let user = match state.repo.create_user(&new_user).await {
        Ok(user) => user,
        // Lost a race with a concurrent registration of the same name.
        Err(RepoError::Duplicate { .. }) => {
            return Err(AppError::Registration(FieldErrors::single("username", USERNAME_TAKEN)));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = user.id, role = %user.role, "user registered");

    Ok(RegistrationResponse {
        payload: RegisteredUser { username: user.username, email: user.email },
        role: user.role,
    })
}

/// login
///
/// [Public Route] Verifies credentials and sets the access and refresh cookies.
/// Unknown user, wrong password and inactive account all produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let (username, password) = payload.into_credentials()?;

    let user = match state.repo.find_user_by_username(&username).await? {
        Some(user) => user,
        None => {
            // Same hashing cost as a real check.
            let _ = hash_password(&password);
            tracing::warn!("login failed: unknown username");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(&password, &user.password) || !user.is_active {
        tracing::warn!(user_id = user.id, "login failed");
        return Err(AppError::InvalidCredentials);
    }

    let [access, refresh] = login_cookies(&state.config, user.id)
        .map_err(|e| AppError::Internal(format!("token signing: {e}")))?;

    tracing::info!(user_id = user.id, "login succeeded");

    Ok((
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        Json(json!({ "message": "Login successful" })),
    ))
}

/// me
///
/// [Authenticated Route] Profile of the caller identified by the access cookie.
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserInfo> {
    Json(UserInfo::from(&user))
}
