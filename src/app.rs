use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use derive_more::From;
use serde::Deserialize;

use crate::{
    api,
    auth::{AuthClaims, AuthError, Tokens},
    db::{
        self,
        user::{HashError, PasswordHash, Role},
    },
};

pub type SharedAppState = Arc<AppState>;

pub struct AppState {
    pub store: db::Store,
    pub tokens: Tokens,
}

pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/auth", post(login))
        .route("/users", get(list_users).post(create_user))
        .route("/users/me", get(get_self))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_state(state)
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(api::Message::new(text))).into_response()
}

/// Path id extractor. A syntactically invalid id addresses no record,
/// so it answers the same 404 as an unknown one.
struct UserId(api::user::Id);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        Path::<api::user::Id>::from_request_parts(parts, state)
            .await
            .map(|Path(id)| Self(id))
            .map_err(|_| message(StatusCode::NOT_FOUND, "User not found"))
    }
}

#[derive(Deserialize)]
struct LoginInput {
    username: String,
    password: String,
}

async fn login(
    State(state): State<SharedAppState>,
    Json(LoginInput { username, password }): Json<LoginInput>,
) -> Result<String, LoginError> {
    use LoginError as E;

    let user = state
        .store
        .get_user_by_username(&username)
        .await?
        .ok_or(E::InvalidCredentials)?;
    if !user.password_hash.verify(&password).await? {
        return Err(E::InvalidCredentials);
    }

    Ok(state.tokens.issue(&user)?)
}

#[derive(Debug, From)]
pub enum LoginError {
    #[from]
    DbError(db::Error),
    #[from]
    HashError(HashError),
    #[from]
    TokenError(jsonwebtoken::errors::Error),
    /// Unknown username and wrong password are indistinguishable on
    /// purpose.
    InvalidCredentials,
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidCredentials => {
                message(StatusCode::UNAUTHORIZED, "Invalid credentials")
            }
            Self::DbError(_) | Self::HashError(_) | Self::TokenError(_) => {
                message(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                )
            }
        }
    }
}

async fn list_users(
    State(state): State<SharedAppState>,
    claims: AuthClaims,
) -> Result<Json<Vec<api::User>>, ListUsersError> {
    claims.require_role(Role::SuperAdmin)?;

    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(api::User::from).collect()))
}

#[derive(Debug, From)]
pub enum ListUsersError {
    #[from]
    AuthError(AuthError),
    #[from]
    DbError(db::Error),
}

impl IntoResponse for ListUsersError {
    fn into_response(self) -> Response {
        match self {
            Self::AuthError(e) => e.into_response(),
            Self::DbError(_) => message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ),
        }
    }
}

#[derive(Deserialize)]
struct CreateUserInput {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<Role>,
    company: Option<String>,
    team: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

async fn create_user(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Json(input): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<api::Message>), CreateUserError> {
    use CreateUserError as E;

    let (Some(username), Some(email), Some(password), Some(role)) =
        (input.username, input.email, input.password, input.role)
    else {
        return Err(E::MissingFields);
    };

    // Advisory pre-check; the store constraint is authoritative.
    if state.store.has_user_with(&username, &email).await? {
        return Err(E::Duplicate);
    }

    let user = db::User {
        id: db::user::Id::new(),
        username,
        email,
        password_hash: PasswordHash::new(&password).await?,
        role,
        company: input.company,
        team: input.team,
        permissions: input.permissions,
    };

    match state.store.create_user(&user).await {
        Ok(()) => Ok((
            StatusCode::CREATED,
            Json(api::Message::new("User created successfully")),
        )),
        Err(db::Error::Duplicate) => Err(E::Duplicate),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, From)]
pub enum CreateUserError {
    #[from]
    DbError(db::Error),
    #[from]
    HashError(HashError),
    MissingFields,
    Duplicate,
}

impl IntoResponse for CreateUserError {
    fn into_response(self) -> Response {
        match self {
            Self::MissingFields => {
                message(StatusCode::BAD_REQUEST, "Missing required fields")
            }
            Self::Duplicate => message(
                StatusCode::BAD_REQUEST,
                "Username or email already exists",
            ),
            Self::HashError(HashError::PasswordTooLong) => message(
                StatusCode::BAD_REQUEST,
                "Password must be at most 72 characters",
            ),
            Self::DbError(_) | Self::HashError(_) => message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ),
        }
    }
}

async fn get_user(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    UserId(id): UserId,
) -> Result<Json<api::User>, GetUserError> {
    use GetUserError as E;

    let user = state
        .store
        .get_user_by_id(id)
        .await?
        .ok_or(E::UserNotFound)?;

    Ok(Json(user.into()))
}

#[derive(Debug, From)]
pub enum GetUserError {
    #[from]
    DbError(db::Error),
    UserNotFound,
}

impl IntoResponse for GetUserError {
    fn into_response(self) -> Response {
        match self {
            Self::UserNotFound => {
                message(StatusCode::NOT_FOUND, "User not found")
            }
            Self::DbError(_) => message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ),
        }
    }
}

#[derive(Deserialize)]
struct UpdateUserInput {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<Role>,
    company: Option<String>,
    team: Option<String>,
    permissions: Option<Vec<String>>,
}

async fn update_user(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    UserId(id): UserId,
    Json(input): Json<UpdateUserInput>,
) -> Result<Json<api::user::Updated>, UpdateUserError> {
    use UpdateUserError as E;

    let mut user = state
        .store
        .get_user_by_id(id)
        .await?
        .ok_or(E::UserNotFound)?;

    // Partial update: absent fields keep their prior values.
    if let Some(username) = input.username {
        user.username = username;
    }
    if let Some(email) = input.email {
        user.email = email;
    }
    if let Some(password) = input.password {
        user.password_hash = PasswordHash::new(&password).await?;
    }
    if let Some(role) = input.role {
        user.role = role;
    }
    if let Some(company) = input.company {
        user.company = Some(company);
    }
    if let Some(team) = input.team {
        user.team = Some(team);
    }
    if let Some(permissions) = input.permissions {
        user.permissions = permissions;
    }

    match state.store.update_user(&user).await {
        Ok(()) => Ok(Json(api::user::Updated {
            message: "User updated successfully".to_string(),
            user: user.into(),
        })),
        Err(db::Error::Duplicate) => Err(E::Duplicate),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, From)]
pub enum UpdateUserError {
    #[from]
    DbError(db::Error),
    #[from]
    HashError(HashError),
    UserNotFound,
    Duplicate,
}

impl IntoResponse for UpdateUserError {
    fn into_response(self) -> Response {
        match self {
            Self::UserNotFound => {
                message(StatusCode::NOT_FOUND, "User not found")
            }
            Self::Duplicate => message(
                StatusCode::BAD_REQUEST,
                "Username or email already exists",
            ),
            Self::HashError(HashError::PasswordTooLong) => message(
                StatusCode::BAD_REQUEST,
                "Password must be at most 72 characters",
            ),
            Self::DbError(_) | Self::HashError(_) => message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ),
        }
    }
}

async fn delete_user(
    State(state): State<SharedAppState>,
    claims: AuthClaims,
    UserId(id): UserId,
) -> Result<Json<api::Message>, DeleteUserError> {
    use DeleteUserError as E;

    claims.require_role(Role::SuperAdmin)?;

    if !state.store.delete_user_by_id(id).await? {
        return Err(E::UserNotFound);
    }

    Ok(Json(api::Message::new("User deleted successfully")))
}

#[derive(Debug, From)]
pub enum DeleteUserError {
    #[from]
    AuthError(AuthError),
    #[from]
    DbError(db::Error),
    UserNotFound,
}

impl IntoResponse for DeleteUserError {
    fn into_response(self) -> Response {
        match self {
            Self::AuthError(e) => e.into_response(),
            Self::UserNotFound => {
                message(StatusCode::NOT_FOUND, "User not found")
            }
            Self::DbError(_) => message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ),
        }
    }
}

async fn get_self(
    State(state): State<SharedAppState>,
    claims: AuthClaims,
) -> Result<Json<api::User>, GetUserError> {
    use GetUserError as E;

    // The record may be gone even though the token is still valid.
    let user = state
        .store
        .get_user_by_id(claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    Ok(Json(user.into()))
}
