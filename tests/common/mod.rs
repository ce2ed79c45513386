use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net;

use user_registry::{
    api, app, auth, config,
    db::{
        self,
        user::{Id, PasswordHash, Role},
    },
};

pub struct App {
    base_url: String,
}

/// Starts the service on an ephemeral port, backed by an in-memory
/// store seeded with a SuperAdmin (`root`) and a regular user
/// (`alice`).
pub async fn spawn_app() -> App {
    let store: db::Store = Arc::new(db::MemStore::default());
    seed(&store, "root", "root@example.com", "rootpw", Role::SuperAdmin)
        .await;
    seed(&store, "alice", "alice@example.com", "password", Role::User).await;

    let state = Arc::new(app::AppState {
        store,
        tokens: auth::Tokens::new(&config::Jwt {
            secret: "test-secret".to_string(),
            expiration_time: std::time::Duration::from_secs(3600),
        }),
    });

    let listener = net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind a port");
    let addr = listener.local_addr().expect("failed to get the local addr");
    tokio::spawn(async move {
        axum::serve(listener, app::router(state))
            .await
            .expect("server failed");
    });

    App {
        base_url: format!("http://{addr}"),
    }
}

async fn seed(
    store: &db::Store,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Id {
    let user = db::User {
        id: Id::new(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: PasswordHash::new(password)
            .await
            .expect("failed to hash a password"),
        role,
        company: None,
        team: None,
        permissions: Vec::new(),
    };
    store
        .create_user(&user)
        .await
        .expect("failed to seed a user");
    user.id
}

impl App {
    pub fn client(&self) -> Client {
        Client {
            inner: reqwest::Client::new(),
            base_url: self.base_url.clone(),
            auth_token: None,
        }
    }
}

pub struct Client {
    inner: reqwest::Client,
    base_url: String,
    pub auth_token: Option<String>,
}

impl Client {
    pub async fn auth(mut self, username: &str, password: &str) -> Self {
        self.auth_token = Some(
            self.try_auth(username, password)
                .await
                .expect("authentication failed"),
        );
        self
    }

    pub async fn try_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Result<String, StatusCode> {
        let resp = self
            .inner
            .post(format!("{}/auth", self.base_url))
            .json(&json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await
            .expect("failed to send a request");
        if !resp.status().is_success() {
            return Err(resp.status());
        }
        Ok(resp.text().await.expect("failed to get a response"))
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> reqwest::RequestBuilder {
        let mut req = self
            .inner
            .request(method, format!("{}{path}", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req
    }

    async fn json_response(
        req: reqwest::RequestBuilder,
    ) -> (StatusCode, Value) {
        let resp = req.send().await.expect("failed to send a request");
        let status = resp.status();
        let body = resp.json().await.expect("failed to get a response");
        (status, body)
    }

    pub async fn list_users(&self) -> Result<Vec<api::User>, StatusCode> {
        Ok(self
            .request(reqwest::Method::GET, "/users")
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json()
            .await
            .expect("failed to get a response"))
    }

    pub async fn me(&self) -> Result<api::User, StatusCode> {
        Ok(self
            .request(reqwest::Method::GET, "/users/me")
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json()
            .await
            .expect("failed to get a response"))
    }

    pub async fn get_user(&self, id: Id) -> (StatusCode, Value) {
        self.get(&format!("/users/{id}")).await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        Self::json_response(self.request(reqwest::Method::GET, path)).await
    }

    pub async fn create_user(&self, body: &Value) -> (StatusCode, Value) {
        Self::json_response(
            self.request(reqwest::Method::POST, "/users").json(body),
        )
        .await
    }

    pub async fn update_user(
        &self,
        id: Id,
        body: &Value,
    ) -> (StatusCode, Value) {
        Self::json_response(
            self.request(reqwest::Method::PUT, &format!("/users/{id}"))
                .json(body),
        )
        .await
    }

    pub async fn delete_user(&self, id: Id) -> (StatusCode, Value) {
        Self::json_response(
            self.request(reqwest::Method::DELETE, &format!("/users/{id}")),
        )
        .await
    }

    /// Looks a user up by username through the list endpoint, so the
    /// caller must hold the SuperAdmin role.
    pub async fn user_id_by_username(&self, username: &str) -> Id {
        self.list_users()
            .await
            .expect("failed to list users")
            .into_iter()
            .find(|u| u.username == username)
            .expect("user not found")
            .id
    }
}
