pub mod mem;
pub mod user;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_postgres::NoTls;

use crate::config;

pub use self::{mem::MemStore, user::User};

pub type Store = Arc<dyn UserStore>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The `username`/`email` unique constraint was violated. The
    /// storage layer is the authoritative uniqueness guard; the
    /// application-level pre-check only improves the error message.
    #[error("duplicate username or email")]
    Duplicate,

    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),
}

/// Credential store interface consumed by the handlers.
///
/// Backed by PostgreSQL in production ([`Client`]) and by an in-memory
/// map ([`MemStore`]) in tests and local development.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<(), Error>;

    async fn list_users(&self) -> Result<Vec<User>, Error>;

    async fn get_user_by_id(
        &self,
        id: user::Id,
    ) -> Result<Option<User>, Error>;

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, Error>;

    /// Advisory duplicate pre-check: whether any user already holds the
    /// given username or email.
    async fn has_user_with(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, Error>;

    async fn update_user(&self, user: &User) -> Result<(), Error>;

    /// Removes the record permanently. Returns whether it existed.
    async fn delete_user_by_id(&self, id: user::Id) -> Result<bool, Error>;

    async fn delete_all_users(&self) -> Result<u64, Error>;
}

pub async fn connect(config: config::Db) -> Result<Store, Error> {
    match config.url {
        Some(url) => {
            let (client, connection) =
                tokio_postgres::connect(&url, NoTls).await?;
            tokio::task::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!("database connection failed: {e}");
                }
            });
            Ok(Arc::new(Client(client)))
        }
        None => Ok(Arc::new(MemStore::default())),
    }
}

pub struct Client(tokio_postgres::Client);
