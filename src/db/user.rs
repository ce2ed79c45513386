use std::error::Error as StdError;

use async_trait::async_trait;
use derive_more::{Display, From};
use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use tokio_postgres::{
    error::SqlState,
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Row,
};
use tokio::task;
use uuid::Uuid;

use super::{Client, Error};

#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub role: Role,
    pub company: Option<String>,
    pub team: Option<String>,
    pub permissions: Vec<String>,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    Hash,
    PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromSql<'_> for Id {
    accepts!(UUID);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Uuid::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(UUID);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, TryFromRepr, PartialEq, Serialize,
)]
#[repr(u8)]
pub enum Role {
    /// Unrestricted administrative capability. The only role allowed to
    /// list or delete users.
    SuperAdmin = 1,
    Team = 2,
    Admin = 3,
    Staff = 4,
    User = 5,
}

impl FromSql<'_> for Role {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        let role = Self::try_from(repr).map_err(|_| "invalid role")?;
        Ok(role)
    }
}

impl ToSql for Role {
    accepts!(INT2);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from((*self) as u8);
        repr.to_sql(ty, out)
    }
}

/// Longest password bcrypt digests without truncation.
pub const MAX_PASSWORD_LENGTH: usize = 72;

/// Salted bcrypt digest of a password. The plaintext never leaves the
/// constructor.
#[derive(Clone, Debug, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes on the blocking thread pool: bcrypt takes hundreds of
    /// milliseconds and must not stall the async runtime.
    pub async fn new(secret: &str) -> Result<Self, HashError> {
        if secret.len() > MAX_PASSWORD_LENGTH {
            return Err(HashError::PasswordTooLong);
        }
        let secret = secret.to_owned();
        let digest =
            task::spawn_blocking(move || {
                bcrypt::hash(secret, bcrypt::DEFAULT_COST)
            })
            .await??;
        Ok(Self(digest))
    }

    /// Over-long input (bcrypt would truncate it) and an undecodable
    /// stored hash both count as a mismatch.
    pub async fn verify(&self, secret: &str) -> Result<bool, HashError> {
        if secret.len() > MAX_PASSWORD_LENGTH {
            return Ok(false);
        }
        let secret = secret.to_owned();
        let hash = self.0.clone();
        let matches =
            task::spawn_blocking(move || bcrypt::verify(secret, &hash))
                .await?
                .unwrap_or(false);
        Ok(matches)
    }
}

#[derive(Debug, From)]
pub enum HashError {
    #[from]
    Bcrypt(bcrypt::BcryptError),
    #[from]
    TaskJoin(task::JoinError),
    PasswordTooLong,
}

impl FromSql<'_> for PasswordHash {
    accepts!(TEXT);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for PasswordHash {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

const COLUMNS: &str =
    "id, username, email, password_hash, role, company, team, permissions";

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        company: row.get("company"),
        team: row.get("team"),
        permissions: row.get("permissions"),
    }
}

fn map_unique_violation(e: tokio_postgres::Error) -> Error {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        Error::Duplicate
    } else {
        Error::Postgres(e)
    }
}

#[async_trait]
impl super::UserStore for Client {
    async fn create_user(&self, user: &User) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO users (id, username, email, password_hash, \
                               role, company, team, permissions) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

        self.0
            .execute(
                SQL,
                &[
                    &user.id,
                    &user.username,
                    &user.email,
                    &user.password_hash,
                    &user.role,
                    &user.company,
                    &user.team,
                    &user.permissions,
                ],
            )
            .await
            .map(drop)
            .map_err(map_unique_violation)
    }

    async fn list_users(&self) -> Result<Vec<User>, Error> {
        let sql = format!("SELECT {COLUMNS} FROM users");
        Ok(self
            .0
            .query(&sql, &[])
            .await?
            .iter()
            .map(user_from_row)
            .collect())
    }

    async fn get_user_by_id(
        &self,
        id: Id,
    ) -> Result<Option<User>, Error> {
        let sql =
            format!("SELECT {COLUMNS} FROM users WHERE id = $1 LIMIT 1");
        Ok(self
            .0
            .query_opt(&sql, &[&id])
            .await?
            .as_ref()
            .map(user_from_row))
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM users WHERE username = $1 LIMIT 1",
        );
        Ok(self
            .0
            .query_opt(&sql, &[&username])
            .await?
            .as_ref()
            .map(user_from_row))
    }

    async fn has_user_with(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, Error> {
        const SQL: &str = "\
            SELECT EXISTS(SELECT 1 FROM users \
                          WHERE username = $1 OR email = $2)";
        Ok(self.0.query_one(SQL, &[&username, &email]).await?.get(0))
    }

    async fn update_user(&self, user: &User) -> Result<(), Error> {
        const SQL: &str = "\
            UPDATE users \
            SET username = $2, \
                email = $3, \
                password_hash = $4, \
                role = $5, \
                company = $6, \
                team = $7, \
                permissions = $8 \
            WHERE id = $1";

        self.0
            .execute(
                SQL,
                &[
                    &user.id,
                    &user.username,
                    &user.email,
                    &user.password_hash,
                    &user.role,
                    &user.company,
                    &user.team,
                    &user.permissions,
                ],
            )
            .await
            .map(drop)
            .map_err(map_unique_violation)
    }

    async fn delete_user_by_id(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "DELETE FROM users WHERE id = $1";
        Ok(self.0.execute(SQL, &[&id]).await? > 0)
    }

    async fn delete_all_users(&self) -> Result<u64, Error> {
        const SQL: &str = "DELETE FROM users";
        Ok(self.0.execute(SQL, &[]).await?)
    }
}
