use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use super::{user, Error, User, UserStore};

/// In-memory credential store used by tests and local development.
///
/// Enforces the same `username`/`email` uniqueness the PostgreSQL
/// schema enforces with constraints.
#[derive(Debug, Default)]
pub struct MemStore(Mutex<HashMap<user::Id, User>>);

#[async_trait]
impl UserStore for MemStore {
    async fn create_user(&self, user: &User) -> Result<(), Error> {
        let mut users = self.0.lock().unwrap();
        let taken = users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken {
            return Err(Error::Duplicate);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, Error> {
        Ok(self.0.lock().unwrap().values().cloned().collect())
    }

    async fn get_user_by_id(
        &self,
        id: user::Id,
    ) -> Result<Option<User>, Error> {
        Ok(self.0.lock().unwrap().get(&id).cloned())
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, Error> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn has_user_with(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, Error> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .values()
            .any(|u| u.username == username || u.email == email))
    }

    async fn update_user(&self, user: &User) -> Result<(), Error> {
        let mut users = self.0.lock().unwrap();
        let taken = users.values().any(|u| {
            u.id != user.id
                && (u.username == user.username || u.email == user.email)
        });
        if taken {
            return Err(Error::Duplicate);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user_by_id(&self, id: user::Id) -> Result<bool, Error> {
        Ok(self.0.lock().unwrap().remove(&id).is_some())
    }

    async fn delete_all_users(&self) -> Result<u64, Error> {
        let mut users = self.0.lock().unwrap();
        let count = users.len() as u64;
        users.clear();
        Ok(count)
    }
}
