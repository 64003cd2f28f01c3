//! Account provisioning. Registration flows live outside this crate; this is
//! what seeding and administration use to create users with hashed passwords.

use std::sync::Arc;

use catbase_db::Database;
use catbase_db::queries::NewUser;
use tracing::info;

use crate::password::hash_password;
use crate::{CoreError, CoreResult};

pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub roles: &'a [&'a str],
}

#[derive(Clone)]
pub struct Accounts {
    db: Arc<Database>,
}

impl Accounts {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create(&self, account: &NewAccount<'_>) -> CoreResult<i64> {
        let username = account.username.trim();
        if username.len() < 3 || username.len() > 32 {
            return Err(CoreError::invalid_input("username must be 3-32 characters"));
        }
        if !account.email.contains('@') {
            return Err(CoreError::invalid_input("email is not valid"));
        }
        if account.password.len() < 8 {
            return Err(CoreError::invalid_input("password must be at least 8 characters"));
        }

        let hash = hash_password(account.password)?;
        let id = match self.db.create_account(username, account.email, &hash, account.roles)? {
            NewUser::Created(id) => id,
            NewUser::UsernameTaken => return Err(CoreError::invalid_input("username is taken")),
            NewUser::EmailTaken => return Err(CoreError::invalid_input("email is already registered")),
        };

        info!(user_id = id, username, "Account created");
        Ok(id)
    }

    pub fn exists(&self, username: &str) -> CoreResult<bool> {
        Ok(self.db.get_user_by_username(username)?.is_some())
    }

    /// Disabling does not touch issued tokens; refresh checks the flag.
    pub fn set_active(&self, user_id: i64, active: bool) -> CoreResult<()> {
        if self.db.set_user_active(user_id, active)? == 0 {
            return Err(CoreError::NotFound("user"));
        }
        Ok(())
    }
}
