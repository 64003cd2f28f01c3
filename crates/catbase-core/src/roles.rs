use std::collections::BTreeSet;
use std::sync::Arc;

use catbase_db::Database;

use crate::{CoreError, CoreResult};

/// Permission names seeded by the migrations.
pub const PERM_CATS_WRITE: &str = "cats:write";
pub const PERM_DISCUSSIONS_MODERATE: &str = "discussions:moderate";

/// Read-only role and permission lookups. Always queries the store, so a
/// permission check sees role changes made after the caller's token was
/// issued.
#[derive(Clone)]
pub struct RoleEvaluator {
    db: Arc<Database>,
}

impl RoleEvaluator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn roles_of(&self, user_id: i64) -> CoreResult<BTreeSet<String>> {
        Ok(self.db.get_user_roles(user_id)?.into_iter().collect())
    }

    pub fn has_permission(&self, user_id: i64, permission: &str) -> CoreResult<bool> {
        Ok(self.db.user_has_permission(user_id, permission)?)
    }

    pub fn require_permission(&self, user_id: i64, permission: &'static str) -> CoreResult<()> {
        if self.has_permission(user_id, permission)? {
            Ok(())
        } else {
            Err(CoreError::Forbidden(permission))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotion_is_visible_immediately() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let user = db.create_user("tom", "tom@example.com", "hash").unwrap();
        db.grant_role(user, "admin").unwrap();

        let roles = RoleEvaluator::new(db.clone());
        assert!(roles.roles_of(user).unwrap().contains("admin"));
        assert!(roles.require_permission(user, PERM_CATS_WRITE).is_ok());

        db.with_conn(|conn| {
            conn.execute("DELETE FROM user_roles WHERE user_id = ?1", [user])?;
            Ok(())
        })
        .unwrap();

        assert!(roles.roles_of(user).unwrap().is_empty());
        assert!(matches!(
            roles.require_permission(user, PERM_CATS_WRITE),
            Err(CoreError::Forbidden(PERM_CATS_WRITE))
        ));
    }
}
