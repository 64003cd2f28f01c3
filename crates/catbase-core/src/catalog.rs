use std::sync::Arc;

use serde_json::json;
use tracing::info;

use catbase_db::Database;
use catbase_db::models::{CatPatch, CatRow, NewCat};
use catbase_db::reactions::Subject;
use catbase_types::api::{CreateCatRequest, UpdateCatRequest};
use catbase_types::models::{Actor, Cat, ReactionKind};

use crate::audit::AuditLog;
use crate::roles::{PERM_CATS_WRITE, RoleEvaluator};
use crate::{CoreError, CoreResult, timestamp};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
const MAX_NAME_CHARS: usize = 100;

/// Page size the stores will actually use.
pub fn clamp_limit(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

fn clean_name(raw: &str) -> CoreResult<&str> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(CoreError::invalid_input(format!("name must be 1-{MAX_NAME_CHARS} characters")));
    }
    Ok(name)
}

fn to_cat(row: CatRow, user_reaction: Option<ReactionKind>) -> Cat {
    Cat {
        created_at: timestamp(&row.created_at, "created_at", row.id),
        updated_at: timestamp(&row.updated_at, "updated_at", row.id),
        id: row.id,
        name: row.name,
        origin: row.origin,
        description: row.description,
        care_instructions: row.care_instructions,
        image_url: row.image_url,
        like_count: row.like_count,
        dislike_count: row.dislike_count,
        view_count: row.view_count,
        discussion_count: row.discussion_count,
        user_reaction,
    }
}

/// Cat breed catalog. Reads are public; writes need `cats:write`, checked
/// against the store on every call.
#[derive(Clone)]
pub struct Catalog {
    db: Arc<Database>,
    roles: RoleEvaluator,
    audit: AuditLog,
}

impl Catalog {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            roles: RoleEvaluator::new(db.clone()),
            audit: AuditLog::new(db.clone()),
            db,
        }
    }

    pub fn list(&self, viewer: Option<i64>, limit: Option<u32>, offset: Option<u32>) -> CoreResult<Vec<Cat>> {
        let rows = self.db.list_cats(clamp_limit(limit), offset.unwrap_or(0))?;

        let mut reactions = match viewer {
            Some(user_id) => {
                let subjects: Vec<Subject> = rows.iter().map(|c| Subject::Cat(c.id)).collect();
                self.db.user_reactions(&subjects, user_id)?
            }
            None => Default::default(),
        };

        Ok(rows
            .into_iter()
            .map(|row| {
                let reaction = reactions.remove(&row.id);
                to_cat(row, reaction)
            })
            .collect())
    }

    /// Counts as one view.
    pub fn get(&self, id: i64, viewer: Option<i64>) -> CoreResult<Cat> {
        if self.db.record_cat_view(id)? == 0 {
            return Err(CoreError::NotFound("cat"));
        }
        let row = self.db.get_cat(id)?.ok_or(CoreError::NotFound("cat"))?;
        let reaction = match viewer {
            Some(user_id) => self.db.user_reactions(&[Subject::Cat(id)], user_id)?.remove(&id),
            None => None,
        };
        Ok(to_cat(row, reaction))
    }

    pub fn create(&self, actor: &Actor, input: &CreateCatRequest) -> CoreResult<Cat> {
        self.roles.require_permission(actor.user_id, PERM_CATS_WRITE)?;
        let name = clean_name(&input.name)?;

        let id = self.db.insert_cat(&NewCat {
            name,
            origin: input.origin.trim(),
            description: &input.description,
            care_instructions: &input.care_instructions,
            image_url: input.image_url.as_deref(),
            created_by: actor.user_id,
        })?;

        self.audit
            .record(Some(actor.user_id), "cat.create", "cat", Some(id), json!({ "name": name }));
        info!(cat_id = id, user_id = actor.user_id, "Cat created");

        let row = self.db.get_cat(id)?.ok_or(CoreError::NotFound("cat"))?;
        Ok(to_cat(row, None))
    }

    /// Partial update of descriptive fields. Counters cannot be set here.
    pub fn update(&self, actor: &Actor, id: i64, input: &UpdateCatRequest) -> CoreResult<Cat> {
        self.roles.require_permission(actor.user_id, PERM_CATS_WRITE)?;
        let name = input.name.as_deref().map(clean_name).transpose()?;

        let patch = CatPatch {
            name,
            origin: input.origin.as_deref().map(str::trim),
            description: input.description.as_deref(),
            care_instructions: input.care_instructions.as_deref(),
            image_url: input.image_url.as_deref(),
        };
        if self.db.update_cat(id, &patch)? == 0 {
            return Err(CoreError::NotFound("cat"));
        }

        self.audit.record(Some(actor.user_id), "cat.update", "cat", Some(id), json!({}));
        let row = self.db.get_cat(id)?.ok_or(CoreError::NotFound("cat"))?;
        Ok(to_cat(row, None))
    }

    /// Removes the entry with its reactions and discussions.
    pub fn delete(&self, actor: &Actor, id: i64) -> CoreResult<()> {
        self.roles.require_permission(actor.user_id, PERM_CATS_WRITE)?;
        if self.db.delete_cat(id)? == 0 {
            return Err(CoreError::NotFound("cat"));
        }
        self.audit.record(Some(actor.user_id), "cat.delete", "cat", Some(id), json!({}));
        info!(cat_id = id, user_id = actor.user_id, "Cat deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catbase_types::models::{ROLE_ADMIN, ROLE_USER};

    fn actor(db: &Database, name: &str, role: &str) -> Actor {
        let id = db.create_user(name, &format!("{name}@example.com"), "hash").unwrap();
        db.grant_role(id, role).unwrap();
        Actor {
            user_id: id,
            username: name.to_string(),
            roles: vec![role.to_string()],
        }
    }

    fn create_req(name: &str) -> CreateCatRequest {
        CreateCatRequest {
            name: name.to_string(),
            origin: "Scotland".to_string(),
            description: "Folded ears".to_string(),
            care_instructions: String::new(),
            image_url: None,
        }
    }

    #[test]
    fn writes_need_permission() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let admin = actor(&db, "admin", ROLE_ADMIN);
        let user = actor(&db, "tom", ROLE_USER);
        let catalog = Catalog::new(db);

        assert!(matches!(
            catalog.create(&user, &create_req("Scottish Fold")),
            Err(CoreError::Forbidden(PERM_CATS_WRITE))
        ));

        let cat = catalog.create(&admin, &create_req("  Scottish Fold ")).unwrap();
        assert_eq!(cat.name, "Scottish Fold");
        assert_eq!((cat.like_count, cat.view_count), (0, 0));

        assert!(matches!(catalog.delete(&user, cat.id), Err(CoreError::Forbidden(_))));
        catalog.delete(&admin, cat.id).unwrap();
        assert!(matches!(catalog.delete(&admin, cat.id), Err(CoreError::NotFound("cat"))));
    }

    #[test]
    fn name_is_validated() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let admin = actor(&db, "admin", ROLE_ADMIN);
        let catalog = Catalog::new(db);

        assert!(matches!(catalog.create(&admin, &create_req(" ")), Err(CoreError::InvalidInput(_))));
        assert!(matches!(
            catalog.create(&admin, &create_req(&"x".repeat(101))),
            Err(CoreError::InvalidInput(_))
        ));

        let cat = catalog.create(&admin, &create_req("Sphynx")).unwrap();
        let blank = UpdateCatRequest {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(catalog.update(&admin, cat.id, &blank), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let admin = actor(&db, "admin", ROLE_ADMIN);
        let catalog = Catalog::new(db);
        let cat = catalog.create(&admin, &create_req("Sphynx")).unwrap();

        let updated = catalog
            .update(
                &admin,
                cat.id,
                &UpdateCatRequest {
                    description: Some("Hairless".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Sphynx");
        assert_eq!(updated.origin, "Scotland");
        assert_eq!(updated.description, "Hairless");

        assert!(matches!(
            catalog.update(&admin, 999, &UpdateCatRequest::default()),
            Err(CoreError::NotFound("cat"))
        ));
    }

    #[test]
    fn get_counts_views_and_list_clamps() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let admin = actor(&db, "admin", ROLE_ADMIN);
        let catalog = Catalog::new(db);
        for i in 0..12 {
            catalog.create(&admin, &create_req(&format!("Breed {i}"))).unwrap();
        }

        assert_eq!(catalog.list(None, None, None).unwrap().len(), 10);
        assert_eq!(catalog.list(None, Some(0), None).unwrap().len(), 1);
        assert_eq!(catalog.list(None, Some(500), Some(10)).unwrap().len(), 2);

        let first = catalog.list(None, Some(1), None).unwrap().remove(0);
        catalog.get(first.id, None).unwrap();
        assert_eq!(catalog.get(first.id, None).unwrap().view_count, 2);
        assert!(matches!(catalog.get(999, None), Err(CoreError::NotFound("cat"))));
    }

    #[test]
    fn limit_defaults_and_bounds() {
        assert_eq!(clamp_limit(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1000)), MAX_PAGE_SIZE);
    }
}
