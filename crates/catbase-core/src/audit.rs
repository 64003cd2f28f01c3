use std::sync::Arc;

use catbase_db::Database;
use serde_json::Value;
use tracing::warn;

/// Best-effort audit sink. A failed write is logged and swallowed; it never
/// fails the operation being audited.
#[derive(Clone)]
pub struct AuditLog {
    db: Arc<Database>,
}

impl AuditLog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn record(&self, user_id: Option<i64>, action: &str, resource: &str, resource_id: Option<i64>, details: Value) {
        let resource_id = resource_id.map(|id| id.to_string());
        if let Err(e) = self
            .db
            .insert_audit(user_id, action, resource, resource_id.as_deref(), &details.to_string())
        {
            warn!(action, resource, "Failed to write audit entry: {:#}", e);
        }
    }
}
