use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "identity_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Top-level owning administrator; every other identity belongs to one.
    Owner,
    Admin,
    Staff,
    /// Student.
    Member,
}

impl Role {
    /// Owners, admins and staff may create, edit and delete materials.
    pub fn can_manage_materials(self) -> bool {
        !matches!(self, Role::Member)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Member => "member",
        };
        write!(f, "{s}")
    }
}

/// Identity row. `tenant_id` is written once at creation time and points at
/// the owning `Owner`; it is never derived by walking `supervisor_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
    /// Staff member responsible for a member.
    pub supervisor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
