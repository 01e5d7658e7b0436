use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::Role;

/// Claims embedded in the JWT access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // identity UUID
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// Identity and role taken from a validated access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
}
