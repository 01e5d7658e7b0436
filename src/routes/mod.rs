pub mod categories;
pub mod courses;
pub mod health;
pub mod lessons;
pub mod media;

use crate::{
    error::{AppError, AppResult},
    models::auth::AuthenticatedUser,
    AppState,
};

/// Members may read materials but not change them. The token's role is
/// checked first, then the stored one.
pub(crate) async fn require_manager(state: &AppState, user: &AuthenticatedUser) -> AppResult<()> {
    if !user.role.can_manage_materials() {
        return Err(AppError::AccessDenied);
    }
    state.tenancy.ensure_manager(user.user_id).await
}
