use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        identity::{Identity, Role},
        media::MediaKind,
    },
    services::storage::underscore_whitespace,
    store::IdentityStore,
};

/// Storage folder name used when an identity's tenant row has vanished.
const FALLBACK_TENANT_NAME: &str = "admin";

/// Tenant that scopes everything an identity can see.
///
/// Owners are their own tenant. Everyone else carries the owner's id in
/// `tenant_id`, written at creation; an identity without one only scopes
/// itself.
pub fn tenant_of(identity: &Identity) -> Uuid {
    match identity.role {
        Role::Owner => identity.id,
        _ => identity.tenant_id.unwrap_or(identity.id),
    }
}

/// Fails with `AccessDenied` when a resource lives outside `tenant_id`.
pub fn ensure_same_tenant(resource_tenant: Uuid, tenant_id: Uuid) -> AppResult<()> {
    if resource_tenant == tenant_id {
        Ok(())
    } else {
        Err(AppError::AccessDenied)
    }
}

/// The single read path for tenant membership. Every lookup is a point
/// read by id; no hierarchy is walked.
#[derive(Clone)]
pub struct TenancyResolver {
    identities: Arc<dyn IdentityStore>,
}

impl TenancyResolver {
    pub fn new(identities: Arc<dyn IdentityStore>) -> Self {
        Self { identities }
    }

    pub async fn resolve_tenant(&self, identity_id: Uuid) -> AppResult<Uuid> {
        let identity = self.load(identity_id).await?;
        Ok(tenant_of(&identity))
    }

    /// `{tenant name, whitespace replaced by "_"}{tenant id}`. The name is
    /// read fresh on every call since tenants can rename themselves.
    pub async fn resolve_storage_namespace(&self, identity_id: Uuid) -> AppResult<String> {
        let identity = self.load(identity_id).await?;
        let tenant_id = tenant_of(&identity);

        let name = if tenant_id == identity.id {
            identity.name
        } else {
            match self.identities.get(tenant_id).await? {
                Some(tenant) => tenant.name,
                None => {
                    tracing::warn!(identity_id = %identity_id, tenant_id = %tenant_id, "tenant row missing, using fallback folder name");
                    FALLBACK_TENANT_NAME.to_string()
                }
            }
        };

        Ok(format!("{}{}", underscore_whitespace(&name), tenant_id))
    }

    /// Folder for a kind of material: `{namespace}/materials/{kind}`.
    pub async fn media_folder(&self, identity_id: Uuid, kind: MediaKind) -> AppResult<String> {
        let namespace = self.resolve_storage_namespace(identity_id).await?;
        Ok(format!("{namespace}/materials/{kind}"))
    }

    /// Checks the stored role, which may have changed since a token was issued.
    pub async fn ensure_manager(&self, identity_id: Uuid) -> AppResult<()> {
        let identity = self.load(identity_id).await?;
        if identity.role.can_manage_materials() {
            Ok(())
        } else {
            tracing::debug!(identity_id = %identity_id, role = %identity.role, "write refused by stored role");
            Err(AppError::AccessDenied)
        }
    }

    async fn load(&self, identity_id: Uuid) -> AppResult<Identity> {
        self.identities
            .get(identity_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{identity, MemoryIdentities};

    fn resolver(ids: &Arc<MemoryIdentities>) -> TenancyResolver {
        TenancyResolver::new(ids.clone())
    }

    #[tokio::test]
    async fn test_owner_is_its_own_tenant() {
        let ids = Arc::new(MemoryIdentities::default());
        let owner = ids.insert(identity("Acme School", Role::Owner, None));
        assert_eq!(resolver(&ids).resolve_tenant(owner.id).await.unwrap(), owner.id);
    }

    #[tokio::test]
    async fn test_non_owners_use_stored_tenant() {
        let ids = Arc::new(MemoryIdentities::default());
        let owner = ids.insert(identity("Acme", Role::Owner, None));
        let staff = ids.insert(identity("Teacher", Role::Staff, Some(owner.id)));
        let mut member = identity("Student", Role::Member, Some(owner.id));
        member.supervisor_id = Some(staff.id);
        let member = ids.insert(member);

        let r = resolver(&ids);
        assert_eq!(r.resolve_tenant(staff.id).await.unwrap(), owner.id);
        assert_eq!(r.resolve_tenant(member.id).await.unwrap(), owner.id);
    }

    #[tokio::test]
    async fn test_orphan_scopes_only_itself() {
        let ids = Arc::new(MemoryIdentities::default());
        let orphan = ids.insert(identity("Lost", Role::Admin, None));
        assert_eq!(resolver(&ids).resolve_tenant(orphan.id).await.unwrap(), orphan.id);
    }

    #[tokio::test]
    async fn test_unknown_identity_is_not_found() {
        let ids = Arc::new(MemoryIdentities::default());
        let err = resolver(&ids).resolve_tenant(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_storage_namespace_reads_current_tenant_name() {
        let ids = Arc::new(MemoryIdentities::default());
        let owner = ids.insert(identity("Acme  Music School", Role::Owner, None));
        let staff = ids.insert(identity("Teacher", Role::Staff, Some(owner.id)));
        let r = resolver(&ids);

        assert_eq!(
            r.resolve_storage_namespace(staff.id).await.unwrap(),
            format!("Acme_Music_School{}", owner.id)
        );

        ids.rename(owner.id, "Renamed Academy");
        assert_eq!(
            r.media_folder(staff.id, MediaKind::Photo).await.unwrap(),
            format!("Renamed_Academy{}/materials/photo", owner.id)
        );
    }

    #[tokio::test]
    async fn test_storage_namespace_falls_back_when_tenant_missing() {
        let ids = Arc::new(MemoryIdentities::default());
        let ghost_tenant = Uuid::new_v4();
        let staff = ids.insert(identity("Teacher", Role::Staff, Some(ghost_tenant)));
        assert_eq!(
            resolver(&ids).resolve_storage_namespace(staff.id).await.unwrap(),
            format!("admin{ghost_tenant}")
        );
    }

    #[tokio::test]
    async fn test_ensure_manager_reads_stored_role() {
        let ids = Arc::new(MemoryIdentities::default());
        let owner = ids.insert(identity("Acme", Role::Owner, None));
        let staff = ids.insert(identity("Teacher", Role::Staff, Some(owner.id)));
        let member = ids.insert(identity("Student", Role::Member, Some(owner.id)));
        let r = resolver(&ids);

        assert!(r.ensure_manager(owner.id).await.is_ok());
        assert!(r.ensure_manager(staff.id).await.is_ok());
        assert!(matches!(
            r.ensure_manager(member.id).await,
            Err(AppError::AccessDenied)
        ));
        assert!(matches!(
            r.ensure_manager(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_demoted_staff_loses_write_access() {
        let ids = Arc::new(MemoryIdentities::default());
        let owner = ids.insert(identity("Acme", Role::Owner, None));
        let mut staff = identity("Teacher", Role::Staff, Some(owner.id));
        let r = resolver(&ids);
        let staff_id = ids.insert(staff.clone()).id;
        assert!(r.ensure_manager(staff_id).await.is_ok());

        staff.role = Role::Member;
        ids.insert(staff);
        assert!(matches!(
            r.ensure_manager(staff_id).await,
            Err(AppError::AccessDenied)
        ));
    }

    #[test]
    fn test_ensure_same_tenant() {
        let t = Uuid::new_v4();
        assert!(ensure_same_tenant(t, t).is_ok());
        assert!(matches!(
            ensure_same_tenant(Uuid::new_v4(), t),
            Err(AppError::AccessDenied)
        ));
    }
}
