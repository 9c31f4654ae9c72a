//! Tenant scoping guard.
//!
//! Every tenant-owned table is read and written through this module. The
//! guard is not an interceptor: the tenant identifier is an explicit
//! argument in every function signature, so an unscoped query against a
//! tenant-owned entity is unrepresentable rather than merely rejected at
//! runtime. Reference entities that are shared across tenants simply do not
//! implement [`TenantScoped`] and stay outside the guard.

use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryFilter, Select};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Per-operation tenant context, constructed once at the boundary (request
/// layer, job runner) and threaded through every call. Deliberately not
/// ambient: no thread-local, no task-local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Uuid,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid) -> Self {
        Self { tenant_id }
    }

    /// Builds a context from an authenticated caller's claims. A caller
    /// without a tenant is a correctness bug upstream, not something to
    /// paper over.
    pub fn try_from_claims(tenant_id: Option<Uuid>) -> Result<Self, ServiceError> {
        tenant_id
            .map(Self::new)
            .ok_or(ServiceError::TenantMissing)
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Verifies that a caller-supplied tenant id, if any, matches this
    /// context. Create paths call this before stamping `tenant_id` into the
    /// new row.
    pub fn ensure(&self, supplied: Option<Uuid>) -> Result<(), ServiceError> {
        match supplied {
            Some(id) if id != self.tenant_id => Err(ServiceError::TenantMismatch {
                context: self.tenant_id,
                supplied: id,
            }),
            _ => Ok(()),
        }
    }
}

/// Implemented by every entity owned by a tenant; exposes the column the
/// guard filters on.
pub trait TenantScoped: EntityTrait {
    fn tenant_column() -> <Self as EntityTrait>::Column;
}

/// Starts a select pre-filtered to the context's tenant. Caller filters are
/// AND-combined on top, so widening the scope back out is not possible.
pub fn scoped<E>(ctx: &TenantContext) -> Select<E>
where
    E: TenantScoped,
{
    E::find().filter(E::tenant_column().eq(ctx.tenant_id()))
}

/// Tenant-guarded point lookup. A row owned by another tenant is
/// indistinguishable from an absent one, including by primary key.
pub async fn find_by_id<E, C>(
    ctx: &TenantContext,
    conn: &C,
    id: Uuid,
) -> Result<Option<E::Model>, ServiceError>
where
    E: TenantScoped,
    C: ConnectionTrait,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<Uuid>,
{
    E::find_by_id(id)
        .filter(E::tenant_column().eq(ctx.tenant_id()))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn context_requires_a_tenant() {
        assert_matches!(
            TenantContext::try_from_claims(None),
            Err(ServiceError::TenantMissing)
        );

        let id = Uuid::new_v4();
        let ctx = TenantContext::try_from_claims(Some(id)).unwrap();
        assert_eq!(ctx.tenant_id(), id);
    }

    #[test]
    fn ensure_rejects_foreign_tenant() {
        let ctx = TenantContext::new(Uuid::new_v4());
        let other = Uuid::new_v4();

        assert!(ctx.ensure(None).is_ok());
        assert!(ctx.ensure(Some(ctx.tenant_id())).is_ok());
        assert_matches!(
            ctx.ensure(Some(other)),
            Err(ServiceError::TenantMismatch { supplied, .. }) if supplied == other
        );
    }
}
