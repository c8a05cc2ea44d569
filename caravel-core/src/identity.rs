use caravel_shared::{OwnerKind, OwnerRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Closed set of caller roles.
///
/// The capability table below replaces the string role comparisons the
/// callers used to scatter across every entry point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Admin,
    FactoryStaff,
    DistributorStaff,
    FranchiseStaff,
    Rider,
}

impl ActorRole {
    /// Which roles may create orders against which owner kind.
    pub fn may_create_orders_for(&self, owner: OwnerKind) -> bool {
        match (self, owner) {
            (ActorRole::Admin, _) => true,
            (ActorRole::FactoryStaff, OwnerKind::Factory) => true,
            (ActorRole::DistributorStaff, OwnerKind::Distributor) => true,
            (ActorRole::FranchiseStaff, OwnerKind::Franchise) => true,
            _ => false,
        }
    }

}

/// An authenticated caller, as handed in by the outer HTTP/CLI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
    /// The inventory owner this actor belongs to, if any.
    pub owner: Option<OwnerRef>,
}

impl Actor {
    pub fn new(id: Uuid, role: ActorRole, owner: Option<OwnerRef>) -> Self {
        Self { id, role, owner }
    }

    /// Resolve the owner an order should be created against and check the
    /// capability table. An explicit owner in the request wins over the
    /// actor's own affiliation.
    pub fn resolve_order_owner(&self, requested: Option<OwnerRef>) -> CoreResult<OwnerRef> {
        let owner = requested.or(self.owner).ok_or_else(|| {
            CoreError::ValidationError("an inventory owner is required to create an order".into())
        })?;

        if !self.role.may_create_orders_for(owner.kind()) {
            return Err(CoreError::ForbiddenError(format!(
                "role {:?} may not create orders for {:?}",
                self.role,
                owner.kind()
            )));
        }

        Ok(owner)
    }
}
