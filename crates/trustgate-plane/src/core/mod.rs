//! Authorization logic for the request plane

mod acl;
mod escalation;

pub use acl::{Acl, AclAction, AclEngine, AclEntry, EngineError, PermissionEngine, ALL_PERMISSIONS};
pub use escalation::{
    upgrade_steps, EscalationError, EscalationOutcome, EscalationPlanner, Upgrade, UpgradeRedirect,
    UpgradeStep,
};
