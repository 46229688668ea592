//! Authorization gate: capability checks over principal kind and role.
//!
//! Decisions depend only on the principal kind and the coarse account role.
//! Patients hold no back-office capabilities at all.

use super::principal::{AccountRole, Principal};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Capability {
    /// Enter the staff area of the back office.
    StaffArea,
    /// Change the role attribute of other accounts.
    ManageAccountRoles,
    /// View aggregated statistics dashboards.
    ViewStatistics,
}

/// A denied capability check. Carries nothing; the caller maps it to the
/// forbidden error for its surface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Denied;

/// Check whether `principal` holds `capability`.
pub fn authorize(principal: &Principal, capability: Capability) -> Result<(), Denied> {
    let allowed = match principal {
        Principal::Patient(_) => false,
        Principal::Staff(_) => matches!(capability, Capability::StaffArea),
        Principal::Account(account) => match account.role {
            AccountRole::Admin => true,
            AccountRole::Staff => matches!(capability, Capability::StaffArea),
            AccountRole::User => false,
        },
    };
    if allowed {
        Ok(())
    } else {
        Err(Denied)
    }
}
