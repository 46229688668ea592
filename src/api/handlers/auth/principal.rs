//! Principal types shared by the guard resolver and the gates.
//!
//! Three principal kinds share one login form and one "current user"
//! accessor. The guard tag records which kind owns a session; the resolver
//! pins exactly one principal per request.

use uuid::Uuid;

/// A named authentication mechanism / session namespace.
///
/// `Web` is the guard for generic accounts, kept for compatibility with the
/// session naming the back-office always used.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Guard {
    Patient,
    Staff,
    Web,
}

impl Guard {
    /// Per-request resolution order: the first guard with a live session
    /// becomes the active one.
    pub const RESOLUTION_ORDER: [Self; 3] = [Self::Patient, Self::Staff, Self::Web];

    /// Login lookup order: accounts first, then patients, then staff. When
    /// one email exists in two kinds only the first is ever reachable;
    /// sequential precedence is intentional.
    pub const LOGIN_ORDER: [Self; 3] = [Self::Web, Self::Patient, Self::Staff];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Staff => "staff",
            Self::Web => "web",
        }
    }

    #[must_use]
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "patient" => Some(Self::Patient),
            "staff" => Some(Self::Staff),
            "web" => Some(Self::Web),
            _ => None,
        }
    }

    /// Each guard owns its own session cookie so sessions for different
    /// kinds can coexist in one browser.
    #[must_use]
    pub const fn cookie_name(self) -> &'static str {
        match self {
            Self::Patient => "medgate_session_patient",
            Self::Staff => "medgate_session_staff",
            Self::Web => "medgate_session",
        }
    }
}

/// Coarse account role; the only attribute authorization gates consult.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccountRole {
    User,
    Staff,
    Admin,
}

impl AccountRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "user" => Some(Self::User),
            "staff" => Some(Self::Staff),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AccountRecord {
    pub id: Uuid,
    pub email: String,
    pub role: AccountRole,
    pub totp_secret: Option<String>,
    pub totp_confirmed: bool,
}

#[derive(Clone, Debug)]
pub struct PatientRecord {
    pub id: Uuid,
    pub email: String,
}

#[derive(Clone, Debug)]
pub struct StaffRecord {
    pub id: Uuid,
    pub email: String,
    /// Display-only job title (internist, nurse, ...); never consulted by
    /// the authorization gate.
    pub role_name: String,
}

/// An authenticated identity, one of three kinds.
#[derive(Clone, Debug)]
pub enum Principal {
    Account(AccountRecord),
    Patient(PatientRecord),
    Staff(StaffRecord),
}

impl Principal {
    #[must_use]
    pub fn guard(&self) -> Guard {
        match self {
            Self::Account(_) => Guard::Web,
            Self::Patient(_) => Guard::Patient,
            Self::Staff(_) => Guard::Staff,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::Account(account) => account.id,
            Self::Patient(patient) => patient.id,
            Self::Staff(staff) => staff.id,
        }
    }

    #[must_use]
    pub fn email(&self) -> &str {
        match self {
            Self::Account(account) => &account.email,
            Self::Patient(patient) => &patient.email,
            Self::Staff(staff) => &staff.email,
        }
    }
}

/// The session pinned by the guard resolver for the current request.
#[derive(Clone, Debug)]
pub struct ActiveSession {
    pub principal: Principal,
    pub guard: Guard,
    /// Hash of the session token, used for session-scoped writes such as
    /// flipping `twofa_passed`.
    pub token_hash: Vec<u8>,
    pub twofa_passed: bool,
}

/// Request extension inserted by the guard resolver on every web request.
/// `None` means the request proceeds unauthenticated.
#[derive(Clone, Debug, Default)]
pub struct CurrentUser(pub Option<ActiveSession>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_round_trips() {
        for guard in Guard::RESOLUTION_ORDER {
            assert_eq!(Guard::from_str(guard.as_str()), Some(guard));
        }
        assert_eq!(Guard::from_str("unknown"), None);
    }

    #[test]
    fn guard_orders_are_fixed() {
        assert_eq!(
            Guard::RESOLUTION_ORDER,
            [Guard::Patient, Guard::Staff, Guard::Web]
        );
        assert_eq!(Guard::LOGIN_ORDER, [Guard::Web, Guard::Patient, Guard::Staff]);
    }

    #[test]
    fn cookie_names_are_distinct() {
        let names: Vec<&str> = Guard::RESOLUTION_ORDER
            .iter()
            .map(|guard| guard.cookie_name())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn account_role_round_trips() {
        for role in [AccountRole::User, AccountRole::Staff, AccountRole::Admin] {
            assert_eq!(AccountRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(AccountRole::from_str("root"), None);
    }

    #[test]
    fn principal_exposes_guard_and_identity() {
        let account = Principal::Account(AccountRecord {
            id: Uuid::nil(),
            email: "admin@clinic.test".to_string(),
            role: AccountRole::Admin,
            totp_secret: None,
            totp_confirmed: false,
        });
        assert_eq!(account.guard(), Guard::Web);
        assert_eq!(account.id(), Uuid::nil());
        assert_eq!(account.email(), "admin@clinic.test");

        let patient = Principal::Patient(PatientRecord {
            id: Uuid::nil(),
            email: "patient@clinic.test".to_string(),
        });
        assert_eq!(patient.guard(), Guard::Patient);

        let staff = Principal::Staff(StaffRecord {
            id: Uuid::nil(),
            email: "nurse@clinic.test".to_string(),
            role_name: "nurse".to_string(),
        });
        assert_eq!(staff.guard(), Guard::Staff);
    }
}
