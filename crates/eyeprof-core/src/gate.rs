//! Viewer identity and the decision whether a request gets a report.
//!
//! The gate is built once from configuration at request-setup time; the
//! per-request inputs (collector presence, controller, viewer) are passed to
//! [`DiagnosticsGate::decide`].

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Controllers whose name starts with this prefix belong to the admin area.
pub const DEFAULT_ADMIN_PREFIX: &str = "Admin";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Guest,
    User,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The user behind the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    /// `None` for anonymous viewers.
    pub id: Option<u64>,
    pub name: String,
    pub role: Role,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(id: u64, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            role,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Why a report was not produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DebugDisabled,
    NoCollector,
    AdminArea,
    NotAdmin,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::DebugDisabled => "debug disabled",
            SkipReason::NoCollector => "no diagnostics collector",
            SkipReason::AdminArea => "admin area",
            SkipReason::NotAdmin => "viewer is not an administrator",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Report,
    Skip(SkipReason),
}

impl GateDecision {
    pub fn allows(self) -> bool {
        self == GateDecision::Report
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsGate {
    debug: bool,
    admin_prefix: String,
}

impl DiagnosticsGate {
    pub fn new(debug: bool, admin_prefix: impl Into<String>) -> Self {
        Self {
            debug,
            admin_prefix: admin_prefix.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.application.debug,
            config.application.admin_prefix.clone(),
        )
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Whether `controller` belongs to the admin area (case-sensitive prefix).
    pub fn is_admin_area(&self, controller: &str) -> bool {
        !self.admin_prefix.is_empty() && controller.starts_with(&self.admin_prefix)
    }

    /// Checks, in order: debug flag, collector presence, admin area, viewer.
    pub fn decide(&self, has_collector: bool, controller: &str, viewer: &Viewer) -> GateDecision {
        if !self.debug {
            return GateDecision::Skip(SkipReason::DebugDisabled);
        }
        if !has_collector {
            return GateDecision::Skip(SkipReason::NoCollector);
        }
        if self.is_admin_area(controller) {
            return GateDecision::Skip(SkipReason::AdminArea);
        }
        if !viewer.is_authenticated() || !viewer.is_admin() {
            return GateDecision::Skip(SkipReason::NotAdmin);
        }
        GateDecision::Report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Viewer {
        Viewer::new(1, "root", Role::Admin)
    }

    #[test]
    fn test_report_for_admin_on_public_controller() {
        let gate = DiagnosticsGate::new(true, "Admin");
        assert_eq!(gate.decide(true, "Index", &admin()), GateDecision::Report);
    }

    #[test]
    fn test_debug_disabled() {
        let gate = DiagnosticsGate::new(false, "Admin");
        assert_eq!(
            gate.decide(true, "Index", &admin()),
            GateDecision::Skip(SkipReason::DebugDisabled)
        );
    }

    #[test]
    fn test_no_collector() {
        let gate = DiagnosticsGate::new(true, "Admin");
        assert_eq!(
            gate.decide(false, "Index", &admin()),
            GateDecision::Skip(SkipReason::NoCollector)
        );
    }

    #[test]
    fn test_admin_area_skipped_even_for_admin() {
        let gate = DiagnosticsGate::new(true, "Admin");
        assert_eq!(
            gate.decide(true, "AdminIndex", &admin()),
            GateDecision::Skip(SkipReason::AdminArea)
        );
        // Case-sensitive prefix.
        assert!(gate.decide(true, "adminish", &admin()).allows());
    }

    #[test]
    fn test_non_admin_viewers_never_get_reports() {
        for debug in [true, false] {
            let gate = DiagnosticsGate::new(debug, "Admin");
            let user = Viewer::new(2, "jane", Role::User);
            assert!(!gate.decide(true, "Index", &user).allows());
            assert!(!gate.decide(true, "Index", &Viewer::anonymous()).allows());
        }
    }

    #[test]
    fn test_admin_role_without_identity_is_rejected() {
        let gate = DiagnosticsGate::new(true, "Admin");
        let viewer = Viewer {
            id: None,
            name: "ghost".into(),
            role: Role::Admin,
        };
        assert_eq!(
            gate.decide(true, "Index", &viewer),
            GateDecision::Skip(SkipReason::NotAdmin)
        );
    }

    #[test]
    fn test_empty_prefix_disables_admin_area_check() {
        let gate = DiagnosticsGate::new(true, "");
        assert!(gate.decide(true, "AdminIndex", &admin()).allows());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }
}
