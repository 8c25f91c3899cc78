#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    SiteManager = 2,
    Accountant = 3,
    Viewer = 4,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::SiteManager),
            3 => Some(Role::Accountant),
            4 => Some(Role::Viewer),
            _ => None,
        }
    }

    /// May edit projects, tasks, assignments and attendance.
    pub fn manages_site(self) -> bool {
        matches!(self, Role::Admin | Role::SiteManager)
    }

    /// May process payments.
    pub fn handles_payments(self) -> bool {
        matches!(self, Role::Admin | Role::Accountant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ids() {
        assert_eq!(Role::from_id(2), Some(Role::SiteManager));
        assert_eq!(Role::from_id(9), None);
        assert!(Role::Accountant.handles_payments());
        assert!(!Role::Accountant.manages_site());
        assert!(!Role::Viewer.handles_payments());
    }
}
