//! Capability checks for every service operation.

use crate::types::{AuthorRole, CommentAuthor, StaffRole};
use serde::Serialize;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    Staff {
        id: String,
        email: String,
        name: String,
        role: StaffRole,
    },
    Customer {
        id: String,
        email: String,
        name: String,
    },
}

impl Actor {
    pub fn email(&self) -> &str {
        match self {
            Actor::Staff { email, .. } | Actor::Customer { email, .. } => email,
        }
    }

    /// Display name, used for verification stamps and comment authorship.
    pub fn display_name(&self) -> &str {
        match self {
            Actor::Staff { name, .. } | Actor::Customer { name, .. } => name,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::Staff { .. })
    }

    pub fn author_role(&self) -> AuthorRole {
        match self {
            Actor::Staff { role, .. } => AuthorRole::from(*role),
            Actor::Customer { .. } => AuthorRole::Customer,
        }
    }

    pub fn as_author(&self) -> CommentAuthor {
        CommentAuthor {
            email: self.email().to_string(),
            name: Some(self.display_name().to_string()),
            role: self.author_role(),
        }
    }
}

/// Gated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ViewOverview,
    ViewStaff,
    ViewCustomer,
    CreateCustomer,
    ReassignOm,
    TogglePhaseVisibility,
    /// Global tasks, task files and reports.
    ManageGlobalCatalog,
    /// Custom tasks of one customer.
    ManageCustomerCatalog,
    ToggleCompletion,
    AttachFile,
    PostComment,
    /// verify, unverify, verify-all.
    Verify,
    ToggleSkip,
    ManageStaff,
}

/// What an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource<'a> {
    Global,
    Customer(&'a str),
}

/// Whether `actor` may perform `op` on `resource`.
pub fn can(actor: &Actor, op: Operation, resource: Resource<'_>) -> bool {
    use Operation::*;

    match actor {
        Actor::Staff {
            role: StaffRole::Admin,
            ..
        } => true,
        Actor::Staff {
            role: StaffRole::Om, ..
        } => !matches!(op, ManageGlobalCatalog | ManageStaff),
        Actor::Customer { id, .. } => {
            let own = matches!(resource, Resource::Customer(c) if c == id.as_str());
            own && matches!(op, ViewCustomer | ToggleCompletion | AttachFile | PostComment)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Actor {
        Actor::Staff {
            id: "s1".into(),
            email: "admin@example.com".into(),
            name: "Ada".into(),
            role: StaffRole::Admin,
        }
    }

    fn om() -> Actor {
        Actor::Staff {
            id: "s2".into(),
            email: "om@example.com".into(),
            name: "Olive".into(),
            role: StaffRole::Om,
        }
    }

    fn customer(id: &str) -> Actor {
        Actor::Customer {
            id: id.into(),
            email: format!("{}@example.com", id),
            name: "Bistro".into(),
        }
    }

    #[test]
    fn admin_can_do_everything() {
        for op in [Operation::ManageStaff, Operation::ManageGlobalCatalog, Operation::Verify] {
            assert!(can(&admin(), op, Resource::Global));
        }
    }

    #[test]
    fn om_cannot_touch_global_catalog_or_staff() {
        assert!(!can(&om(), Operation::ManageGlobalCatalog, Resource::Global));
        assert!(!can(&om(), Operation::ManageStaff, Resource::Global));
        assert!(can(&om(), Operation::ManageCustomerCatalog, Resource::Customer("c1")));
        assert!(can(&om(), Operation::Verify, Resource::Customer("c1")));
        assert!(can(&om(), Operation::CreateCustomer, Resource::Global));
    }

    #[test]
    fn customer_is_limited_to_own_record() {
        let c = customer("c1");
        assert!(can(&c, Operation::ViewCustomer, Resource::Customer("c1")));
        assert!(can(&c, Operation::ToggleCompletion, Resource::Customer("c1")));
        assert!(can(&c, Operation::PostComment, Resource::Customer("c1")));
        assert!(!can(&c, Operation::ViewCustomer, Resource::Customer("c2")));
        assert!(!can(&c, Operation::Verify, Resource::Customer("c1")));
        assert!(!can(&c, Operation::ToggleSkip, Resource::Customer("c1")));
        assert!(!can(&c, Operation::ViewOverview, Resource::Global));
    }

    #[test]
    fn author_role_follows_actor() {
        assert_eq!(admin().author_role(), AuthorRole::Admin);
        assert_eq!(om().as_author().role, AuthorRole::Om);
        assert_eq!(customer("c1").as_author().name.as_deref(), Some("Bistro"));
    }
}
