use super::{default_true, trim, IndexSpec, Model};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

/// Actions granted on one admin module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Permission {
    #[validate(length(min = 1, max = 50))]
    pub module: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// A named set of permissions assigned to staff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[serde(default)]
    #[validate(nested)]
    pub permissions: Vec<Permission>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Role {
    /// Whether this role grants `action` on `module`. Inactive roles grant nothing.
    pub fn allows(&self, module: &str, action: Action) -> bool {
        self.is_active
            && self
                .permissions
                .iter()
                .any(|p| p.module == module && p.actions.contains(&action))
    }
}

impl Model for Role {
    const COLLECTION: &'static str = "roles";

    fn indexes() -> &'static [IndexSpec] {
        const INDEXES: &[IndexSpec] = &[IndexSpec::unique(&["name"])];
        INDEXES
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
        for permission in &mut self.permissions {
            trim(&mut permission.module);
            permission.module.make_ascii_lowercase();
            let mut seen = Vec::with_capacity(permission.actions.len());
            permission.actions.retain(|a| {
                if seen.contains(a) {
                    false
                } else {
                    seen.push(*a);
                    true
                }
            });
        }
    }
}
