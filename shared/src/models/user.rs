//! User and permission models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A back-office user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A permission granting actions on a resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub resource: Resource,
    pub actions: Vec<Action>,
}

impl Permission {
    /// Flattened `resource:action` keys as carried in access tokens
    pub fn keys(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(|action| permission_key(self.resource, *action))
            .collect()
    }
}

/// Resources that can be accessed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Product,
    RawMaterial,
    Recipe,
    Sale,
    Purchase,
    Adjustment,
    Alert,
    Report,
    Settings,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::Product,
        Resource::RawMaterial,
        Resource::Recipe,
        Resource::Sale,
        Resource::Purchase,
        Resource::Adjustment,
        Resource::Alert,
        Resource::Report,
        Resource::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Product => "product",
            Resource::RawMaterial => "raw_material",
            Resource::Recipe => "recipe",
            Resource::Sale => "sale",
            Resource::Purchase => "purchase",
            Resource::Adjustment => "adjustment",
            Resource::Alert => "alert",
            Resource::Report => "report",
            Resource::Settings => "settings",
        }
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Export,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::View,
        Action::Create,
        Action::Edit,
        Action::Delete,
        Action::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Export => "export",
        }
    }
}

pub fn permission_key(resource: Resource, action: Action) -> String {
    format!("{}:{}", resource.as_str(), action.as_str())
}

/// Built-in roles and the permissions they grant
pub fn default_roles() -> Vec<(&'static str, Vec<Permission>)> {
    vec![
        (
            "owner",
            Resource::ALL
                .iter()
                .map(|resource| Permission {
                    resource: *resource,
                    actions: Action::ALL.to_vec(),
                })
                .collect(),
        ),
        (
            "manager",
            vec![
                Permission {
                    resource: Resource::Product,
                    actions: vec![Action::View, Action::Create, Action::Edit],
                },
                Permission {
                    resource: Resource::RawMaterial,
                    actions: vec![Action::View, Action::Create, Action::Edit],
                },
                Permission {
                    resource: Resource::Recipe,
                    actions: vec![Action::View, Action::Create, Action::Edit],
                },
                Permission {
                    resource: Resource::Sale,
                    actions: vec![Action::View, Action::Create],
                },
                Permission {
                    resource: Resource::Purchase,
                    actions: vec![Action::View, Action::Create],
                },
                Permission {
                    resource: Resource::Adjustment,
                    actions: vec![Action::View, Action::Create],
                },
                Permission {
                    resource: Resource::Alert,
                    actions: vec![Action::View, Action::Create, Action::Edit],
                },
                Permission {
                    resource: Resource::Report,
                    actions: vec![Action::View, Action::Export],
                },
            ],
        ),
        (
            "cashier",
            vec![
                Permission {
                    resource: Resource::Product,
                    actions: vec![Action::View],
                },
                Permission {
                    resource: Resource::Sale,
                    actions: vec![Action::View, Action::Create],
                },
                Permission {
                    resource: Resource::Alert,
                    actions: vec![Action::View, Action::Edit],
                },
            ],
        ),
    ]
}

/// Permission keys granted by a built-in role, `None` for unknown roles
pub fn role_permission_keys(role: &str) -> Option<Vec<String>> {
    default_roles()
        .into_iter()
        .find(|(name, _)| *name == role)
        .map(|(_, permissions)| permissions.iter().flat_map(Permission::keys).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_can_do_everything() {
        let keys = role_permission_keys("owner").unwrap();
        assert_eq!(keys.len(), Resource::ALL.len() * Action::ALL.len());
        assert!(keys.contains(&"sale:delete".to_string()));
        assert!(keys.contains(&"purchase:delete".to_string()));
    }

    #[test]
    fn test_cashier_cannot_delete_sales() {
        let keys = role_permission_keys("cashier").unwrap();
        assert!(keys.contains(&"sale:create".to_string()));
        assert!(!keys.contains(&"sale:delete".to_string()));
    }

    #[test]
    fn test_permission_key_uses_singular_resource() {
        assert_eq!(permission_key(Resource::Sale, Action::Delete), "sale:delete");
        assert_eq!(permission_key(Resource::Purchase, Action::Delete), "purchase:delete");
        assert_eq!(permission_key(Resource::RawMaterial, Action::Edit), "raw_material:edit");
    }

    #[test]
    fn test_unknown_role() {
        assert!(role_permission_keys("auditor").is_none());
    }
}
