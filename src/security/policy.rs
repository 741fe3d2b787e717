use serde::{Deserialize, Serialize};

use crate::security::action::Action;
use crate::security::resource::{Resource, ResourceKind};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

/// A fully qualified grant, e.g. `/project/7/repository` + `push`.
///
/// A `*` path segment matches any segment, so `/project/*/repository`
/// covers the repositories of every project.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Policy {
    pub resource: String,
    pub action: Action,
    #[serde(default)]
    pub effect: Effect,
}

impl Policy {
    pub fn matches(&self, resource: &Resource, action: Action) -> bool {
        self.action.covers(action) && resource_matches(&self.resource, &resource.to_string())
    }
}

fn resource_matches(pattern: &str, resource: &str) -> bool {
    let mut pattern = pattern.split('/');
    let mut resource = resource.split('/');

    loop {
        match (pattern.next(), resource.next()) {
            (None, None) => return true,
            (Some(expected), Some(actual)) if expected == "*" || expected == actual => {}
            _ => return false,
        }
    }
}

/// Evaluates a policy list: any matching deny wins over matching allows.
pub fn evaluate(policies: &[Policy], resource: &Resource, action: Action) -> bool {
    let mut allowed = false;
    for policy in policies.iter().filter(|p| p.matches(resource, action)) {
        match policy.effect {
            Effect::Deny => return false,
            Effect::Allow => allowed = true,
        }
    }
    allowed
}

/// One entry of a robot permission grant, relative to the grant scope.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Access {
    pub resource: ResourceKind,
    pub action: Action,
    #[serde(default)]
    pub effect: Effect,
}

/// A robot permission grant: `scope` is a namespace path such as
/// `/project/7`, `/system` or `/project/*`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RobotPermission {
    pub scope: String,
    #[serde(default)]
    pub access: Vec<Access>,
}

impl RobotPermission {
    pub fn policies(&self) -> impl Iterator<Item = Policy> + '_ {
        let scope = self.scope.trim_end_matches('/');
        self.access.iter().map(move |access| {
            let resource = if access.resource == ResourceKind::SelfResource {
                scope.to_string()
            } else {
                format!("{scope}/{}", access.resource)
            };

            Policy {
                resource,
                action: access.action,
                effect: access.effect,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(resource: &str, action: Action, effect: Effect) -> Policy {
        Policy {
            resource: resource.to_string(),
            action,
            effect,
        }
    }

    #[test]
    fn test_exact_match() {
        let p = policy("/project/7/repository", Action::Push, Effect::Allow);
        let resource = Resource::project(7, ResourceKind::Repository);

        assert!(p.matches(&resource, Action::Push));
        assert!(!p.matches(&resource, Action::Pull));
        assert!(!p.matches(&Resource::project(8, ResourceKind::Repository), Action::Push));
    }

    #[test]
    fn test_wildcard_action_and_segment() {
        let p = policy("/project/*/repository", Action::All, Effect::Allow);

        assert!(p.matches(&Resource::project(1, ResourceKind::Repository), Action::Delete));
        assert!(p.matches(&Resource::project(99, ResourceKind::Repository), Action::Pull));
        assert!(!p.matches(&Resource::project(1, ResourceKind::Artifact), Action::Pull));
        assert!(!p.matches(&Resource::system(ResourceKind::Repository), Action::Pull));
    }

    #[test]
    fn test_deny_overrides_allow() {
        let resource = Resource::project(7, ResourceKind::Repository);
        let policies = vec![
            policy("/project/7/repository", Action::All, Effect::Allow),
            policy("/project/7/repository", Action::Delete, Effect::Deny),
        ];

        assert!(evaluate(&policies, &resource, Action::Pull));
        assert!(!evaluate(&policies, &resource, Action::Delete));
        assert!(!evaluate(&[], &resource, Action::Pull));
    }

    #[test]
    fn test_robot_permission_expansion() {
        let permission = RobotPermission {
            scope: "/project/7".to_string(),
            access: vec![
                Access {
                    resource: ResourceKind::Repository,
                    action: Action::Push,
                    effect: Effect::Allow,
                },
                Access {
                    resource: ResourceKind::SelfResource,
                    action: Action::Read,
                    effect: Effect::Allow,
                },
            ],
        };

        let resources: Vec<String> = permission.policies().map(|p| p.resource).collect();
        assert_eq!(resources, vec!["/project/7/repository", "/project/7"]);
    }

    #[test]
    fn test_robot_permission_deserialize() {
        let permission: RobotPermission = toml::from_str(
            r#"
            scope = "/project/7"
            access = [
                { resource = "repository", action = "push" },
                { resource = "artifact", action = "delete", effect = "deny" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(permission.access.len(), 2);
        assert_eq!(permission.access[0].effect, Effect::Allow);
        assert_eq!(permission.access[1].effect, Effect::Deny);
    }
}
