use std::sync::Arc;

use super::*;
use crate::security::policy::{Effect, Policy};
use crate::security::principal::RobotAccount;
use crate::security::resource::ResourceKind;
use crate::security::role::Role;
use crate::store::memory::tests::seeded_store;
use crate::store::{MockMemberStore, MockProjectStore, Project, User};
use crate::token::ResourceActions;

fn chain() -> EvaluatorChain {
    EvaluatorChain::with_stores(&Stores::from_memory(Arc::new(seeded_store())))
}

fn user(user_id: i64, group_ids: Vec<i64>) -> Principal {
    Principal::User(User {
        user_id,
        username: format!("user{user_id}"),
        group_ids,
        ..User::default()
    })
}

fn robot(policies: Vec<Policy>) -> Principal {
    Principal::Robot(RobotAccount {
        id: 1,
        name: "robot$ci".to_string(),
        project_id: 7,
        policies,
    })
}

fn allow(resource: &str, action: Action) -> Policy {
    Policy {
        resource: resource.to_string(),
        action,
        effect: Effect::Allow,
    }
}

#[tokio::test]
async fn test_anonymous_only_pulls_public_repositories() {
    let chain = chain();
    let anonymous = Principal::Anonymous;

    for kind in ResourceKind::ALL {
        for action in Action::ALL {
            let allowed = chain
                .has_permission(&anonymous, &Resource::project(1, kind), action)
                .await
                .unwrap();
            let expected = kind == ResourceKind::Repository && action == Action::Pull;
            assert_eq!(allowed, expected, "{kind} {action}");
        }
    }

    let private = Resource::project(2, ResourceKind::Repository);
    assert!(!chain
        .has_permission(&anonymous, &private, Action::Pull)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_sysadmin_allowed_everywhere() {
    let chain = chain();
    let admin = Principal::User(User {
        user_id: 1,
        username: "admin".to_string(),
        sysadmin_flag: true,
        ..User::default()
    });

    for resource in [
        Resource::system(ResourceKind::Catalog),
        Resource::project(2, ResourceKind::Repository),
        Resource::project(42, ResourceKind::Member),
    ] {
        assert!(chain
            .has_permission(&admin, &resource, Action::Delete)
            .await
            .unwrap());
    }
}

#[tokio::test]
async fn test_roles_union_over_user_and_groups() {
    let chain = chain();
    let repository = Resource::project(7, ResourceKind::Repository);

    // guest directly, maintainer through group 10
    let alice_in_qa = user(2, vec![10]);
    assert!(chain
        .has_permission(&alice_in_qa, &repository, Action::Push)
        .await
        .unwrap());
    assert!(chain
        .has_permission(&alice_in_qa, &repository, Action::Delete)
        .await
        .unwrap());

    let alice = user(2, vec![]);
    assert!(chain
        .has_permission(&alice, &repository, Action::Pull)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&alice, &repository, Action::Push)
        .await
        .unwrap());

    let system = Resource::system(ResourceKind::Catalog);
    assert!(!chain
        .has_permission(&alice_in_qa, &system, Action::Read)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_robot_policies_bypass_roles() {
    let chain = chain();
    let principal = robot(vec![allow("/project/7/repository", Action::Push)]);

    let repository = Resource::project(7, ResourceKind::Repository);
    assert!(chain
        .has_permission(&principal, &repository, Action::Push)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&principal, &repository, Action::Pull)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&principal, &Resource::project(2, ResourceKind::Repository), Action::Push)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_robot_wildcard_scope_and_deny() {
    let chain = chain();
    let principal = robot(vec![
        allow("/project/*/repository", Action::All),
        Policy {
            resource: "/project/2/repository".to_string(),
            action: Action::Delete,
            effect: Effect::Deny,
        },
    ]);

    assert!(chain
        .has_permission(&principal, &Resource::project(2, ResourceKind::Repository), Action::Push)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&principal, &Resource::project(2, ResourceKind::Repository), Action::Delete)
        .await
        .unwrap());
    assert!(chain
        .has_permission(&principal, &Resource::project(7, ResourceKind::Repository), Action::Delete)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_token_access_matches_project_name() {
    let chain = chain();
    let principal = Principal::Token {
        subject: "alice".to_string(),
        access: vec![ResourceActions {
            kind: "repository".to_string(),
            name: "team/app".to_string(),
            actions: vec!["push".to_string()],
        }],
    };

    let team = Resource::project(7, ResourceKind::Repository);
    assert!(chain
        .has_permission(&principal, &team, Action::Push)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&principal, &team, Action::Delete)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&principal, &Resource::project(2, ResourceKind::Repository), Action::Push)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_token_access_is_project_granular() {
    let chain = chain();
    let principal = Principal::Token {
        subject: "alice".to_string(),
        access: vec![ResourceActions {
            kind: "repository".to_string(),
            name: "team/img".to_string(),
            actions: vec!["pull".to_string()],
        }],
    };

    // any repository of `team` is covered by the `team/img` grant
    let team = Resource::project(7, ResourceKind::Repository);
    assert!(chain
        .has_permission(&principal, &team, Action::Pull)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&principal, &team, Action::Push)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&principal, &Resource::project(7, ResourceKind::Artifact), Action::Pull)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_proxy_cache_bound_to_its_project() {
    let chain = chain();
    let principal = Principal::ProxyCache {
        repository: "team/nginx".to_string(),
    };

    let team = Resource::project(7, ResourceKind::Repository);
    assert!(chain
        .has_permission(&principal, &team, Action::Push)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&principal, &team, Action::Delete)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&principal, &Resource::project(2, ResourceKind::Repository), Action::Pull)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_solution_user_reads_repositories() {
    let chain = chain();
    let principal = Principal::Solution {
        name: "jobservice".to_string(),
    };

    let private = Resource::project(2, ResourceKind::Repository);
    assert!(chain
        .has_permission(&principal, &private, Action::Pull)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&principal, &private, Action::Push)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_first_allow_stops_the_chain() {
    let mut members = MockMemberStore::new();
    members.expect_get_roles().never();

    let mut projects = MockProjectStore::new();
    projects.expect_get_project_by_id().times(1).returning(|id| {
        Ok(Some(Project {
            project_id: id,
            name: "library".to_string(),
            public: true,
        }))
    });

    let chain = EvaluatorChain::new(vec![
        Box::new(PublicProjectEvaluator::new(Arc::new(projects))),
        Box::new(ProjectRoleEvaluator::new(Arc::new(members))),
    ]);

    let allowed = chain
        .has_permission(
            &user(2, vec![]),
            &Resource::project(1, ResourceKind::Repository),
            Action::Pull,
        )
        .await
        .unwrap();
    assert!(allowed);
}

#[tokio::test]
async fn test_store_errors_propagate() {
    let mut members = MockMemberStore::new();
    members
        .expect_get_roles()
        .returning(|_, _, _| Err(Error::Backend("connection refused".to_string())));

    let chain = EvaluatorChain::new(vec![Box::new(ProjectRoleEvaluator::new(Arc::new(
        members,
    )))]);

    let result = chain
        .has_permission(
            &user(2, vec![]),
            &Resource::project(1, ResourceKind::Repository),
            Action::Pull,
        )
        .await;
    assert!(matches!(result, Err(Error::Backend(_))));
}

#[tokio::test]
async fn test_role_lookup_receives_group_ids() {
    let mut members = MockMemberStore::new();
    members
        .expect_get_roles()
        .withf(|project_id, user_id, group_ids| {
            *project_id == 3 && *user_id == 9 && group_ids.to_vec() == vec![4, 5]
        })
        .returning(|_, _, _| Ok(vec![Role::LimitedGuest]));

    let chain = EvaluatorChain::new(vec![Box::new(ProjectRoleEvaluator::new(Arc::new(
        members,
    )))]);

    let principal = user(9, vec![4, 5]);
    let repository = Resource::project(3, ResourceKind::Repository);
    assert!(chain
        .has_permission(&principal, &repository, Action::Pull)
        .await
        .unwrap());
    assert!(!chain
        .has_permission(&principal, &repository, Action::Read)
        .await
        .unwrap());
}
