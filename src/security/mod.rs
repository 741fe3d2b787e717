//! Principals and the permission model they are checked against.

pub mod action;
pub mod context;
pub mod evaluator;
pub mod policy;
pub mod principal;
pub mod resource;
pub mod role;

pub use action::Action;
pub use context::SecurityContext;
pub use evaluator::Rbac;
pub use principal::Principal;
pub use resource::{Namespace, Resource, ResourceKind};
