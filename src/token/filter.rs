use std::fmt;

use tracing::{debug, warn};

use crate::security::{Action, Resource, ResourceKind, SecurityContext};
use crate::store::{self, ProjectStore};
use crate::token::image::ImageParser;
use crate::token::ResourceActions;

const CATALOG: &str = "catalog";

#[derive(Debug, PartialEq)]
pub enum Error {
    BadScope(String),
    Store(store::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BadScope(err) => write!(f, "Bad scope: {err}"),
            Error::Store(err) => write!(f, "{err}"),
        }
    }
}

impl From<store::Error> for Error {
    fn from(error: store::Error) -> Self {
        Error::Store(error)
    }
}

/// Narrows requested scopes down to what the principal may actually do.
pub struct AccessFilter {
    parser: Box<dyn ImageParser>,
}

impl AccessFilter {
    pub fn new(parser: Box<dyn ImageParser>) -> Self {
        Self { parser }
    }

    pub async fn filter(
        &self,
        ctx: &SecurityContext,
        projects: &dyn ProjectStore,
        access: &mut [ResourceActions],
    ) -> Result<(), Error> {
        for entry in access.iter_mut() {
            match entry.kind.as_str() {
                "registry" => Self::filter_registry(ctx, entry)?,
                "repository" => self.filter_repository(ctx, projects, entry).await?,
                kind => {
                    warn!("No filter for access type '{kind}', clearing its actions");
                    entry.actions.clear();
                }
            }
        }

        Ok(())
    }

    fn filter_registry(ctx: &SecurityContext, entry: &mut ResourceActions) -> Result<(), Error> {
        if entry.name != CATALOG {
            return Err(Error::BadScope(format!(
                "unsupported registry resource '{}'",
                entry.name
            )));
        }
        if !ctx.is_sysadmin() {
            entry.actions.clear();
        }

        Ok(())
    }

    async fn filter_repository(
        &self,
        ctx: &SecurityContext,
        projects: &dyn ProjectStore,
        entry: &mut ResourceActions,
    ) -> Result<(), Error> {
        let image = self
            .parser
            .parse(&entry.name)
            .map_err(|error| Error::BadScope(error.to_string()))?;

        let Some(project) = projects.get_project_by_name(&image.namespace).await? else {
            debug!("Project '{}' does not exist, clearing actions", image.namespace);
            entry.actions.clear();
            return Ok(());
        };

        let resource = Resource::project(project.project_id, ResourceKind::Repository);
        let permitted = Self::repository_actions(ctx, &resource).await?;

        let mut granted: Vec<String> = Vec::with_capacity(entry.actions.len());
        for action in &entry.actions {
            if permitted.contains(&action.as_str()) && !granted.contains(action) {
                granted.push(action.clone());
            }
        }
        entry.actions = granted;

        Ok(())
    }

    async fn repository_actions(
        ctx: &SecurityContext,
        resource: &Resource,
    ) -> Result<Vec<&'static str>, Error> {
        let mut permitted = Vec::with_capacity(4);

        let can_pull = ctx.can(resource, Action::Pull).await?;
        let can_push = ctx.can(resource, Action::Push).await?;
        if can_pull {
            permitted.push(Action::Pull.as_str());
        }
        if can_push {
            permitted.push(Action::Push.as_str());
        }
        if can_pull && can_push {
            permitted.push(Action::All.as_str());
        }
        if ctx.can(resource, Action::ScannerPull).await? {
            permitted.push(Action::ScannerPull.as_str());
        }

        Ok(permitted)
    }
}
