use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ResourceKind {
    // the namespace itself, rendered without a suffix
    SelfResource,
    Member,
    Metadata,
    Log,
    Label,
    Quota,
    Repository,
    TagRetention,
    ImmutableTag,
    HelmChart,
    HelmChartVersion,
    HelmChartVersionLabel,
    Configuration,
    Robot,
    NotificationPolicy,
    Webhook,
    Replication,
    Scan,
    Scanner,
    Artifact,
    ArtifactAddition,
    Tag,
    Accessory,
    ArtifactLabel,
    PreheatPolicy,
    Catalog,
    User,
    Project,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 28] = [
        ResourceKind::SelfResource,
        ResourceKind::Member,
        ResourceKind::Metadata,
        ResourceKind::Log,
        ResourceKind::Label,
        ResourceKind::Quota,
        ResourceKind::Repository,
        ResourceKind::TagRetention,
        ResourceKind::ImmutableTag,
        ResourceKind::HelmChart,
        ResourceKind::HelmChartVersion,
        ResourceKind::HelmChartVersionLabel,
        ResourceKind::Configuration,
        ResourceKind::Robot,
        ResourceKind::NotificationPolicy,
        ResourceKind::Webhook,
        ResourceKind::Replication,
        ResourceKind::Scan,
        ResourceKind::Scanner,
        ResourceKind::Artifact,
        ResourceKind::ArtifactAddition,
        ResourceKind::Tag,
        ResourceKind::Accessory,
        ResourceKind::ArtifactLabel,
        ResourceKind::PreheatPolicy,
        ResourceKind::Catalog,
        ResourceKind::User,
        ResourceKind::Project,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::SelfResource => "",
            ResourceKind::Member => "member",
            ResourceKind::Metadata => "metadata",
            ResourceKind::Log => "log",
            ResourceKind::Label => "label",
            ResourceKind::Quota => "quota",
            ResourceKind::Repository => "repository",
            ResourceKind::TagRetention => "tag-retention",
            ResourceKind::ImmutableTag => "immutable-tag",
            ResourceKind::HelmChart => "helm-chart",
            ResourceKind::HelmChartVersion => "helm-chart-version",
            ResourceKind::HelmChartVersionLabel => "helm-chart-version-label",
            ResourceKind::Configuration => "configuration",
            ResourceKind::Robot => "robot",
            ResourceKind::NotificationPolicy => "notification-policy",
            ResourceKind::Webhook => "webhook",
            ResourceKind::Replication => "replication",
            ResourceKind::Scan => "scan",
            ResourceKind::Scanner => "scanner",
            ResourceKind::Artifact => "artifact",
            ResourceKind::ArtifactAddition => "artifact-addition",
            ResourceKind::Tag => "tag",
            ResourceKind::Accessory => "accessory",
            ResourceKind::ArtifactLabel => "artifact-label",
            ResourceKind::PreheatPolicy => "preheat-policy",
            ResourceKind::Catalog => "catalog",
            ResourceKind::User => "user",
            ResourceKind::Project => "project",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown resource kind '{s}'"))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// The owner of a resource: a single project, or the whole system.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Namespace {
    System,
    Project(i64),
}

impl Namespace {
    pub fn resource(self, kind: ResourceKind) -> Resource {
        Resource {
            namespace: self,
            kind,
        }
    }

    pub fn project_id(self) -> Option<i64> {
        match self {
            Namespace::Project(id) => Some(id),
            Namespace::System => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Namespace::System => f.write_str("/system"),
            Namespace::Project(id) => write!(f, "/project/{id}"),
        }
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "/system" {
            return Ok(Namespace::System);
        }

        let id = s
            .strip_prefix("/project/")
            .and_then(|id| id.parse::<i64>().ok())
            .ok_or_else(|| format!("invalid namespace '{s}'"))?;

        Ok(Namespace::Project(id))
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Resource {
    pub namespace: Namespace,
    pub kind: ResourceKind,
}

impl Resource {
    pub fn project(project_id: i64, kind: ResourceKind) -> Self {
        Namespace::Project(project_id).resource(kind)
    }

    pub fn system(kind: ResourceKind) -> Self {
        Namespace::System.resource(kind)
    }

    /// The resource path with its namespace prefix stripped, as returned by
    /// the relative permissions listing.
    pub fn relative(&self) -> &'static str {
        self.kind.as_str()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.kind == ResourceKind::SelfResource {
            write!(f, "{}", self.namespace)
        } else {
            write!(f, "{}/{}", self.namespace, self.kind)
        }
    }
}
