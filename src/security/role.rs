use std::fmt;

use serde::{Deserialize, Serialize};

use crate::security::action::Action;
use crate::security::resource::ResourceKind;

use crate::security::action::Action::{
    Create, Delete, List, Operate, Pull, Push, Read, Stop, Update,
};
use crate::security::resource::ResourceKind::{
    Accessory, Artifact, ArtifactAddition, ArtifactLabel, Configuration, HelmChart,
    HelmChartVersion, HelmChartVersionLabel, ImmutableTag, Label, Log, Member, Metadata,
    NotificationPolicy, PreheatPolicy, Quota, Repository, Robot, Scan, Scanner, SelfResource, Tag,
    TagRetention,
};

type Bundle = &'static [(ResourceKind, Action)];

static PROJECT_ADMIN: Bundle = &[
    (SelfResource, Read),
    (SelfResource, Update),
    (SelfResource, Delete),
    (Member, Create),
    (Member, Read),
    (Member, Update),
    (Member, Delete),
    (Member, List),
    (Metadata, Create),
    (Metadata, Read),
    (Metadata, Update),
    (Metadata, Delete),
    (Log, List),
    (Label, Create),
    (Label, Read),
    (Label, Update),
    (Label, Delete),
    (Label, List),
    (Quota, Read),
    (Repository, Create),
    (Repository, Read),
    (Repository, Update),
    (Repository, Delete),
    (Repository, List),
    (Repository, Pull),
    (Repository, Push),
    (TagRetention, Create),
    (TagRetention, Read),
    (TagRetention, Update),
    (TagRetention, Delete),
    (TagRetention, List),
    (TagRetention, Operate),
    (ImmutableTag, Create),
    (ImmutableTag, Update),
    (ImmutableTag, Delete),
    (ImmutableTag, List),
    (HelmChart, Create),
    (HelmChart, Read),
    (HelmChart, Delete),
    (HelmChart, List),
    (HelmChartVersion, Create),
    (HelmChartVersion, Read),
    (HelmChartVersion, Delete),
    (HelmChartVersion, List),
    (HelmChartVersionLabel, Create),
    (HelmChartVersionLabel, Delete),
    (Configuration, Read),
    (Configuration, Update),
    (Robot, Create),
    (Robot, Read),
    (Robot, Update),
    (Robot, Delete),
    (Robot, List),
    (NotificationPolicy, Create),
    (NotificationPolicy, Update),
    (NotificationPolicy, Delete),
    (NotificationPolicy, List),
    (NotificationPolicy, Read),
    (Scan, Create),
    (Scan, Read),
    (Scan, Stop),
    (Scanner, Read),
    (Scanner, Create),
    (Artifact, Create),
    (Artifact, Read),
    (Artifact, Delete),
    (Artifact, List),
    (ArtifactAddition, Read),
    (Tag, List),
    (Tag, Create),
    (Tag, Delete),
    (Accessory, List),
    (ArtifactLabel, Create),
    (ArtifactLabel, Delete),
    (PreheatPolicy, Create),
    (PreheatPolicy, Read),
    (PreheatPolicy, Update),
    (PreheatPolicy, Delete),
    (PreheatPolicy, List),
];

static MAINTAINER: Bundle = &[
    (SelfResource, Read),
    (Member, Read),
    (Member, List),
    (Metadata, Create),
    (Metadata, Read),
    (Metadata, Update),
    (Metadata, Delete),
    (Log, List),
    (Quota, Read),
    (Label, Create),
    (Label, Read),
    (Label, Update),
    (Label, Delete),
    (Label, List),
    (Repository, Create),
    (Repository, Read),
    (Repository, Update),
    (Repository, Delete),
    (Repository, List),
    (Repository, Push),
    (Repository, Pull),
    (TagRetention, Create),
    (TagRetention, Read),
    (TagRetention, Update),
    (TagRetention, Delete),
    (TagRetention, List),
    (TagRetention, Operate),
    (Accessory, List),
    (ImmutableTag, Create),
    (ImmutableTag, Update),
    (ImmutableTag, Delete),
    (ImmutableTag, List),
    (HelmChart, Create),
    (HelmChart, Read),
    (HelmChart, Delete),
    (HelmChart, List),
    (HelmChartVersion, Create),
    (HelmChartVersion, Read),
    (HelmChartVersion, Delete),
    (HelmChartVersion, List),
    (HelmChartVersionLabel, Create),
    (HelmChartVersionLabel, Delete),
    (Configuration, Read),
    (Robot, Read),
    (Robot, List),
    (NotificationPolicy, List),
    (Scan, Create),
    (Scan, Read),
    (Scan, Stop),
    (Scanner, Read),
    (Artifact, Create),
    (Artifact, Read),
    (Artifact, Delete),
    (Artifact, List),
    (ArtifactAddition, Read),
    (Tag, List),
    (Tag, Create),
    (Tag, Delete),
    (ArtifactLabel, Create),
    (ArtifactLabel, Delete),
];

static DEVELOPER: Bundle = &[
    (SelfResource, Read),
    (Member, Read),
    (Member, List),
    (Log, List),
    (Label, Read),
    (Label, List),
    (Quota, Read),
    (Repository, Create),
    (Repository, Read),
    (Repository, Update),
    (Repository, List),
    (Repository, Push),
    (Repository, Pull),
    (HelmChart, Create),
    (HelmChart, Read),
    (HelmChart, List),
    (HelmChartVersion, Create),
    (HelmChartVersion, Read),
    (HelmChartVersion, List),
    (HelmChartVersionLabel, Create),
    (HelmChartVersionLabel, Delete),
    (Configuration, Read),
    (Robot, Read),
    (Robot, List),
    (Scan, Read),
    (Scanner, Read),
    (Artifact, Create),
    (Artifact, Read),
    (Artifact, List),
    (ArtifactAddition, Read),
    (Tag, List),
    (Tag, Create),
    (Accessory, List),
    (ArtifactLabel, Create),
    (ArtifactLabel, Delete),
];

static GUEST: Bundle = &[
    (SelfResource, Read),
    (Member, Read),
    (Member, List),
    (Log, List),
    (Label, Read),
    (Label, List),
    (Quota, Read),
    (Repository, Read),
    (Repository, List),
    (Repository, Pull),
    (HelmChart, Read),
    (HelmChart, List),
    (HelmChartVersion, Read),
    (HelmChartVersion, List),
    (Configuration, Read),
    (Robot, Read),
    (Robot, List),
    (Scan, Read),
    (Scanner, Read),
    (Tag, List),
    (Accessory, List),
    (Artifact, Read),
    (Artifact, List),
    (ArtifactAddition, Read),
];

static LIMITED_GUEST: Bundle = &[
    (SelfResource, Read),
    (Quota, Read),
    (Repository, List),
    (Repository, Pull),
    (HelmChart, Read),
    (HelmChart, List),
    (HelmChartVersion, Read),
    (HelmChartVersion, List),
    (Configuration, Read),
    (Scan, Read),
    (Scanner, Read),
    (Tag, List),
    (Accessory, List),
    (Artifact, Read),
    (Artifact, List),
    (ArtifactAddition, Read),
];

/// Project-scoped roles. Discriminants match the role ids of the member table.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    ProjectAdmin,
    Developer,
    Guest,
    Maintainer,
    LimitedGuest,
}

impl Role {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Role::ProjectAdmin),
            2 => Some(Role::Developer),
            3 => Some(Role::Guest),
            4 => Some(Role::Maintainer),
            5 => Some(Role::LimitedGuest),
            _ => None,
        }
    }

    pub fn id(self) -> i32 {
        match self {
            Role::ProjectAdmin => 1,
            Role::Developer => 2,
            Role::Guest => 3,
            Role::Maintainer => 4,
            Role::LimitedGuest => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::ProjectAdmin => "projectAdmin",
            Role::Developer => "developer",
            Role::Guest => "guest",
            Role::Maintainer => "maintainer",
            Role::LimitedGuest => "limitedGuest",
        }
    }

    pub fn policies(self) -> Bundle {
        match self {
            Role::ProjectAdmin => PROJECT_ADMIN,
            Role::Maintainer => MAINTAINER,
            Role::Developer => DEVELOPER,
            Role::Guest => GUEST,
            Role::LimitedGuest => LIMITED_GUEST,
        }
    }

    pub fn allows(self, kind: ResourceKind, action: Action) -> bool {
        self.policies()
            .iter()
            .any(|(granted_kind, granted_action)| *granted_kind == kind && *granted_action == action)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
