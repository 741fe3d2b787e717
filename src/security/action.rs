use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Action {
    Push,
    Pull,
    Delete,
    ScannerPull,
    Create,
    Read,
    Update,
    List,
    Stop,
    Operate,
    All,
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::Push,
        Action::Pull,
        Action::Delete,
        Action::ScannerPull,
        Action::Create,
        Action::Read,
        Action::Update,
        Action::List,
        Action::Stop,
        Action::Operate,
        Action::All,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Push => "push",
            Action::Pull => "pull",
            Action::Delete => "delete",
            Action::ScannerPull => "scanner-pull",
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::List => "list",
            Action::Stop => "stop",
            Action::Operate => "operate",
            Action::All => "*",
        }
    }

    /// Whether a granted action covers the requested one.
    pub fn covers(self, requested: Action) -> bool {
        self == Action::All || self == requested
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}
