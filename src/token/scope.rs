use serde::{Deserialize, Serialize};

/// A parsed `type:name:actions` scope, as carried in the `access` claim.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ResourceActions {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub actions: Vec<String>,
}

impl ResourceActions {
    pub fn parse(scope: &str) -> Self {
        let segments: Vec<&str> = scope.split(':').collect();

        match segments.as_slice() {
            [kind] => Self {
                kind: kind.to_string(),
                ..Self::default()
            },
            [kind, name] => Self {
                kind: kind.to_string(),
                name: name.to_string(),
                actions: Vec::new(),
            },
            [kind, name @ .., actions] => Self {
                kind: kind.to_string(),
                name: name.join(":"),
                actions: actions
                    .split(',')
                    .filter(|action| !action.is_empty())
                    .map(str::to_string)
                    .collect(),
            },
            [] => Self::default(),
        }
    }
}

/// Parses every `scope` query value; one value may hold several
/// whitespace-separated scopes.
pub fn parse_scopes<S: AsRef<str>>(scopes: &[S]) -> Vec<ResourceActions> {
    scopes
        .iter()
        .flat_map(|value| value.as_ref().split_whitespace())
        .map(ResourceActions::parse)
        .collect()
}
