use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    InvalidName(String),
    EndpointMismatch { found: String, expected: String },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidName(name) => write!(f, "Unable to parse image from string: {name}"),
            Error::EndpointMismatch { found, expected } => {
                write!(f, "Mismatched endpoint '{found}', expected '{expected}'")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub namespace: String,
    pub repository: String,
    pub tag: Option<String>,
}

/// Splits a scope name into the project it lives in and the rest.
pub trait ImageParser: Send + Sync {
    fn parse(&self, name: &str) -> Result<Image, Error>;
}

/// `namespace/repo[:tag]`.
#[derive(Debug, Default)]
pub struct BasicParser;

impl ImageParser for BasicParser {
    fn parse(&self, name: &str) -> Result<Image, Error> {
        let Some((namespace, rest)) = name.split_once('/') else {
            return Err(Error::InvalidName(name.to_string()));
        };

        let (repository, tag) = match rest.split_once(':') {
            Some((repository, tag)) => (repository, Some(tag.to_string())),
            None => (rest, None),
        };

        Ok(Image {
            namespace: namespace.to_string(),
            repository: repository.to_string(),
            tag,
        })
    }
}

/// `<endpoint>/namespace/repo[:tag]`, used for fully qualified notary names.
#[derive(Debug)]
pub struct EndpointPrefixedParser {
    endpoint: String,
}

impl EndpointPrefixedParser {
    /// `ext_endpoint` is the external URL; its scheme is ignored.
    pub fn new(ext_endpoint: &str) -> Self {
        let endpoint = ext_endpoint
            .split_once("://")
            .map_or(ext_endpoint, |(_, host)| host)
            .trim_end_matches('/');

        Self {
            endpoint: endpoint.to_string(),
        }
    }
}

impl ImageParser for EndpointPrefixedParser {
    fn parse(&self, name: &str) -> Result<Image, Error> {
        let Some((endpoint, rest)) = name.split_once('/') else {
            return Err(Error::InvalidName(name.to_string()));
        };
        if endpoint != self.endpoint {
            return Err(Error::EndpointMismatch {
                found: endpoint.to_string(),
                expected: self.endpoint.clone(),
            });
        }

        BasicParser.parse(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_parser() {
        let image = BasicParser.parse("library/ubuntu:22.04").unwrap();
        assert_eq!(image.namespace, "library");
        assert_eq!(image.repository, "ubuntu");
        assert_eq!(image.tag.as_deref(), Some("22.04"));

        let image = BasicParser.parse("library/team/app").unwrap();
        assert_eq!(image.namespace, "library");
        assert_eq!(image.repository, "team/app");
        assert_eq!(image.tag, None);
    }

    #[test]
    fn test_basic_parser_requires_namespace() {
        assert_eq!(
            BasicParser.parse("ubuntu"),
            Err(Error::InvalidName("ubuntu".to_string()))
        );
    }

    #[test]
    fn test_endpoint_parser() {
        let parser = EndpointPrefixedParser::new("https://harbor.example.com:8443");

        let image = parser
            .parse("harbor.example.com:8443/library/app:v1")
            .unwrap();
        assert_eq!(image.namespace, "library");
        assert_eq!(image.repository, "app");
        assert_eq!(image.tag.as_deref(), Some("v1"));

        let mismatch = parser.parse("other.example.com/library/app");
        assert!(matches!(mismatch, Err(Error::EndpointMismatch { .. })));

        assert!(parser.parse("harbor.example.com:8443/app").is_err());
        assert!(parser.parse("harbor.example.com:8443").is_err());
    }
}
