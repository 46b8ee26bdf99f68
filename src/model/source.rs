use crate::error::Error;
use crate::protocol;
use crate::session::SessionId;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Stable address of a source location.
///
/// Sources that exist only inside the debuggee (positive numeric reference,
/// no usable path) get a synthesized `debug:` address scoped by session id
/// and reference number, so sourceless frames of two sessions never collide
/// and content requests can be routed back to the owning session.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum SourceUri {
    File(PathBuf),
    Debug {
        path: String,
        session: SessionId,
        reference: i64,
    },
}

impl SourceUri {
    pub fn is_virtual(&self) -> bool {
        matches!(self, SourceUri::Debug { .. })
    }
}

impl Display for SourceUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceUri::File(path) => write!(f, "{}", path.display()),
            SourceUri::Debug {
                path,
                session,
                reference,
            } => write!(f, "debug:{path}?session={session}&ref={reference}"),
        }
    }
}

impl FromStr for SourceUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix("debug:") else {
            return Ok(SourceUri::File(PathBuf::from(s)));
        };
        let (path, query) = rest
            .split_once('?')
            .ok_or_else(|| Error::SourceAddress(s.to_string()))?;

        let mut session = None;
        let mut reference = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("session", v)) => {
                    session = Some(
                        v.parse::<SessionId>()
                            .map_err(|_| Error::SourceAddress(s.to_string()))?,
                    )
                }
                Some(("ref", v)) => {
                    reference = Some(
                        v.parse::<i64>()
                            .map_err(|_| Error::SourceAddress(s.to_string()))?,
                    )
                }
                _ => return Err(Error::SourceAddress(s.to_string())),
            }
        }
        match (session, reference) {
            (Some(session), Some(reference)) => Ok(SourceUri::Debug {
                path: path.to_string(),
                session,
                reference,
            }),
            _ => Err(Error::SourceAddress(s.to_string())),
        }
    }
}

/// A resolved source location of stack frames and breakpoints.
#[derive(Debug, Clone)]
pub struct Source {
    raw: protocol::Source,
    uri: SourceUri,
    /// False for frames the adapter reported without any source descriptor.
    available: bool,
}

impl Source {
    /// Resolve a raw adapter source descriptor for the given session.
    pub fn new(raw: Option<protocol::Source>, session: SessionId) -> Self {
        match raw {
            Some(raw) => {
                let path = raw
                    .path
                    .clone()
                    .or_else(|| raw.name.clone())
                    .unwrap_or_default();
                let uri = match raw.source_reference {
                    Some(reference) if reference > 0 => SourceUri::Debug {
                        path,
                        session,
                        reference,
                    },
                    _ => SourceUri::File(PathBuf::from(path)),
                };
                Self {
                    raw,
                    uri,
                    available: true,
                }
            }
            None => Self {
                raw: protocol::Source {
                    name: Some("Unknown Source".to_string()),
                    ..Default::default()
                },
                uri: SourceUri::File(PathBuf::from("Unknown Source")),
                available: false,
            },
        }
    }

    /// Build the raw descriptor for a source the user authored by path.
    pub fn raw_for_path(path: &Path) -> protocol::Source {
        protocol::Source {
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            path: Some(path.to_string_lossy().into_owned()),
            ..Default::default()
        }
    }

    pub fn uri(&self) -> &SourceUri {
        &self.uri
    }

    pub fn raw(&self) -> &protocol::Source {
        &self.raw
    }

    pub fn name(&self) -> Option<&str> {
        self.raw.name.as_deref()
    }

    pub fn origin(&self) -> Option<&str> {
        self.raw.origin.as_deref()
    }

    pub fn presentation_hint(&self) -> Option<&str> {
        self.raw.presentation_hint.as_deref()
    }

    pub fn reference(&self) -> Option<i64> {
        self.raw.source_reference
    }

    pub fn available(&self) -> bool {
        self.available
    }

    /// True for sources that live only inside the debuggee.
    pub fn in_memory(&self) -> bool {
        self.uri.is_virtual()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn referenced(name: &str, reference: i64) -> protocol::Source {
        protocol::Source {
            name: Some(name.to_string()),
            source_reference: Some(reference),
            ..Default::default()
        }
    }

    #[test]
    fn test_virtual_address_deterministic() {
        let session = SessionId::new();
        let a = Source::new(Some(referenced("eval.rs", 7)), session);
        let b = Source::new(Some(referenced("eval.rs", 7)), session);
        assert_eq!(a.uri().to_string(), b.uri().to_string());
        assert!(a.in_memory());
    }

    #[test]
    fn test_virtual_addresses_distinct() {
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        let same_ref_other_session = [
            Source::new(Some(referenced("eval.rs", 7)), s1),
            Source::new(Some(referenced("eval.rs", 7)), s2),
        ];
        assert_ne!(
            same_ref_other_session[0].uri().to_string(),
            same_ref_other_session[1].uri().to_string()
        );

        let other_ref_same_session = Source::new(Some(referenced("eval.rs", 8)), s1);
        assert_ne!(
            same_ref_other_session[0].uri().to_string(),
            other_ref_same_session.uri().to_string()
        );
    }

    #[test]
    fn test_virtual_address_roundtrip() {
        let session = SessionId::new();
        let source = Source::new(Some(referenced("eval.rs", 42)), session);
        let parsed: SourceUri = source.uri().to_string().parse().unwrap();
        assert_eq!(parsed, *source.uri());
        match parsed {
            SourceUri::Debug {
                session: s,
                reference,
                ..
            } => {
                assert_eq!(s, session);
                assert_eq!(reference, 42);
            }
            SourceUri::File(_) => panic!("expected a virtual address"),
        }
    }

    #[test]
    fn test_path_source_stays_a_file() {
        let raw = protocol::Source {
            path: Some("/work/src/main.rs".to_string()),
            ..Default::default()
        };
        let source = Source::new(Some(raw), SessionId::new());
        assert!(!source.in_memory());
        assert_eq!(source.uri().to_string(), "/work/src/main.rs");
    }

    #[test]
    fn test_missing_descriptor() {
        let source = Source::new(None, SessionId::new());
        assert!(!source.available());
        assert_eq!(source.name(), Some("Unknown Source"));
    }

    #[test]
    fn test_malformed_address_rejected() {
        assert!("debug:eval.rs".parse::<SourceUri>().is_err());
        assert!("debug:eval.rs?session=nope&ref=1".parse::<SourceUri>().is_err());
        assert!("debug:eval.rs?ref=1".parse::<SourceUri>().is_err());
    }
}
