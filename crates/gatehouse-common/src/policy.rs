//! Route exposure policy.
//!
//! An ordered list of `pattern → access` rules. The first rule whose pattern
//! matches the request path decides; paths no rule matches require
//! authentication.
//!
//! Patterns are matched segment by segment:
//!
//! | pattern segment | matches |
//! |---|---|
//! | `**` | zero or more segments (only allowed last) |
//! | `*`  | exactly one segment |
//! | anything else | that literal segment |
//!
//! So `/public/**` matches `/public` and `/public/css/site.css` but not
//! `/publicity`, and `/` matches only the root.

use serde::{Deserialize, Serialize};

use crate::config::RouteRuleConfig;

/// Whether a route may be reached without credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Authenticated,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    One,
    Rest,
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PolicyError> {
        let invalid = |reason| PolicyError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason,
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let segments: Vec<Segment> = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "**" => Segment::Rest,
                "*" => Segment::One,
                literal => Segment::Literal(literal.to_owned()),
            })
            .collect();

        if let Some(pos) = segments.iter().position(|s| *s == Segment::Rest) {
            if pos + 1 != segments.len() {
                return Err(invalid("'**' may only appear as the last segment"));
            }
        }
        if segments
            .iter()
            .any(|s| matches!(s, Segment::Literal(l) if l == "." || l == ".."))
        {
            return Err(invalid("relative segments are not allowed"));
        }

        Ok(Self {
            raw: pattern.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matches_segments(&normalize(path))
    }

    fn matches_segments(&self, path: &[&str]) -> bool {
        let mut remaining = path;
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::One => match remaining.split_first() {
                    Some((_, rest)) => remaining = rest,
                    None => return false,
                },
                Segment::Literal(literal) => match remaining.split_first() {
                    Some((head, rest)) if head == literal => remaining = rest,
                    _ => return false,
                },
            }
        }
        remaining.is_empty()
    }
}

/// Split a request path into segments, resolving `.` and `..` so a request
/// cannot walk from a public prefix into a protected one.
fn normalize(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub pattern: PathPattern,
    pub access: Access,
}

/// First-match-wins route policy. Unmatched paths are [`Access::Authenticated`].
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    rules: Vec<RouteRule>,
}

impl RoutePolicy {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(rules: &[RouteRuleConfig]) -> Result<Self, PolicyError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Ok(RouteRule {
                    pattern: PathPattern::parse(&rule.pattern)?,
                    access: rule.access,
                })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn evaluate(&self, path: &str) -> Access {
        let segments = normalize(path);
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches_segments(&segments))
            .map(|rule| rule.access)
            .unwrap_or(Access::Authenticated)
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::from_config(&crate::config::default_route_rules())
            .unwrap_or_else(|_| Self::new(Vec::new()))
    }
}
