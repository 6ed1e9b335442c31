//! Path routing for the gateway's HTTP surface.
//!
//! Patterns are `/`-separated with `{name}` segments capturing one
//! non-empty path segment. Leading and trailing slashes are ignored.
//! Captured segments are percent-decoded; a segment that does not decode
//! to UTF-8 fails the match.

use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    HealthCheck,
    Harbor,
    ShipmentStatus,
    ShipmentEvents,
}

impl Endpoint {
    /// Stable name used in logs and metric tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::HealthCheck => "health_check",
            Endpoint::Harbor => "harbor",
            Endpoint::ShipmentStatus => "shipment_status",
            Endpoint::ShipmentEvents => "shipment_events",
        }
    }
}

#[derive(Debug)]
enum PathSegment {
    Static(String),
    Param(String),
}

#[derive(Debug)]
struct PathPattern {
    segments: Vec<PathSegment>,
}

impl PathPattern {
    fn parse(pattern: &str) -> Self {
        let segments = split(pattern)
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => PathSegment::Param(name.to_string()),
                None => PathSegment::Static(s.to_string()),
            })
            .collect();
        PathPattern { segments }
    }

    fn matches<'a>(&self, path: &'a str) -> Option<HashMap<String, Cow<'a, str>>> {
        let request_segments: Vec<&'a str> = split(path).collect();
        if request_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, actual) in self.segments.iter().zip(request_segments) {
            match segment {
                PathSegment::Static(expected) if expected == actual => {}
                PathSegment::Static(_) => return None,
                PathSegment::Param(_) if actual.is_empty() => return None,
                PathSegment::Param(name) => {
                    let decoded = percent_decode_str(actual).decode_utf8().ok()?;
                    params.insert(name.clone(), decoded);
                }
            }
        }
        Some(params)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.trim().trim_matches('/');
    trimmed.split('/').filter(move |_| !trimmed.is_empty())
}

#[derive(Debug, PartialEq)]
pub struct RouteMatch<'a> {
    pub endpoint: Endpoint,
    pub params: HashMap<String, Cow<'a, str>>,
}

#[derive(Debug)]
pub struct Routes {
    routes: Vec<(PathPattern, Endpoint)>,
}

impl Routes {
    pub fn new<'p>(routes: impl IntoIterator<Item = (&'p str, Endpoint)>) -> Self {
        Routes {
            routes: routes
                .into_iter()
                .map(|(pattern, endpoint)| (PathPattern::parse(pattern), endpoint))
                .collect(),
        }
    }

    /// First route matching `path`.
    pub fn resolve<'a>(&self, path: &'a str) -> Option<RouteMatch<'a>> {
        self.routes.iter().find_map(|(pattern, endpoint)| {
            pattern.matches(path).map(|params| RouteMatch {
                endpoint: *endpoint,
                params,
            })
        })
    }
}

impl Default for Routes {
    fn default() -> Self {
        Routes::new([
            ("/_hc", Endpoint::HealthCheck),
            ("/harbor/{barge}/{shipment}/{environment}", Endpoint::Harbor),
            (
                "/shipment/status/{barge}/{shipment}/{environment}",
                Endpoint::ShipmentStatus,
            ),
            (
                "/shipment/events/{barge}/{shipment}/{environment}",
                Endpoint::ShipmentEvents,
            ),
        ])
    }
}
