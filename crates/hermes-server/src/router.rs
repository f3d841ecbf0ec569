//! Route registry.
//!
//! Routes are declared once at startup: a method, a path pattern and an
//! arbitrary value (the gateway stores the route's pipeline and handler
//! there). Patterns may contain `{name}` segments; their values are returned
//! as path parameters.
//!
//! # Example
//!
//! ```rust
//! use hermes_server::Router;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.add_route(Method::POST, "/messages/text", "sendText");
//! router.add_route(Method::GET, "/templates/{templateId}", "viewTemplate");
//!
//! let found = router.match_route(&Method::GET, "/templates/42").unwrap();
//! assert_eq!(*found.value(), "viewTemplate");
//! assert_eq!(found.param("templateId"), Some("42"));
//!
//! assert!(router.match_route(&Method::GET, "/messages/text").is_none());
//! ```

use std::collections::BTreeMap;

use http::Method;

/// A matched route.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
    value: &'a T,
    pattern: &'a str,
    params: BTreeMap<String, String>,
}

impl<'a, T> RouteMatch<'a, T> {
    /// Returns the value registered for the route.
    #[must_use]
    pub const fn value(&self) -> &'a T {
        self.value
    }

    /// Returns the pattern the route was registered with.
    #[must_use]
    pub const fn pattern(&self) -> &'a str {
        self.pattern
    }

    /// Returns a single path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Consumes the match, returning the path parameters.
    #[must_use]
    pub fn into_params(self) -> BTreeMap<String, String> {
        self.params
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct Route<T> {
    method: Method,
    pattern: String,
    segments: Vec<PathSegment>,
    value: T,
}

impl<T> Route<T> {
    fn parse_segments(pattern: &str) -> Vec<PathSegment> {
        pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => PathSegment::Param(name.to_string()),
                None => PathSegment::Literal(s.to_string()),
            })
            .collect()
    }

    fn match_path(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let actual: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if actual.len() != self.segments.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (segment, value) in self.segments.iter().zip(actual) {
            match segment {
                PathSegment::Literal(expected) if expected == value => {}
                PathSegment::Literal(_) => return None,
                PathSegment::Param(name) => {
                    params.insert(name.clone(), value.to_string());
                }
            }
        }
        Some(params)
    }
}

/// Maps method and path to a registered value. First match wins.
#[derive(Debug, Clone)]
pub struct Router<T> {
    routes: Vec<Route<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T> Router<T> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route.
    pub fn add_route(&mut self, method: Method, pattern: impl AsRef<str>, value: T) {
        let pattern = pattern.as_ref();
        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            segments: Route::<T>::parse_segments(pattern),
            value,
        });
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Finds the route for a request.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route.match_path(path).map(|params| RouteMatch {
                    value: &route.value,
                    pattern: &route.pattern,
                    params,
                })
            })
    }

    /// Lists the declared routes as `(method, pattern)` pairs, in
    /// registration order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|r| (&r.method, r.pattern.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router<u8> {
        let mut router = Router::new();
        router.add_route(Method::POST, "/messages/text", 1);
        router.add_route(Method::GET, "/phoneNumbers/list", 2);
        router.add_route(Method::DELETE, "/templates/deleteByName", 3);
        router.add_route(Method::GET, "/templates/{templateId}", 4);
        router
    }

    #[test]
    fn test_exact_match() {
        let router = router();
        let found = router.match_route(&Method::POST, "/messages/text").unwrap();
        assert_eq!(*found.value(), 1);
        assert_eq!(found.pattern(), "/messages/text");
        assert!(found.into_params().is_empty());
    }

    #[test]
    fn test_method_must_match() {
        let router = router();
        assert!(router.match_route(&Method::GET, "/messages/text").is_none());
        assert!(router
            .match_route(&Method::DELETE, "/templates/deleteByName")
            .is_some());
    }

    #[test]
    fn test_trailing_slash_ignored() {
        let router = router();
        assert!(router.match_route(&Method::GET, "/phoneNumbers/list/").is_some());
    }

    #[test]
    fn test_param_extraction() {
        let router = router();
        let found = router.match_route(&Method::GET, "/templates/123").unwrap();
        assert_eq!(*found.value(), 4);
        assert_eq!(found.param("templateId"), Some("123"));
    }

    #[test]
    fn test_first_match_wins() {
        let mut router = Router::new();
        router.add_route(Method::GET, "/system/info", "literal");
        router.add_route(Method::GET, "/system/{name}", "param");
        let found = router.match_route(&Method::GET, "/system/info").unwrap();
        assert_eq!(*found.value(), "literal");
    }

    #[test]
    fn test_no_match() {
        let router = router();
        assert!(router.match_route(&Method::GET, "/").is_none());
        assert!(router.match_route(&Method::GET, "/unknown/route").is_none());
        assert!(router.match_route(&Method::POST, "/messages/text/extra").is_none());
    }

    #[test]
    fn test_routes_listing() {
        let router = router();
        assert_eq!(router.route_count(), 4);
        let listed: Vec<_> = router.routes().map(|(m, p)| format!("{m} {p}")).collect();
        assert_eq!(listed[0], "POST /messages/text");
        assert_eq!(listed[3], "GET /templates/{templateId}");
    }
}
