//! Ordered route table.
//!
//! Routes are scanned in registration order and the first whose pattern
//! matches the path *and* whose method equals the request method wins. A
//! pattern match with another method does not stop the scan. Duplicates are
//! legal; the earlier one shadows the later.
//!
//! Register specific patterns before general ones:
//!
//! ```rust
//! # use plume::{Request, Response, Router};
//! # async fn me(_: Request) -> Response { Response::status(http::StatusCode::OK) }
//! # async fn user(_: Request) -> Response { Response::status(http::StatusCode::OK) }
//! Router::new()
//!     .get("/users/me",   me)     // must come first
//!     .get("/users/{id}", user);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use crate::controller::Controller;
use crate::handler::Handler;
use crate::route::Route;

/// Path parameters extracted by a match, by placeholder name.
pub type Params = HashMap<String, String>;

/// The application route table.
///
/// Build it once at startup and hand it to [`App::new`](crate::App::new).
/// Every registration method returns `self` so calls chain naturally.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Arc<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for a method + pattern pair.
    ///
    /// # Panics
    ///
    /// Panics if the pattern is invalid; see [`Route::new`].
    pub fn on(self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.route(Route::new(method, pattern, handler))
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, pattern, handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, pattern, handler)
    }

    /// Register a fully configured [`Route`].
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(Arc::new(route));
        self
    }

    /// Register every route of `controller`, in its order, with its
    /// middleware applied.
    pub fn controller(self, controller: Controller) -> Self {
        controller.into_routes().into_iter().fold(self, Self::route)
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize { self.routes.len() }
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }

    /// First route matching `method` and `path`, with its parameters.
    pub fn match_route(&self, method: &str, path: &str) -> Option<(Arc<Route>, Params)> {
        self.routes.iter().find_map(|route| {
            let params = route.params(path)?;
            (route.method().as_str() == method).then(|| (Arc::clone(route), params))
        })
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::{Request, Response};

    async fn first(_: Request) -> Response { Response::status(StatusCode::OK) }
    async fn second(_: Request) -> Response { Response::status(StatusCode::ACCEPTED) }

    #[test]
    fn first_match_wins() {
        let router = Router::new()
            .get("/items/{id}", first)
            .get("/items/{name}", second);
        let (route, params) = router.match_route("GET", "/items/7").unwrap();
        assert_eq!(route.pattern(), "/items/{id}");
        assert_eq!(params["id"], "7");
    }

    #[test]
    fn general_catch_all_shadows_later_routes() {
        let router = Router::new()
            .get("/{*rest}", first)
            .get("/users/{id}", second);
        let (route, params) = router.match_route("GET", "/users/1").unwrap();
        assert_eq!(route.pattern(), "/{*rest}");
        assert_eq!(params["rest"], "users/1");
    }

    #[test]
    fn method_mismatch_continues_the_scan() {
        let router = Router::new()
            .post("/users/{id}", first)
            .get("/users/{uid}", second);
        let (route, params) = router.match_route("GET", "/users/9").unwrap();
        assert_eq!(route.method(), Method::GET);
        assert_eq!(params["uid"], "9");
    }

    #[test]
    fn method_is_exact() {
        let router = Router::new().get("/", first);
        assert!(router.match_route("get", "/").is_none());
        assert!(router.match_route("HEAD", "/").is_none());
    }

    #[test]
    fn no_match() {
        assert!(Router::new().match_route("GET", "/").is_none());
        let router = Router::new().get("/users/{id}", first);
        assert!(router.match_route("GET", "/users").is_none());
        assert!(router.match_route("GET", "/users/42/edit").is_none());
        assert!(router.match_route("DELETE", "/users/42").is_none());
    }

    #[test]
    fn registration_order_is_kept() {
        let router = Router::new()
            .get("/a", first)
            .post("/b", first)
            .route(Route::new(Method::PUT, "/c", second));
        let patterns: Vec<_> = router.routes().iter().map(|r| r.pattern()).collect();
        assert_eq!(patterns, ["/a", "/b", "/c"]);
        assert_eq!(router.len(), 3);
    }
}
