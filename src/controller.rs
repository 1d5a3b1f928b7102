//! Route grouping.

use std::sync::Arc;

use crate::middleware::{BoxedMiddleware, Middleware};
use crate::route::Route;

/// Groups related routes and middleware that applies to some or all of them.
///
/// Controller middleware runs before each route's own middleware, in the
/// order it was added to the controller.
///
/// ```rust
/// # use plume::{Controller, Route, Router, Request, Response, middleware::Hooks};
/// # use http::Method;
/// # async fn list(_: Request) -> Response { Response::status(http::StatusCode::OK) }
/// # async fn purge(_: Request) -> Response { Response::status(http::StatusCode::OK) }
/// let users = Controller::new()
///     .route(Route::new(Method::GET, "/users", list))
///     .route(Route::new(Method::DELETE, "/users", purge))
///     .middleware(Hooks::new().before(|req| req.set_header("x-area", "users")))
///     .middleware_for(&["/users"], Hooks::new());
///
/// let router = Router::new().controller(users);
/// ```
#[derive(Default)]
pub struct Controller {
    routes: Vec<Route>,
    middleware: Vec<(Scope, BoxedMiddleware)>,
}

enum Scope {
    All,
    Patterns(Vec<String>),
}

impl Scope {
    fn covers(&self, pattern: &str) -> bool {
        match self {
            Self::All => true,
            Self::Patterns(patterns) => patterns.iter().any(|p| p == pattern),
        }
    }
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Middleware for every route in this controller.
    pub fn middleware(mut self, mw: impl Middleware) -> Self {
        self.middleware.push((Scope::All, Arc::new(mw)));
        self
    }

    /// Middleware for the routes whose pattern is one of `patterns`.
    pub fn middleware_for(mut self, patterns: &[&str], mw: impl Middleware) -> Self {
        let patterns = patterns.iter().map(|p| (*p).to_owned()).collect();
        self.middleware.push((Scope::Patterns(patterns), Arc::new(mw)));
        self
    }

    /// Consumes the controller, returning its routes with the controller's
    /// middleware placed ahead of each route's own.
    pub fn into_routes(self) -> Vec<Route> {
        let Self { routes, middleware } = self;
        routes
            .into_iter()
            .map(|mut route| {
                let inherited: Vec<BoxedMiddleware> = middleware
                    .iter()
                    .filter(|(scope, _)| scope.covers(route.pattern()))
                    .map(|(_, mw)| Arc::clone(mw))
                    .collect();
                route.prepend_middleware(&inherited);
                route
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::{Method, StatusCode};

    use super::*;
    use crate::middleware::{Hooks, run_before};
    use crate::{Request, Response, request::empty_body};

    async fn ok(_: Request) -> Response { Response::status(StatusCode::OK) }

    fn tag(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Hooks {
        let log = Arc::clone(log);
        Hooks::new().before(move |_| log.lock().unwrap().push(name))
    }

    #[test]
    fn controller_middleware_precedes_route_middleware() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let routes = Controller::new()
            .route(Route::new(Method::GET, "/a", ok).middleware(tag(&log, "route-a")))
            .route(Route::new(Method::GET, "/b", ok))
            .middleware(tag(&log, "all-1"))
            .middleware_for(&["/a"], tag(&log, "only-a"))
            .middleware(tag(&log, "all-2"))
            .into_routes();

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].middleware.len(), 4);
        assert_eq!(routes[1].middleware.len(), 2);

        let (parts, ()) = http::Request::new(()).into_parts();
        let mut req = Request::new(
            Arc::new(parts),
            "/".to_owned(),
            None,
            Default::default(),
            empty_body(),
            std::time::Instant::now(),
        );
        run_before([&[], &routes[0].middleware], &mut req);
        assert_eq!(*log.lock().unwrap(), ["all-1", "only-a", "all-2", "route-a"]);
    }
}
