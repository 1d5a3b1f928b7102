//! Middleware layer.
//!
//! Middleware is the right place for cross-cutting concerns: authentication
//! header inspection, request-id injection, response decoration, metrics.
//! It has three optional hooks:
//!
//! | Hook | Runs | Sees |
//! |---|---|---|
//! | `before` | before the handler | `&mut Request` |
//! | `after` | after the handler | `&mut Response` |
//! | `terminate` | after the response is written | final request (if any) and response |
//!
//! Hooks cannot short-circuit dispatch. Middleware is attached to the
//! [`App`](crate::App), a [`Controller`](crate::Controller) or a single
//! [`Route`](crate::Route); for a matched route the order is
//!
//! ```text
//! before:    app … → route …        (controller-inherited route hooks first)
//! after:     route … → app …
//! terminate: route … → app …
//! ```
//!
//! Within one level hooks always run in registration order.
//!
//! Implement [`Middleware`] on a type, or build one from closures with
//! [`Hooks`]:
//!
//! ```rust
//! use plume::middleware::Hooks;
//!
//! let stamp = Hooks::new()
//!     .before(|req| req.set_header("x-seen", "1"))
//!     .after(|res| res.set_header("x-served-by", "plume"));
//! ```

mod access;

use std::fmt;
use std::sync::Arc;

use crate::request::Request;
use crate::response::Response;

pub use access::AccessLog;

/// A set of optional request/response hooks. Every hook defaults to a no-op.
pub trait Middleware: Send + Sync + 'static {
    fn before(&self, _req: &mut Request) {}

    fn after(&self, _res: &mut Response) {}

    /// `req` is `None` when the call ended before a [`Request`] was built
    /// (no matching route, unreadable or undecodable body).
    fn terminate(&self, _req: Option<&Request>, _res: &Response) {}
}

/// Shared middleware handle, as stored on apps, controllers and routes.
pub type BoxedMiddleware = Arc<dyn Middleware>;

type BeforeFn = dyn Fn(&mut Request) + Send + Sync + 'static;
type AfterFn = dyn Fn(&mut Response) + Send + Sync + 'static;
type TerminateFn = dyn Fn(Option<&Request>, &Response) + Send + Sync + 'static;

/// Closure-backed [`Middleware`]. Hooks left unset do nothing.
#[derive(Default)]
pub struct Hooks {
    before: Option<Box<BeforeFn>>,
    after: Option<Box<AfterFn>>,
    terminate: Option<Box<TerminateFn>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, f: impl Fn(&mut Request) + Send + Sync + 'static) -> Self {
        self.before = Some(Box::new(f));
        self
    }

    pub fn after(mut self, f: impl Fn(&mut Response) + Send + Sync + 'static) -> Self {
        self.after = Some(Box::new(f));
        self
    }

    pub fn terminate(
        mut self,
        f: impl Fn(Option<&Request>, &Response) + Send + Sync + 'static,
    ) -> Self {
        self.terminate = Some(Box::new(f));
        self
    }
}

impl Middleware for Hooks {
    fn before(&self, req: &mut Request) {
        if let Some(f) = &self.before {
            f(req);
        }
    }

    fn after(&self, res: &mut Response) {
        if let Some(f) = &self.after {
            f(res);
        }
    }

    fn terminate(&self, req: Option<&Request>, res: &Response) {
        if let Some(f) = &self.terminate {
            f(req, res);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("terminate", &self.terminate.is_some())
            .finish()
    }
}

// ── Chain runners ─────────────────────────────────────────────────────────────

pub(crate) fn run_before(levels: [&[BoxedMiddleware]; 2], req: &mut Request) {
    for mw in levels.into_iter().flatten() {
        mw.before(req);
    }
}

pub(crate) fn run_after(levels: [&[BoxedMiddleware]; 2], res: &mut Response) {
    for mw in levels.into_iter().flatten() {
        mw.after(res);
    }
}

pub(crate) fn run_terminate(chain: &[BoxedMiddleware], req: Option<&Request>, res: &Response) {
    for mw in chain {
        mw.terminate(req, res);
    }
}
