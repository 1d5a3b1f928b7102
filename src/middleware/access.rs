//! Access logging.

use tracing::info;

use super::Middleware;
use crate::request::Request;
use crate::response::Response;

/// Emits one `info` event per completed request on the `plume::access` target.
///
/// Attach it at app level so it sees every request, including unmatched ones:
///
/// ```rust,no_run
/// # use plume::{App, Router, middleware::AccessLog};
/// let app = App::new(Router::new()).middleware(AccessLog);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessLog;

impl Middleware for AccessLog {
    fn terminate(&self, req: Option<&Request>, res: &Response) {
        let status = res.status_code().as_u16();
        match req {
            Some(req) => info!(
                target: "plume::access",
                method = %req.method(),
                path = req.path(),
                route = req.route().map(|r| r.pattern()).unwrap_or("-"),
                status,
                latency_ms = req.received_at().elapsed().as_secs_f64() * 1000.0,
                "access"
            ),
            None => info!(target: "plume::access", status, "access"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use http::StatusCode;
    use serde_json::json;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    fn capture(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        String::from_utf8(captured.0.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn logs_matched_requests() {
        let (parts, ()) = http::Request::post("/users/7").body(()).unwrap().into_parts();
        let path = parts.uri.path().to_owned();
        let req = Request::new(Arc::new(parts), path, None, HashMap::new(), json!({}), Instant::now());
        let res = Response::status(StatusCode::CREATED);

        let logs = capture(|| AccessLog.terminate(Some(&req), &res));
        assert!(logs.contains("plume::access"), "{logs}");
        assert!(logs.contains("method=POST"), "{logs}");
        assert!(logs.contains("path=\"/users/7\"") || logs.contains("path=/users/7"), "{logs}");
        assert!(logs.contains("status=201"), "{logs}");
    }

    #[test]
    fn logs_requests_without_a_route() {
        let res = Response::status(StatusCode::NOT_FOUND);
        let logs = capture(|| AccessLog.terminate(None, &res));
        assert!(logs.contains("status=404"), "{logs}");
        assert!(!logs.contains("method="), "{logs}");
    }
}
