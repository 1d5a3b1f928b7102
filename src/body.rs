//! Response body that runs `terminate` middleware once it has been written.

use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::{Body, Frame, SizeHint};

use crate::middleware::{BoxedMiddleware, run_terminate};
use crate::request::Request;
use crate::response::Response;

/// The body of every response produced by [`App::dispatch`](crate::App::dispatch).
///
/// Holds the encoded bytes and, for requests that reached routing, the
/// terminate chain together with the final request and response. The chain
/// runs exactly once: when the transport polls the body to its end, or when
/// the body is dropped without being drained.
pub struct DispatchBody {
    inner: Full<Bytes>,
    terminate: Option<Termination>,
}

struct Termination {
    chain: Vec<BoxedMiddleware>,
    request: Option<Request>,
    response: Response,
}

impl DispatchBody {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self { inner: Full::new(bytes), terminate: None }
    }

    pub(crate) fn empty() -> Self {
        Self::new(Bytes::new())
    }

    /// Attaches the terminate chain. An empty chain attaches nothing.
    pub(crate) fn on_complete(
        mut self,
        chain: Vec<BoxedMiddleware>,
        request: Option<Request>,
        response: Response,
    ) -> Self {
        if !chain.is_empty() {
            self.terminate = Some(Termination { chain, request, response });
        }
        self
    }

    fn finish(&mut self) {
        if let Some(t) = self.terminate.take() {
            run_terminate(&t.chain, t.request.as_ref(), &t.response);
        }
    }
}

impl Body for DispatchBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let frame = Pin::new(&mut this.inner).poll_frame(cx);
        if let Poll::Ready(None) = frame {
            this.finish();
        }
        frame
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for DispatchBody {
    fn drop(&mut self) {
        self.finish();
    }
}

impl fmt::Debug for DispatchBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchBody")
            .field("size", &self.inner.size_hint().exact())
            .field("terminate", &self.terminate.as_ref().map(|t| t.chain.len()))
            .finish()
    }
}
