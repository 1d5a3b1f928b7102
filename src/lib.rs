//! # plume
//!
//! The request-dispatch core of an embeddable HTTP service: ordered routing,
//! tiered rate limiting, middleware hooks and body negotiation.
//!
//! ## What happens to a request
//!
//! 1. **Rate limits**: a global bucket, then a per-client bucket
//!    ([`limit`]). Over the limit is a bare `429`.
//! 2. **Routing**: routes are tried in registration order; the first whose
//!    pattern and method both match wins ([`Router`]). No match is a bare `404`.
//! 3. **Route limit**: a per-client bucket owned by the route.
//! 4. **Decoding**: the body becomes a [`serde_json::Value`] through the route,
//!    app or built-in JSON [`Serializer`] ([`negotiate`]).
//! 5. **Middleware and handler**: `before` hooks, the handler, `after` hooks
//!    ([`middleware`]).
//! 6. **Encoding** with a fallback ladder that always produces a response,
//!    then **terminate** hooks once the response is written.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use plume::{App, Request, Response, Router, Server, limit, RateLimit};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), plume::Error> {
//!     let router = Router::new()
//!         .get("/users/{id}", get_user)
//!         .post("/users",     create_user);
//!
//!     let app = App::new(router)
//!         .client_limit(RateLimit::per_second(10.0, 20))
//!         .client_identifier(limit::remote_ip);
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::ok(json!({"id": id}))
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     match req.data("name").as_str() {
//!         Some(name) => Response::new(StatusCode::CREATED, json!({"name": name}))
//!             .header("location", "/users/99"),
//!         None => Response::new(StatusCode::BAD_REQUEST, json!({"error": "name is required"})),
//!     }
//! }
//! ```

mod app;
mod body;
mod controller;
mod error;
mod handler;
mod request;
mod response;
mod route;
mod router;
mod serializer;
mod server;

pub mod limit;
pub mod middleware;
pub mod negotiate;

pub use app::App;
pub use body::DispatchBody;
pub use controller::Controller;
pub use error::{Error, Rejection, SerializeError};
pub use handler::Handler;
pub use limit::{LimitsConfig, RateLimit, TokenBucket};
pub use request::Request;
pub use response::{IntoResponse, Response};
pub use route::Route;
pub use router::{Params, Router};
pub use serializer::Serializer;
pub use server::Server;
