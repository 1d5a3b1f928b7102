//! Minimal plume example: JSON endpoints, a download, a redirect, limits and
//! access logging.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -i http://localhost:3000/old-users/42
//!   curl http://localhost:3000/export

use http::{Method, StatusCode};
use plume::middleware::{AccessLog, Hooks};
use plume::{App, Controller, RateLimit, Request, Response, Route, Router, Server, limit};
use serde_json::json;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let users = Controller::new()
        .route(Route::new(Method::GET, "/users/{id}", get_user))
        .route(
            Route::new(Method::POST, "/users", create_user)
                .limit(RateLimit::per_second(1.0, 5)),
        )
        .middleware(Hooks::new().after(|res| res.set_header("x-area", "users")));

    let router = Router::new()
        .controller(users)
        .get("/old-users/{id}", old_user)
        .get("/export", export);

    let app = App::new(router)
        .middleware(AccessLog)
        .client_limit(RateLimit::per_second(20.0, 40))
        .client_identifier(limit::remote_ip);

    let server = match Server::bind("0.0.0.0:3000") {
        Ok(server) => server,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = server.serve(app).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::ok(json!({"id": id, "name": "alice"}))
}

// POST /users  {"name": "..."}
async fn create_user(req: Request) -> Response {
    let Some(name) = req.data("name").as_str() else {
        return Response::new(StatusCode::BAD_REQUEST, json!({"error": "name is required"}));
    };
    Response::new(StatusCode::CREATED, json!({"id": "99", "name": name}))
        .header("location", "/users/99")
}

// GET /old-users/{id} → 301 to the new path
async fn old_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or_default();
    Response::redirect(StatusCode::MOVED_PERMANENTLY, format!("/users/{id}"))
}

// GET /export → CSV download
async fn export(_req: Request) -> Response {
    Response::ok(json!({"data": "id,name\n42,alice\n"})).download("users.csv")
}
