// rest/mod.rs — Public REST API server.
//
// Axum HTTP server, local bind by default. Endpoints:
//   GET    /api/health
//   POST   /api/auth/login
//   POST   /api/auth/logout
//   GET    /api/tasks                 (filtered, paginated; anonymous ok)
//   POST   /api/tasks
//   GET/PUT/PATCH/DELETE /api/tasks/{id}
//   POST   /api/tasks/{id}/assign
//   DELETE /api/tasks/{id}/unassign
//   GET    /api/task-assignments[/{id}]
//   GET/POST /api/users
//   GET/PUT/PATCH/DELETE /api/users/{id}

pub mod auth;
pub mod error;
pub mod pagination;
pub mod routes;

use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.server.bind, ctx.config.server.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/health", get(routes::health::health))
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        // Tasks
        .route(
            "/api/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/api/tasks/{id}",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .patch(routes::tasks::patch_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/api/tasks/{id}/assign", post(routes::tasks::assign))
        .route("/api/tasks/{id}/unassign", delete(routes::tasks::unassign))
        // Assignments (read-only)
        .route(
            "/api/task-assignments",
            get(routes::assignments::list_assignments),
        )
        .route(
            "/api/task-assignments/{id}",
            get(routes::assignments::get_assignment),
        )
        // Users
        .route(
            "/api/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/api/users/{id}",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .patch(routes::users::patch_user)
                .delete(routes::users::delete_user),
        )
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
