use std::net::TcpListener;

use actix_web::dev::{Server, Service};
use actix_web::{web, App, HttpServer};
use sqlx::SqlitePool;
use tracing_actix_web::TracingLogger;

pub mod auth;
pub mod config;
pub mod core;
pub mod models;
pub mod posts;
pub mod static_server;
pub mod telemetry;
pub mod templates;

/// Registers every route of the application.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(auth::scope())
        .route(
            "/static/{filename:.*}",
            web::get().to(static_server::serve_static),
        )
        .configure(posts::configure);
}

/// Builds the HTTP server on an already bound listener. The returned
/// [`Server`] does nothing until it is awaited or spawned.
pub fn run(listener: TcpListener, pool: SqlitePool) -> std::io::Result<Server> {
    let pool = web::Data::new(pool);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .wrap_fn(|req, srv| {
                let fut = srv.call(req);
                async move {
                    let res = fut.await?;
                    crate::core::db::release(res.request());
                    Ok(res)
                }
            })
            .wrap(TracingLogger::default())
            .configure(configure)
    })
    .listen(listener)?
    .run();

    Ok(server)
}
