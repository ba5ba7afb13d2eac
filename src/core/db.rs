use std::str::FromStr;
use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{ready, Ready};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::config::MAX_DB_CONNECTIONS;
use crate::core::errors::{BlogError, StorageError};

const SCHEMA: &str = include_str!("../schema.sql");

pub async fn connect(url: &str) -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_DB_CONNECTIONS)
        .connect_with(options)
        .await?;

    tracing::debug!(url, "connected to database");
    Ok(pool)
}

/// Drops every table and recreates the schema. All data is lost.
pub async fn init_db(pool: &SqlitePool) -> Result<(), StorageError> {
    pool.execute(SCHEMA).await?;
    tracing::info!("database schema initialized");
    Ok(())
}

/// The database handle of a single request.
///
/// The first extraction in a request caches the handle in the request
/// extensions, so every extractor and the handler itself share one
/// connection. The connection is checked out of the pool lazily on the first
/// [`Db::get`] and goes back when the request is torn down (see [`release`]).
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
    conn: Arc<Mutex<Option<PoolConnection<Sqlite>>>>,
}

impl Db {
    pub fn new(pool: SqlitePool) -> Self {
        Db {
            pool,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    pub fn for_request(req: &HttpRequest) -> Result<Self, StorageError> {
        if let Some(db) = req.extensions().get::<Db>() {
            return Ok(db.clone());
        }

        let pool = req
            .app_data::<web::Data<SqlitePool>>()
            .ok_or(StorageError::PoolMissing)?;
        let db = Db::new(pool.get_ref().clone());
        req.extensions_mut().insert(db.clone());
        Ok(db)
    }

    /// Returns this request's connection, acquiring it on first use.
    ///
    /// The guard must be dropped before calling `get` again.
    pub async fn get(&self) -> Result<MappedMutexGuard<'_, SqliteConnection>, StorageError> {
        let mut slot = self.conn.lock().await;
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.pool.acquire().await?,
        };

        Ok(MutexGuard::map(slot, |slot| &mut **slot.insert(conn)))
    }
}

impl FromRequest for Db {
    type Error = BlogError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Db::for_request(req).map_err(BlogError::from))
    }
}

/// Detaches the request's handle so its connection returns to the pool as
/// soon as the handler's copies are gone.
pub fn release(req: &HttpRequest) {
    if req.extensions_mut().remove::<Db>().is_some() {
        tracing::trace!("released request connection");
    }
}
