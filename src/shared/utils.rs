use crate::shared::error::ServiceError;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn database_url() -> String {
    std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://perfomix:@localhost:5432/perfomix".to_string())
}

pub fn create_conn() -> Result<DbPool, r2d2::Error> {
    let manager = ConnectionManager::<PgConnection>::new(database_url());
    Pool::builder().max_size(10).build(manager)
}

/// Run pooled diesel work on the blocking thread pool. Handlers stay async
/// while every query (and any transaction) executes off the runtime threads.
pub async fn blocking<T, F>(pool: &DbPool, f: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, ServiceError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("blocking task failed: {e}")))?
}
