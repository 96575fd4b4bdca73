use futures_util::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction};

use crate::Result;

/// Runs `f` inside a database transaction.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`. The
/// closure receives the open transaction and must return a boxed future
/// borrowing it:
///
/// ```ignore
/// with_transaction(&pool, move |tx| {
///     Box::pin(async move {
///         sqlx::query("DELETE FROM outbox").execute(&mut **tx).await?;
///         Ok(())
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<T, F>(pool: &PgPool, f: F) -> Result<T>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut Transaction<'static, Postgres>) -> BoxFuture<'c, Result<T>> + Send,
{
    let mut tx = pool.begin().await?;

    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Transaction rollback failed");
            }
            Err(err)
        }
    }
}
