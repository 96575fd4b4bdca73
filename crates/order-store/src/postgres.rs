use async_trait::async_trait;
use common::{OrderId, OutboxId, ProductId, UserId};
use domain::{
    Money, Order, OrderItem, OrderStatus, OutboxDisposition, OutboxEntry, OutboxStatus,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OutboxQuery, Result, StoreError,
    store::{OrderStore, OutboxStats, OutboxStore},
    with_transaction,
};

const ORDER_COLUMNS: &str = "id, user_id, subtotal_cents, tax_cents, shipping_cents, total_cents, \
     status, shipping_address, payment_method, created_at, updated_at";

const OUTBOX_COLUMNS: &str =
    "id, event_type, payload, status, created_at, processed_at, error";

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> Result<Vec<(Uuid, OrderItem)>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, product_name, quantity, price_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<(Uuid, OrderItem)> {
                Ok((row.try_get("order_id")?, row_to_item(&row)?))
            })
            .collect()
    }

    /// Loads the items for a batch of order rows and assembles the orders,
    /// keeping the row order.
    async fn assemble(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut orders = rows
            .iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        for (order_id, item) in self.load_items(&ids).await? {
            if let Some(order) = orders.iter_mut().find(|o| o.id.as_uuid() == order_id) {
                order.items.push(item);
            }
        }
        Ok(orders)
    }
}

fn quantity_from_row(product_id: &str, quantity: i32) -> Result<u32> {
    u32::try_from(quantity)
        .map_err(|_| StoreError::Corrupt(format!("negative quantity for {product_id}")))
}

/// LIMIT/OFFSET value for a row count; PostgreSQL rejects negatives.
fn sql_count(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    let product_id: String = row.try_get("product_id")?;
    let quantity = quantity_from_row(&product_id, row.try_get("quantity")?)?;

    Ok(OrderItem {
        product_id: ProductId::new(product_id),
        product_name: row.try_get("product_name")?,
        quantity,
        price: Money::from_cents(row.try_get("price_cents")?),
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        items: Vec::new(),
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        tax: Money::from_cents(row.try_get("tax_cents")?),
        shipping_cost: Money::from_cents(row.try_get("shipping_cents")?),
        total: Money::from_cents(row.try_get("total_cents")?),
        status: status.parse::<OrderStatus>()?,
        shipping_address: row.try_get("shipping_address")?,
        payment_method: row.try_get("payment_method")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_entry(row: &PgRow) -> Result<OutboxEntry> {
    let status: String = row.try_get("status")?;

    Ok(OutboxEntry {
        id: OutboxId::from_uuid(row.try_get::<Uuid, _>("id")?),
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
        status: status.parse::<OutboxStatus>()?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
        error: row.try_get("error")?,
    })
}

async fn insert_order_rows(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (id, user_id, subtotal_cents, tax_cents, shipping_cents, total_cents,
                            status, shipping_address, payment_method, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(order.id.as_uuid())
    .bind(order.user_id.as_str())
    .bind(order.subtotal.cents())
    .bind(order.tax.cents())
    .bind(order.shipping_cost.cents())
    .bind(order.total.cents())
    .bind(order.status.as_str())
    .bind(&order.shipping_address)
    .bind(&order.payment_method)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.constraint() == Some("orders_pkey")
        {
            return StoreError::DuplicateOrder(order.id);
        }
        StoreError::Database(e)
    })?;

    for (position, item) in order.items.iter().enumerate() {
        let quantity = i32::try_from(item.quantity).map_err(|_| {
            StoreError::Corrupt(format!("quantity too large for {}", item.product_id))
        })?;

        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, position, product_id, product_name, quantity, price_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(position as i32)
        .bind(item.product_id.as_str())
        .bind(&item.product_name)
        .bind(quantity)
        .bind(item.price.cents())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn insert_outbox_row(conn: &mut PgConnection, entry: &OutboxEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO outbox (id, event_type, payload, status, created_at, processed_at, error)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id.as_uuid())
    .bind(&entry.event_type)
    .bind(&entry.payload)
    .bind(entry.status.as_str())
    .bind(entry.created_at)
    .bind(entry.processed_at)
    .bind(&entry.error)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn update_status_row(
    conn: &mut PgConnection,
    order: &Order,
    expected: OrderStatus,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET status = $1, updated_at = $2
        WHERE id = $3 AND status = $4
        "#,
    )
    .bind(order.status.as_str())
    .bind(order.updated_at)
    .bind(order.id.as_uuid())
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let actual: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
        .bind(order.id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

    match actual {
        Some(actual) => Err(StoreError::StatusConflict {
            order_id: order.id,
            expected,
            actual: actual.parse::<OrderStatus>()?,
        }),
        None => Err(StoreError::OrderNotFound(order.id)),
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert_order_with_outbox(&self, order: &Order, entry: &OutboxEntry) -> Result<()> {
        let order = order.clone();
        let entry = entry.clone();

        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                insert_order_rows(&mut **tx, &order).await?;
                insert_outbox_row(&mut **tx, &entry).await?;
                Ok(())
            })
        })
        .await
    }

    async fn update_order_status_with_outbox(
        &self,
        order: &Order,
        expected: OrderStatus,
        entry: &OutboxEntry,
    ) -> Result<()> {
        let order = order.clone();
        let entry = entry.clone();

        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                update_status_row(&mut **tx, &order, expected).await?;
                insert_outbox_row(&mut **tx, &entry).await?;
                Ok(())
            })
        })
        .await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, seq DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.assemble(rows).await
    }

    async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, seq DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.assemble(rows).await
    }
}

#[async_trait]
impl OutboxStore for PostgresOrderStore {
    async fn list_pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        self.query_outbox(OutboxQuery::with_status(OutboxStatus::Pending).limit(limit))
            .await
    }

    async fn update_outbox_status(
        &self,
        id: OutboxId,
        disposition: &OutboxDisposition,
    ) -> Result<()> {
        let query = match disposition {
            OutboxDisposition::Processed { at } => sqlx::query(
                "UPDATE outbox SET status = $1, processed_at = $2, error = NULL WHERE id = $3",
            )
            .bind(disposition.status().as_str())
            .bind(*at)
            .bind(id.as_uuid()),
            OutboxDisposition::Failed { error } => {
                sqlx::query("UPDATE outbox SET status = $1, error = $2 WHERE id = $3")
                    .bind(disposition.status().as_str())
                    .bind(error.clone())
                    .bind(id.as_uuid())
            }
        };

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::OutboxEntryNotFound(id));
        }
        Ok(())
    }

    async fn get_outbox_entry(&self, id: OutboxId) -> Result<Option<OutboxEntry>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {OUTBOX_COLUMNS} FROM outbox WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    async fn query_outbox(&self, query: OutboxQuery) -> Result<Vec<OutboxEntry>> {
        let mut sql = format!("SELECT {OUTBOX_COLUMNS} FROM outbox WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.event_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, seq ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(event_type) = query.event_type {
            sqlx_query = sqlx_query.bind(event_type);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(sql_count(limit));
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(sql_count(offset));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn outbox_stats(&self) -> Result<OutboxStats> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM outbox GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut stats = OutboxStats::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            stats.record(status.parse::<OutboxStatus>()?, count.max(0) as u64);
        }
        Ok(stats)
    }

    async fn requeue_failed(&self, limit: usize) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE outbox SET status = 'PENDING', error = NULL
            WHERE id IN (
                SELECT id FROM outbox
                WHERE status = 'FAILED'
                ORDER BY created_at ASC, seq ASC
                LIMIT $1
            )
            "#,
        )
        .bind(sql_count(limit))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_quantity_is_corrupt() {
        assert!(matches!(
            quantity_from_row("p1", -1),
            Err(StoreError::Corrupt(_))
        ));
        assert_eq!(quantity_from_row("p1", 3).unwrap(), 3);
    }

    #[test]
    fn test_row_counts_saturate() {
        assert_eq!(sql_count(10), 10);
        assert_eq!(sql_count(usize::MAX), i64::MAX);
    }
}
