//! Order creation, query and payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::money::major_units;
use domain::{Money, Order, OrderItem, OrderStatus};
use orders::{CreateOrderRequest, RequestedItem};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the calling user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub items: Vec<OrderItemBody>,
    #[serde(default)]
    pub shipping_address: Option<serde_json::Value>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemBody {
    pub product_id: String,
    pub quantity: u32,
    /// Price the client saw, in major units. Logged if it differs from the
    /// catalog, never charged; ignored when out of range.
    #[serde(default)]
    pub price: Option<f64>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderItemResponse>,
    #[serde(with = "major_units")]
    pub subtotal: Money,
    #[serde(with = "major_units")]
    pub tax: Money,
    #[serde(with = "major_units")]
    pub shipping_cost: Money,
    #[serde(with = "major_units")]
    pub total: Money,
    pub shipping_address: Option<serde_json::Value>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    #[serde(with = "major_units")]
    pub price: Money,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            price: item.price,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            items: order.items.into_iter().map(OrderItemResponse::from).collect(),
            subtotal: order.subtotal,
            tax: order.tax,
            shipping_cost: order.shipping_cost,
            total: order.total,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders: validate and place an order for the calling user.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let user_id = user_id(&headers)?;

    let items = body
        .items
        .into_iter()
        .map(|item| {
            let requested = RequestedItem::new(item.product_id, item.quantity);
            match item.price.and_then(Money::from_major_units) {
                Some(price) => requested.with_price(price),
                None => requested,
            }
        })
        .collect();

    let mut request = CreateOrderRequest::new(user_id, items);
    request.shipping_address = body.shipping_address;
    request.payment_method = body.payment_method;

    let order = state.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders: every order, newest first.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_orders().await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/my-orders: the calling user's orders, newest first.
pub async fn list_mine(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let user_id = user_id(&headers)?;
    let orders = state.orders.list_orders_for_user(&user_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}: one order with its items.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get_order(parse_order_id(&id)?).await?;
    Ok(Json(order.into()))
}

/// PATCH /orders/{id}/pay: record a (simulated) payment.
#[tracing::instrument(skip(state))]
pub async fn pay(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.pay_order(parse_order_id(&id)?).await?;
    Ok(Json(order.into()))
}

// -- Helpers --

fn user_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::from)
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {USER_ID_HEADER} header")))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_user_id_header() {
        let mut headers = HeaderMap::new();
        assert!(matches!(user_id(&headers), Err(ApiError::BadRequest(_))));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert!(user_id(&headers).is_err());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u1"));
        assert_eq!(user_id(&headers).unwrap(), UserId::new("u1"));
    }

    #[test]
    fn test_order_response_uses_major_units() {
        let order = Order::place(
            UserId::new("u1"),
            vec![OrderItem::new("p1", "Widget", 2, Money::from_cents(1050))],
            &Default::default(),
            None,
            None,
        )
        .unwrap();

        let json = serde_json::to_value(OrderResponse::from(order)).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["total"], 21.0);
        assert_eq!(json["items"][0]["price"], 10.5);
        assert_eq!(json["items"][0]["productName"], "Widget");
    }
}
