//! HTTP API for the tripwire daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - Order creation and listing
//! - Order status lookup
//! - On-demand execution and cancellation
//! - Trigger-price check
//!
//! This is a thin shim: handlers validate input, call into the store or
//! the trigger engine synchronously, and map errors to status codes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tripwire_domain::{Order, OrderId, OrderKind, OrderStatus, Price, UserId};
use tripwire_store::{OrderRepository, PositionReader, StoreError};

use crate::error::DaemonError;
use crate::event_bus::{DaemonEvent, EventBus};
use crate::trigger::TriggerEngine;

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState {
    /// Order store
    pub orders: Arc<dyn OrderRepository>,
    /// Position and reference-price resolution
    pub positions: Arc<dyn PositionReader>,
    /// On-demand execution and cancellation
    pub engine: Arc<TriggerEngine>,
    /// Bus for order-creation notices
    pub event_bus: Arc<EventBus>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Request to create a new conditional order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    /// "stop-loss" or "take-profit"
    #[serde(rename = "type")]
    pub kind: String,
    pub trigger_price: Decimal,
}

/// An order record as returned by the gateway.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: OrderKind,
    pub trigger_price: Decimal,
    pub status: OrderStatus,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            kind: order.kind,
            trigger_price: order.trigger_price.as_decimal(),
            status: order.status,
        }
    }
}

/// Response after creating an order.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub message: String,
    pub order: OrderResponse,
}

/// Request to execute or cancel an order on demand.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderActionRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
}

/// Request to check a trigger price against the user's reference price.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOrderRequest {
    pub user_id: UserId,
    pub trigger_price: Decimal,
}

/// Plain message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/orders", post(create_order_handler))
        .route("/orders/:id", get(get_order_handler))
        .route("/orders/user/:user_id", get(list_orders_handler))
        .route("/orders/execute", post(execute_order_handler))
        .route("/orders/cancel", post(cancel_order_handler))
        .route("/orders/check", post(check_order_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create a new conditional order.
async fn create_order_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), (StatusCode, Json<ErrorResponse>)> {
    let kind: OrderKind = req.kind.parse().map_err(|e: tripwire_domain::DomainError| {
        warn!(kind = %req.kind, "Invalid order type received");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: e.to_string() }),
        )
    })?;

    let trigger_price = Price::new(req.trigger_price).map_err(|e| {
        warn!(trigger_price = %req.trigger_price, "Invalid trigger price received");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: e.to_string() }),
        )
    })?;

    let order = state
        .orders
        .create(req.user_id, kind, trigger_price)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    info!(order_id = order.id, user_id = order.user_id, "Order created");
    state.event_bus.send(DaemonEvent::OrderCreated(order.clone()));

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            message: format!("Order created successfully with ID: {}", order.id),
            order: OrderResponse::from(&order),
        }),
    ))
}

/// Get a single order by id.
async fn get_order_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let order = state
        .orders
        .find_by_id(id)
        .await
        .map_err(|e| to_error_response(e.into()))?
        .ok_or_else(|| to_error_response(DaemonError::OrderNotFound(id)))?;

    Ok(Json(OrderResponse::from(&order)))
}

/// List a user's orders in creation order.
async fn list_orders_handler(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<OrderResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let orders = state
        .orders
        .find_by_user(user_id)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// Execute an order on demand.
async fn execute_order_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<OrderActionRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    let outcome = state
        .engine
        .execute_on_demand(req.order_id, req.user_id)
        .await
        .map_err(to_error_response)?;

    Ok(Json(MessageResponse {
        message: outcome.message().to_string(),
    }))
}

/// Cancel an active order.
async fn cancel_order_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<OrderActionRequest>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let cancelled = state
        .engine
        .cancel(req.order_id, req.user_id)
        .await
        .map_err(to_error_response)?;

    Ok(Json(OrderResponse::from(&cancelled)))
}

/// Report whether the user's reference price has reached a trigger price.
async fn check_order_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CheckOrderRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    let trigger = Price::new(req.trigger_price).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: e.to_string() }),
        )
    })?;

    let reference = state
        .positions
        .price_for_user(req.user_id)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    let message = if reference >= trigger {
        "Trigger price met, execute stop loss"
    } else {
        "Price below trigger, waiting..."
    };

    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

// =============================================================================
// Helpers
// =============================================================================

fn to_error_response(error: DaemonError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        DaemonError::Domain(_) => StatusCode::BAD_REQUEST,
        DaemonError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        DaemonError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        DaemonError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
        DaemonError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
        DaemonError::Store(StoreError::PriceUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
        DaemonError::Feed(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_create_order_request_camel_case() {
        let json = r#"{"userId":1,"type":"stop-loss","triggerPrice":"100.5"}"#;
        let req: CreateOrderRequest = serde_json::from_str(json).unwrap();

        assert_eq!(req.user_id, 1);
        assert_eq!(req.kind, "stop-loss");
        assert_eq!(req.trigger_price, dec!(100.5));
    }

    #[test]
    fn test_order_response_shape() {
        let order = Order::new(3, 1, OrderKind::TakeProfit, Price::new(dec!(200)).unwrap());
        let json = serde_json::to_string(&OrderResponse::from(&order)).unwrap();

        assert!(json.contains("\"id\":3"));
        assert!(json.contains("\"userId\":1"));
        assert!(json.contains("\"type\":\"take-profit\""));
        assert!(json.contains("\"triggerPrice\":\"200\""));
        assert!(json.contains("\"status\":\"active\""));
    }

    #[test]
    fn test_error_mapping() {
        let (status, _) = to_error_response(DaemonError::OrderNotFound(1));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = to_error_response(DaemonError::Unauthorized { order_id: 1, user_id: 2 });
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = to_error_response(DaemonError::Store(StoreError::Conflict {
            id: 1,
            expected: OrderStatus::Active,
            actual: OrderStatus::Executed,
        }));
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = to_error_response(DaemonError::Store(StoreError::PriceUnavailable));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_invalid_kind_is_rejected() {
        assert!("limit".parse::<OrderKind>().is_err());
        assert!("stop-loss".parse::<OrderKind>().is_ok());
    }
}
