//! Stock notification channel
//!
//! Events are published after the owning transaction commits and fanned out
//! to dashboard clients over Server-Sent Events. Delivery is best effort.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use uuid::Uuid;

use shared::{DcProduct, MaterialKind, UnitType};

use crate::AppState;

/// Events dashboards listen to for live refresh
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StockEvent {
    #[serde(rename_all = "camelCase")]
    DcCompleted {
        dc_id: Uuid,
        dc_no: String,
        unit_type: UnitType,
        product_names: Vec<String>,
        products: Vec<DcProduct>,
    },
    #[serde(rename_all = "camelCase")]
    ProductStockUpdated {
        product_name: String,
        own_unit_stock: i32,
        jobber_stock: i32,
        current_stock: i32,
    },
    #[serde(rename_all = "camelCase")]
    MaterialStockChanged {
        material_id: Uuid,
        kind: MaterialKind,
        name: String,
        quantity: Decimal,
        reference: Option<String>,
    },
}

impl StockEvent {
    fn name(&self) -> &'static str {
        match self {
            StockEvent::DcCompleted { .. } => "dcCompleted",
            StockEvent::ProductStockUpdated { .. } => "productStockUpdated",
            StockEvent::MaterialStockChanged { .. } => "materialStockChanged",
        }
    }
}

/// Broadcast sender shared through application state
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StockEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: StockEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event = name, receivers, "Stock event published"),
            Err(_) => tracing::trace!(event = name, "No subscribers for stock event"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StockEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Stream stock events as Server-Sent Events
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|message| {
        let event = match message {
            Ok(event) => Event::default().event(event.name()).json_data(&event).ok(),
            // Lagging subscribers skip what they missed
            Err(err) => {
                tracing::warn!("Event subscriber lagged: {}", err);
                None
            }
        };
        event.map(Ok)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
