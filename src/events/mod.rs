use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::{
    delivery_note::DeliveryNoteStatus, order::OrderStatus,
};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "event dropped");
        }
    }
}

/// Domain events published after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    QuoteCreated {
        quote_id: Uuid,
        code: String,
    },
    QuoteRemissioned {
        quote_id: Uuid,
        order_id: Uuid,
        delivery_note_id: Uuid,
    },
    OrderCreated {
        order_id: Uuid,
        order_number: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderDelivered {
        order_id: Uuid,
    },
    DeliveryNoteCreated {
        delivery_note_id: Uuid,
        number: String,
        order_id: Uuid,
    },
    DeliveryNoteStatusChanged {
        delivery_note_id: Uuid,
        old_status: DeliveryNoteStatus,
        new_status: DeliveryNoteStatus,
    },
    SaleRecorded {
        sale_id: Uuid,
        order_id: Uuid,
        total: Decimal,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::QuoteCreated { .. } => "quote_created",
            Event::QuoteRemissioned { .. } => "quote_remissioned",
            Event::OrderCreated { .. } => "order_created",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::OrderDelivered { .. } => "order_delivered",
            Event::DeliveryNoteCreated { .. } => "delivery_note_created",
            Event::DeliveryNoteStatusChanged { .. } => "delivery_note_status_changed",
            Event::SaleRecorded { .. } => "sale_recorded",
        }
    }
}

/// Sends each event through `sender` when one is configured.
pub async fn publish(sender: Option<&EventSender>, events: Vec<Event>) {
    if let Some(sender) = sender {
        for event in events {
            sender.send_or_log(event).await;
        }
    }
}

/// Drains the channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!("ventas.events", 1, "event" => event.name());
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = event.name(), %payload, "domain event"),
            Err(e) => warn!(event = event.name(), error = %e, "failed to serialize event"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();

        sender.send(Event::OrderDelivered { order_id }).await.unwrap();

        assert_eq!(rx.recv().await, Some(Event::OrderDelivered { order_id }));
    }

    #[tokio::test]
    async fn closed_channel_does_not_fail_publish() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender
            .send(Event::OrderDelivered { order_id: Uuid::nil() })
            .await
            .is_err());
        publish(
            Some(&sender),
            vec![Event::OrderDelivered { order_id: Uuid::nil() }],
        )
        .await;
    }

    #[tokio::test]
    async fn process_events_exits_when_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::QuoteCreated {
                quote_id: Uuid::nil(),
                code: "COT-AB12".into(),
            })
            .await
            .unwrap();
        drop(sender);

        process_events(rx).await;
    }
}
