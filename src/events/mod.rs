use crate::shell::{Notification, NotificationLevel, Shell};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

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

    /// Sends an event; a closed channel is logged, never surfaced to the caller.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Domain events emitted after successful writes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    DocumentCreated {
        collection: String,
        id: Uuid,
    },
    DocumentUpdated {
        collection: String,
        id: Uuid,
    },
    DocumentDeleted {
        collection: String,
        id: Uuid,
    },
    StockMoved {
        product_id: Uuid,
        movement_id: Uuid,
        previous_quantity: Decimal,
        resulting_quantity: Decimal,
    },
    LowStock {
        product_id: Uuid,
        product_name: String,
        stock_quantity: Decimal,
        min_stock: Decimal,
    },
    SaleCompleted {
        order_id: Uuid,
        total: Decimal,
    },
    SaleCancelled {
        order_id: Uuid,
    },
    QuoteConverted {
        quote_id: Uuid,
        order_id: Uuid,
    },
    TransactionPaid {
        transaction_id: Uuid,
        amount: Decimal,
    },
    OpportunityStageChanged {
        opportunity_id: Uuid,
        stage: String,
    },
}

impl Event {
    pub fn created(collection: &str, id: Uuid) -> Self {
        Event::DocumentCreated {
            collection: collection.to_string(),
            id,
        }
    }

    pub fn updated(collection: &str, id: Uuid) -> Self {
        Event::DocumentUpdated {
            collection: collection.to_string(),
            id,
        }
    }

    pub fn deleted(collection: &str, id: Uuid) -> Self {
        Event::DocumentDeleted {
            collection: collection.to_string(),
            id,
        }
    }

    /// Shell toast for events the user should see outside the current screen
    fn notification(&self) -> Option<Notification> {
        match self {
            Event::LowStock {
                product_name,
                stock_quantity,
                min_stock,
                ..
            } => Some(Notification::new(
                NotificationLevel::Warning,
                "Low stock",
                format!(
                    "{} has {} left (minimum {})",
                    product_name, stock_quantity, min_stock
                ),
            )),
            Event::SaleCompleted { total, .. } => Some(Notification::new(
                NotificationLevel::Success,
                "Sale completed",
                format!("Total {}", total),
            )),
            Event::QuoteConverted { .. } => Some(Notification::new(
                NotificationLevel::Info,
                "Quote converted",
                "A new sale was created from the accepted quote",
            )),
            _ => None,
        }
    }
}

/// Consumes events until every sender is dropped
pub async fn process_events(mut rx: mpsc::Receiver<Event>, shell: Option<Arc<Shell>>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::DocumentCreated { collection, id } => {
                info!(%collection, %id, "document created")
            }
            Event::DocumentUpdated { collection, id } => {
                info!(%collection, %id, "document updated")
            }
            Event::DocumentDeleted { collection, id } => {
                info!(%collection, %id, "document deleted")
            }
            Event::LowStock {
                product_id,
                stock_quantity,
                ..
            } => warn!(%product_id, %stock_quantity, "product below minimum stock"),
            other => info!("Received event: {:?}", other),
        }

        if let (Some(shell), Some(notification)) = (&shell, event.notification()) {
            shell.notify(notification).await;
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn low_stock_reaches_shell() {
        let shell = Arc::new(Shell::headless());
        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let handle = tokio::spawn(process_events(rx, Some(shell.clone())));

        sender
            .send(Event::LowStock {
                product_id: Uuid::new_v4(),
                product_name: "Coffee 500g".into(),
                stock_quantity: dec!(2),
                min_stock: dec!(5),
            })
            .await
            .unwrap();
        sender
            .send(Event::created("customers", Uuid::new_v4()))
            .await
            .unwrap();
        drop(sender);
        handle.await.unwrap();

        let snapshot = shell.snapshot().await;
        assert_eq!(snapshot.notifications.len(), 1);
        assert_eq!(snapshot.notifications[0].title, "Low stock");
        assert!(snapshot.notifications[0].body.contains("Coffee 500g"));
    }

    #[tokio::test]
    async fn send_on_closed_channel_is_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::SaleCancelled { order_id: Uuid::new_v4() }).await.is_err());
        // does not panic
        sender
            .send_or_log(Event::SaleCancelled {
                order_id: Uuid::new_v4(),
            })
            .await;
    }
}
