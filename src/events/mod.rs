use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Sends domain events to the in-process consumer loop.
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
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Tenant events
    SystemCreated(i64),
    SystemUpdated(i64),
    SystemDeleted(i64),

    // Employee events
    EmployeeAdded {
        system_id: i64,
        employee_id: i64,
    },
    EmployeeUpdated {
        system_id: i64,
        employee_id: i64,
    },
    EmployeeDeactivated {
        system_id: i64,
        employee_id: i64,
    },

    // Catalog events
    ProductCreated {
        system_id: i64,
        product_id: i64,
    },
    ProductUpdated {
        system_id: i64,
        product_id: i64,
    },
    ProductDeleted {
        system_id: i64,
        product_id: i64,
    },
    SupplierCreated {
        system_id: i64,
        supplier_id: i64,
    },

    // Procurement events
    PurchaseOrderCreated {
        system_id: i64,
        purchase_order_id: i64,
    },
    PurchaseOrderStatusChanged {
        purchase_order_id: i64,
        old_status: String,
        new_status: String,
    },
    PurchaseOrderCancelled(i64),
    GoodsReceiptRecorded {
        purchase_order_id: i64,
        receipt_id: i64,
        quantity: i32,
    },
    GoodsReceiptUpdated {
        receipt_id: i64,
    },
    GoodsReceiptDeleted {
        receipt_id: i64,
    },

    // Inventory events
    StockReconciled {
        product_id: i64,
        stock_quantity: i32,
    },
    LowStock {
        product_id: i64,
        stock_quantity: i32,
        minimum_stock: i32,
    },

    // Sales events
    SaleCompleted {
        system_id: i64,
        sale_id: i64,
    },
    SaleItemVoided {
        sale_id: i64,
        sale_item_id: i64,
    },
    SaleVoided(i64),
}

/// Consumes events off the channel and reacts to them. Runs for the lifetime
/// of the process; ends when every sender has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Event processing loop started");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::SystemCreated(system_id) => {
                info!("System created: {}", system_id);
            }
            Event::SystemDeleted(system_id) => {
                info!("System deleted: {}", system_id);
            }
            Event::PurchaseOrderStatusChanged {
                purchase_order_id,
                old_status,
                new_status,
            } => {
                info!(
                    "Purchase order {} status changed: {} -> {}",
                    purchase_order_id, old_status, new_status
                );
            }
            Event::GoodsReceiptRecorded {
                purchase_order_id,
                receipt_id,
                quantity,
            } => {
                info!(
                    "Goods receipt {} recorded against purchase order {} ({} units)",
                    receipt_id, purchase_order_id, quantity
                );
            }
            Event::LowStock {
                product_id,
                stock_quantity,
                minimum_stock,
            } => {
                warn!(
                    "Low stock alert: product {} has {} units remaining (minimum {})",
                    product_id, stock_quantity, minimum_stock
                );
                // Reorder workflows would hang off this event.
            }
            Event::SaleCompleted { system_id, sale_id } => {
                info!("Sale {} completed in system {}", sale_id, system_id);
            }
            Event::SaleItemVoided {
                sale_id,
                sale_item_id,
            } => {
                info!("Sale item {} voided on sale {}", sale_item_id, sale_id);
            }
            _ => {
                info!("No specific handler for event: {:?}", event);
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_into_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender.send(Event::SystemCreated(5)).await.unwrap();

        match rx.recv().await {
            Some(Event::SystemCreated(id)) => assert_eq!(id, 5),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::SystemDeleted(1)).await.is_err());
    }
}
