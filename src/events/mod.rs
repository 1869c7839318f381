use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::OrderStatus;

/// Events emitted by the pricing & lifecycle engine. Consumers (notification
/// workers, tracking sync, analytics) subscribe via the mpsc receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderCompleted(Uuid),
    /// Emitted when an order enters `shipped` and carries tracking details;
    /// the carrier sync worker picks this up.
    TrackingSyncRequested {
        order_id: Uuid,
        tracking_provider: Option<String>,
        tracking_number: Option<String>,
    },
    PointsAwarded {
        user_id: Uuid,
        related_type: String,
        related_id: Uuid,
        points: i64,
        timestamp: DateTime<Utc>,
    },
    PointsRedeemed {
        user_id: Uuid,
        related_type: String,
        related_id: Uuid,
        points: i64,
        timestamp: DateTime<Utc>,
    },
    CouponRedeemed {
        coupon_id: Uuid,
        order_id: Option<Uuid>,
    },
    GiftCardApplied {
        gift_card_id: Uuid,
        amount: Decimal,
        remaining_balance: Decimal,
    },
}

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

/// Convenience constructor for an event channel pair.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}
