use crate::domain::model::{Order, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The order notifications pushed over the orders hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderEventKind {
    StatusChanged,
    Created,
    EtaUpdated,
    Delayed,
}

impl OrderEventKind {
    pub const ALL: [OrderEventKind; 4] = [
        OrderEventKind::StatusChanged,
        OrderEventKind::Created,
        OrderEventKind::EtaUpdated,
        OrderEventKind::Delayed,
    ];

    /// Hub method name the server invokes for this kind.
    pub fn method_name(&self) -> &'static str {
        match self {
            OrderEventKind::StatusChanged => "OrderStatusChanged",
            OrderEventKind::Created => "OrderCreated",
            OrderEventKind::EtaUpdated => "OrderETAUpdated",
            OrderEventKind::Delayed => "OrderDelayed",
        }
    }

    pub fn from_method_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.method_name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChanged {
    pub order_id: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub previous_status: Option<OrderStatus>,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEtaUpdated {
    pub order_id: String,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub estimated_ready_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDelayed {
    pub order_id: String,
    pub delay_minutes: u32,
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_name_lookup_is_case_insensitive() {
        assert_eq!(
            OrderEventKind::from_method_name("orderetaupdated"),
            Some(OrderEventKind::EtaUpdated)
        );
        assert_eq!(
            OrderEventKind::from_method_name("OrderDelayed"),
            Some(OrderEventKind::Delayed)
        );
        assert_eq!(OrderEventKind::from_method_name("ReceiveMessage"), None);
    }
}
