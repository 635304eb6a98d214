//! Typed order-update callbacks on top of a [`HubConnection`].

use crate::core::hub_connection::{HubConnection, HubSender};
use crate::domain::events::{
    OrderCreated, OrderDelayed, OrderEtaUpdated, OrderEventKind, OrderStatusChanged,
};
use crate::domain::model::Order;
use crate::utils::error::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Default)]
struct Registries {
    status_changed: Vec<Callback<OrderStatusChanged>>,
    created: Vec<Callback<OrderCreated>>,
    eta_updated: Vec<Callback<OrderEtaUpdated>>,
    delayed: Vec<Callback<OrderDelayed>>,
}

/// One callback list per order event kind.
///
/// Cloning shares the same lists.
#[derive(Clone, Default)]
pub struct OrderUpdates {
    registries: Arc<Mutex<Registries>>,
}

impl OrderUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    fn registries(&self) -> MutexGuard<'_, Registries> {
        self.registries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn on_status_changed<F: Fn(&OrderStatusChanged) + Send + Sync + 'static>(&self, callback: F) {
        self.registries().status_changed.push(Arc::new(callback));
    }

    pub fn on_created<F: Fn(&OrderCreated) + Send + Sync + 'static>(&self, callback: F) {
        self.registries().created.push(Arc::new(callback));
    }

    pub fn on_eta_updated<F: Fn(&OrderEtaUpdated) + Send + Sync + 'static>(&self, callback: F) {
        self.registries().eta_updated.push(Arc::new(callback));
    }

    pub fn on_delayed<F: Fn(&OrderDelayed) + Send + Sync + 'static>(&self, callback: F) {
        self.registries().delayed.push(Arc::new(callback));
    }

    pub fn callback_count(&self, kind: OrderEventKind) -> usize {
        let registries = self.registries();
        match kind {
            OrderEventKind::StatusChanged => registries.status_changed.len(),
            OrderEventKind::Created => registries.created.len(),
            OrderEventKind::EtaUpdated => registries.eta_updated.len(),
            OrderEventKind::Delayed => registries.delayed.len(),
        }
    }

    pub fn clear(&self) {
        *self.registries() = Registries::default();
    }

    /// Routes a hub invocation to the callbacks of the matching kind.
    ///
    /// Unknown targets and payloads that fail to decode are logged and dropped.
    pub fn handle_invocation(&self, target: &str, arguments: &[Value]) {
        let Some(kind) = OrderEventKind::from_method_name(target) else {
            tracing::debug!("Ignoring unknown order event '{}'", target);
            return;
        };
        self.dispatch(kind, arguments);
    }

    pub fn dispatch(&self, kind: OrderEventKind, arguments: &[Value]) {
        let Some(payload) = arguments.first() else {
            tracing::warn!("{} arrived without a payload", kind.method_name());
            return;
        };

        match kind {
            OrderEventKind::StatusChanged => {
                let callbacks = self.registries().status_changed.clone();
                fire(kind, payload, &callbacks);
            }
            OrderEventKind::Created => {
                let callbacks = self.registries().created.clone();
                match decode_created(payload) {
                    Some(event) => callbacks.iter().for_each(|callback| callback(&event)),
                    None => tracing::warn!("Could not decode {} payload", kind.method_name()),
                }
            }
            OrderEventKind::EtaUpdated => {
                let callbacks = self.registries().eta_updated.clone();
                fire(kind, payload, &callbacks);
            }
            OrderEventKind::Delayed => {
                let callbacks = self.registries().delayed.clone();
                fire(kind, payload, &callbacks);
            }
        }
    }
}

fn fire<T: DeserializeOwned>(kind: OrderEventKind, payload: &Value, callbacks: &[Callback<T>]) {
    match serde_json::from_value::<T>(payload.clone()) {
        Ok(event) => {
            tracing::debug!("Delivering {} to {} callback(s)", kind.method_name(), callbacks.len());
            for callback in callbacks {
                callback(&event);
            }
        }
        Err(e) => tracing::warn!("Could not decode {} payload: {}", kind.method_name(), e),
    }
}

// Servers send either `{ "order": {...} }` or the bare order.
fn decode_created(payload: &Value) -> Option<OrderCreated> {
    if payload.get("order").is_some() {
        return serde_json::from_value(payload.clone()).ok();
    }
    serde_json::from_value::<Order>(payload.clone())
        .ok()
        .map(|order| OrderCreated { order })
}

const JOIN_ORDER_GROUP: &str = "JoinOrderGroup";
const LEAVE_ORDER_GROUP: &str = "LeaveOrderGroup";
const JOIN_VENDOR_GROUP: &str = "JoinVendorGroup";

/// Groups joined on the current connection. Membership is per connection
/// on the server, so these are joined again after every reconnect.
#[derive(Debug, Default)]
struct Groups {
    orders: Vec<String>,
    vendors: Vec<String>,
}

impl Groups {
    fn joins(&self) -> Vec<(&'static str, String)> {
        self.orders
            .iter()
            .map(|id| (JOIN_ORDER_GROUP, id.clone()))
            .chain(self.vendors.iter().map(|id| (JOIN_VENDOR_GROUP, id.clone())))
            .collect()
    }
}

fn remember(ids: &mut Vec<String>, id: &str) {
    if !ids.iter().any(|known| known == id) {
        ids.push(id.to_string());
    }
}

async fn rejoin(sender: HubSender, joins: Vec<(&'static str, String)>) {
    for (method, id) in joins {
        match sender.send(method, &[Value::String(id.clone())]).await {
            Ok(()) => tracing::debug!("Rejoined {} {}", method, id),
            Err(e) => tracing::warn!("Could not rejoin {} {}: {}", method, id, e),
        }
    }
}

/// Order-event subscriptions over the orders hub.
pub struct OrderUpdatesService {
    connection: HubConnection,
    updates: OrderUpdates,
    groups: Arc<Mutex<Groups>>,
}

impl OrderUpdatesService {
    pub fn new(connection: HubConnection) -> Self {
        let updates = OrderUpdates::new();
        for kind in OrderEventKind::ALL {
            let updates = updates.clone();
            connection.on(kind.method_name(), move |arguments| {
                updates.dispatch(kind, arguments)
            });
        }

        let groups = Arc::new(Mutex::new(Groups::default()));
        let joined = groups.clone();
        let sender = connection.sender();
        connection.on_reconnected(move || {
            let joins = lock_groups(&joined).joins();
            if !joins.is_empty() {
                tokio::spawn(rejoin(sender.clone(), joins));
            }
        });

        Self {
            connection,
            updates,
            groups,
        }
    }

    pub fn updates(&self) -> &OrderUpdates {
        &self.updates
    }

    pub fn connection(&self) -> &HubConnection {
        &self.connection
    }

    pub async fn start(&self) -> Result<()> {
        self.connection.start().await
    }

    pub async fn join_order_group(&self, order_id: &str) -> Result<()> {
        self.connection
            .send(JOIN_ORDER_GROUP, &[Value::String(order_id.to_string())])
            .await?;
        remember(&mut lock_groups(&self.groups).orders, order_id);
        Ok(())
    }

    pub async fn leave_order_group(&self, order_id: &str) -> Result<()> {
        lock_groups(&self.groups).orders.retain(|id| id != order_id);
        self.connection
            .send(LEAVE_ORDER_GROUP, &[Value::String(order_id.to_string())])
            .await
    }

    pub async fn join_vendor_group(&self, vendor_id: &str) -> Result<()> {
        self.connection
            .send(JOIN_VENDOR_GROUP, &[Value::String(vendor_id.to_string())])
            .await?;
        remember(&mut lock_groups(&self.groups).vendors, vendor_id);
        Ok(())
    }

    /// Disconnects and drops every registered callback and joined group.
    pub async fn stop(&self) {
        self.connection.stop().await;
        self.updates.clear();
        *lock_groups(&self.groups) = Groups::default();
    }
}

fn lock_groups(groups: &Mutex<Groups>) -> MutexGuard<'_, Groups> {
    groups.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
