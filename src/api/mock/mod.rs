//! Mock TrackingApi implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};

use crate::interfaces::tracking_api::{ApiError, Result, TrackingApi};
use crate::model::{
    Dealer, EntityKind, EntityRef, Id, LocationRecord, Notification, OrderTracking, Warehouse,
    Workflow,
};

/// Mock REST backend that serves canned responses from memory.
pub struct MockTrackingApi {
    locations: RwLock<Vec<LocationRecord>>,
    orders: RwLock<HashMap<Id, OrderTracking>>,
    workflows: RwLock<HashMap<(EntityKind, Id), Workflow>>,
    notifications: RwLock<Vec<Notification>>,
    warehouses: RwLock<Vec<Warehouse>>,
    dealers: RwLock<Vec<Dealer>>,
    fail_on_locations: RwLock<Option<String>>,
    fail_on_order: RwLock<bool>,
    forbid_notifications: RwLock<bool>,
    driver_filters: RwLock<Vec<Option<String>>>,
    order_requests: RwLock<Vec<Id>>,
    marked_read: RwLock<Vec<Id>>,
    deleted: RwLock<Vec<Id>>,
    location_calls: watch::Sender<usize>,
}

impl Default for MockTrackingApi {
    fn default() -> Self {
        Self {
            locations: RwLock::default(),
            orders: RwLock::default(),
            workflows: RwLock::default(),
            notifications: RwLock::default(),
            warehouses: RwLock::default(),
            dealers: RwLock::default(),
            fail_on_locations: RwLock::default(),
            fail_on_order: RwLock::default(),
            forbid_notifications: RwLock::default(),
            driver_filters: RwLock::default(),
            order_requests: RwLock::default(),
            marked_read: RwLock::default(),
            deleted: RwLock::default(),
            location_calls: watch::channel(0).0,
        }
    }
}

impl MockTrackingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_locations(&self, records: Vec<LocationRecord>) {
        *self.locations.write().await = records;
    }

    pub async fn set_order(&self, tracking: OrderTracking) {
        if let Some(id) = tracking.order_id.clone() {
            self.orders.write().await.insert(id, tracking);
        }
    }

    pub async fn set_workflow(&self, entity: EntityRef, workflow: Workflow) {
        self.workflows
            .write()
            .await
            .insert((entity.kind, entity.id), workflow);
    }

    pub async fn set_notifications(&self, notifications: Vec<Notification>) {
        *self.notifications.write().await = notifications;
    }

    pub async fn set_warehouses(&self, warehouses: Vec<Warehouse>) {
        *self.warehouses.write().await = warehouses;
    }

    pub async fn set_dealers(&self, dealers: Vec<Dealer>) {
        *self.dealers.write().await = dealers;
    }

    /// Make `live_locations` fail with an HTTP 500 carrying `message`.
    pub async fn set_fail_on_locations(&self, message: Option<&str>) {
        *self.fail_on_locations.write().await = message.map(str::to_string);
    }

    pub async fn set_fail_on_order(&self, fail: bool) {
        *self.fail_on_order.write().await = fail;
    }

    /// Answer notification requests with 403.
    pub async fn set_forbid_notifications(&self, forbid: bool) {
        *self.forbid_notifications.write().await = forbid;
    }

    /// Number of `live_locations` calls so far.
    pub fn location_calls(&self) -> usize {
        *self.location_calls.borrow()
    }

    /// Wait until at least `count` `live_locations` calls have been made.
    pub async fn wait_for_location_calls(&self, count: usize) {
        let mut rx = self.location_calls.subscribe();
        let _ = rx.wait_for(|calls| *calls >= count).await;
    }

    /// Driver filters passed to each `live_locations` call, in order.
    pub async fn driver_filters(&self) -> Vec<Option<String>> {
        self.driver_filters.read().await.clone()
    }

    /// Order ids requested so far, in order.
    pub async fn order_requests(&self) -> Vec<Id> {
        self.order_requests.read().await.clone()
    }

    pub async fn marked_read(&self) -> Vec<Id> {
        self.marked_read.read().await.clone()
    }

    pub async fn deleted(&self) -> Vec<Id> {
        self.deleted.read().await.clone()
    }

    async fn check_notifications_allowed(&self) -> Result<()> {
        if *self.forbid_notifications.read().await {
            return Err(ApiError::Forbidden("/notifications".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TrackingApi for MockTrackingApi {
    async fn live_locations(&self, driver_phone: Option<&str>) -> Result<Vec<LocationRecord>> {
        self.driver_filters
            .write()
            .await
            .push(driver_phone.map(str::to_string));
        self.location_calls.send_modify(|calls| *calls += 1);

        if let Some(message) = self.fail_on_locations.read().await.clone() {
            return Err(ApiError::Status {
                endpoint: "/tracking/live-locations".to_string(),
                status: 500,
                body: message,
            });
        }

        let records = self.locations.read().await;
        Ok(records
            .iter()
            .filter(|r| r.matches_driver(driver_phone))
            .cloned()
            .collect())
    }

    async fn order_tracking(&self, order_id: &Id) -> Result<OrderTracking> {
        self.order_requests.write().await.push(order_id.clone());
        if *self.fail_on_order.read().await {
            return Err(ApiError::Status {
                endpoint: format!("/tracking/order/{order_id}"),
                status: 500,
                body: "mock failure".to_string(),
            });
        }
        self.orders
            .read()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("/tracking/order/{order_id}")))
    }

    async fn workflow(&self, entity: &EntityRef) -> Result<Workflow> {
        self.workflows
            .read()
            .await
            .get(&(entity.kind, entity.id.clone()))
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("/workflow/{}/{}", entity.kind, entity.id)))
    }

    async fn notifications(&self) -> Result<Vec<Notification>> {
        self.check_notifications_allowed().await?;
        Ok(self.notifications.read().await.clone())
    }

    async fn mark_notification_read(&self, id: &Id) -> Result<()> {
        self.check_notifications_allowed().await?;
        self.marked_read.write().await.push(id.clone());
        if let Some(n) = self
            .notifications
            .write()
            .await
            .iter_mut()
            .find(|n| &n.id == id)
        {
            n.is_read = true;
        }
        Ok(())
    }

    async fn delete_notification(&self, id: &Id) -> Result<()> {
        self.check_notifications_allowed().await?;
        self.deleted.write().await.push(id.clone());
        self.notifications.write().await.retain(|n| &n.id != id);
        Ok(())
    }

    async fn warehouses(&self) -> Result<Vec<Warehouse>> {
        Ok(self.warehouses.read().await.clone())
    }

    async fn dealers(&self) -> Result<Vec<Dealer>> {
        Ok(self.dealers.read().await.clone())
    }
}
