use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::config::Config;
use crate::geo::geocoder::Geocoder;
use crate::models::assignment::Assignment;
use crate::notify::Notifier;
use crate::observability::metrics::Metrics;
use crate::store::deliveries::DeliveryStore;
use crate::store::orders::OrderStore;
use crate::store::users::UserStore;
use crate::store::vendors::VendorStore;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Strictly ascending search radii in meters.
    pub search_radii_m: Vec<u32>,
    /// Upper bound for every geocoder and mailer call.
    pub gateway_timeout: Duration,
    pub admin_email: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            search_radii_m: vec![5_000, 15_000, 50_000],
            gateway_timeout: Duration::from_secs(10),
            admin_email: "admin@yourapp.com".to_string(),
        }
    }
}

impl DispatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            search_radii_m: config.search_radii_m.clone(),
            gateway_timeout: config.gateway_timeout,
            admin_email: config.admin_email.clone(),
        }
    }
}

pub struct AppState {
    pub users: UserStore,
    pub vendors: VendorStore,
    pub orders: OrderStore,
    pub deliveries: DeliveryStore,
    pub assignments: DashMap<Uuid, Assignment>,
    pub assignment_events_tx: broadcast::Sender<Assignment>,
    pub geocoder: Arc<dyn Geocoder>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: DispatchSettings,
    pub metrics: Metrics,
    /// Held for the whole of an assignment cycle so cycles never overlap.
    pub cycle_lock: Mutex<()>,
}

impl AppState {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        notifier: Arc<dyn Notifier>,
        settings: DispatchSettings,
        event_buffer_size: usize,
    ) -> Self {
        let (assignment_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            users: UserStore::new(),
            vendors: VendorStore::new(),
            orders: OrderStore::new(),
            deliveries: DeliveryStore::new(),
            assignments: DashMap::new(),
            assignment_events_tx,
            geocoder,
            notifier,
            settings,
            metrics: Metrics::new(),
            cycle_lock: Mutex::new(()),
        }
    }
}
