use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::geo::geocoder::StaticGeocoder;
use crate::models::delivery::DeliveryRecord;
use crate::models::location::{GeoPoint, Location};
use crate::models::order::{Order, OrderItem, OrderStatus};
use crate::models::user::{CourierStatus, Role, User};
use crate::models::vendor::Vendor;
use crate::notify::OutboxNotifier;
use crate::state::{AppState, DispatchSettings};

pub const OPS_EMAIL: &str = "ops@dispatch.test";
const KM_PER_DEGREE_LAT: f64 = 111.195;

pub fn vendor_point() -> GeoPoint {
    GeoPoint::new(6.45, 3.40)
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub geocoder: Arc<StaticGeocoder>,
    pub outbox: Arc<OutboxNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        let geocoder = Arc::new(StaticGeocoder::new());
        let outbox = Arc::new(OutboxNotifier::new());
        let settings = DispatchSettings {
            search_radii_m: vec![5_000, 15_000, 50_000],
            gateway_timeout: Duration::from_millis(200),
            admin_email: OPS_EMAIL.to_string(),
        };
        let state = AppState::new(geocoder.clone(), outbox.clone(), settings, 64);

        Self {
            state: Arc::new(state),
            geocoder,
            outbox,
        }
    }

    pub fn customer(&self, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: "Customer".to_string(),
            email: email.to_string(),
            role: Role::User,
            status: CourierStatus::Available,
            location: None,
            updated_at: Utc::now(),
        };
        self.state.users.insert(user.clone());
        user
    }

    pub fn courier_km_north(&self, km: f64, status: CourierStatus) -> User {
        let origin = vendor_point();
        let point = GeoPoint::new(origin.lat() + km / KM_PER_DEGREE_LAT, origin.lng());
        let user = User {
            id: Uuid::new_v4(),
            name: format!("Rider {km}km"),
            email: format!("rider-{}@dispatch.test", Uuid::new_v4()),
            role: Role::Delivery,
            status,
            location: Some(Location::resolved("rider road", "Rider Road".to_string(), point)),
            updated_at: Utc::now(),
        };
        self.state.users.insert(user.clone());
        user
    }

    pub fn vendor_with_point(&self) -> Vendor {
        self.vendor(Location::resolved(
            "1 Kitchen Lane",
            "1 Kitchen Lane, Lagos".to_string(),
            vendor_point(),
        ))
    }

    pub fn vendor_without_point(&self) -> Vendor {
        self.vendor(Location::unresolved("unmapped alley"))
    }

    fn vendor(&self, location: Location) -> Vendor {
        let vendor = Vendor {
            id: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            name: "Mama Put".to_string(),
            email: "kitchen@dispatch.test".to_string(),
            phone: "+2340000000".to_string(),
            location,
            updated_at: Utc::now(),
        };
        self.state.vendors.insert(vendor.clone());
        vendor
    }

    /// Inserts a paid order and its open delivery record.
    pub fn paid_order(&self, customer: &User, vendor: &Vendor) -> (Order, DeliveryRecord) {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer: customer.id,
            vendor: vendor.id,
            items: vec![OrderItem {
                product_id: Uuid::new_v4(),
                name: "Jollof".to_string(),
                unit_price: 150_000,
                quantity: 1,
            }],
            subtotal: 150_000,
            tax: 15_000,
            shipping_fee: 50_000,
            total: 215_000,
            reference: Some(format!("ref-{}", Uuid::new_v4())),
            status: OrderStatus::Paid,
            assigned_delivery: None,
            drop_off_location: Location::resolved(
                "7 Home Street",
                "7 Home Street, Lagos".to_string(),
                GeoPoint::new(6.46, 3.41),
            ),
            created_at: now,
            updated_at: now,
        };
        self.state.orders.insert(order.clone());

        let (delivery, _) = self
            .state
            .deliveries
            .ensure_open(order.id, || {
                DeliveryRecord::open_for(&order, vendor.location.clone())
            })
            .expect("open delivery record");

        (order, delivery)
    }
}
