use crate::models::assignment::SearchMatch;
use crate::models::location::GeoPoint;
use crate::models::user::User;
use crate::store::users::UserStore;

#[derive(Debug, Clone)]
pub struct CourierMatch {
    pub courier: User,
    pub search: SearchMatch,
}

/// Radius escalation: queries the directory once per radius, smallest first,
/// and stops at the first radius holding an available courier. Within that
/// radius the nearest courier wins.
pub fn find_courier(directory: &UserStore, pickup: &GeoPoint, radii_m: &[u32]) -> Option<CourierMatch> {
    radii_m.iter().find_map(|&radius_m| {
        directory
            .find_nearest(pickup, f64::from(radius_m))
            .map(|(courier, distance_m)| CourierMatch {
                courier,
                search: SearchMatch {
                    radius_m,
                    distance_m,
                },
            })
    })
}
