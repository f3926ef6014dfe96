pub mod assignment;
pub mod delivery;
pub mod location;
pub mod order;
pub mod user;
pub mod vendor;
