pub mod accounts;
pub mod assignment;
pub mod checkout;
pub mod lifecycle;
pub mod payments;
pub mod scheduler;
pub mod search;
pub mod vendors;

#[cfg(test)]
pub(crate) mod fixtures;
