//! Entity stores shared by the scheduler and request handlers.
//!
//! Every state transition that other actors can race on is a compare-and-set:
//! the precondition is checked and the write applied while holding the
//! entry's shard lock, so the loser of a race sees a conflict instead of
//! overwriting the winner.

pub mod deliveries;
pub mod orders;
pub mod users;
pub mod vendors;
