pub mod delivery;
pub mod events;
pub mod idempotency;
pub mod payment;
