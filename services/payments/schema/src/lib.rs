//! sea-orm entities owned by the payments service.

pub mod payments;
pub mod stored_events;
pub mod stored_requests;
