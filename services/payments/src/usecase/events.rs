use paygate_core::pagination::PageRequest;

use crate::domain::repository::EventStore;
use crate::domain::types::StoredEvent;
use crate::error::PaymentsServiceError;

/// Lists fallback events in the order they would be redelivered.
pub struct ListStoredEventsUseCase<'a, S: EventStore> {
    pub store: &'a S,
}

impl<S: EventStore> ListStoredEventsUseCase<'_, S> {
    pub async fn execute(&self, page: PageRequest) -> Result<Vec<StoredEvent>, PaymentsServiceError> {
        self.store.list(page.clamped()).await
    }
}
