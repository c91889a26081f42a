use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use paygate_core::pagination::PageRequest;
use paygate_payments::domain::repository::{
    Channel, EventPublisher, EventStore, IdempotencyRepository, PaymentRepository, PayoutProvider,
    Transport,
};
use paygate_payments::domain::types::{
    DomainEvent, Payment, PaymentStatus, Quote, QuoteRequest, Recipient, StoredEvent,
    StoredRequest,
};
use paygate_payments::error::{PaymentsServiceError, TransportError};

fn unavailable(what: &str) -> PaymentsServiceError {
    PaymentsServiceError::StoreUnavailable(anyhow::anyhow!("{what}: connection refused"))
}

// ── MockIdempotencyRepo ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockIdempotencyRepo {
    pub records: Arc<Mutex<Vec<StoredRequest>>>,
    pub fail_lookup: bool,
    pub fail_insert: bool,
    /// Simulates a concurrent request recording the same key between check and record.
    pub lose_race: bool,
}

impl MockIdempotencyRepo {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a shared handle to the recorded responses for post-execution inspection.
    pub fn records_handle(&self) -> Arc<Mutex<Vec<StoredRequest>>> {
        Arc::clone(&self.records)
    }
}

impl IdempotencyRepository for MockIdempotencyRepo {
    async fn find_by_key(&self, key: &str) -> Result<Option<StoredRequest>, PaymentsServiceError> {
        if self.fail_lookup {
            return Err(unavailable("find stored request by key"));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.idempotency_key == key)
            .cloned())
    }

    async fn insert(&self, request: &StoredRequest) -> Result<(), PaymentsServiceError> {
        if self.fail_insert {
            return Err(unavailable("insert stored request"));
        }
        if self.lose_race {
            return Err(PaymentsServiceError::DuplicateKey);
        }
        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.idempotency_key == request.idempotency_key)
        {
            return Err(PaymentsServiceError::DuplicateKey);
        }
        records.push(request.clone());
        Ok(())
    }
}

// ── MockEventStore ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockEventStore {
    pub events: Arc<Mutex<Vec<StoredEvent>>>,
    pub fail_insert: Arc<AtomicBool>,
}

impl MockEventStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<StoredEvent>) -> Self {
        Self {
            events: Arc::new(Mutex::new(events)),
            ..Self::default()
        }
    }

    pub fn events_handle(&self) -> Arc<Mutex<Vec<StoredEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn unprocessed_count(events: &Arc<Mutex<Vec<StoredEvent>>>) -> usize {
        events.lock().unwrap().iter().filter(|e| !e.processed).count()
    }
}

impl EventStore for MockEventStore {
    async fn insert(&self, event: &StoredEvent) -> Result<(), PaymentsServiceError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(unavailable("insert stored event"));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn find_unprocessed(&self) -> Result<Vec<StoredEvent>, PaymentsServiceError> {
        let mut pending: Vec<StoredEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !e.processed)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    async fn mark_processed(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), PaymentsServiceError> {
        let mut events = self.events.lock().unwrap();
        if let Some(e) = events.iter_mut().find(|e| e.id == id) {
            e.processed = true;
            e.processed_at = Some(processed_at);
        }
        Ok(())
    }

    async fn list(&self, page: PageRequest) -> Result<Vec<StoredEvent>, PaymentsServiceError> {
        let mut events = self.events.lock().unwrap().clone();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(events
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }
}

// ── MockTransport ────────────────────────────────────────────────────────────

/// Shared view of the fake broker, kept by the test after the transport is moved.
#[derive(Default)]
pub struct Broker {
    pub available: AtomicBool,
    /// Every send fails while set, even on an open channel.
    pub fail_sends: AtomicBool,
    /// Sends whose payload contains this marker fail.
    pub reject_marker: Mutex<Option<String>>,
    pub connects: AtomicUsize,
    pub asserted: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(String, Vec<u8>)>>,
}

impl Broker {
    pub fn up() -> Arc<Self> {
        let broker = Self::default();
        broker.available.store(true, Ordering::SeqCst);
        Arc::new(broker)
    }

    pub fn down() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn sent_events(&self) -> Vec<(String, DomainEvent)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(queue, payload)| (queue.clone(), serde_json::from_slice(payload).unwrap()))
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

pub struct MockTransport {
    pub broker: Arc<Broker>,
}

impl MockTransport {
    pub fn new(broker: &Arc<Broker>) -> Self {
        Self {
            broker: Arc::clone(broker),
        }
    }
}

impl Transport for MockTransport {
    type Channel = MockChannel;

    async fn connect(&self) -> Result<MockChannel, TransportError> {
        self.broker.connects.fetch_add(1, Ordering::SeqCst);
        if !self.broker.available.load(Ordering::SeqCst) {
            return Err(TransportError::Connect(anyhow::anyhow!("connection refused")));
        }
        Ok(MockChannel {
            broker: Arc::clone(&self.broker),
        })
    }
}

pub struct MockChannel {
    broker: Arc<Broker>,
}

impl Channel for MockChannel {
    async fn assert_queue(&mut self, queue: &str) -> Result<(), TransportError> {
        self.broker.asserted.lock().unwrap().push(queue.to_owned());
        Ok(())
    }

    async fn send_to_queue(&mut self, queue: &str, payload: &[u8]) -> Result<(), TransportError> {
        let rejected = self
            .broker
            .reject_marker
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|marker| String::from_utf8_lossy(payload).contains(marker));
        if !self.broker.available.load(Ordering::SeqCst)
            || self.broker.fail_sends.load(Ordering::SeqCst)
            || rejected
        {
            return Err(TransportError::Send {
                queue: queue.to_owned(),
                source: anyhow::anyhow!("channel closed"),
            });
        }
        self.broker
            .sent
            .lock()
            .unwrap()
            .push((queue.to_owned(), payload.to_vec()));
        Ok(())
    }
}

// ── MockPaymentRepo ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPaymentRepo {
    pub payments: Arc<Mutex<Vec<Payment>>>,
    pub fail_insert: bool,
}

impl MockPaymentRepo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(payments: Vec<Payment>) -> Self {
        Self {
            payments: Arc::new(Mutex::new(payments)),
            fail_insert: false,
        }
    }

    pub fn payments_handle(&self) -> Arc<Mutex<Vec<Payment>>> {
        Arc::clone(&self.payments)
    }
}

impl PaymentRepository for MockPaymentRepo {
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentsServiceError> {
        if self.fail_insert {
            return Err(unavailable("insert payment"));
        }
        self.payments.lock().unwrap().push(payment.clone());
        Ok(())
    }

    async fn list(&self, page: PageRequest) -> Result<Vec<Payment>, PaymentsServiceError> {
        let mut payments = self.payments.lock().unwrap().clone();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>, PaymentsServiceError> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.payment_id == payment_id)
            .cloned())
    }
}

// ── MockPayoutProvider ───────────────────────────────────────────────────────

pub struct MockPayoutProvider {
    pub recipients: Vec<Recipient>,
    pub fail_account_details: bool,
    pub quote_id: String,
    pub quotes: Arc<Mutex<Vec<QuoteRequest>>>,
}

impl MockPayoutProvider {
    pub fn new(recipients: Vec<Recipient>) -> Self {
        Self {
            recipients,
            fail_account_details: false,
            quote_id: "quote-1".to_owned(),
            quotes: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn quotes_handle(&self) -> Arc<Mutex<Vec<QuoteRequest>>> {
        Arc::clone(&self.quotes)
    }
}

impl PayoutProvider for MockPayoutProvider {
    async fn fetch_account_details(&self) -> Result<serde_json::Value, PaymentsServiceError> {
        if self.fail_account_details {
            return Err(PaymentsServiceError::Provider(anyhow::anyhow!(
                "provider returned 401 Unauthorized"
            )));
        }
        Ok(serde_json::json!({ "profile": 12345 }))
    }

    async fn fetch_recipients(
        &self,
        _currency: &str,
    ) -> Result<Vec<Recipient>, PaymentsServiceError> {
        Ok(self.recipients.clone())
    }

    async fn create_quote(&self, request: &QuoteRequest) -> Result<Quote, PaymentsServiceError> {
        self.quotes.lock().unwrap().push(request.clone());
        Ok(Quote {
            id: self.quote_id.clone(),
        })
    }
}

// ── MockPublisher ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPublisher {
    pub published: Arc<Mutex<Vec<(String, DomainEvent)>>>,
    pub fail: bool,
}

impl MockPublisher {
    pub fn published_handle(&self) -> Arc<Mutex<Vec<(String, DomainEvent)>>> {
        Arc::clone(&self.published)
    }
}

impl EventPublisher for MockPublisher {
    async fn publish(&self, queue: &str, event: &DomainEvent) -> Result<(), PaymentsServiceError> {
        if self.fail {
            return Err(unavailable("insert stored event"));
        }
        self.published
            .lock()
            .unwrap()
            .push((queue.to_owned(), event.clone()));
        Ok(())
    }
}

// ── Test fixture helpers ─────────────────────────────────────────────────────

pub const TEST_QUEUE: &str = "payment_events";

pub fn test_payment(customer_id: &str) -> Payment {
    Payment {
        payment_id: Uuid::new_v4(),
        amount: Decimal::new(10_000, 2),
        currency: "USD".to_owned(),
        customer_id: customer_id.to_owned(),
        recipient_id: "701234".to_owned(),
        wise_payment_id: "quote-1".to_owned(),
        status: PaymentStatus::Succeeded,
        created_at: Utc::now(),
    }
}

pub fn test_event(customer_id: &str) -> DomainEvent {
    test_payment(customer_id).created_event()
}

/// An unprocessed stored event created `age_secs` seconds ago.
pub fn stored_event(customer_id: &str, age_secs: i64) -> StoredEvent {
    let mut stored = StoredEvent::pending(TEST_QUEUE, &test_event(customer_id)).unwrap();
    stored.created_at = Utc::now() - chrono::Duration::seconds(age_secs);
    stored
}

pub fn customer_of(event: &DomainEvent) -> &str {
    match event {
        DomainEvent::PaymentCreated(data) => &data.customer_id,
    }
}
