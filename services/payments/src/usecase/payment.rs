use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use paygate_core::pagination::PageRequest;

use crate::domain::repository::{EventPublisher, PaymentRepository, PayoutProvider};
use crate::domain::types::{Payment, PaymentResponse, PaymentStatus, QuoteRequest};
use crate::error::PaymentsServiceError;

pub struct CreatePaymentInput {
    pub amount: Decimal,
    pub currency: String,
    pub customer_id: String,
}

impl CreatePaymentInput {
    fn validate(&self) -> Result<(), PaymentsServiceError> {
        if self.amount <= Decimal::ZERO {
            return Err(PaymentsServiceError::InvalidPaymentRequest(
                "amount must be positive".to_owned(),
            ));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PaymentsServiceError::InvalidPaymentRequest(
                "currency must be a 3-letter ISO code".to_owned(),
            ));
        }
        if self.customer_id.trim().is_empty() {
            return Err(PaymentsServiceError::InvalidPaymentRequest(
                "customerId is required".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Quote a payout with the provider, record the payment and publish
/// `payment.created` exactly once.
pub struct CreatePaymentUseCase<P, R, E>
where
    P: PayoutProvider,
    R: PaymentRepository,
    E: EventPublisher,
{
    pub provider: P,
    pub payments: R,
    pub publisher: E,
    /// Queue receiving `payment.created`.
    pub queue: String,
    /// Payout currency requested from the provider (e.g. "INR").
    pub target_currency: String,
}

impl<P, R, E> CreatePaymentUseCase<P, R, E>
where
    P: PayoutProvider,
    R: PaymentRepository,
    E: EventPublisher,
{
    pub async fn execute(
        &self,
        input: CreatePaymentInput,
    ) -> Result<PaymentResponse, PaymentsServiceError> {
        input.validate()?;
        let currency = input.currency.to_ascii_uppercase();

        // 1. Make sure the provider profile is usable
        let account = self.provider.fetch_account_details().await?;
        debug!(account = %account, "provider account details");

        // 2. Resolve the payout recipient
        let recipient = self
            .provider
            .fetch_recipients(&self.target_currency)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PaymentsServiceError::Provider(anyhow::anyhow!(
                    "no recipients found for {}",
                    self.target_currency
                ))
            })?;

        // 3. Quote the transfer
        let quote = self
            .provider
            .create_quote(&QuoteRequest {
                source_currency: currency.clone(),
                target_currency: self.target_currency.clone(),
                source_amount: input.amount,
                target_account: recipient.id,
            })
            .await?;

        // 4. Record the payment (a quote counts as success)
        let payment = Payment {
            payment_id: Uuid::new_v4(),
            amount: input.amount,
            currency,
            customer_id: input.customer_id,
            recipient_id: recipient.id.to_string(),
            wise_payment_id: quote.id,
            status: PaymentStatus::Succeeded,
            created_at: Utc::now(),
        };
        self.payments.insert(&payment).await?;

        // 5. Publish payment.created
        self.publisher
            .publish(&self.queue, &payment.created_event())
            .await?;

        info!(
            payment_id = %payment.payment_id,
            quote_id = %payment.wise_payment_id,
            "payment created"
        );
        Ok(PaymentResponse {
            payment_id: payment.payment_id,
            status: PaymentStatus::Processing,
        })
    }
}

pub struct ListPaymentsUseCase<R: PaymentRepository> {
    pub repo: R,
}

impl<R: PaymentRepository> ListPaymentsUseCase<R> {
    pub async fn execute(&self, page: PageRequest) -> Result<Vec<Payment>, PaymentsServiceError> {
        self.repo.list(page.clamped()).await
    }
}

pub struct GetPaymentUseCase<R: PaymentRepository> {
    pub repo: R,
}

impl<R: PaymentRepository> GetPaymentUseCase<R> {
    pub async fn execute(&self, payment_id: Uuid) -> Result<Payment, PaymentsServiceError> {
        self.repo
            .find_by_id(payment_id)
            .await?
            .ok_or(PaymentsServiceError::PaymentNotFound)
    }
}
