use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::prelude::ToPrimitive as _;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::domain::repository::PayoutProvider;
use crate::domain::types::{Quote, QuoteRequest, Recipient};
use crate::error::PaymentsServiceError;

/// Wise REST API client scoped to one business profile.
#[derive(Clone)]
pub struct WiseClient {
    client: Client,
    base_url: String,
    /// Pre-built `Bearer` header, marked sensitive.
    authorization: HeaderValue,
    profile_id: u64,
}

#[derive(Deserialize)]
struct AccountsPage {
    #[serde(default)]
    content: Vec<AccountEntry>,
}

#[derive(Deserialize)]
struct AccountEntry {
    id: i64,
}

#[derive(Deserialize)]
struct QuoteBody {
    id: serde_json::Value,
}

impl WiseClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        profile_id: u64,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build provider HTTP client")?;
        let mut authorization =
            HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
                .context("WISE_API_KEY is not a valid header value")?;
        authorization.set_sensitive(true);
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            authorization,
            profile_id,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, self.authorization.clone())
    }

    async fn send(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<Response, PaymentsServiceError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .with_context(|| format!("{what}: request failed"))
            .map_err(PaymentsServiceError::Provider)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PaymentsServiceError::Provider(anyhow::anyhow!(
            "{what}: provider returned {status}: {body}"
        )))
    }

    async fn json<T: serde::de::DeserializeOwned>(
        response: Response,
        what: &str,
    ) -> Result<T, PaymentsServiceError> {
        response
            .json::<T>()
            .await
            .with_context(|| format!("{what}: malformed provider response"))
            .map_err(PaymentsServiceError::Provider)
    }
}

impl PayoutProvider for WiseClient {
    async fn fetch_account_details(&self) -> Result<serde_json::Value, PaymentsServiceError> {
        let url = format!(
            "{}/v1/profiles/{}/account-details",
            self.base_url, self.profile_id
        );
        let response = self.send(self.client.get(url), "account details").await?;
        Self::json(response, "account details").await
    }

    async fn fetch_recipients(
        &self,
        currency: &str,
    ) -> Result<Vec<Recipient>, PaymentsServiceError> {
        let profile = self.profile_id.to_string();
        let request = self
            .client
            .get(format!("{}/v2/accounts", self.base_url))
            .query(&[("profile", profile.as_str()), ("currency", currency)]);
        let response = self.send(request, "recipients").await?;
        let page: AccountsPage = Self::json(response, "recipients").await?;
        Ok(page
            .content
            .into_iter()
            .map(|a| Recipient { id: a.id })
            .collect())
    }

    async fn create_quote(&self, request: &QuoteRequest) -> Result<Quote, PaymentsServiceError> {
        let url = format!("{}/v3/profiles/{}/quotes", self.base_url, self.profile_id);
        let body = json!({
            "sourceCurrency": request.source_currency,
            "targetCurrency": request.target_currency,
            "sourceAmount": request.source_amount.to_f64(),
            "targetAmount": null,
            "payOut": null,
            "preferredPayIn": null,
            "targetAccount": request.target_account,
            "paymentMetadata": {
                "transferNature": format!(
                    "{}_TO_{}_PAYOUT",
                    request.source_currency, request.target_currency
                ),
            },
        });
        let response = self
            .send(self.client.post(url).json(&body), "create quote")
            .await?;
        let quote: QuoteBody = Self::json(response, "create quote").await?;
        // Wise returns a UUID string for v3 quotes; older profiles return a number.
        let id = match quote.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(Quote { id })
    }
}
