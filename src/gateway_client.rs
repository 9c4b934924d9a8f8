use crate::config::Config;
use crate::errors::{AppError, ResultExt, VendorError, TWILIO_ALPHA_SENDER_REJECTED};
use crate::models::{
    AddOn, AddOnPage, Execution, ExecutionContext, LookupOutcome, MessageReceipt, StepContext,
    ValidationResult,
};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Lookup data packages requested by default. Each one is billed separately.
pub const DEFAULT_LOOKUP_TYPES: [&str; 2] = ["carrier", "caller-name"];

/// The one capability the enrichment pipeline needs from the provider.
#[async_trait]
pub trait NumberValidator: Send + Sync {
    /// Looks a number up. Never fails: not-found and other vendor errors are
    /// folded into the returned outcome.
    async fn validate(&self, number: &str) -> LookupOutcome;
}

/// Client for the Twilio Lookup, Messaging, Studio and Marketplace APIs.
///
/// Holds only immutable configuration; every operation is a single request.
#[derive(Clone)]
pub struct TwilioGateway {
    client: reqwest::Client,
    config: Config,
    lookup_types: Vec<String>,
}

impl TwilioGateway {
    /// Creates a new `TwilioGateway` requesting the default lookup types.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.http_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            AppError::Config(format!("Failed to create Twilio HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            config,
            lookup_types: DEFAULT_LOOKUP_TYPES.iter().map(|t| t.to_string()).collect(),
        })
    }

    /// Replaces the lookup data packages. An empty list asks for basic
    /// format validation only.
    pub fn with_lookup_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lookup_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetches a lookup, surfacing every failure (including not-found) as an error.
    pub async fn fetch_lookup(&self, number: &str) -> Result<ValidationResult, AppError> {
        let url = endpoint(&self.config.endpoints.lookups, &["v1", "PhoneNumbers", number])?;

        let mut query: Vec<(&str, &str)> = self
            .lookup_types
            .iter()
            .map(|t| ("Type", t.as_str()))
            .collect();
        if let Some(ref country) = self.config.lookup_country_code {
            query.push(("CountryCode", country.as_str()));
        }

        tracing::debug!("Looking up {} ({:?})", number, self.lookup_types);
        let raw: Value = self.get_json(url, &query).await?;
        ValidationResult::from_json(raw).map_err(|e| {
            AppError::Vendor(VendorError::transport(format!(
                "Failed to parse lookup response: {}",
                e
            )))
        })
    }

    /// Sends an SMS from the numeric sender.
    ///
    /// A number that does not exist and any other send error both come back
    /// as `None`; callers only learn whether the message went out.
    pub async fn send_message(&self, to: &str, body: &str) -> Option<MessageReceipt> {
        tracing::info!("Sending notification to {}", to);
        tracing::info!("Message: {}", body);

        let result = self
            .create_message(&self.config.phone_number, to, body)
            .await;
        let receipt = self.report("send message", result)?;
        tracing::info!("✓ Message queued: {}", receipt.sid);
        Some(receipt)
    }

    /// Sends an SMS from the alphanumeric sender, retrying once from the
    /// numeric sender if the destination does not accept alpha senders.
    pub async fn send_message_with_alias(&self, to: &str, body: &str) -> Option<MessageReceipt> {
        let Some(alpha) = self.config.phone_number_alpha.as_deref() else {
            tracing::debug!("No alpha sender configured, sending from numeric sender");
            return self.send_message(to, body).await;
        };

        tracing::info!("Sending notification to {} as {}", to, alpha);
        match self.create_message(alpha, to, body).await {
            Ok(receipt) => {
                tracing::info!("✓ Message queued: {}", receipt.sid);
                Some(receipt)
            }
            Err(e)
                if e
                    .vendor()
                    .is_some_and(|v| v.has_code(TWILIO_ALPHA_SENDER_REJECTED)) =>
            {
                tracing::warn!("Alpha sender rejected for {}, retrying without alias", to);
                self.send_message(to, body).await
            }
            Err(e) => self.report("send message with alias", Err(e)),
        }
    }

    /// Starts a Studio Flow execution for `to`, passing `params` as flow data.
    pub async fn start_flow(&self, to: &str, params: &Map<String, Value>) -> Option<Execution> {
        let result = self.create_execution(to, params).await;
        let execution = self.report("start flow", result)?;
        tracing::info!(
            "✓ Execution {} started for {} ({})",
            execution.sid,
            to,
            execution.status.as_deref().unwrap_or("unknown")
        );
        Some(execution)
    }

    pub async fn get_execution(&self, execution_sid: &str) -> Option<Execution> {
        let result = self
            .fetch_studio(&[execution_sid])
            .await
            .with_context(|| format!("fetching execution {}", execution_sid));
        self.report("get execution", result)
    }

    pub async fn get_execution_context(&self, execution_sid: &str) -> Option<ExecutionContext> {
        let result = self
            .fetch_studio(&[execution_sid, "Context"])
            .await
            .with_context(|| format!("fetching context of execution {}", execution_sid));
        self.report("get execution context", result)
    }

    pub async fn get_step_context(
        &self,
        execution_sid: &str,
        step_sid: &str,
    ) -> Option<StepContext> {
        let result = self
            .fetch_studio(&[execution_sid, "Steps", step_sid, "Context"])
            .await
            .with_context(|| {
                format!(
                    "fetching context of step {} in execution {}",
                    step_sid, execution_sid
                )
            });
        self.report("get step context", result)
    }

    /// Lists the Marketplace add-ons available to the account, across every page.
    pub async fn available_add_ons(&self) -> Option<Vec<AddOn>> {
        let result = self.fetch_add_on_pages().await;
        let add_ons = self.report("list add-ons", result)?;
        for add_on in &add_ons {
            tracing::info!(
                "Add on: name: {}  SID: {}",
                add_on.friendly_name,
                add_on.sid
            );
        }
        Some(add_ons)
    }

    /// Follows `meta.next_page_url` until the last page, one request per page.
    async fn fetch_add_on_pages(&self) -> Result<Vec<AddOn>, AppError> {
        let mut url = endpoint(
            &self.config.endpoints.preview,
            &["marketplace", "AvailableAddOns"],
        )?;
        let mut add_ons = Vec::new();
        loop {
            let page: AddOnPage = self.get_json(url, &[]).await?;
            let next = page.next_page_url().map(str::to_string);
            add_ons.extend(page.available_add_ons);
            match next {
                Some(next) => {
                    url = Url::parse(&next).map_err(|e| {
                        VendorError::transport(format!("bad next_page_url {}: {}", next, e))
                    })?;
                    tracing::debug!("Fetching next add-on page: {}", url);
                }
                None => break,
            }
        }
        Ok(add_ons)
    }

    async fn fetch_studio<T: DeserializeOwned>(&self, tail: &[&str]) -> Result<T, AppError> {
        let url = self.execution_url(tail)?;
        self.get_json(url, &[]).await
    }

    async fn create_message(
        &self,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<MessageReceipt, AppError> {
        let url = endpoint(
            &self.config.endpoints.api,
            &[
                "2010-04-01",
                "Accounts",
                self.config.account_sid.as_str(),
                "Messages.json",
            ],
        )?;
        self.post_form(url, &[("To", to), ("From", from), ("Body", body)])
            .await
    }

    async fn create_execution(
        &self,
        to: &str,
        params: &Map<String, Value>,
    ) -> Result<Execution, AppError> {
        let url = self.execution_url(&[])?;
        let parameters = Value::Object(params.clone()).to_string();
        self.post_form(
            url,
            &[
                ("To", to),
                ("From", self.config.phone_number.as_str()),
                ("Parameters", parameters.as_str()),
            ],
        )
        .await
    }

    fn execution_url(&self, tail: &[&str]) -> Result<Url, AppError> {
        let mut segments = vec!["v2", "Flows", self.config.flow_sid.as_str(), "Executions"];
        segments.extend_from_slice(tail);
        endpoint(&self.config.endpoints.studio, &segments)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .query(query)
            .send()
            .await?;
        decode(response).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        url: Url,
        form: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(form)
            .send()
            .await?;
        decode(response).await
    }

    /// Logs a failed call with its vendor code and turns it into `None`.
    fn report<T>(&self, operation: &str, result: Result<T, AppError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                match e.vendor() {
                    Some(v) => tracing::error!(
                        status = v.status,
                        code = ?v.code,
                        more_info = ?v.more_info,
                        "Twilio {} failed: {}",
                        operation,
                        e
                    ),
                    None => tracing::error!("Twilio {} failed: {}", operation, e),
                }
                None
            }
        }
    }
}

#[async_trait]
impl NumberValidator for TwilioGateway {
    async fn validate(&self, number: &str) -> LookupOutcome {
        match self.fetch_lookup(number).await {
            Ok(result) => LookupOutcome::Found(result),
            Err(e) => match e.vendor() {
                Some(v) if v.is_not_found() => {
                    tracing::debug!("{} not found at provider", number);
                    LookupOutcome::NotFound
                }
                Some(v) => {
                    tracing::error!("Lookup of {} failed: {}", number, v);
                    LookupOutcome::Failed(v.clone())
                }
                None => {
                    tracing::error!("Lookup of {} failed: {}", number, e);
                    LookupOutcome::Failed(VendorError::transport(e.to_string()))
                }
            },
        }
    }
}

/// Joins path segments onto a base URL, percent-encoding each segment.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, AppError> {
    let mut url = Url::parse(base)
        .map_err(|e| AppError::Config(format!("Invalid base URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Config(format!("Base URL cannot take a path: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Decodes a Twilio response, turning non-2xx bodies into `VendorError`.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let mut vendor = serde_json::from_str::<VendorError>(&error_text)
            .unwrap_or_else(|_| VendorError::transport(error_text));
        vendor.status = status.as_u16();
        return Err(AppError::Vendor(vendor));
    }

    response.json().await.map_err(|e| {
        AppError::Vendor(VendorError::transport(format!(
            "Failed to parse Twilio response: {}",
            e
        )))
    })
}
