use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::errors::VendorError;

// ============ Lookup ============

/// `caller_name` sub-record of a Lookup response (caller-name add-on).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallerName {
    /// Registered caller name (CNAM).
    pub caller_name: Option<String>,
    /// "BUSINESS", "CONSUMER" or "UNDETERMINED".
    pub caller_type: Option<String>,
    pub error_code: Option<i64>,
}

/// `carrier` sub-record of a Lookup response (carrier add-on).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Carrier {
    pub mobile_country_code: Option<String>,
    pub mobile_network_code: Option<String>,
    /// Carrier name.
    pub name: Option<String>,
    /// "mobile", "landline" or "voip".
    #[serde(rename = "type")]
    pub carrier_type: Option<String>,
    pub error_code: Option<i64>,
}

/// Body of `GET /v1/PhoneNumbers/{number}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhoneNumberLookup {
    pub phone_number: String,
    pub national_format: Option<String>,
    pub country_code: Option<String>,
    /// Absent unless the caller-name type was requested and is entitled.
    pub caller_name: Option<CallerName>,
    /// Absent unless the carrier type was requested and is entitled.
    pub carrier: Option<Carrier>,
    pub add_ons: Option<Value>,
    pub url: Option<String>,
}

/// A successful lookup: the decoded record plus the body exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub lookup: PhoneNumberLookup,
    pub raw: Value,
}

/// A structured field that could not be read from a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionError {
    /// The account has no caller-name entitlement, or it was not requested.
    MissingCallerName,
    /// The account has no carrier entitlement, or it was not requested.
    MissingCarrier,
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionError::MissingCallerName => write!(f, "lookup has no caller_name record"),
            ExtractionError::MissingCarrier => write!(f, "lookup has no carrier record"),
        }
    }
}

impl std::error::Error for ExtractionError {}

impl ValidationResult {
    pub fn from_json(raw: Value) -> Result<Self, serde_json::Error> {
        let lookup = serde_json::from_value(raw.clone())?;
        Ok(Self { lookup, raw })
    }

    /// The response body in compact JSON, as stored in the `VALID` column.
    pub fn raw_text(&self) -> String {
        self.raw.to_string()
    }

    // A present sub-record with a null value reads as "".

    pub fn account_name(&self) -> Result<String, ExtractionError> {
        let caller = self.caller_name()?;
        Ok(caller.caller_name.clone().unwrap_or_default())
    }

    pub fn account_type(&self) -> Result<String, ExtractionError> {
        let caller = self.caller_name()?;
        Ok(caller.caller_type.clone().unwrap_or_default())
    }

    pub fn carrier_name(&self) -> Result<String, ExtractionError> {
        let carrier = self.carrier()?;
        Ok(carrier.name.clone().unwrap_or_default())
    }

    pub fn carrier_type(&self) -> Result<String, ExtractionError> {
        let carrier = self.carrier()?;
        Ok(carrier.carrier_type.clone().unwrap_or_default())
    }

    fn caller_name(&self) -> Result<&CallerName, ExtractionError> {
        self.lookup
            .caller_name
            .as_ref()
            .ok_or(ExtractionError::MissingCallerName)
    }

    fn carrier(&self) -> Result<&Carrier, ExtractionError> {
        self.lookup
            .carrier
            .as_ref()
            .ok_or(ExtractionError::MissingCarrier)
    }
}

/// Three-way outcome of a number validation.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(ValidationResult),
    /// The number does not resolve at the provider.
    NotFound,
    /// Any other vendor failure. Never to be read as "not found".
    Failed(VendorError),
}

impl LookupOutcome {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupOutcome::NotFound)
    }
}

impl fmt::Display for LookupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupOutcome::Found(result) => write!(f, "{}", result.raw_text()),
            LookupOutcome::NotFound => write!(f, "NOT FOUND"),
            LookupOutcome::Failed(e) => write!(f, "FAILED ({})", e),
        }
    }
}

// ============ Messaging ============

/// Body of `POST /2010-04-01/Accounts/{sid}/Messages.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub sid: String,
    pub status: Option<String>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub body: Option<String>,
    pub num_segments: Option<String>,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
    /// RFC 2822 timestamp, kept as sent.
    pub date_created: Option<String>,
}

// ============ Studio ============

/// A Studio Flow execution (`/v2/Flows/{flow}/Executions/{sid}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub sid: String,
    pub account_sid: Option<String>,
    pub flow_sid: Option<String>,
    pub contact_channel_address: Option<String>,
    /// "active" or "ended".
    pub status: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

impl Execution {
    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }
}

/// Accumulated flow context of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub account_sid: Option<String>,
    pub flow_sid: Option<String>,
    pub execution_sid: Option<String>,
    #[serde(default)]
    pub context: Value,
    pub url: Option<String>,
}

/// Context captured by a single step of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepContext {
    pub account_sid: Option<String>,
    pub flow_sid: Option<String>,
    pub execution_sid: Option<String>,
    pub step_sid: Option<String>,
    #[serde(default)]
    pub context: Value,
    pub url: Option<String>,
}

// ============ Marketplace ============

/// An add-on available to the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOn {
    pub sid: String,
    pub friendly_name: String,
    pub description: Option<String>,
    pub pricing_type: Option<String>,
    pub url: Option<String>,
}

/// One page of `GET /marketplace/AvailableAddOns`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddOnPage {
    #[serde(default)]
    pub available_add_ons: Vec<AddOn>,
    pub meta: Option<Value>,
}

impl AddOnPage {
    /// Absolute URL of the following page, `None` on the last one.
    pub fn next_page_url(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.get("next_page_url"))
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }
}
