use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Lead,
    Purchase,
    EmailOpen,
    EmailClick,
}

impl fmt::Display for EventType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::Lead => "lead",
            Self::Purchase => "purchase",
            Self::EmailOpen => "email_open",
            Self::EmailClick => "email_click",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead" => Ok(Self::Lead),
            "purchase" => Ok(Self::Purchase),
            "email_open" => Ok(Self::EmailOpen),
            "email_click" => Ok(Self::EmailClick),
            other => Err(format!("unknown event_type: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Blocked,
}

impl fmt::Display for EventStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "blocked" => Ok(Self::Blocked),
            other => Err(format!("unknown event status: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailValidationStatus {
    Valid,
    Invalid,
    CatchAll,
    Unknown,
    Role,
    Disposable,
}

impl fmt::Display for EmailValidationStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::CatchAll => "catch-all",
            Self::Unknown => "unknown",
            Self::Role => "role",
            Self::Disposable => "disposable",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EmailValidationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(Self::Valid),
            "invalid" => Ok(Self::Invalid),
            "catch-all" => Ok(Self::CatchAll),
            "unknown" => Ok(Self::Unknown),
            "role" => Ok(Self::Role),
            "disposable" => Ok(Self::Disposable),
            other => Err(format!("unknown email validation status: {other:?}")),
        }
    }
}

impl EmailValidationStatus {
    /// "Good for downstream" per spec.md §6.
    pub fn is_deliverable(self) -> bool { matches!(self, Self::Valid | Self::CatchAll | Self::Unknown | Self::Role) }
}

/// First-touch attribution, captured once at the earliest event for a
/// contact and carried forward by the linker.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionBlock {
    pub source: Option<String>,
    pub campaign: Option<String>,
    pub term: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub form_title: Option<String>,
}

impl AcquisitionBlock {
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.campaign.is_none() && self.term.is_none() && self.date.is_none() && self.form_title.is_none()
    }
}

/// This-touch attribution.
#[derive(Debug, Clone, Default)]
pub struct CurrentTouch {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub content: Option<String>,
    pub term: Option<String>,
    pub gclid: Option<String>,
    pub ga_client_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PurchaseBlock {
    pub offer: Option<String>,
    pub publisher: Option<String>,
    pub amount: Option<f64>,
    pub traffic_source: Option<String>,
    /// Residual `purchase_*` attributes that don't map to a named field.
    pub attributes: Value,
}

/// A single lead or purchase submission, and the unit the rest of the
/// pipeline operates on. Built once at intake, mutated only by the
/// `Processor`.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub event_id: Uuid,
    pub event_type: EventType,
    pub email: Option<String>,
    pub email_md5: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub ip: Option<String>,
    pub acquisition: AcquisitionBlock,
    pub current: CurrentTouch,
    pub purchase: Option<PurchaseBlock>,
    pub email_validation_status: Option<EmailValidationStatus>,
    pub zb_last_active: Option<i32>,
    pub event_data: Value,
    pub status: EventStatus,
    pub blocked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// `revenue_amount` virtual field used by routing conditions: 0 when
    /// absent rather than null, so numeric comparisons don't need a
    /// special-cased "missing" branch.
    pub fn revenue_amount(&self) -> f64 { self.purchase.as_ref().and_then(|p| p.amount).unwrap_or(0.0) }

    pub fn email_domain(&self) -> Option<&str> { self.email.as_deref().and_then(|e| e.split('@').nth(1)) }

    pub fn has_phone(&self) -> bool { self.phone.as_deref().is_some_and(|p| !p.is_empty()) }

    pub fn is_gmail(&self) -> bool { self.email_domain().is_some_and(|d| d.eq_ignore_ascii_case("gmail.com")) }

    pub fn is_mobile(&self) -> bool { self.phone.as_deref().is_some_and(|p| p.chars().filter(char::is_ascii_digit).count() >= 10) }
}
