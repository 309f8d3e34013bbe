use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformType {
    Crm,
    Analytics,
    Sms,
    Validation,
    Monetization,
    Email,
}

impl fmt::Display for PlatformType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::Crm => "crm",
            Self::Analytics => "analytics",
            Self::Sms => "sms",
            Self::Validation => "validation",
            Self::Monetization => "monetization",
            Self::Email => "email",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PlatformType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crm" => Ok(Self::Crm),
            "analytics" => Ok(Self::Analytics),
            "sms" => Ok(Self::Sms),
            "validation" => Ok(Self::Validation),
            "monetization" => Ok(Self::Monetization),
            "email" => Ok(Self::Email),
            other => Err(format!("unknown platform_type: {other:?}")),
        }
    }
}

/// Immutable for the lifetime of a worker process; `Router::reload` is the
/// only thing that re-reads it.
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    pub id: i32,
    pub platform_code: String,
    pub display_name: String,
    pub platform_type: PlatformType,
    pub is_active: bool,
    pub api_config: serde_json::Value,
    pub max_retries: i32,
    pub retry_delay_seconds: i32,
    pub timeout_seconds: i32,
    pub requires_valid_email: bool,
    pub priority: i32,
}

impl PlatformDefinition {
    /// The config an `AdapterFactory` should build from: the flat top-level
    /// config with any nested `api_config` map merged over it (§4.5, §9).
    pub fn merged_config(&self) -> serde_json::Value {
        let mut merged = serde_json::json!({
            "platform_code": self.platform_code,
            "timeout_seconds": self.timeout_seconds,
            "max_retries": self.max_retries,
            "retry_delay_seconds": self.retry_delay_seconds,
        });
        if let (Some(target), Some(extra)) = (merged.as_object_mut(), self.api_config.as_object()) {
            for (k, v) in extra {
                target.insert(k.clone(), v.clone());
            }
        }
        merged
    }
}
