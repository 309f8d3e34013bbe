//! Resolves `{event_type, event attributes}` to an ordered list of platform
//! targets, via rule caches populated once at construction and reloadable.

use std::collections::HashMap;

use regex::Regex;
use sqlx::PgPool;

use crate::domain::Event;
use crate::domain::EventType;
use crate::domain::PlatformDefinition;
use crate::store::PlatformStore;
use crate::store::RoutingRuleStore;

#[derive(Debug, Clone)]
pub enum Condition {
    Equals(serde_json::Value),
    NotEquals(serde_json::Value),
    Contains(String),
    NotContains(String),
    In(Vec<serde_json::Value>),
    NotIn(Vec<serde_json::Value>),
    GreaterThan(f64),
    LessThan(f64),
    Regex(Regex),
}

impl Condition {
    /// Parses one rule-condition entry from its stored JSON shape:
    /// `{"op": "equals", "value": ...}`, or a bare scalar for equality.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, anyhow::Error> {
        let Some(obj) = value.as_object() else {
            return Ok(Self::Equals(value.clone()));
        };
        let Some(op) = obj.get("op").and_then(|v| v.as_str()) else {
            return Ok(Self::Equals(value.clone()));
        };
        let arg = obj.get("value").cloned().unwrap_or(serde_json::Value::Null);
        match op {
            "equals" => Ok(Self::Equals(arg)),
            "not_equals" => Ok(Self::NotEquals(arg)),
            "contains" => Ok(Self::Contains(arg.as_str().unwrap_or_default().to_lowercase())),
            "not_contains" => Ok(Self::NotContains(arg.as_str().unwrap_or_default().to_lowercase())),
            "in" => Ok(Self::In(arg.as_array().cloned().unwrap_or_default())),
            "not_in" => Ok(Self::NotIn(arg.as_array().cloned().unwrap_or_default())),
            "greater_than" => Ok(Self::GreaterThan(arg.as_f64().unwrap_or_default())),
            "less_than" => Ok(Self::LessThan(arg.as_f64().unwrap_or_default())),
            "regex" => Ok(Self::Regex(Regex::new(arg.as_str().unwrap_or_default())?)),
            other => anyhow::bail!("unknown routing condition operator: {other:?}"),
        }
    }

    fn matches(
        &self,
        field_value: &serde_json::Value,
    ) -> bool {
        match self {
            Self::Equals(v) => field_value == v,
            Self::NotEquals(v) => field_value != v,
            Self::Contains(needle) => field_value.as_str().is_some_and(|s| s.to_lowercase().contains(needle)),
            Self::NotContains(needle) => !field_value.as_str().is_some_and(|s| s.to_lowercase().contains(needle)),
            Self::In(list) => list.contains(field_value),
            Self::NotIn(list) => !list.contains(field_value),
            Self::GreaterThan(n) => field_value.as_f64().is_some_and(|v| v > *n),
            Self::LessThan(n) => field_value.as_f64().is_some_and(|v| v < *n),
            Self::Regex(re) => field_value.as_str().is_some_and(|s| re.is_match(s)),
        }
    }
}

#[derive(Clone)]
pub struct RoutingRule {
    pub id: i32,
    pub event_type: EventType,
    pub platform_id: i32,
    pub conditions: HashMap<String, Condition>,
    pub priority: i32,
}

/// Resolves a field name (real or virtual) against an Event to the JSON
/// value a `Condition` compares against.
fn field_value(
    event: &Event,
    field: &str,
) -> serde_json::Value {
    match field {
        "email_domain" => serde_json::json!(event.email_domain()),
        "has_phone" => serde_json::json!(event.has_phone()),
        "revenue_amount" => serde_json::json!(event.revenue_amount()),
        "is_gmail" => serde_json::json!(event.is_gmail()),
        "is_mobile" => serde_json::json!(event.is_mobile()),
        "email" => serde_json::json!(event.email),
        "phone" => serde_json::json!(event.phone),
        "first_name" => serde_json::json!(event.first_name),
        "last_name" => serde_json::json!(event.last_name),
        "acq_source" => serde_json::json!(event.acquisition.source),
        "acq_campaign" => serde_json::json!(event.acquisition.campaign),
        "cur_medium" => serde_json::json!(event.current.medium),
        other => event.event_data.get(other).cloned().unwrap_or(serde_json::Value::Null),
    }
}

impl RoutingRule {
    fn matches(
        &self,
        event: &Event,
    ) -> bool {
        self.conditions.iter().all(|(field, condition)| condition.matches(&field_value(event, field)))
    }
}

#[derive(Clone)]
pub struct Router {
    platforms_by_id: HashMap<i32, PlatformDefinition>,
    rules_by_event_type: HashMap<EventType, Vec<RoutingRule>>,
}

impl Router {
    #[tracing::instrument(skip(pool))]
    pub async fn load(pool: &PgPool) -> Result<Self, anyhow::Error> {
        let platforms = PlatformStore::list_active(pool).await?;
        let platforms_by_id: HashMap<i32, PlatformDefinition> = platforms.into_iter().map(|p| (p.id, p)).collect();

        let rows = RoutingRuleStore::list_active(pool).await?;
        let mut rules_by_event_type: HashMap<EventType, Vec<RoutingRule>> = HashMap::new();
        for row in rows {
            let event_type = row.event_type.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let conditions = row
                .conditions
                .as_object()
                .map(|obj| {
                    obj.iter()
                        .map(|(k, v)| Condition::from_json(v).map(|c| (k.clone(), c)))
                        .collect::<Result<HashMap<_, _>, _>>()
                })
                .transpose()?
                .unwrap_or_default();
            rules_by_event_type.entry(event_type).or_default().push(RoutingRule {
                id: row.id,
                event_type,
                platform_id: row.platform_id,
                conditions,
                priority: row.priority,
            });
        }
        for rules in rules_by_event_type.values_mut() {
            rules.sort_by_key(|r| r.priority);
        }

        Ok(Self { platforms_by_id, rules_by_event_type })
    }

    /// Offline/admin operation only — not called under load from workers.
    pub async fn reload(
        &mut self,
        pool: &PgPool,
    ) -> Result<(), anyhow::Error> {
        *self = Self::load(pool).await?;
        Ok(())
    }

    pub fn get_platform_by_id(
        &self,
        id: i32,
    ) -> Option<&PlatformDefinition> {
        self.platforms_by_id.get(&id)
    }

    pub fn get_validation_platform(&self) -> Option<&PlatformDefinition> {
        self.platforms_by_id.values().find(|p| p.platform_type == crate::domain::PlatformType::Validation)
    }

    /// §4.3: match, dedupe by platform id, order by priority ascending.
    pub fn get_routes_for_event(
        &self,
        event: &Event,
    ) -> Vec<&PlatformDefinition> {
        let Some(rules) = self.rules_by_event_type.get(&event.event_type) else {
            return Vec::new();
        };

        let mut seen = std::collections::HashSet::new();
        let mut matched: Vec<&PlatformDefinition> = Vec::new();
        for rule in rules {
            if !rule.matches(event) {
                continue;
            }
            let Some(platform) = self.platforms_by_id.get(&rule.platform_id) else {
                continue;
            };
            if seen.insert(platform.id) {
                matched.push(platform);
            }
        }
        matched.sort_by_key(|p| p.priority);
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AcquisitionBlock;
    use crate::domain::CurrentTouch;
    use crate::domain::EventStatus;
    use crate::domain::EventType;
    use chrono::Utc;

    fn sample_event() -> Event {
        Event {
            id: 1,
            event_id: uuid::Uuid::new_v4(),
            event_type: EventType::Lead,
            email: Some("jane@gmail.com".to_string()),
            email_md5: None,
            phone: Some("14155552671".to_string()),
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            ip: None,
            acquisition: AcquisitionBlock::default(),
            current: CurrentTouch::default(),
            purchase: None,
            email_validation_status: None,
            zb_last_active: None,
            event_data: serde_json::json!({}),
            status: EventStatus::Pending,
            blocked_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn bare_scalar_condition_parses_as_equals() {
        let condition = Condition::from_json(&serde_json::json!("gmail.com")).unwrap();
        assert!(matches!(condition, Condition::Equals(_)));
    }

    #[test]
    fn is_gmail_virtual_field_matches_equals_true() {
        let condition = Condition::from_json(&serde_json::json!({"op": "equals", "value": true})).unwrap();
        assert!(condition.matches(&field_value(&sample_event(), "is_gmail")));
    }

    #[test]
    fn contains_condition_is_case_insensitive() {
        let condition = Condition::from_json(&serde_json::json!({"op": "contains", "value": "GMAIL"})).unwrap();
        assert!(condition.matches(&serde_json::json!("jane@gmail.com")));
    }

    #[test]
    fn routing_rule_requires_every_condition_to_match() {
        let mut conditions = HashMap::new();
        conditions.insert("is_gmail".to_string(), Condition::from_json(&serde_json::json!({"op": "equals", "value": true})).unwrap());
        conditions.insert("has_phone".to_string(), Condition::from_json(&serde_json::json!({"op": "equals", "value": false})).unwrap());
        let rule = RoutingRule { id: 1, event_type: EventType::Lead, platform_id: 1, conditions, priority: 100 };

        // sample_event() has a phone, so the has_phone=false condition fails.
        assert!(!rule.matches(&sample_event()));
    }
}
