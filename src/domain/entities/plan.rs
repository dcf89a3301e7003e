use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_interval", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanInterval {
    Day,
    Week,
    Month,
    Year,
}

impl PlanInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanInterval::Day => "day",
            PlanInterval::Week => "week",
            PlanInterval::Month => "month",
            PlanInterval::Year => "year",
        }
    }
}

impl std::str::FromStr for PlanInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(PlanInterval::Day),
            "week" => Ok(PlanInterval::Week),
            "month" => Ok(PlanInterval::Month),
            "year" => Ok(PlanInterval::Year),
            _ => Err(format!("Invalid plan interval: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub id: Uuid,
    pub stripe_id: String,
    pub name: Option<String>,
    /// Price per interval in the smallest currency unit. None for tiered pricing.
    pub amount: Option<i64>,
    pub currency: String,
    pub interval: PlanInterval,
    pub interval_count: i32,
    pub trial_period_days: Option<i32>,
    pub active: bool,
    pub metadata: HashMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => f.write_str(&self.stripe_id),
        }
    }
}
