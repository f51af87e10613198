use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One flat data record as it moves through the pipeline. Ingestion sees the
/// base fields; each transformation stage accumulates its derived fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub value: f64,
    pub quantity: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,

    // Added by processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,

    // Added by transformation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_high_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_avg_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformed_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn base(
        id: i64,
        name: String,
        category: String,
        value: f64,
        quantity: i64,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            category,
            value,
            quantity,
            is_active,
            created_at,
            total_value: None,
            processed_by: None,
            processed_at: None,
            is_high_value: None,
            tier: None,
            category_avg_value: None,
            transformed_by: None,
            transformed_at: None,
        }
    }
}
