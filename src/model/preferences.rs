use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

pub const PREFERENCES_VERSION: u32 = 1;

/// Filter selections a user keeps across sessions. Stored as JSON text and
/// decoded only at the storage boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ViewPreferences {
    #[schema(example = 1)]
    pub version: u32,

    #[schema(example = "in_progress", nullable = true)]
    pub task_status: Option<String>,

    #[schema(nullable = true)]
    pub project_id: Option<u64>,
    #[schema(nullable = true)]
    pub tower_id: Option<u64>,
    #[schema(nullable = true)]
    pub floor_id: Option<u64>,
    #[schema(nullable = true)]
    pub worker_id: Option<u64>,

    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub date_from: Option<NaiveDate>,

    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub date_to: Option<NaiveDate>,
}

impl Default for ViewPreferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            task_status: None,
            project_id: None,
            tower_id: None,
            floor_id: None,
            worker_id: None,
            date_from: None,
            date_to: None,
        }
    }
}

impl ViewPreferences {
    /// Decodes a stored payload. Unversioned payloads use the old flat
    /// browser-storage keys; unreadable or newer payloads fall back to defaults.
    pub fn decode(raw: &str) -> Self {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable view preferences, using defaults");
                return Self::default();
            }
        };

        match value.get("version").and_then(Value::as_u64) {
            None => Self::from_legacy(&value),
            Some(v) if v == PREFERENCES_VERSION as u64 => {
                serde_json::from_value(value).unwrap_or_default()
            }
            Some(v) => {
                tracing::warn!(version = v, "Unknown view preferences version, using defaults");
                Self::default()
            }
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.version != PREFERENCES_VERSION {
            return Err(format!("unsupported preferences version {}", self.version));
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err("date_from cannot be after date_to".to_string());
            }
        }
        Ok(())
    }

    fn from_legacy(value: &Value) -> Self {
        let id = |key: &str| -> Option<u64> {
            match value.get(key)? {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            }
        };
        let date = |key: &str| -> Option<NaiveDate> {
            value
                .get(key)
                .and_then(Value::as_str)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        };
        let status = value
            .get("statusFilter")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty() && *s != "all")
            .map(str::to_string);

        Self {
            version: PREFERENCES_VERSION,
            task_status: status,
            project_id: id("projectFilter"),
            tower_id: id("towerFilter"),
            floor_id: id("floorFilter"),
            worker_id: id("workerFilter"),
            date_from: date("dateFrom"),
            date_to: date("dateTo"),
        }
    }
}
