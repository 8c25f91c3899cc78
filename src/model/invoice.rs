use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Persisted invoice record. Amount and identity columns stay NULL when the
/// extractor could not read them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct InvoiceIncome {
    pub id: u64,
    pub project_id: u64,

    #[schema(nullable = true)]
    pub invoice_number: Option<String>,

    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub issue_date: Option<NaiveDate>,

    #[schema(nullable = true)]
    pub issuer_name: Option<String>,
    #[schema(nullable = true)]
    pub issuer_rut: Option<String>,
    #[schema(nullable = true)]
    pub issuer_giro: Option<String>,
    #[schema(nullable = true)]
    pub client_name: Option<String>,
    #[schema(nullable = true)]
    pub client_rut: Option<String>,
    #[schema(nullable = true)]
    pub client_giro: Option<String>,

    #[schema(nullable = true)]
    pub net_amount: Option<f64>,
    #[schema(nullable = true)]
    pub iva_amount: Option<f64>,
    #[schema(nullable = true)]
    pub total_amount: Option<f64>,

    #[schema(example = "partial_success")]
    pub extraction_status: String,

    /// Comma separated list of fields the extractor could not read.
    #[schema(nullable = true)]
    pub missing_fields: Option<String>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
