use crate::{
    api::project::ensure_active_project,
    auth::auth::AuthUser,
    error::AppError,
    invoice::extractor::{ExtractionResult, extract},
    model::invoice::InvoiceIncome,
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

const INVOICE_COLUMNS: &str = "id, project_id, invoice_number, issue_date, issuer_name, issuer_rut, issuer_giro, \
     client_name, client_rut, client_giro, net_amount, iva_amount, total_amount, extraction_status, missing_fields, created_at";

#[derive(Deserialize, ToSchema)]
pub struct ExtractInvoice {
    pub project_id: u64,
    /// Text already extracted from the invoice PDF, one line per row.
    pub text: String,
    /// Persist the record even when some required fields are missing.
    #[serde(default)]
    pub accept_partial: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ExtractionResponse {
    #[schema(value_type = Object)]
    pub result: ExtractionResult,
    #[schema(nullable = true)]
    pub invoice: Option<InvoiceIncome>,
}

#[derive(Deserialize, IntoParams)]
pub struct InvoiceQuery {
    pub project_id: u64,
}

/// Runs the field extractor over the submitted text. Complete results are
/// stored; partial ones only with `accept_partial`; failures never are.
#[utoipa::path(
    post,
    path = "/api/invoices/extract",
    request_body = ExtractInvoice,
    responses(
        (status = 201, description = "Extracted and stored", body = ExtractionResponse),
        (status = 200, description = "Extracted, not stored", body = ExtractionResponse),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Invoices"
)]
pub async fn extract_invoice(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ExtractInvoice>,
) -> Result<HttpResponse, AppError> {
    auth.require_payments()?;
    ensure_active_project(pool.get_ref(), payload.project_id).await?;

    let result = extract(&payload.text);

    // Some(missing list) when the record should be stored
    let stored: Option<Option<String>> = match &result {
        ExtractionResult::Success { .. } => Some(None),
        ExtractionResult::PartialSuccess { missing, .. } if payload.accept_partial => {
            Some(Some(missing.join(",")))
        }
        ExtractionResult::PartialSuccess { missing, .. } => {
            info!(project_id = payload.project_id, ?missing, "Partial invoice not stored");
            None
        }
        ExtractionResult::Failed { reason } => {
            warn!(project_id = payload.project_id, %reason, "Invoice extraction failed");
            None
        }
    };

    let Some(missing) = stored else {
        return Ok(HttpResponse::Ok().json(ExtractionResponse { result, invoice: None }));
    };

    let Some(fields) = result.fields() else {
        return Err(AppError::Internal("extraction result without fields".into()));
    };

    let mut tx = pool.begin().await?;
    let id = sqlx::query(
        r#"
        INSERT INTO invoice_income
            (project_id, invoice_number, issue_date, issuer_name, issuer_rut, issuer_giro,
             client_name, client_rut, client_giro, net_amount, iva_amount, total_amount,
             extraction_status, missing_fields)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.project_id)
    .bind(fields.invoice_number.as_deref())
    .bind(fields.issue_date)
    .bind(fields.issuer_name.as_deref())
    .bind(fields.issuer_rut.as_deref())
    .bind(fields.issuer_giro.as_deref())
    .bind(fields.client_name.as_deref())
    .bind(fields.client_rut.as_deref())
    .bind(fields.client_giro.as_deref())
    .bind(fields.net_amount)
    .bind(fields.iva_amount)
    .bind(fields.total_amount)
    .bind(result.status())
    .bind(missing.as_deref())
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    if let Some(total) = fields.total_amount {
        sqlx::query(
            r#"
            INSERT INTO income_tracking (project_id, total_income) VALUES (?, ?)
            ON DUPLICATE KEY UPDATE total_income = total_income + VALUES(total_income)
            "#,
        )
        .bind(payload.project_id)
        .bind(total)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!(invoice_id = id, status = result.status(), "Invoice stored");

    let sql = format!("SELECT {} FROM invoice_income WHERE id = ?", INVOICE_COLUMNS);
    let invoice = sqlx::query_as::<_, InvoiceIncome>(&sql)
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;

    Ok(HttpResponse::Created().json(ExtractionResponse {
        result,
        invoice: Some(invoice),
    }))
}

#[utoipa::path(
    get,
    path = "/api/invoices",
    params(InvoiceQuery),
    responses((status = 200, body = [InvoiceIncome])),
    security(("bearer_auth" = [])),
    tag = "Invoices"
)]
pub async fn list_invoices(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<InvoiceQuery>,
) -> Result<HttpResponse, AppError> {
    let sql = format!(
        "SELECT {} FROM invoice_income WHERE project_id = ? ORDER BY created_at DESC, id DESC",
        INVOICE_COLUMNS
    );
    let invoices = sqlx::query_as::<_, InvoiceIncome>(&sql)
        .bind(query.project_id)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(invoices))
}
