//! Field extraction from the text of a Chilean electronic invoice.
//!
//! Each rule looks at one line at a time and fills at most one field. Rules are
//! independent and order sensitive: the first `R.U.T.:` line belongs to the
//! issuer and the next one to the client, the same goes for `Giro:`. Nothing
//! is ever guessed; a field that no rule matched stays empty and is reported.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::utils::rut::Rut;

static RUT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)R\.?\s*U\.?\s*T\.?\s*:?\s*([0-9]{1,2}(?:\.?[0-9]{3}){2}\s*-\s*[0-9K])")
        .expect("valid regex")
});
static GIRO_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^giro\s*:\s*(.+)$").expect("valid regex"));
static CLIENT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^SE[ÑN]OR\s*\(?ES\)?\s*:\s*(.+)$").expect("valid regex"));
static NUMBER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bN\s*[°º]\s*:?\s*([0-9]+)").expect("valid regex"));
static DATE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)fecha(?:\s+de)?\s+emisi[oó]n\s*:?\s*(.+)$").expect("valid regex")
});
static NET_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)MONTO\s+NETO\s*:?\s*\$?\s*([0-9][0-9.,]*)").expect("valid regex"));
static IVA_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bI\.?\s*V\.?\s*A\b").expect("valid regex"));
static IVA_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bI\.?\s*V\.?\s*A\b\.?\s*:?\s*\$?\s*([0-9][0-9.,]*)").expect("valid regex")
});
// Tax rate tokens such as `19%` or `19,0 %`; never an amount.
static RATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+(?:[.,][0-9]+)?\s*%").expect("valid regex"));
static BARE_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$?\s*([0-9][0-9.,]*)$").expect("valid regex"));
static TOTAL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^TOTAL\s*:?\s*\$?\s*([0-9][0-9.,]*)").expect("valid regex"));
static SPANISH_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,2})\s+de\s+([a-záéíóú]+)\s+(?:de|del)\s+(\d{4})").expect("valid regex")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct InvoiceFields {
    pub invoice_number: Option<String>,

    #[schema(value_type = Option<String>, format = "date")]
    pub issue_date: Option<NaiveDate>,

    pub issuer_name: Option<String>,
    pub issuer_rut: Option<String>,
    pub issuer_giro: Option<String>,
    pub client_name: Option<String>,
    pub client_rut: Option<String>,
    pub client_giro: Option<String>,
    pub net_amount: Option<f64>,
    pub iva_amount: Option<f64>,
    pub total_amount: Option<f64>,
}

impl InvoiceFields {
    fn is_empty(&self) -> bool {
        *self == InvoiceFields::default()
    }

    /// Fields an invoice record cannot be booked without.
    fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.invoice_number.is_none() {
            missing.push("invoice_number");
        }
        if self.issue_date.is_none() {
            missing.push("issue_date");
        }
        if self.issuer_rut.is_none() {
            missing.push("issuer_rut");
        }
        if self.net_amount.is_none() {
            missing.push("net_amount");
        }
        if self.iva_amount.is_none() {
            missing.push("iva_amount");
        }
        if self.total_amount.is_none() {
            missing.push("total_amount");
        }
        missing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionResult {
    Success {
        fields: InvoiceFields,
    },
    PartialSuccess {
        fields: InvoiceFields,
        missing: Vec<&'static str>,
    },
    Failed {
        reason: String,
    },
}

impl ExtractionResult {
    pub fn status(&self) -> &'static str {
        match self {
            ExtractionResult::Success { .. } => "success",
            ExtractionResult::PartialSuccess { .. } => "partial_success",
            ExtractionResult::Failed { .. } => "failed",
        }
    }

    pub fn fields(&self) -> Option<&InvoiceFields> {
        match self {
            ExtractionResult::Success { fields } | ExtractionResult::PartialSuccess { fields, .. } => {
                Some(fields)
            }
            ExtractionResult::Failed { .. } => None,
        }
    }
}

pub fn extract(text: &str) -> ExtractionResult {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        return ExtractionResult::Failed {
            reason: "document has no text".to_string(),
        };
    }

    let mut fields = InvoiceFields::default();
    let mut ruts = 0usize;
    let mut giros = 0usize;
    let mut previous_plain: Option<&str> = None;
    // IVA label seen without an amount; the amount may sit alone on the next line
    let mut iva_pending = false;

    for &line in &lines {
        if std::mem::take(&mut iva_pending) {
            if let Some(c) = BARE_AMOUNT.captures(line) {
                if fields.iva_amount.is_none() {
                    fields.iva_amount = parse_amount(&c[1]);
                }
                previous_plain = None;
                continue;
            }
        }

        let mut matched = false;

        if let Some(c) = RUT_LINE.captures(line) {
            matched = true;
            let parsed = c[1].parse::<Rut>().ok().map(|r| r.to_string());
            match ruts {
                0 => fields.issuer_rut = parsed,
                1 => fields.client_rut = parsed,
                _ => {}
            }
            ruts += 1;
        }

        if let Some(c) = GIRO_LINE.captures(line) {
            matched = true;
            let value = Some(c[1].trim().to_string());
            match giros {
                0 => {
                    fields.issuer_giro = value;
                    if fields.issuer_name.is_none() {
                        fields.issuer_name = previous_plain.map(str::to_string);
                    }
                }
                1 => fields.client_giro = value,
                _ => {}
            }
            giros += 1;
        }

        if let Some(c) = CLIENT_LINE.captures(line) {
            matched = true;
            fields.client_name.get_or_insert_with(|| c[1].trim().to_string());
        }

        if fields.invoice_number.is_none() {
            if let Some(c) = NUMBER_LINE.captures(line) {
                matched = true;
                fields.invoice_number = Some(c[1].to_string());
            }
        }

        if let Some(c) = DATE_LINE.captures(line) {
            matched = true;
            if fields.issue_date.is_none() {
                fields.issue_date = parse_date(&c[1]);
            }
        }

        if let Some(c) = NET_LINE.captures(line) {
            matched = true;
            if fields.net_amount.is_none() {
                fields.net_amount = parse_amount(&c[1]);
            }
        } else if let Some(c) = TOTAL_LINE.captures(line) {
            matched = true;
            if fields.total_amount.is_none() {
                fields.total_amount = parse_amount(&c[1]);
            }
        } else if IVA_LABEL.is_match(line) {
            matched = true;
            let without_rate = RATE_TOKEN.replace_all(line, "");
            match IVA_LINE.captures(&without_rate) {
                Some(c) => {
                    if fields.iva_amount.is_none() {
                        fields.iva_amount = parse_amount(&c[1]);
                    }
                }
                None => iva_pending = fields.iva_amount.is_none(),
            }
        }

        previous_plain = if matched { None } else { Some(line) };
    }

    if fields.is_empty() {
        return ExtractionResult::Failed {
            reason: "no invoice fields recognised".to_string(),
        };
    }

    let missing = fields.missing_required();
    if missing.is_empty() {
        ExtractionResult::Success { fields }
    } else {
        ExtractionResult::PartialSuccess { fields, missing }
    }
}

/// Chilean amounts use `.` for thousands and `,` for decimals.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let normalized: String = raw
        .trim()
        .trim_end_matches(['.', ','])
        .replace('.', "")
        .replace(',', ".");
    normalized.parse().ok()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for fmt in ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }

    let c = SPANISH_DATE.captures(raw)?;
    let day: u32 = c[1].parse().ok()?;
    let month = spanish_month(&c[2].to_lowercase())?;
    let year: i32 = c[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn spanish_month(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "enero",
        "febrero",
        "marzo",
        "abril",
        "mayo",
        "junio",
        "julio",
        "agosto",
        "septiembre",
        "octubre",
        "noviembre",
        "diciembre",
    ];
    if name == "setiembre" {
        return Some(9);
    }
    MONTHS.iter().position(|m| *m == name).map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVOICE: &str = "
        CONSTRUCTORA LOS ANDES SPA
        Giro: Construccion de edificios
        Av. Providencia 1234, Santiago
        R.U.T.: 76.086.428-5
        FACTURA ELECTRONICA
        N° 4521
        Fecha Emision: 14 de marzo del 2025
        SEÑOR(ES): Inmobiliaria Costa Sur Ltda
        R.U.T.: 9.876.543-3
        Giro: Inmobiliaria
        MONTO NETO $ 1.000.000
        I.V.A. 19% $ 190.000
        TOTAL $ 1.190.000
    ";

    #[test]
    fn extracts_complete_invoice() {
        let result = extract(INVOICE);
        let ExtractionResult::Success { fields } = result else {
            panic!("expected success, got {:?}", result);
        };

        assert_eq!(fields.issuer_name.as_deref(), Some("CONSTRUCTORA LOS ANDES SPA"));
        assert_eq!(fields.issuer_giro.as_deref(), Some("Construccion de edificios"));
        assert_eq!(fields.issuer_rut.as_deref(), Some("76086428-5"));
        assert_eq!(fields.client_rut.as_deref(), Some("9876543-3"));
        assert_eq!(fields.client_name.as_deref(), Some("Inmobiliaria Costa Sur Ltda"));
        assert_eq!(fields.client_giro.as_deref(), Some("Inmobiliaria"));
        assert_eq!(fields.invoice_number.as_deref(), Some("4521"));
        assert_eq!(fields.issue_date, NaiveDate::from_ymd_opt(2025, 3, 14));
        assert_eq!(fields.net_amount, Some(1_000_000.0));
        assert_eq!(fields.iva_amount, Some(190_000.0));
        assert_eq!(fields.total_amount, Some(1_190_000.0));
    }

    #[test]
    fn missing_totals_are_reported_not_invented() {
        let text = "R.U.T.: 76.086.428-5\nN° 10\nFecha Emision: 01/02/2025\nMONTO NETO $ 500.000";
        let result = extract(text);
        let ExtractionResult::PartialSuccess { fields, missing } = result else {
            panic!("expected partial, got {:?}", result);
        };

        assert_eq!(fields.net_amount, Some(500_000.0));
        assert_eq!(fields.iva_amount, None);
        assert_eq!(fields.total_amount, None);
        assert_eq!(missing, vec!["iva_amount", "total_amount"]);
    }

    #[test]
    fn iva_rate_is_not_taken_as_amount() {
        let text = "R.U.T.: 76.086.428-5\nN° 10\nFecha Emision: 01/02/2025\n\
                    MONTO NETO $ 1.000.000\nI.V.A. 19%\n$ 190.000\nTOTAL $ 1.190.000";
        let ExtractionResult::Success { fields } = extract(text) else {
            panic!("expected success");
        };
        assert_eq!(fields.iva_amount, Some(190_000.0));
        assert_eq!(fields.total_amount, Some(1_190_000.0));
    }

    #[test]
    fn iva_rate_without_amount_stays_missing() {
        let text = "R.U.T.: 76.086.428-5\nN° 10\nFecha Emision: 01/02/2025\n\
                    MONTO NETO $ 1.000.000\nI.V.A. 19%\nTOTAL $ 1.190.000";
        let ExtractionResult::PartialSuccess { fields, missing } = extract(text) else {
            panic!("expected partial");
        };
        assert_eq!(fields.iva_amount, None);
        assert_eq!(missing, vec!["iva_amount"]);

        let ExtractionResult::PartialSuccess { fields, .. } = extract("IVA 19 %: \nTOTAL $ 100") else {
            panic!("expected partial");
        };
        assert_eq!(fields.iva_amount, None);
        assert_eq!(fields.total_amount, Some(100.0));
    }

    #[test]
    fn invalid_rut_leaves_issuer_slot_empty() {
        let text = "R.U.T.: 76.086.428-1\nR.U.T.: 9.876.543-3\nTOTAL $ 100";
        let ExtractionResult::PartialSuccess { fields, missing } = extract(text) else {
            panic!("expected partial");
        };
        assert_eq!(fields.issuer_rut, None);
        assert_eq!(fields.client_rut.as_deref(), Some("9876543-3"));
        assert!(missing.contains(&"issuer_rut"));
    }

    #[test]
    fn unrelated_text_fails() {
        assert!(matches!(extract("hola mundo\nsin datos"), ExtractionResult::Failed { .. }));
        assert!(matches!(extract("   \n  "), ExtractionResult::Failed { .. }));
    }

    #[test]
    fn amounts_and_dates() {
        assert_eq!(parse_amount("1.234.567"), Some(1_234_567.0));
        assert_eq!(parse_amount("1.234,50"), Some(1234.5));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_date("2025-01-31"), NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(parse_date("5 de Setiembre de 2024"), NaiveDate::from_ymd_opt(2024, 9, 5));
        assert_eq!(parse_date("mañana"), None);
    }
}
