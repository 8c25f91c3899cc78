use crate::api::{
    attendance::MarkAttendance,
    contract::{ChangeContractStatus, CreateContract},
    invoice::{ExtractInvoice, ExtractionResponse},
    job_application::{ChangeApplicationStatus, SubmitApplication},
    payment::{CustomPaymentRequest, DayPaymentRequest, HistoryResponse, TaskPaymentRequest},
    project::{CreateApartment, CreateFloor, CreateProject, CreateTower},
    task::{AdjustDistribution, AssignWorker, ChangeTaskStatus, CreateTask, DistributionResponse},
    worker::{CreateWorker, UpdateWorker, WorkerListResponse, WorkerQuery},
};
use crate::invoice::extractor::InvoiceFields;
use crate::model::{
    attendance::AttendanceRecord,
    contract::{Contract, ContractStatus, ContractType},
    invoice::InvoiceIncome,
    lifecycle::PaymentState,
    job_application::{ApplicationStatus, JobApplication},
    payment::{PaymentHistoryRecord, PaymentType},
    preferences::ViewPreferences,
    project::{Apartment, Floor, Project, Tower},
    task::{Task, TaskAssignment, TaskPriority, TaskStatus},
    worker::Worker,
};
use crate::payments::{
    aggregator::{PendingSummary, ProjectPending, WorkerPending},
    day_payment::{DayLine, DayPaymentQuote},
    distribution::{ProposedShare, SharePayment},
    rate::RateCandidate,
};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Site Ledger API",
        version = "1.0.0",
        description = r#"
## Construction site administration

Workers, contracts, the project hierarchy (project, tower, floor, apartment,
task), daily attendance and the payments that come out of them.

### Payments
- **Per day**: unpaid present days × daily rate × payment percentage
- **Per task (a trato)**: task budget split by percentage across the assigned workers
- Every processed payment flips the paid rows and writes one history record in a
  single transaction

### Security
Endpoints under `/api` need a JWT bearer token. Payment processing is limited
to Admin and Accountant, structural changes to Admin and Site manager.
"#,
    ),
    paths(
        crate::api::worker::create_worker,
        crate::api::worker::list_workers,
        crate::api::worker::get_worker,
        crate::api::worker::update_worker,

        crate::api::project::create_project,
        crate::api::project::list_projects,
        crate::api::project::archive_project,
        crate::api::project::create_tower,
        crate::api::project::create_floor,
        crate::api::project::create_apartment,

        crate::api::contract::create_contract,
        crate::api::contract::list_worker_contracts,
        crate::api::contract::change_contract_status,
        crate::api::contract::resolve_rate,

        crate::api::task::create_task,
        crate::api::task::update_task_status,
        crate::api::task::list_assignments,
        crate::api::task::assign_worker,
        crate::api::task::remove_worker,
        crate::api::task::adjust_distribution,

        crate::api::attendance::mark_attendance,
        crate::api::attendance::list_attendance,

        crate::api::payment::quote_day_payment,
        crate::api::payment::process_day_payment,
        crate::api::payment::process_task_payment,
        crate::api::payment::record_custom_payment,
        crate::api::payment::pending_summary,
        crate::api::payment::payment_history,

        crate::api::invoice::extract_invoice,
        crate::api::invoice::list_invoices,

        crate::api::job_application::submit_application,
        crate::api::job_application::list_applications,
        crate::api::job_application::update_application_status,

        crate::api::preferences::get_preferences,
        crate::api::preferences::put_preferences
    ),
    components(
        schemas(
            Worker, CreateWorker, UpdateWorker, WorkerQuery, WorkerListResponse,
            Project, Tower, Floor, Apartment,
            CreateProject, CreateTower, CreateFloor, CreateApartment,
            Contract, ContractType, ContractStatus, CreateContract, ChangeContractStatus, RateCandidate,
            Task, TaskStatus, TaskPriority, TaskAssignment,
            CreateTask, ChangeTaskStatus, AssignWorker, AdjustDistribution, DistributionResponse,
            ProposedShare, SharePayment,
            AttendanceRecord, MarkAttendance,
            PaymentType, PaymentState, PaymentHistoryRecord, DayLine, DayPaymentQuote,
            DayPaymentRequest, TaskPaymentRequest, CustomPaymentRequest, HistoryResponse,
            PendingSummary, ProjectPending, WorkerPending,
            InvoiceFields, InvoiceIncome, ExtractInvoice, ExtractionResponse,
            ApplicationStatus, JobApplication, SubmitApplication, ChangeApplicationStatus,
            ViewPreferences
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Workers", description = "Worker registry keyed by RUT"),
        (name = "Projects", description = "Project, tower, floor and apartment hierarchy"),
        (name = "Contracts", description = "Worker contracts and daily-rate resolution"),
        (name = "Tasks", description = "Tasks and their budget distribution"),
        (name = "Attendance", description = "Daily attendance"),
        (name = "Payments", description = "Payment quotes, processing, history and pending totals"),
        (name = "Invoices", description = "Invoice field extraction"),
        (name = "Job applications", description = "Job application intake"),
        (name = "Preferences", description = "Saved view filters"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
