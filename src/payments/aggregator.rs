use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use super::{day_payment::day_amount, rate::RateResolution};
use crate::model::{
    contract::Contract,
    lifecycle::Lifecycle,
    payment::PaymentType,
    task::{AssignmentStatus, TaskStatus},
};

/// Unpaid task assignment joined with its task, project and worker.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingTaskRow {
    pub project_id: u64,
    pub project_name: String,
    pub project_lifecycle: String,
    pub worker_id: u64,
    pub worker_name: String,
    pub worker_rut: String,
    pub task_id: u64,
    pub task_status: String,
    pub task_lifecycle: String,
    pub assignment_status: String,
    pub contract_type: String,
    pub is_paid: bool,
    pub worker_payment: f64,
}

/// Unpaid attendance day joined with its project and worker.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingDayRow {
    pub project_id: u64,
    pub project_name: String,
    pub project_lifecycle: String,
    pub worker_id: u64,
    pub worker_name: String,
    pub worker_rut: String,
    pub attendance_id: u64,
    pub date: NaiveDate,
    pub is_present: bool,
    pub is_paid: bool,
    pub payment_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WorkerPending {
    pub worker_id: u64,
    pub worker_name: String,
    pub worker_rut: String,
    pub payment_type: PaymentType,
    pub tasks_amount: f64,
    pub tasks_count: usize,
    pub days_amount: f64,
    pub days_count: usize,
    /// Set when day amounts were priced at 0 because the rate could not be resolved.
    pub rate_unresolved: bool,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProjectPending {
    pub project_id: u64,
    pub project_name: String,
    pub workers: Vec<WorkerPending>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PendingSummary {
    pub projects: Vec<ProjectPending>,
    pub total_tasks_amount: f64,
    pub total_days_amount: f64,
    pub total_pending: f64,
    /// Distinct workers owed anything, across projects and payment types.
    pub workers_with_pending: usize,
}

fn active(raw: &str) -> bool {
    raw.parse::<Lifecycle>().is_ok_and(Lifecycle::is_active)
}

fn counts_as_pending_task(row: &PendingTaskRow) -> bool {
    active(&row.project_lifecycle)
        && active(&row.task_lifecycle)
        && !row.is_paid
        && row.worker_payment >= 0.0
        && matches!(row.contract_type.parse::<PaymentType>(), Ok(PaymentType::ATrato))
        && matches!(row.task_status.parse::<TaskStatus>(), Ok(TaskStatus::Completed))
        && matches!(row.assignment_status.parse::<AssignmentStatus>(), Ok(AssignmentStatus::Active))
}

fn counts_as_pending_day(row: &PendingDayRow) -> bool {
    active(&row.project_lifecycle) && row.is_present && !row.is_paid
}

fn slot<'a>(
    projects: &'a mut BTreeMap<u64, (String, BTreeMap<(u64, PaymentType), WorkerPending>)>,
    (project_id, project_name): (u64, &str),
    (worker_id, worker_name, worker_rut): (u64, &str, &str),
    payment_type: PaymentType,
) -> &'a mut WorkerPending {
    let (_, workers) = projects
        .entry(project_id)
        .or_insert_with(|| (project_name.to_string(), BTreeMap::new()));

    workers
        .entry((worker_id, payment_type))
        .or_insert_with(|| WorkerPending {
            worker_id,
            worker_name: worker_name.to_string(),
            worker_rut: worker_rut.to_string(),
            payment_type,
            tasks_amount: 0.0,
            tasks_count: 0,
            days_amount: 0.0,
            days_count: 0,
            rate_unresolved: false,
            total: 0.0,
        })
}

/// Groups pending amounts by project and by (worker, payment type). A worker
/// owed both task and day money gets one entry per type. Days are priced with
/// the per-day contract of their pair covering that date. Output order is
/// stable: projects, then workers, by id.
pub fn aggregate(
    tasks: &[PendingTaskRow],
    days: &[PendingDayRow],
    contracts: &HashMap<(u64, u64), Vec<Contract>>,
) -> PendingSummary {
    let mut projects: BTreeMap<u64, (String, BTreeMap<(u64, PaymentType), WorkerPending>)> =
        BTreeMap::new();

    for row in tasks.iter().filter(|r| counts_as_pending_task(r)) {
        let w = slot(
            &mut projects,
            (row.project_id, &row.project_name),
            (row.worker_id, &row.worker_name, &row.worker_rut),
            PaymentType::ATrato,
        );
        w.tasks_amount += row.worker_payment;
        w.tasks_count += 1;
    }

    for row in days.iter().filter(|r| counts_as_pending_day(r)) {
        let pair = contracts
            .get(&(row.worker_id, row.project_id))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let rate = RateResolution::resolve(pair, Some(row.date));

        let w = slot(
            &mut projects,
            (row.project_id, &row.project_name),
            (row.worker_id, &row.worker_name, &row.worker_rut),
            PaymentType::PorDia,
        );
        w.days_amount += day_amount(rate.rate_or_zero(), row.payment_percentage);
        w.days_count += 1;
        w.rate_unresolved |= !rate.is_resolved();
    }

    let mut summary = PendingSummary {
        projects: Vec::with_capacity(projects.len()),
        total_tasks_amount: 0.0,
        total_days_amount: 0.0,
        total_pending: 0.0,
        workers_with_pending: 0,
    };

    let mut owed = BTreeSet::new();
    for (project_id, (project_name, workers)) in projects {
        let workers: Vec<WorkerPending> = workers
            .into_values()
            .map(|mut w| {
                w.total = w.tasks_amount + w.days_amount;
                w
            })
            .collect();
        let total = workers.iter().map(|w| w.total).sum();

        summary.total_tasks_amount += workers.iter().map(|w| w.tasks_amount).sum::<f64>();
        summary.total_days_amount += workers.iter().map(|w| w.days_amount).sum::<f64>();
        owed.extend(workers.iter().map(|w| w.worker_id));
        summary.projects.push(ProjectPending {
            project_id,
            project_name,
            workers,
            total,
        });
    }
    summary.total_pending = summary.total_tasks_amount + summary.total_days_amount;
    summary.workers_with_pending = owed.len();

    summary
}

pub async fn load_pending_tasks(
    pool: &MySqlPool,
    project_id: Option<u64>,
) -> Result<Vec<PendingTaskRow>, sqlx::Error> {
    let mut qb = sqlx::QueryBuilder::<sqlx::MySql>::new(
        r#"
        SELECT p.id AS project_id, p.name AS project_name, p.lifecycle AS project_lifecycle,
               w.id AS worker_id, w.full_name AS worker_name, w.rut AS worker_rut,
               t.id AS task_id, t.status AS task_status, t.lifecycle AS task_lifecycle,
               ta.assignment_status, ta.contract_type, ta.is_paid, ta.worker_payment
        FROM task_assignments ta
        JOIN tasks t ON t.id = ta.task_id
        JOIN apartments a ON a.id = t.apartment_id
        JOIN floors f ON f.id = a.floor_id
        JOIN towers tw ON tw.id = f.tower_id
        JOIN projects p ON p.id = tw.project_id
        JOIN workers w ON w.id = ta.worker_id
        WHERE ta.is_paid = FALSE
        "#,
    );
    if let Some(project_id) = project_id {
        qb.push(" AND p.id = ").push_bind(project_id);
    }

    qb.build_query_as::<PendingTaskRow>().fetch_all(pool).await
}

pub async fn load_pending_days(
    pool: &MySqlPool,
    project_id: Option<u64>,
) -> Result<Vec<PendingDayRow>, sqlx::Error> {
    let mut qb = sqlx::QueryBuilder::<sqlx::MySql>::new(
        r#"
        SELECT p.id AS project_id, p.name AS project_name, p.lifecycle AS project_lifecycle,
               w.id AS worker_id, w.full_name AS worker_name, w.rut AS worker_rut,
               wa.id AS attendance_id, wa.date, wa.is_present, wa.is_paid, wa.payment_percentage
        FROM worker_attendance wa
        JOIN projects p ON p.id = wa.project_id
        JOIN workers w ON w.id = wa.worker_id
        WHERE wa.is_paid = FALSE AND wa.is_present = TRUE
        "#,
    );
    if let Some(project_id) = project_id {
        qb.push(" AND p.id = ").push_bind(project_id);
    }

    qb.build_query_as::<PendingDayRow>().fetch_all(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::contract::per_day;

    fn task_row(project_id: u64, worker_id: u64, amount: f64) -> PendingTaskRow {
        PendingTaskRow {
            project_id,
            project_name: format!("Proyecto {}", project_id),
            project_lifecycle: "active".into(),
            worker_id,
            worker_name: format!("Trabajador {}", worker_id),
            worker_rut: "11111111-1".into(),
            task_id: 1,
            task_status: "completed".into(),
            task_lifecycle: "active".into(),
            assignment_status: "active".into(),
            contract_type: "a_trato".into(),
            is_paid: false,
            worker_payment: amount,
        }
    }

    fn day_row(project_id: u64, worker_id: u64, pct: f64) -> PendingDayRow {
        PendingDayRow {
            project_id,
            project_name: format!("Proyecto {}", project_id),
            project_lifecycle: "active".into(),
            worker_id,
            worker_name: format!("Trabajador {}", worker_id),
            worker_rut: "11111111-1".into(),
            attendance_id: 1,
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            is_present: true,
            is_paid: false,
            payment_percentage: pct,
        }
    }

    fn rates() -> HashMap<(u64, u64), Vec<Contract>> {
        HashMap::from([((1, 1), vec![per_day(1, Some(30000.0), "active")])])
    }

    #[test]
    fn same_worker_gets_one_entry_per_type() {
        let summary = aggregate(
            &[task_row(1, 1, 50000.0)],
            &[day_row(1, 1, 100.0), day_row(1, 1, 50.0)],
            &rates(),
        );

        let workers = &summary.projects[0].workers;
        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].payment_type, PaymentType::ATrato);
        assert_eq!(workers[0].tasks_amount, 50000.0);
        assert_eq!(workers[1].payment_type, PaymentType::PorDia);
        assert_eq!(workers[1].days_amount, 45000.0);
        assert_eq!(workers[1].days_count, 2);
        assert_eq!(summary.total_pending, 95000.0);
        assert_eq!(summary.workers_with_pending, 1);
    }

    #[test]
    fn negative_payments_are_excluded_not_clamped() {
        let summary = aggregate(&[task_row(1, 1, -500.0), task_row(1, 2, 1000.0)], &[], &rates());

        let workers = &summary.projects[0].workers;
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].worker_id, 2);
        assert_eq!(summary.total_tasks_amount, 1000.0);
    }

    #[test]
    fn filters_ineligible_task_rows() {
        let mut paid = task_row(1, 1, 100.0);
        paid.is_paid = true;
        let mut unfinished = task_row(1, 1, 100.0);
        unfinished.task_status = "in_progress".into();
        let mut removed = task_row(1, 1, 100.0);
        removed.assignment_status = "removed".into();
        let mut per_day = task_row(1, 1, 100.0);
        per_day.contract_type = "por_dia".into();
        let mut archived = task_row(1, 1, 100.0);
        archived.project_lifecycle = "archived".into();

        let summary = aggregate(&[paid, unfinished, removed, per_day, archived], &[], &rates());
        assert!(summary.projects.is_empty());
        assert_eq!(summary.total_pending, 0.0);
    }

    #[test]
    fn unresolved_rate_prices_at_zero_and_is_flagged() {
        let summary = aggregate(&[], &[day_row(2, 5, 100.0)], &rates());
        let w = &summary.projects[0].workers[0];
        assert_eq!(w.days_amount, 0.0);
        assert_eq!(w.days_count, 1);
        assert!(w.rate_unresolved);
    }

    #[test]
    fn day_before_contract_start_is_unresolved() {
        let mut row = day_row(1, 1, 100.0);
        row.date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let summary = aggregate(&[], &[row], &rates());
        let w = &summary.projects[0].workers[0];
        assert_eq!(w.days_amount, 0.0);
        assert!(w.rate_unresolved);
    }

    #[test]
    fn archived_project_days_are_skipped() {
        let mut row = day_row(1, 1, 100.0);
        row.project_lifecycle = "archived".into();
        assert!(aggregate(&[], &[row], &rates()).projects.is_empty());
    }

    #[test]
    fn repeated_aggregation_is_identical() {
        let tasks = vec![task_row(2, 3, 700.0), task_row(1, 1, 50000.0), task_row(1, 4, 10.0)];
        let days = vec![day_row(1, 1, 100.0)];
        let first = aggregate(&tasks, &days, &rates());
        let second = aggregate(&tasks, &days, &rates());

        assert_eq!(first, second);
        assert_eq!(first.projects[0].project_id, 1);
        assert_eq!(first.projects[1].project_id, 2);
    }
}
