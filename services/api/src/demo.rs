use crate::infra::{InMemoryDocuments, InMemoryNotifications, InMemoryProfitStore, SeedData};
use chrono::{Local, NaiveDate, Utc};
use clap::Args;
use profit_share::config::DataConfig;
use profit_share::error::AppError;
use profit_share::workflows::profit_sharing::{
    Actor, Award, AwardId, AwardOwner, AwardRef, AwardStatus, Company, CompanyId,
    DashboardRequest, KpiScope, PayoutDashboard, Plan, PlanId, PlanSchedule, PlanStatus,
    ProfitSharingService, ProfitType, Stakeholder, StakeholderId, TransitionOutcome, UserId,
    ValuationEntry, ValuationId,
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;

type DemoService =
    ProfitSharingService<InMemoryProfitStore, InMemoryNotifications, InMemoryDocuments>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the reporting date (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Print every payout row, not just the KPIs.
    #[arg(long)]
    pub(crate) include_history: bool,
    /// Skip the issue/accept portion of the demo.
    #[arg(long)]
    pub(crate) skip_lifecycle: bool,
}

#[derive(Args, Debug)]
pub(crate) struct PayoutReportArgs {
    /// Stakeholder record id, or a user id when --user is set
    pub(crate) owner: String,
    /// Treat OWNER as a user id and merge every linked stakeholder record
    #[arg(long)]
    pub(crate) user: bool,
    /// Directory holding stakeholders.json and valuations.csv (defaults to PROFIT_SHARE_DATA_DIR)
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
    /// Restrict the report to a single plan
    #[arg(long)]
    pub(crate) plan: Option<String>,
    /// Company context used for the plan fallback
    #[arg(long)]
    pub(crate) company: Option<String>,
    /// Evaluation date for the report (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Include the payout history table in the output
    #[arg(long)]
    pub(crate) history: bool,
}

pub(crate) fn run_payout_report(args: PayoutReportArgs) -> Result<(), AppError> {
    let PayoutReportArgs {
        owner,
        user,
        data_dir,
        plan,
        company,
        today,
        history,
    } = args;

    let data = match data_dir {
        Some(dir) => DataConfig {
            data_dir: Some(dir),
        },
        None => profit_share::config::AppConfig::load()?.data,
    };
    let store = Arc::new(InMemoryProfitStore::from_data_dir(&data)?);
    let service = ProfitSharingService::new(
        store,
        Arc::new(InMemoryNotifications::default()),
        Arc::new(InMemoryDocuments::default()),
    );

    let owner = if user {
        AwardOwner::LinkedUser(UserId(owner))
    } else {
        AwardOwner::Stakeholder(StakeholderId(owner))
    };
    let request = DashboardRequest {
        owner,
        scope: KpiScope {
            selected_plan_id: plan.map(PlanId),
            context_company_id: company.map(CompanyId),
        },
        today: today.unwrap_or_else(|| Local::now().date_naive()),
    };

    let dashboard = service.dashboard(&request)?;
    render_dashboard(&dashboard, history);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        include_history,
        skip_lifecycle,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    println!("Profit sharing demo");
    let store = demo_store();
    let notifications = InMemoryNotifications::default();
    let service: DemoService = ProfitSharingService::new(
        Arc::new(store),
        Arc::new(notifications.clone()),
        Arc::new(InMemoryDocuments::default()),
    );

    let request = DashboardRequest {
        owner: AwardOwner::LinkedUser(UserId::new("user-dana")),
        scope: KpiScope::default(),
        today,
    };
    let dashboard = service.dashboard(&request)?;
    println!("\nMerged view for user-dana (Acme + Globex records)");
    render_dashboard(&dashboard, include_history);

    if skip_lifecycle {
        return Ok(());
    }

    println!("\nAward lifecycle");
    let award_ref = AwardRef {
        stakeholder_id: StakeholderId::new("s-acme-dana"),
        award_id: AwardId::new("award-acme-2025"),
    };
    let issued = service.issue_award(&Actor::new("admin-ops"), &award_ref, Utc::now())?;
    render_transition("issued by admin-ops", &issued);

    match service.accept_award(&Actor::new("user-sam"), &award_ref, Utc::now()) {
        Ok(_) => println!("- unexpected: user-sam accepted an award they do not own"),
        Err(err) => println!("- user-sam rejected: {err}"),
    }

    let accepted = service.accept_award(&Actor::new("user-dana"), &award_ref, Utc::now())?;
    render_transition("accepted by user-dana", &accepted);

    match service.issue_award(&Actor::new("admin-ops"), &award_ref, Utc::now()) {
        Ok(_) => println!("- unexpected: finalized award was issued again"),
        Err(err) => println!("- re-issue rejected: {err}"),
    }

    let sent = notifications.events();
    println!("\nNotifications queued: {}", sent.len());
    for notification in &sent {
        println!(
            "- {} -> {} ({})",
            notification.event.label(),
            notification.user_id,
            notification
                .payload
                .get("status")
                .map(String::as_str)
                .unwrap_or("unknown")
        );
    }

    Ok(())
}

pub(crate) fn render_dashboard(dashboard: &PayoutDashboard, list_history: bool) {
    println!("Evaluated {}", dashboard.today);
    if let Some(plan_id) = &dashboard.scope.selected_plan_id {
        println!("Plan filter: {plan_id}");
    }

    for line in dashboard.kpi_lines() {
        match line.as_of {
            Some(date) => println!("- {}: ${} (as of {})", line.label, line.amount, date),
            None => println!("- {}: ${}", line.label, line.amount),
        }
    }

    if !dashboard.kpis.next_estimated_profit.has_estimate {
        println!("No upcoming estimate recorded.");
    }
    if dashboard.kpis.using_company_fallback {
        println!("Note: some plans have no valuations; awards were matched on company instead.");
    }

    if !list_history {
        return;
    }

    if !dashboard.has_history() {
        println!("\nPayout history: none");
        return;
    }

    println!("\nPayout history");
    for row in &dashboard.history {
        let date = row
            .profit_date
            .map(|date| date.to_string())
            .unwrap_or_else(|| "undated".to_string());
        println!(
            "- {} | {} | award {} | {} shares x ${} = ${}",
            date,
            row.profit_type.label(),
            row.award_id,
            row.shares_issued,
            row.price_per_share.round_dp(4),
            row.payout.round_dp(2)
        );
    }
}

fn render_transition(action: &str, outcome: &TransitionOutcome) {
    println!(
        "- {} {}: status {}",
        outcome.award.id, action, outcome.award.status
    );
    if let Some(document) = &outcome.document {
        println!("  document {}", document.storage_key);
    }
    for warning in &outcome.warnings {
        println!("  warning: {warning}");
    }
}

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn demo_award(
    id: &str,
    stakeholder_id: &str,
    plan: &str,
    shares: i64,
    (start, end): (Option<NaiveDate>, Option<NaiveDate>),
    status: AwardStatus,
) -> Award {
    Award {
        id: AwardId::new(id),
        plan_id: Some(PlanId::new(plan)),
        stakeholder_id: StakeholderId::new(stakeholder_id),
        source_company_id: None,
        award_start_date: start,
        award_end_date: end,
        shares_issued: Some(shares),
        status,
        issued_at: None,
        issued_by: None,
        accepted_at: None,
        accepted_by: None,
    }
}

fn demo_valuation(
    id: &str,
    (company, plan): (&str, &str),
    on: Option<NaiveDate>,
    profit_type: ProfitType,
    profit: i64,
    total_shares: i64,
) -> ValuationEntry {
    ValuationEntry {
        id: ValuationId::new(id),
        company_id: CompanyId::new(company),
        plan_id: Some(PlanId::new(plan)),
        valuation_date: on,
        profit_amount: Decimal::from(profit),
        profit_type,
        price_per_share: None,
        total_shares: Some(Decimal::from(total_shares)),
    }
}

fn demo_plan(id: &str, company: &str, schedule: PlanSchedule) -> Plan {
    Plan {
        id: PlanId::new(id),
        company_id: CompanyId::new(company),
        name: format!("{company} crew pool"),
        trigger_amount: Decimal::from(5_000),
        total_shares: 1_000,
        schedule,
        status: PlanStatus::Finalized,
    }
}

/// Acme uses a live plan; Globex re-issued its plan id after valuations were recorded.
fn demo_store() -> InMemoryProfitStore {
    let store = InMemoryProfitStore::default();

    let acme_awards = vec![
        demo_award(
            "award-acme-2024",
            "s-acme-dana",
            "acme-p1",
            100,
            (date(2024, 1, 1), date(2024, 12, 31)),
            AwardStatus::Finalized,
        ),
        demo_award(
            "award-acme-2025",
            "s-acme-dana",
            "acme-p1",
            120,
            (date(2025, 1, 1), date(2025, 12, 31)),
            AwardStatus::Draft,
        ),
    ];
    let globex_awards = vec![demo_award(
        "award-globex",
        "s-globex-dana",
        "globex-p-new",
        40,
        (date(2024, 1, 1), date(2025, 12, 31)),
        AwardStatus::Finalized,
    )];

    store.seed(SeedData {
        companies: vec![
            Company {
                id: CompanyId::new("acme"),
                name: "Acme Outfitters".to_string(),
            },
            Company {
                id: CompanyId::new("globex"),
                name: "Globex Logistics".to_string(),
            },
        ],
        plans: vec![
            demo_plan("acme-p1", "acme", PlanSchedule::Quarterly),
            demo_plan("globex-p-new", "globex", PlanSchedule::Annual),
        ],
        stakeholders: vec![
            Stakeholder {
                id: StakeholderId::new("s-acme-dana"),
                company_id: CompanyId::new("acme"),
                name: "Dana Reyes".to_string(),
                linked_user_id: Some(UserId::new("user-dana")),
                awards: acme_awards,
            },
            Stakeholder {
                id: StakeholderId::new("s-globex-dana"),
                company_id: CompanyId::new("globex"),
                name: "Dana Reyes".to_string(),
                linked_user_id: Some(UserId::new("user-dana")),
                awards: globex_awards,
            },
        ],
    });

    store.add_valuations(vec![
        demo_valuation(
            "acme-2024-q1",
            ("acme", "acme-p1"),
            date(2024, 3, 31),
            ProfitType::Actual,
            10_000,
            1_000,
        ),
        demo_valuation(
            "acme-2024-q3",
            ("acme", "acme-p1"),
            date(2024, 9, 30),
            ProfitType::Actual,
            14_000,
            1_000,
        ),
        demo_valuation(
            "acme-2025-q1",
            ("acme", "acme-p1"),
            date(2025, 3, 31),
            ProfitType::Estimated,
            12_000,
            1_000,
        ),
        demo_valuation(
            "globex-2024",
            ("globex", "globex-p-old"),
            date(2024, 12, 31),
            ProfitType::Actual,
            50_000,
            500,
        ),
    ]);

    store
}
