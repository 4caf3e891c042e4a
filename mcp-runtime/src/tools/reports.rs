//! Daily, weekly and monthly backup and snapshot statistics.
//!
//! Each agent in scope is fetched once per call: its backups for the whole
//! date range are bucketed by UTC day and its snapshot counts are computed
//! once and repeated on every day's row.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use slide_core::models::{Agent, Backup, Snapshot};
use slide_core::policy::tools;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::args::{Args, arg_bool, optional_string};
use crate::context::ToolContext;
use crate::enrich::render;
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, properties};
use crate::tools::lookup::{Directory, PAGE_SIZE, agent_label, collect_pages, device_label};

const SCOPED_CONCURRENCY: usize = 10;
const FLEET_CONCURRENCY: usize = 20;
const DAY_LABELS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        tools::REPORTS,
        "Generate statistical reports about backups, snapshots, and system health. Provides pre-calculated metrics to help LLMs analyze data without complex calculations.",
        json!({
            "type": "object",
            "properties": properties(&[json!({
                "operation": {"type": "string", "description": "The type of report to generate"},
                "date": {"type": "string", "description": "Date for the report in YYYY-MM-DD format (defaults to today/current week/current month)"},
                "agent_id": {"type": "string", "description": "Filter report by specific agent ID"},
                "device_id": {"type": "string", "description": "Filter report by device ID (includes all agents on device)"},
                "client_id": {"type": "string", "description": "Filter report by client ID (includes all agents for client)"},
                "format": {"type": "string", "description": "Output format for the report", "enum": ["json", "markdown"]},
                "verbose": {"type": "boolean", "description": "Enable verbose progress logging to stderr (useful for long operations)"}
            })]),
            "required": ["operation"],
        }),
    )
    .operation(op!("daily_backup_snapshot", daily))
    .operation(op!("weekly_backup_snapshot", weekly))
    .operation(op!("monthly_backup_snapshot", monthly))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackupStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub in_progress: usize,
    pub success_rate: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failures_by_error: BTreeMap<String, usize>,
}

impl BackupStats {
    fn record(&mut self, backup: &Backup) {
        self.total += 1;
        match backup.status.as_str() {
            "success" => self.successful += 1,
            "failed" => {
                self.failed += 1;
                if let Some(message) = &backup.error_message {
                    *self.failures_by_error.entry(message.clone()).or_default() += 1;
                }
            }
            "running" | "pending" => self.in_progress += 1,
            _ => {}
        }
        self.success_rate = percentage(self.successful, self.total);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    pub total: usize,
    pub active: usize,
    pub deleted: usize,
    pub deleted_by_retention: usize,
    pub deleted_manually: usize,
    pub deleted_other: usize,
    pub local_storage: usize,
    pub cloud_storage: usize,
}

impl SnapshotStats {
    /// Counts active snapshots by where they are stored and deleted ones by
    /// the type of their first deletion.
    pub fn from_snapshots(active: &[Snapshot], deleted: &[Snapshot]) -> Self {
        let mut stats = Self {
            active: active.len(),
            deleted: deleted.len(),
            ..Default::default()
        };
        for snapshot in active {
            let cloud = snapshot
                .locations
                .iter()
                .any(|location| location.kind.contains("cloud"));
            let local = snapshot
                .locations
                .iter()
                .any(|location| !location.kind.contains("cloud"));
            if local {
                stats.local_storage += 1;
            }
            if cloud {
                stats.cloud_storage += 1;
            }
        }
        for snapshot in deleted {
            match snapshot.deletions.first().map(|d| d.kind.as_str()) {
                Some("retention") => stats.deleted_by_retention += 1,
                Some("manual") => stats.deleted_manually += 1,
                Some(_) => stats.deleted_other += 1,
                None => {}
            }
        }
        stats.total = stats.active + stats.deleted;
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyReport {
    pub date: String,
    pub backups: BackupStats,
    pub snapshots: SnapshotStats,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub agent_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub agent_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub device_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub device_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_name: String,
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Which agents a report covers.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Agent(String),
    Device(String),
    Client(String),
    Fleet,
}

impl Scope {
    fn from_args(args: &Args) -> Result<Self, ToolError> {
        if let Some(id) = optional_string(args, "agent_id")? {
            return Ok(Scope::Agent(id));
        }
        if let Some(id) = optional_string(args, "device_id")? {
            return Ok(Scope::Device(id));
        }
        if let Some(id) = optional_string(args, "client_id")? {
            return Ok(Scope::Client(id));
        }
        Ok(Scope::Fleet)
    }

    fn failure_label(&self) -> &'static str {
        match self {
            Scope::Agent(_) => "agent",
            Scope::Device(_) => "device",
            Scope::Client(_) => "client",
            Scope::Fleet => "all agents",
        }
    }
}

/// Per-agent data for an inclusive range of days.
#[derive(Debug, Clone)]
struct AgentWindow {
    identity: DailyReport,
    backups: BTreeMap<NaiveDate, BackupStats>,
    snapshots: SnapshotStats,
}

impl AgentWindow {
    fn report_for(&self, day: NaiveDate) -> DailyReport {
        DailyReport {
            date: day.format("%Y-%m-%d").to_string(),
            backups: self.backups.get(&day).cloned().unwrap_or_default(),
            snapshots: self.snapshots.clone(),
            ..self.identity.clone()
        }
    }
}

/// Report-wide settings shared by every agent task.
#[derive(Debug, Clone)]
struct Run {
    ctx: ToolContext,
    directory: Directory,
    first: NaiveDate,
    last: NaiveDate,
    verbose: bool,
}

fn progress(verbose: bool, message: &str) {
    if verbose {
        tracing::info!(event = "report_progress", "{message}");
    } else {
        tracing::debug!(event = "report_progress", "{message}");
    }
}

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Backups started inside `[first, last]`, bucketed by UTC day. Pages are read
/// newest first and paging stops once a page reaches past the range start.
async fn backup_buckets(
    run: &Run,
    agent_id: &str,
) -> Result<BTreeMap<NaiveDate, BackupStats>, ToolError> {
    let range_start = day_start(run.first);
    let range_end = day_start(run.last) + Duration::days(1);
    let mut buckets: BTreeMap<NaiveDate, BackupStats> = BTreeMap::new();
    let mut offset = 0_i64;
    loop {
        let query = crate::args::ListQuery::default()
            .with("agent_id", agent_id)
            .with("limit", PAGE_SIZE.to_string())
            .with("offset", offset.to_string())
            .with("sort_by", "start_time")
            .with("sort_asc", "false");
        let page: slide_core::models::Page<Backup> = run
            .ctx
            .api
            .list("/v1/backup", &query)
            .await
            .map_err(|e| ToolError::new(e.code, format!("failed to list backups: {}", e.message)))?;

        let mut reached_start = false;
        for backup in &page.data {
            let Ok(started) = DateTime::parse_from_rfc3339(&backup.started_at) else {
                continue;
            };
            let started = started.with_timezone(&Utc);
            if started < range_start {
                reached_start = true;
                continue;
            }
            if started >= range_end {
                continue;
            }
            buckets
                .entry(started.date_naive())
                .or_default()
                .record(backup);
        }

        match page.pagination.next_offset {
            Some(next) if !reached_start && next > offset && !page.data.is_empty() => {
                offset = next
            }
            _ => break,
        }
    }
    Ok(buckets)
}

async fn snapshot_stats(run: &Run, agent_id: &str) -> Result<SnapshotStats, ToolError> {
    let active: Vec<Snapshot> =
        collect_pages(&run.ctx, "/v1/snapshot", &[("agent_id", agent_id)], PAGE_SIZE)
            .await
            .map_err(|e| {
                ToolError::new(e.code, format!("failed to list active snapshots: {}", e.message))
            })?;
    let deleted: Vec<Snapshot> = collect_pages(
        &run.ctx,
        "/v1/snapshot",
        &[("agent_id", agent_id), ("snapshot_location", "exists_deleted")],
        PAGE_SIZE,
    )
    .await
    .unwrap_or_else(|e| {
        progress(
            run.verbose,
            &format!("could not fetch deleted snapshots for agent {agent_id}: {e}"),
        );
        Vec::new()
    });
    Ok(SnapshotStats::from_snapshots(&active, &deleted))
}

async fn identity(run: &Run, agent_id: &str) -> DailyReport {
    let mut report = DailyReport {
        agent_id: agent_id.to_string(),
        ..Default::default()
    };
    let Some(agent) = run.directory.agent(&run.ctx, agent_id).await else {
        return report;
    };
    report.agent_name = agent_label(&agent);
    if let Some(client_id) = agent.client_id.as_deref().filter(|id| !id.is_empty()) {
        report.client_id = client_id.to_string();
        report.client_name = run
            .directory
            .client_name(&run.ctx, client_id)
            .await
            .unwrap_or_default();
    }
    if let Some(device) = run.directory.device(&run.ctx, &agent.device_id).await {
        report.device_name = device_label(&device);
    }
    report.device_id = agent.device_id;
    report
}

async fn agent_window(run: Run, agent_id: String) -> Result<AgentWindow, ToolError> {
    let identity = identity(&run, &agent_id).await;
    let (backups, snapshots) = tokio::join!(
        backup_buckets(&run, &agent_id),
        snapshot_stats(&run, &agent_id)
    );
    let backups = backups
        .map_err(|e| ToolError::new(e.code, format!("failed to calculate backup stats: {}", e.message)))?;
    let snapshots = snapshots.map_err(|e| {
        ToolError::new(e.code, format!("failed to calculate snapshot stats: {}", e.message))
    })?;
    Ok(AgentWindow {
        identity,
        backups,
        snapshots,
    })
}

/// Runs `agent_window` for every agent with at most `limit` in flight.
/// Agents that fail are logged and left out.
async fn agent_windows(run: &Run, agents: Vec<Agent>, limit: usize) -> Vec<AgentWindow> {
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let total = agents.len();
    let mut tasks = JoinSet::new();
    for (index, agent) in agents.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let run = run.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            if index % 10 == 0 {
                progress(
                    run.verbose,
                    &format!("processing agent {}/{total} ({})", index + 1, agent.display_name),
                );
            }
            let result = agent_window(run, agent.agent_id.clone()).await;
            (agent, result)
        });
    }

    let mut windows = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(window))) => windows.push(window),
            Ok((agent, Err(e))) => tracing::warn!(
                event = "report_agent_skipped",
                agent_id = %agent.agent_id,
                error = %e,
            ),
            Err(e) => tracing::warn!(event = "report_task_failed", error = %e),
        }
    }
    windows.sort_by(|a, b| {
        (&a.identity.agent_name, &a.identity.agent_id)
            .cmp(&(&b.identity.agent_name, &b.identity.agent_id))
    });
    progress(run.verbose, &format!("completed processing {} agents", windows.len()));
    windows
}

async fn scope_windows(run: &Run, scope: &Scope) -> Result<Vec<AgentWindow>, ToolError> {
    let (filter, limit) = match scope {
        Scope::Agent(id) => return Ok(vec![agent_window(run.clone(), id.clone()).await?]),
        Scope::Device(id) => (Some(("device_id", id.as_str())), SCOPED_CONCURRENCY),
        Scope::Client(id) => (Some(("client_id", id.as_str())), SCOPED_CONCURRENCY),
        Scope::Fleet => (None, FLEET_CONCURRENCY),
    };
    let filters: Vec<(&str, &str)> = filter.into_iter().collect();
    let agents: Vec<Agent> = collect_pages(&run.ctx, "/v1/agent", &filters, PAGE_SIZE)
        .await
        .map_err(|e| ToolError::new(e.code, format!("failed to list agents: {}", e.message)))?;
    progress(run.verbose, &format!("total agents collected: {}", agents.len()));
    Ok(agent_windows(run, agents, limit).await)
}

struct Request {
    scope: Scope,
    date: Option<NaiveDate>,
    markdown: bool,
    verbose: bool,
}

impl Request {
    fn from_args(args: &Args) -> Result<Self, ToolError> {
        let date = optional_string(args, "date")?
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                    ToolError::invalid("date", format!("invalid date format. Use YYYY-MM-DD: {e}"))
                })
            })
            .transpose()?;
        Ok(Self {
            scope: Scope::from_args(args)?,
            date,
            markdown: optional_string(args, "format")?.as_deref() == Some("markdown"),
            verbose: arg_bool(args, "verbose", false)?,
        })
    }

    fn target(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Utc::now().date_naive())
    }

    async fn windows(
        &self,
        ctx: &ToolContext,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<Vec<AgentWindow>, ToolError> {
        let run = Run {
            ctx: ctx.clone(),
            directory: Directory::default(),
            first,
            last,
            verbose: self.verbose,
        };
        scope_windows(&run, &self.scope).await.map_err(|e| {
            ToolError::new(
                e.code,
                format!(
                    "failed to generate {} report: {}",
                    self.scope.failure_label(),
                    e.message
                ),
            )
        })
    }
}

fn days(first: NaiveDate, last: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    first.iter_days().take_while(move |day| *day <= last)
}

async fn daily(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let request = Request::from_args(args)?;
    let day = request.target();
    let reports: Vec<DailyReport> = request
        .windows(ctx, day, day)
        .await?
        .iter()
        .map(|window| window.report_for(day))
        .collect();

    if request.markdown {
        return Ok(daily_markdown(&reports, day));
    }
    render(&json!({
        "date": day.format("%Y-%m-%d").to_string(),
        "reports": reports,
        "_metadata": {
            "description": "Daily backup and snapshot statistics",
            "guidance": "Use this data to identify backup failures, storage trends, and deletion patterns"
        }
    }))
}

/// Sunday on or before `day`.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_sunday()))
}

async fn weekly(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let request = Request::from_args(args)?;
    let first = week_start(request.target());
    let last = first + Duration::days(6);
    let windows = request.windows(ctx, first, last).await?;
    let week: Vec<Vec<DailyReport>> = days(first, last)
        .map(|day| windows.iter().map(|w| w.report_for(day)).collect())
        .collect();

    if request.markdown {
        return Ok(weekly_markdown(&week, first));
    }
    render(&json!({
        "week_start": first.format("%Y-%m-%d").to_string(),
        "week_end": last.format("%Y-%m-%d").to_string(),
        "daily_reports": week,
        "_metadata": {
            "description": "Weekly backup and snapshot statistics (Sunday to Saturday)",
            "guidance": "Use this data to identify weekly patterns and trends"
        }
    }))
}

fn month_bounds(day: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let first = day.with_day(1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((first, last))
}

async fn monthly(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let request = Request::from_args(args)?;
    let target = request.target();
    let (first, last) = month_bounds(target)
        .ok_or_else(|| ToolError::invalid("date", format!("date out of range: {target}")))?;
    let windows = request.windows(ctx, first, last).await?;
    let month: BTreeMap<u32, Vec<DailyReport>> = days(first, last)
        .map(|day| (day.day(), windows.iter().map(|w| w.report_for(day)).collect()))
        .collect();

    if request.markdown {
        return Ok(monthly_markdown(&month, first));
    }
    render(&json!({
        "month": first.format("%Y-%m").to_string(),
        "month_name": first.format("%B %Y").to_string(),
        "daily_reports": month,
        "_metadata": {
            "description": "Monthly backup and snapshot statistics",
            "guidance": "Use this data to identify monthly patterns and long-term trends"
        }
    }))
}

#[derive(Debug, Default)]
struct Totals {
    backups: usize,
    successful: usize,
    failed: usize,
    snapshots: usize,
    deleted: usize,
    agents: BTreeSet<String>,
}

impl Totals {
    fn of<'a>(reports: impl IntoIterator<Item = &'a DailyReport>) -> Self {
        let mut totals = Totals::default();
        for report in reports {
            totals.backups += report.backups.total;
            totals.successful += report.backups.successful;
            totals.failed += report.backups.failed;
            totals.snapshots += report.snapshots.total;
            totals.deleted += report.snapshots.deleted;
            totals.agents.insert(report.agent_id.clone());
        }
        totals
    }

    fn success_rate(&self) -> Option<f64> {
        (self.backups > 0).then(|| percentage(self.successful, self.backups))
    }

    fn write_summary(&self, out: &mut String, agents_label: &str, agents: usize, rate_label: &str) {
        let _ = writeln!(out, "- **{agents_label}**: {agents}");
        let _ = writeln!(out, "- **Total Backups**: {}", self.backups);
        if let Some(rate) = self.success_rate() {
            let _ = writeln!(out, "- **{rate_label}**: {rate:.1}%");
        }
        let _ = writeln!(out, "- **Total Snapshots**: {}", self.snapshots);
        let _ = writeln!(out, "- **Snapshots Deleted**: {}\n", self.deleted);
    }
}

pub fn daily_markdown(reports: &[DailyReport], day: NaiveDate) -> String {
    let mut out = format!(
        "# Daily Backup & Snapshot Report - {}\n\n",
        day.format("%Y-%m-%d")
    );
    if reports.is_empty() {
        out.push_str("No data available for the specified criteria.\n");
        return out;
    }

    out.push_str("## Summary\n\n");
    Totals::of(reports).write_summary(
        &mut out,
        "Total Agents Reporting",
        reports.len(),
        "Overall Success Rate",
    );

    out.push_str("## Agent Details\n\n");
    for report in reports {
        let _ = writeln!(out, "### {}", report.agent_name);
        if !report.client_name.is_empty() {
            let _ = writeln!(out, "**Client**: {}", report.client_name);
        }
        if !report.device_name.is_empty() {
            let _ = writeln!(out, "**Device**: {}", report.device_name);
        }
        out.push('\n');

        let b = &report.backups;
        out.push_str("**Backups:**\n");
        let _ = writeln!(out, "- Total: {}", b.total);
        let _ = writeln!(out, "- Successful: {}", b.successful);
        let _ = writeln!(out, "- Failed: {}", b.failed);
        if b.in_progress > 0 {
            let _ = writeln!(out, "- In Progress: {}", b.in_progress);
        }
        let _ = writeln!(out, "- Success Rate: {:.1}%", b.success_rate);
        if !b.failures_by_error.is_empty() {
            out.push_str("\n**Failure Reasons:**\n");
            for (message, count) in &b.failures_by_error {
                let _ = writeln!(out, "- {message}: {count}");
            }
        }

        let s = &report.snapshots;
        out.push_str("\n**Snapshots:**\n");
        let _ = writeln!(out, "- Total: {}", s.total);
        let _ = writeln!(out, "- Active: {}", s.active);
        let _ = writeln!(out, "- Deleted: {}", s.deleted);
        if s.deleted > 0 {
            let _ = writeln!(out, "  - By Retention Policy: {}", s.deleted_by_retention);
            let _ = writeln!(out, "  - Manually Deleted: {}", s.deleted_manually);
            let _ = writeln!(out, "  - Other Reasons: {}", s.deleted_other);
        }
        let _ = writeln!(out, "- Local Storage: {}", s.local_storage);
        let _ = writeln!(out, "- Cloud Storage: {}\n", s.cloud_storage);
        out.push_str("---\n\n");
    }
    out
}

pub fn weekly_markdown(week: &[Vec<DailyReport>], first: NaiveDate) -> String {
    let mut out = String::from("# Weekly Backup & Snapshot Report\n");
    let _ = writeln!(
        out,
        "## Week of {} to {}\n",
        first.format("%B %-d, %Y"),
        (first + Duration::days(6)).format("%B %-d, %Y")
    );

    let totals = Totals::of(week.iter().flatten());
    out.push_str("## Weekly Summary\n\n");
    totals.write_summary(
        &mut out,
        "Total Unique Agents",
        totals.agents.len(),
        "Weekly Success Rate",
    );

    out.push_str("## Daily Breakdown\n\n");
    for (offset, (label, reports)) in DAY_LABELS.iter().zip(week).enumerate() {
        let day = first + Duration::days(offset as i64);
        let _ = writeln!(out, "### {label} - {}\n", day.format("%b %-d"));
        if reports.is_empty() {
            out.push_str("No data available for this day.\n\n");
            continue;
        }
        let day_totals = Totals::of(reports);
        let _ = writeln!(out, "- Agents: {}", reports.len());
        match day_totals.success_rate() {
            Some(rate) => {
                let _ = writeln!(out, "- Backups: {} ({rate:.1}% success)", day_totals.backups);
            }
            None => {
                let _ = writeln!(out, "- Backups: {} (no backups)", day_totals.backups);
            }
        }
        let _ = writeln!(out, "- Snapshots: {}\n", day_totals.snapshots);
    }
    out
}

/// Calendar cell marker for a day's backup success rate.
pub fn success_indicator(rate: f64) -> &'static str {
    if rate >= 90.0 {
        "✓"
    } else if rate >= 50.0 {
        "~"
    } else {
        "✗"
    }
}

pub fn monthly_markdown(month: &BTreeMap<u32, Vec<DailyReport>>, first: NaiveDate) -> String {
    let mut out = format!(
        "# Monthly Backup & Snapshot Report - {}\n\n",
        first.format("%B %Y")
    );

    let totals = Totals::of(month.values().flatten());
    out.push_str("## Monthly Summary\n\n");
    totals.write_summary(
        &mut out,
        "Total Unique Agents",
        totals.agents.len(),
        "Monthly Success Rate",
    );

    out.push_str("## Calendar View\n\n");
    out.push_str("| Sun | Mon | Tue | Wed | Thu | Fri | Sat |\n");
    out.push_str("|-----|-----|-----|-----|-----|-----|-----|\n");

    let last_day = month_bounds(first).map_or(28, |(_, last)| last.day());
    let lead = first.weekday().num_days_from_sunday();
    let mut day = 1;
    for week in 0..6 {
        if day > last_day {
            break;
        }
        out.push('|');
        for weekday in 0..7 {
            if (week == 0 && weekday < lead) || day > last_day {
                out.push_str("     |");
                continue;
            }
            let day_totals = Totals::of(month.get(&day).into_iter().flatten());
            match day_totals.success_rate() {
                Some(rate) => {
                    let _ = write!(out, " {day:>2}{} |", success_indicator(rate));
                }
                None => {
                    let _ = write!(out, " {day:>2}  |");
                }
            }
            day += 1;
        }
        out.push('\n');
    }
    out.push_str("\n**Legend:** ✓ = ≥90% success, ~ = 50-89% success, ✗ = <50% success\n\n");

    out.push_str("## Daily Details\n\n");
    for (day, reports) in month {
        if reports.is_empty() {
            continue;
        }
        let Some(date) = first.with_day(*day) else {
            continue;
        };
        let day_totals = Totals::of(reports);
        let _ = writeln!(out, "### {}", date.format("%B %-d (%A)"));
        let _ = writeln!(out, "- **Agents**: {}", reports.len());
        let _ = writeln!(
            out,
            "- **Backups**: {} total ({} successful, {} failed)",
            day_totals.backups, day_totals.successful, day_totals.failed
        );
        if let Some(rate) = day_totals.success_rate() {
            let _ = writeln!(out, "- **Success Rate**: {rate:.1}%");
        }
        let _ = writeln!(out, "- **Snapshots**: {}\n", day_totals.snapshots);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, context_for};
    use serde_json::Value;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
    }

    fn backup(status: &str, error: Option<&str>) -> Backup {
        Backup {
            status: status.to_string(),
            error_message: error.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn backup_stats_track_status_and_failure_reasons() {
        let mut stats = BackupStats::default();
        for b in [
            backup("success", None),
            backup("success", None),
            backup("failed", Some("disk full")),
            backup("running", None),
        ] {
            stats.record(&b);
        }
        assert_eq!(stats.total, 4);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.success_rate, 50.0);
        assert_eq!(stats.failures_by_error.get("disk full"), Some(&1));
    }

    #[test]
    fn snapshot_stats_split_storage_and_deletion_reasons() {
        let active: Vec<Snapshot> = serde_json::from_value(json!([
            {"locations": [{"type": "local", "device_id": "d1"}, {"type": "cloud", "device_id": "c"}]},
            {"locations": [{"type": "local", "device_id": "d1"}]}
        ]))
        .expect("active");
        let deleted: Vec<Snapshot> = serde_json::from_value(json!([
            {"deletions": [{"type": "retention"}, {"type": "manual"}]},
            {"deletions": [{"type": "manual"}]},
            {"deletions": [{"type": "quota"}]}
        ]))
        .expect("deleted");
        let stats = SnapshotStats::from_snapshots(&active, &deleted);
        assert_eq!(
            stats,
            SnapshotStats {
                total: 5,
                active: 2,
                deleted: 3,
                deleted_by_retention: 1,
                deleted_manually: 1,
                deleted_other: 1,
                local_storage: 2,
                cloud_storage: 1,
            }
        );
    }

    #[test]
    fn week_starts_on_sunday_and_months_end_correctly() {
        assert_eq!(week_start(date("2024-06-12")), date("2024-06-09"));
        assert_eq!(week_start(date("2024-06-09")), date("2024-06-09"));
        assert_eq!(
            month_bounds(date("2024-02-17")),
            Some((date("2024-02-01"), date("2024-02-29")))
        );
    }

    #[test]
    fn monthly_calendar_marks_success_levels() {
        let report = |successful: usize, total: usize| DailyReport {
            agent_id: "a1".into(),
            backups: BackupStats {
                total,
                successful,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut month = BTreeMap::new();
        month.insert(1, vec![report(10, 10)]);
        month.insert(2, vec![report(6, 10)]);
        month.insert(3, vec![report(1, 10)]);
        month.insert(4, Vec::new());
        let out = monthly_markdown(&month, date("2024-06-01"));
        assert!(out.starts_with("# Monthly Backup & Snapshot Report - June 2024\n"));
        assert!(out.contains("|     |     |     |     |     |     |  1✓ |\n|  2~ |  3✗ |  4  |"));
        assert!(out.contains("### June 1 (Saturday)\n"));
        assert!(!out.contains("### June 4 (Tuesday)"));
    }

    #[test]
    fn empty_daily_markdown_says_so() {
        assert_eq!(
            daily_markdown(&[], date("2024-06-01")),
            "# Daily Backup & Snapshot Report - 2024-06-01\n\nNo data available for the specified criteria.\n"
        );
    }

    #[tokio::test]
    async fn bad_date_is_rejected_before_any_request() {
        let server = MockServer::start().await;
        let err = daily(&context_for(&server), &args(json!({"date": "06/01/2024"})))
            .await
            .expect_err("bad date");
        assert!(err.message.starts_with("invalid date format. Use YYYY-MM-DD:"));
    }

    #[tokio::test]
    async fn agent_daily_report_buckets_backups_for_the_day() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/agent/a1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "agent_id": "a1", "display_name": "DC01", "device_id": "d1", "client_id": "c1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/device/d1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_id": "d1", "hostname": "slide-01"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/client/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "client_id": "c1", "name": "Acme"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/backup"))
            .and(query_param("agent_id", "a1"))
            .and(query_param("sort_asc", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagination": {"total": 4, "next_offset": 4},
                "data": [
                    {"backup_id": "b0", "started_at": "2024-06-02T01:00:00Z", "status": "success"},
                    {"backup_id": "b1", "started_at": "2024-06-01T20:00:00Z", "status": "success"},
                    {"backup_id": "b2", "started_at": "2024-06-01T08:00:00Z", "status": "failed", "error_message": "timeout"},
                    {"backup_id": "b3", "started_at": "2024-05-31T23:00:00Z", "status": "success"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/snapshot"))
            .and(query_param("snapshot_location", "exists_deleted"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/snapshot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagination": {"total": 1},
                "data": [{"snapshot_id": "s1", "locations": [{"type": "local"}]}]
            })))
            .mount(&server)
            .await;

        let out = daily(
            &context_for(&server),
            &args(json!({"agent_id": "a1", "date": "2024-06-01"})),
        )
        .await
        .expect("report");
        let value: Value = serde_json::from_str(&out).expect("json");
        let report = &value["reports"][0];
        assert_eq!(value["date"], "2024-06-01");
        assert_eq!(report["agent_name"], "DC01");
        assert_eq!(report["device_name"], "slide-01");
        assert_eq!(report["client_name"], "Acme");
        assert_eq!(report["backups"]["total"], 2);
        assert_eq!(report["backups"]["failures_by_error"]["timeout"], 1);
        assert_eq!(report["snapshots"]["active"], 1);
        assert_eq!(report["snapshots"]["deleted"], 0);
    }
}
