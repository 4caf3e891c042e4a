//! Report templates and presentation cards fetched from the public templates repository.

use std::time::Duration;

use serde_json::json;
use slide_core::error::tool_codes;
use slide_core::policy::tools;

use crate::args::{Args, optional_string, required_string};
use crate::context::ToolContext;
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, properties, require_when};

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const FORMATS: [&str; 4] = ["html", "haml", "markdown", "md"];

/// Card types with the description returned alongside their content.
pub const CARDS: [(&str, &str); 8] = [
    ("agent", "Individual backup agent card - Shows detailed info for a single agent including hostname, OS, status, recent backups, and client assignment. Use for agent status pages or detailed agent views."),
    ("agents_table", "Multiple agents table card - Shows overview table of multiple agents with status, last seen, and assignments. Use for agent dashboard, status overview, or multi-agent comparison."),
    ("client", "Individual client card - Shows detailed info for a single client including name, agent count, device assignments, and stats. Use for client detail pages or client status views."),
    ("clients_table", "Multiple clients table card - Shows overview table of multiple clients with agent counts and assignments. Use for client dashboard or multi-client management views."),
    ("device", "Individual backup device card - Shows detailed info for a single backup device including capacity, assignments, and storage info. Use for device status pages or detailed device views."),
    ("devices_table", "Multiple devices table card - Shows overview table of multiple backup devices with capacity and assignments. Use for device dashboard or storage management views."),
    ("snapshot", "Individual snapshot card - Shows detailed info for a single backup snapshot including date, size, status, and retention. Use for backup detail pages or snapshot analysis."),
    ("snapshots_table", "Multiple snapshots table card - Shows chronological table of multiple backup snapshots with sizes and status. Use for backup history, snapshot dashboard, or backup timeline views."),
];

const CARD_ALIASES: [(&str, &str); 1] = [("snapshot_table", "snapshots_table")];

pub fn spec() -> ToolSpec {
    let card_names: Vec<&str> = CARDS
        .iter()
        .map(|(name, _)| *name)
        .chain(CARD_ALIASES.iter().map(|(alias, _)| *alias))
        .collect();
    ToolSpec::new(
        tools::PRESENTATION,
        "USE THIS TOOL ANYTIME YOU'RE PRESENTING DATA TO THE USER. Provides report templates (runbooks, daily reports, monthly reports) for comprehensive documents and cards (agent, client, device, snapshot and their table variants) for structured data display. Use single cards for one item in detail, table cards for multiple items, and report templates for documentation.",
        json!({
            "type": "object",
            "properties": properties(&[
                json!({"operation": {"type": "string", "description": "Choose based on what you're presenting: 'get_card' for displaying backup system data, 'get_runbook_template' for operational procedures, 'get_daily_report_template' for daily summaries, 'get_monthly_report_template' for monthly analysis"}}),
                json!({
                    "format": {
                        "type": "string",
                        "description": "Template format - 'html' for web display, 'haml' for Ruby/Rails apps, 'markdown' for documentation. Only applies to report templates, not cards.",
                        "enum": FORMATS,
                        "default": "markdown"
                    },
                    "card_type": {
                        "type": "string",
                        "description": "Required for 'get_card'. Single item cards: agent, client, device, snapshot. Table cards: agents_table, clients_table, devices_table, snapshots_table.",
                        "enum": card_names
                    }
                }),
            ]),
            "required": ["operation"],
            "allOf": require_when(&[("get_card", &["card_type"])]),
        }),
    )
    .operation(op!("get_runbook_template", runbook_template))
    .operation(op!("get_daily_report_template", daily_report_template))
    .operation(op!("get_monthly_report_template", monthly_report_template))
    .operation(op!("get_card", card))
}

/// Template families under the templates base URL.
#[derive(Debug, Clone, Copy)]
enum Template {
    Runbook,
    DailyReport,
    MonthlyReport,
}

impl Template {
    fn dir(self) -> &'static str {
        match self {
            Template::Runbook => "runbook",
            Template::DailyReport => "daily_report",
            Template::MonthlyReport => "monthly_report",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Template::Runbook => "runbook",
            Template::DailyReport => "daily report",
            Template::MonthlyReport => "monthly report",
        }
    }

    fn default_format(self) -> &'static str {
        match self {
            Template::Runbook => "markdown",
            Template::DailyReport | Template::MonthlyReport => "html",
        }
    }
}

fn extension(format: &str) -> Result<&'static str, ToolError> {
    match format {
        "html" => Ok("html"),
        "haml" => Ok("haml"),
        "markdown" | "md" => Ok("md"),
        other => Err(ToolError::invalid(
            "format",
            format!("unsupported format: {other}. Supported formats: html, haml, markdown, md"),
        )),
    }
}

fn fetch_failed(message: String) -> ToolError {
    ToolError::new(tool_codes::FETCH_ERROR, message)
}

async fn template(ctx: &ToolContext, args: &Args, template: Template) -> Result<String, ToolError> {
    let format = optional_string(args, "format")?.unwrap_or_else(|| template.default_format().to_string());
    let ext = extension(&format)?;
    let base = ctx.sources.template_base.trim_end_matches('/');
    let dir = template.dir();
    let label = template.label();

    let context = ctx
        .fetch_text(&format!("{base}/{dir}/context.txt"), FETCH_TIMEOUT)
        .await
        .map_err(|e| fetch_failed(format!("failed to download {label} context: {e}")))?;
    let body = ctx
        .fetch_text(&format!("{base}/{dir}/{dir}.{ext}"), FETCH_TIMEOUT)
        .await
        .map_err(|e| fetch_failed(format!("failed to download {label} template: {e}")))?;
    Ok(format!("{context}\n\nTEMPLATE CONTENT:\n{body}"))
}

async fn runbook_template(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    template(ctx, args, Template::Runbook).await
}

async fn daily_report_template(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    template(ctx, args, Template::DailyReport).await
}

async fn monthly_report_template(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    template(ctx, args, Template::MonthlyReport).await
}

/// Canonical card name and description, accepting the singular table alias.
pub fn resolve_card(card_type: &str) -> Option<(&'static str, &'static str)> {
    let canonical = CARD_ALIASES
        .iter()
        .find(|(alias, _)| *alias == card_type)
        .map_or(card_type, |(_, target)| *target);
    CARDS.iter().find(|(name, _)| *name == canonical).copied()
}

async fn card(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let card_type = required_string(args, "card_type")?;
    let Some((name, description)) = resolve_card(&card_type) else {
        let valid: Vec<&str> = CARDS.iter().map(|(name, _)| *name).collect();
        return Err(ToolError::invalid(
            "card_type",
            format!("invalid card_type: {card_type}. Valid types: {}", valid.join(", ")),
        ));
    };
    let url = format!("{}/{name}.md", ctx.sources.card_base.trim_end_matches('/'));
    let content = ctx
        .fetch_text(&url, FETCH_TIMEOUT)
        .await
        .map_err(|e| fetch_failed(format!("failed to download card: {e}")))?;
    Ok(format!(
        "CARD TYPE: {name}\nDESCRIPTION: {description}\nSOURCE: {url}\n\nCARD CONTENT:\n{content}"
    ))
}
