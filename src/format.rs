//! Output formatting for operator reports.

use crate::aggregate::{CustomerOverview, Overview};
use crate::types::PhaseInfo;
use chrono::{DateTime, Utc};
use clap::ValueEnum;

/// Output format for CLI reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[value(alias = "md")]
    Markdown,
}

/// Render a millisecond timestamp as `YYYY-MM-DD HH:MM` UTC.
pub fn format_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn phase_label(phases: &[PhaseInfo], phase: i32) -> String {
    phases
        .iter()
        .find(|p| p.phase == phase)
        .map(|p| p.label.clone())
        .unwrap_or_else(|| format!("Phase {}", phase))
}

fn format_customer_line(row: &CustomerOverview, phases: &[PhaseInfo]) -> String {
    let p = &row.progress;
    let mut flags = Vec::new();
    if p.pending_verification > 0 {
        flags.push(format!("{} to verify", p.pending_verification));
    }
    if p.unread_comments > 0 {
        flags.push(format!("{} unread", p.unread_comments));
    }
    if p.stuck {
        flags.push("stuck".to_string());
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };

    format!(
        "- **{}** ({}) {}% {}/{} - {} - OM {}{}\n",
        row.customer.name,
        row.customer.email,
        p.percentage,
        p.completed,
        p.total,
        phase_label(phases, row.current_phase),
        row.customer.assigned_om,
        flags,
    )
}

/// Portfolio overview as markdown.
pub fn format_overview_markdown(overview: &Overview, phases: &[PhaseInfo]) -> String {
    let s = &overview.stats;
    let mut md = String::new();

    md.push_str("# Onboarding Overview\n\n");
    md.push_str(&format!("- **customers**: {}\n", s.total_customers));
    md.push_str(&format!("- **active**: {}\n", s.active));
    md.push_str(&format!("- **completed**: {}\n", s.completed));
    md.push_str(&format!("- **pending verification**: {}\n", s.pending_verification));
    md.push_str(&format!("- **unread comments**: {}\n", s.unread_comments));
    md.push_str(&format!("- **stuck**: {}\n\n", s.stuck));

    md.push_str(&format!("## Customers ({})\n\n", overview.customers.len()));
    for row in &overview.customers {
        md.push_str(&format_customer_line(row, phases));
    }

    if !overview.verification_feed.is_empty() {
        md.push_str(&format!(
            "\n## Awaiting Verification ({})\n\n",
            overview.verification_feed.len()
        ));
        for item in &overview.verification_feed {
            let when = item.completed_at.map(format_timestamp).unwrap_or_default();
            md.push_str(&format!(
                "- {} / {} `{}` {}\n",
                item.customer_name, item.task_name, item.progress_id, when
            ));
        }
    }

    if !overview.unread_feed.is_empty() {
        md.push_str(&format!("\n## Unread Comments ({})\n\n", overview.unread_feed.len()));
        for item in &overview.unread_feed {
            let c = &item.comment;
            md.push_str(&format!(
                "- {} on {}: _{}_ ({})\n",
                c.author_name.as_deref().unwrap_or(&c.author_email),
                item.task_name.as_deref().unwrap_or("unknown task"),
                c.message,
                format_timestamp(c.created_at),
            ));
        }
    }

    md
}
