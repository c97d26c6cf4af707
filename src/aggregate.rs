//! Derived reporting views over a fully loaded ledger.
//!
//! Nothing here touches the database. Every view is recomputed from a
//! [`Ledger`] snapshot after each reload.

use crate::types::{
    Customer, CustomerProgress, MAX_PHASE, MIN_PHASE, Phase, Report, Task, TaskComment, TaskFile,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Everything the views are computed from.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ledger {
    /// Newest first.
    pub customers: Vec<Customer>,
    /// Catalog order (phase, sort_order).
    pub tasks: Vec<Task>,
    pub progress: Vec<CustomerProgress>,
    /// Oldest first.
    pub comments: Vec<TaskComment>,
    pub reports: Vec<Report>,
    pub task_files: Vec<TaskFile>,
}

impl Ledger {
    pub fn customer(&self, customer_id: &str) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == customer_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn progress_for(&self, customer_id: &str, task_id: &str) -> Option<&CustomerProgress> {
        self.progress
            .iter()
            .find(|p| p.customer_id == customer_id && p.task_id == task_id)
    }

    /// Progress rows of one customer whose task still applies to them, in catalog order.
    pub fn rows_for(&self, customer_id: &str) -> Vec<(&Task, &CustomerProgress)> {
        let by_task: HashMap<&str, &CustomerProgress> = self
            .progress
            .iter()
            .filter(|p| p.customer_id == customer_id)
            .map(|p| (p.task_id.as_str(), p))
            .collect();

        self.tasks
            .iter()
            .filter(|t| t.applies_to(customer_id))
            .filter_map(|t| by_task.get(t.id.as_str()).map(|p| (t, *p)))
            .collect()
    }
}

/// Per-customer progress numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub verified: usize,
    /// Applicable, non-skipped rows.
    pub total: usize,
    pub percentage: u32,
    pub pending_verification: usize,
    pub last_activity: Option<i64>,
    pub unread_comments: usize,
    pub stuck: bool,
}

/// `round(100 * completed / total)`, 0 for an empty total.
pub fn percentage(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 * 100.0) / total as f64).round() as u32
}

/// Partial progress with no activity inside the staleness window.
pub fn is_stuck(
    percentage: u32,
    last_activity: Option<i64>,
    now: i64,
    stale_after_days: u32,
) -> bool {
    if percentage == 0 || percentage >= 100 {
        return false;
    }
    match last_activity {
        None => true,
        Some(at) => now - at > i64::from(stale_after_days) * DAY_MS,
    }
}

pub fn customer_snapshot(
    ledger: &Ledger,
    customer_id: &str,
    unread: &[TaskComment],
    now: i64,
    stale_after_days: u32,
) -> ProgressSnapshot {
    let rows = ledger.rows_for(customer_id);
    let counted: Vec<&CustomerProgress> = rows
        .iter()
        .map(|(_, p)| *p)
        .filter(|p| !p.is_skipped)
        .collect();

    let total = counted.len();
    let completed = counted.iter().filter(|p| p.completed).count();
    let verified = counted.iter().filter(|p| p.completed && p.verified).count();
    let pending_verification = counted.iter().filter(|p| p.awaits_verification()).count();
    let last_activity = counted
        .iter()
        .filter(|p| p.completed)
        .filter_map(|p| p.completed_at)
        .max();
    let pct = percentage(completed, total);

    ProgressSnapshot {
        completed,
        verified,
        total,
        percentage: pct,
        pending_verification,
        last_activity,
        unread_comments: unread.iter().filter(|c| c.customer_id == customer_id).count(),
        stuck: is_stuck(pct, last_activity, now, stale_after_days),
    }
}

/// Customer comments with no later staff comment on the same thread, newest first.
pub fn unreplied_customer_comments(comments: &[TaskComment]) -> Vec<TaskComment> {
    let mut threads: HashMap<&str, Vec<&TaskComment>> = HashMap::new();
    for comment in comments {
        threads.entry(comment.progress_id.as_str()).or_default().push(comment);
    }

    let mut unread = Vec::new();
    for thread in threads.values_mut() {
        // Stable: equal timestamps keep their load order.
        thread.sort_by_key(|c| c.created_at);

        let last_staff = thread.iter().rposition(|c| c.author_role.is_staff());
        let first_unread = last_staff.map_or(0, |i| i + 1);
        unread.extend(
            thread[first_unread..]
                .iter()
                .filter(|c| !c.author_role.is_staff())
                .map(|c| (*c).clone()),
        );
    }

    unread.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    unread
}

/// Counters across every customer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GlobalStats {
    pub total_customers: usize,
    pub active: usize,
    pub completed: usize,
    pub pending_verification: usize,
    pub unread_comments: usize,
    pub stuck: usize,
}

pub fn global_stats<'a>(
    snapshots: impl IntoIterator<Item = &'a ProgressSnapshot>,
    unread_feed_len: usize,
) -> GlobalStats {
    let mut stats = GlobalStats {
        unread_comments: unread_feed_len,
        ..Default::default()
    };
    for s in snapshots {
        stats.total_customers += 1;
        if s.percentage > 0 && s.percentage < 100 {
            stats.active += 1;
        }
        if s.percentage == 100 {
            stats.completed += 1;
        }
        if s.stuck {
            stats.stuck += 1;
        }
        stats.pending_verification += s.pending_verification;
    }
    stats
}

/// Lowest phase with an incomplete, non-skipped task.
///
/// Finished customers sit in the last phase; customers without any
/// applicable task sit in the first.
pub fn current_phase(ledger: &Ledger, customer_id: &str) -> Phase {
    let rows = ledger.rows_for(customer_id);
    if rows.iter().all(|(_, p)| p.is_skipped) {
        return MIN_PHASE;
    }
    rows.iter()
        .filter(|(_, p)| !p.is_skipped && !p.completed)
        .map(|(t, _)| t.phase)
        .min()
        .unwrap_or(MAX_PHASE)
}

/// Case-insensitive substring match on name or email. Blank queries match everything.
pub fn matches_search(customer: &Customer, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty()
        || customer.name.to_lowercase().contains(&query)
        || customer.email.to_lowercase().contains(&query)
}

/// A group of items sharing a phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseGroup<T> {
    pub phase: Phase,
    pub phase_name: String,
    pub items: Vec<T>,
}

/// Partition items by phase, ascending. Items keep their relative order and
/// each group takes its label from its first item.
pub fn group_by_phase<T, F>(items: impl IntoIterator<Item = T>, key: F) -> Vec<PhaseGroup<T>>
where
    F: Fn(&T) -> (Phase, &str),
{
    let mut groups: BTreeMap<Phase, PhaseGroup<T>> = BTreeMap::new();
    for item in items {
        let (phase, name) = key(&item);
        let name = name.to_string();
        groups
            .entry(phase)
            .or_insert_with(|| PhaseGroup {
                phase,
                phase_name: name,
                items: Vec::new(),
            })
            .items
            .push(item);
    }
    groups.into_values().collect()
}

/// One task as seen on a customer's checklist.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistRow {
    pub task: Task,
    pub progress: CustomerProgress,
    pub comments: Vec<TaskComment>,
    pub template_files: Vec<TaskFile>,
}

/// Completed / verified / total within one phase group, skipped rows excluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseCounters {
    pub completed: usize,
    pub verified: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistPhase {
    #[serde(flatten)]
    pub group: PhaseGroup<ChecklistRow>,
    pub counters: PhaseCounters,
    /// Whether the customer has this phase hidden.
    pub hidden: bool,
}

pub fn phase_counters(rows: &[ChecklistRow]) -> PhaseCounters {
    let mut counters = PhaseCounters::default();
    for row in rows.iter().filter(|r| !r.progress.is_skipped) {
        counters.total += 1;
        if row.progress.completed {
            counters.completed += 1;
            if row.progress.verified {
                counters.verified += 1;
            }
        }
    }
    counters
}

/// The customer's checklist grouped by phase.
///
/// Staff views pass `customer_facing = false` and see everything. The
/// customer-facing view omits hidden phases and skipped tasks.
pub fn checklist(
    ledger: &Ledger,
    customer: &Customer,
    customer_facing: bool,
) -> Vec<ChecklistPhase> {
    let rows = ledger
        .rows_for(&customer.id)
        .into_iter()
        .filter(|(t, p)| !customer_facing || (!p.is_skipped && !customer.is_phase_hidden(t.phase)))
        .map(|(task, progress)| ChecklistRow {
            task: task.clone(),
            progress: progress.clone(),
            comments: ledger
                .comments
                .iter()
                .filter(|c| c.progress_id == progress.id)
                .cloned()
                .collect(),
            template_files: ledger
                .task_files
                .iter()
                .filter(|f| f.task_id == task.id)
                .cloned()
                .collect(),
        });

    group_by_phase(rows, |r| (r.task.phase, r.task.phase_name.as_str()))
        .into_iter()
        .map(|group| ChecklistPhase {
            counters: phase_counters(&group.items),
            hidden: customer.is_phase_hidden(group.phase),
            group,
        })
        .collect()
}

/// Task that unlocks a report for a customer.
///
/// An explicit `unlocking_task_id` wins; otherwise the first applicable task
/// in catalog order listing the report's name in `unlocks_report`.
pub fn unlocking_task<'a>(
    ledger: &'a Ledger,
    report: &Report,
    customer_id: &str,
) -> Option<&'a Task> {
    if let Some(task_id) = &report.unlocking_task_id {
        return ledger.task(task_id);
    }
    ledger
        .tasks
        .iter()
        .find(|t| t.applies_to(customer_id) && t.unlocks(&report.name))
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportStatus {
    pub report: Report,
    pub unlocked: bool,
    pub unlocking_task_id: Option<String>,
    pub unlocking_task_name: Option<String>,
}

/// Unlock state of every report for one customer, in report order.
/// Completion alone unlocks; verification is not required.
pub fn report_statuses(ledger: &Ledger, customer_id: &str) -> Vec<ReportStatus> {
    ledger
        .reports
        .iter()
        .map(|report| {
            let task = unlocking_task(ledger, report, customer_id);
            let unlocked = task
                .and_then(|t| ledger.progress_for(customer_id, &t.id))
                .is_some_and(|p| p.completed);
            ReportStatus {
                report: report.clone(),
                unlocked,
                unlocking_task_id: task.map(|t| t.id.clone()),
                unlocking_task_name: task.map(|t| t.task_name.clone()),
            }
        })
        .collect()
}

/// First locked report, the "up next" teaser.
pub fn next_report(statuses: &[ReportStatus]) -> Option<&ReportStatus> {
    statuses.iter().find(|s| !s.unlocked)
}

/// A completed row waiting for staff verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationItem {
    pub progress_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub task_id: String,
    pub task_name: String,
    pub phase: Phase,
    pub completed_at: Option<i64>,
}

/// Every row awaiting verification, most recently completed first.
pub fn verification_feed(ledger: &Ledger) -> Vec<VerificationItem> {
    let mut feed: Vec<VerificationItem> = ledger
        .customers
        .iter()
        .flat_map(|customer| {
            ledger
                .rows_for(&customer.id)
                .into_iter()
                .filter(|(_, p)| p.awaits_verification())
                .map(move |(task, progress)| VerificationItem {
                    progress_id: progress.id.clone(),
                    customer_id: customer.id.clone(),
                    customer_name: customer.name.clone(),
                    task_id: task.id.clone(),
                    task_name: task.task_name.clone(),
                    phase: task.phase,
                    completed_at: progress.completed_at,
                })
        })
        .collect();
    feed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    feed
}

/// An unreplied customer comment with display context.
#[derive(Debug, Clone, Serialize)]
pub struct UnreadItem {
    #[serde(flatten)]
    pub comment: TaskComment,
    pub customer_name: Option<String>,
    pub task_name: Option<String>,
}

pub fn unread_feed(ledger: &Ledger, unread: &[TaskComment]) -> Vec<UnreadItem> {
    unread
        .iter()
        .map(|comment| {
            let task_name = ledger
                .progress
                .iter()
                .find(|p| p.id == comment.progress_id)
                .and_then(|p| ledger.task(&p.task_id))
                .map(|t| t.task_name.clone());
            UnreadItem {
                customer_name: ledger.customer(&comment.customer_id).map(|c| c.name.clone()),
                task_name,
                comment: comment.clone(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerOverview {
    pub customer: Customer,
    pub progress: ProgressSnapshot,
    pub current_phase: Phase,
}

/// Admin overview filters.
#[derive(Debug, Clone, Default)]
pub struct OverviewFilter {
    pub search: Option<String>,
    pub phase: Option<Phase>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    /// Computed over every customer, regardless of the filter.
    pub stats: GlobalStats,
    pub customers: Vec<CustomerOverview>,
    pub verification_feed: Vec<VerificationItem>,
    pub unread_feed: Vec<UnreadItem>,
}

pub fn overview(
    ledger: &Ledger,
    filter: &OverviewFilter,
    now: i64,
    stale_after_days: u32,
) -> Overview {
    let unread = unreplied_customer_comments(&ledger.comments);

    let all: Vec<CustomerOverview> = ledger
        .customers
        .iter()
        .map(|customer| CustomerOverview {
            progress: customer_snapshot(ledger, &customer.id, &unread, now, stale_after_days),
            current_phase: current_phase(ledger, &customer.id),
            customer: customer.clone(),
        })
        .collect();

    let stats = global_stats(all.iter().map(|c| &c.progress), unread.len());

    let customers = all
        .into_iter()
        .filter(|c| {
            filter
                .search
                .as_deref()
                .is_none_or(|q| matches_search(&c.customer, q))
        })
        .filter(|c| filter.phase.is_none_or(|p| c.current_phase == p))
        .collect();

    Overview {
        stats,
        customers,
        verification_feed: verification_feed(ledger),
        unread_feed: unread_feed(ledger, &unread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthorRole, TaskOwner};
    use std::collections::BTreeSet;

    fn customer(id: &str, name: &str) -> Customer {
        Customer {
            id: id.into(),
            name: name.into(),
            email: format!("{}@example.com", id),
            company: None,
            phone: None,
            assigned_om: "Olive".into(),
            assigned_om_id: None,
            hidden_phases: BTreeSet::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn task(id: &str, phase: Phase, order: i32) -> Task {
        Task {
            id: id.into(),
            phase,
            phase_name: format!("Phase {}", phase),
            task_name: format!("Task {}", id),
            description: None,
            owner: TaskOwner::Customer,
            est_time: None,
            sort_order: order,
            is_success_gate: false,
            unlocks_report: None,
            requires_upload: false,
            customer_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn progress(id: &str, customer_id: &str, task_id: &str) -> CustomerProgress {
        CustomerProgress {
            id: id.into(),
            customer_id: customer_id.into(),
            task_id: task_id.into(),
            completed: false,
            completed_at: None,
            verified: false,
            verified_at: None,
            verified_by: None,
            is_skipped: false,
            files: vec![],
            notes: None,
            updated_at: 0,
        }
    }

    fn comment(id: &str, progress_id: &str, role: AuthorRole, at: i64) -> TaskComment {
        TaskComment {
            id: id.into(),
            progress_id: progress_id.into(),
            customer_id: "c1".into(),
            author_email: "x@example.com".into(),
            author_name: None,
            author_role: role,
            message: "hi".into(),
            created_at: at,
        }
    }

    fn report(id: &str, name: &str) -> Report {
        Report {
            id: id.into(),
            name: name.into(),
            phase: 2,
            description: None,
            key_metric: None,
            report_url: None,
            sort_order: 1,
            unlocking_task_id: None,
            created_at: 0,
        }
    }

    fn three_task_ledger() -> Ledger {
        Ledger {
            customers: vec![customer("c1", "Bistro")],
            tasks: vec![task("t1", 0, 1), task("t2", 1, 1), task("t3", 2, 1)],
            progress: vec![
                progress("p1", "c1", "t1"),
                progress("p2", "c1", "t2"),
                progress("p3", "c1", "t3"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn percentage_rounds_and_handles_zero_total() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(3, 3), 100);
    }

    #[test]
    fn snapshot_excludes_skipped_rows() {
        let mut ledger = three_task_ledger();
        ledger.progress[0].completed = true;
        ledger.progress[0].completed_at = Some(10);
        ledger.progress[2].is_skipped = true;
        ledger.progress[2].completed = true;

        let s = customer_snapshot(&ledger, "c1", &[], 10, 7);
        assert_eq!(s.total, 2);
        assert_eq!(s.completed, 1);
        assert_eq!(s.percentage, 50);
        assert_eq!(s.pending_verification, 1);
        assert_eq!(s.last_activity, Some(10));
        assert!(!s.stuck);
    }

    #[test]
    fn snapshot_ignores_other_customers_custom_tasks() {
        let mut ledger = three_task_ledger();
        let mut custom = task("t4", 1, 1);
        custom.customer_id = Some("c2".into());
        ledger.tasks.push(custom);
        // Stray row pointing at a task that belongs to someone else.
        ledger.progress.push(progress("p4", "c1", "t4"));

        assert_eq!(customer_snapshot(&ledger, "c1", &[], 0, 7).total, 3);
    }

    #[test]
    fn stale_partial_progress_is_stuck() {
        let now = 30 * DAY_MS;
        assert!(is_stuck(50, Some(now - 8 * DAY_MS), now, 7));
        assert!(!is_stuck(50, Some(now - 6 * DAY_MS), now, 7));
        assert!(is_stuck(50, None, now, 7));
        assert!(!is_stuck(0, None, now, 7));
        assert!(!is_stuck(100, Some(0), now, 7));
    }

    #[test]
    fn staff_reply_clears_earlier_customer_comments_only() {
        let comments = vec![
            comment("a", "p1", AuthorRole::Customer, 1),
            comment("b", "p1", AuthorRole::Om, 2),
            comment("c", "p1", AuthorRole::Customer, 3),
            comment("d", "p2", AuthorRole::Customer, 4),
        ];
        let unread = unreplied_customer_comments(&comments);
        let ids: Vec<&str> = unread.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c"]);
    }

    #[test]
    fn unread_uses_timestamps_not_load_order() {
        let comments = vec![
            comment("reply", "p1", AuthorRole::Admin, 5),
            comment("question", "p1", AuthorRole::Customer, 1),
        ];
        assert!(unreplied_customer_comments(&comments).is_empty());
    }

    #[test]
    fn global_stats_sum_per_customer_values() {
        let snapshots = [
            ProgressSnapshot {
                percentage: 50,
                pending_verification: 2,
                stuck: true,
                ..Default::default()
            },
            ProgressSnapshot {
                percentage: 100,
                pending_verification: 1,
                ..Default::default()
            },
            ProgressSnapshot::default(),
        ];
        let stats = global_stats(snapshots.iter(), 4);
        assert_eq!(stats.total_customers, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending_verification, 3);
        assert_eq!(stats.unread_comments, 4);
        assert_eq!(stats.stuck, 1);
    }

    #[test]
    fn current_phase_is_lowest_open_phase() {
        let mut ledger = three_task_ledger();
        assert_eq!(current_phase(&ledger, "c1"), 0);

        ledger.progress[0].completed = true;
        assert_eq!(current_phase(&ledger, "c1"), 1);

        ledger.progress[1].is_skipped = true;
        assert_eq!(current_phase(&ledger, "c1"), 2);

        ledger.progress[2].completed = true;
        assert_eq!(current_phase(&ledger, "c1"), MAX_PHASE);

        assert_eq!(current_phase(&ledger, "nobody"), MIN_PHASE);
    }

    #[test]
    fn search_matches_name_or_email() {
        let c = customer("bistro", "Corner Bistro");
        assert!(matches_search(&c, "corner"));
        assert!(matches_search(&c, "BISTRO@"));
        assert!(matches_search(&c, "  "));
        assert!(!matches_search(&c, "cafe"));
    }

    #[test]
    fn groups_are_sorted_by_phase_and_keep_order() {
        let tasks = vec![task("b", 2, 1), task("a", 0, 1), task("c", 2, 2)];
        let groups = group_by_phase(tasks, |t| (t.phase, t.phase_name.as_str()));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].phase, 0);
        assert_eq!(groups[1].phase_name, "Phase 2");
        let ids: Vec<&str> = groups[1].items.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn customer_facing_checklist_hides_phases_and_skips() {
        let mut ledger = three_task_ledger();
        ledger.customers[0].hidden_phases.insert(2);
        ledger.progress[1].is_skipped = true;
        let c = ledger.customers[0].clone();

        let staff_view = checklist(&ledger, &c, false);
        assert_eq!(staff_view.len(), 3);
        assert!(staff_view[2].hidden);
        assert_eq!(staff_view[1].counters.total, 0);

        let customer_view = checklist(&ledger, &c, true);
        assert_eq!(customer_view.len(), 1);
        assert_eq!(customer_view[0].group.phase, 0);
    }

    #[test]
    fn report_unlocks_on_completion_not_verification() {
        let mut ledger = three_task_ledger();
        ledger.tasks[1].unlocks_report = Some("Sales by Hour".into());
        ledger.reports = vec![report("r1", "Sales by Hour"), report("r2", "Menu Mix")];

        let statuses = report_statuses(&ledger, "c1");
        assert!(!statuses[0].unlocked);
        assert_eq!(statuses[0].unlocking_task_id.as_deref(), Some("t2"));
        assert!(statuses[1].unlocking_task_id.is_none());

        ledger.progress[1].completed = true;
        let statuses = report_statuses(&ledger, "c1");
        assert!(statuses[0].unlocked);
        assert_eq!(next_report(&statuses).unwrap().report.name, "Menu Mix");
    }

    #[test]
    fn explicit_unlocking_task_wins_over_name_match() {
        let mut ledger = three_task_ledger();
        ledger.tasks[0].unlocks_report = Some("Sales by Hour".into());
        let mut r = report("r1", "Sales by Hour");
        r.unlocking_task_id = Some("t3".into());
        ledger.reports = vec![r];

        ledger.progress[0].completed = true;
        assert!(!report_statuses(&ledger, "c1")[0].unlocked);

        ledger.progress[2].completed = true;
        assert!(report_statuses(&ledger, "c1")[0].unlocked);
    }

    #[test]
    fn overview_filters_rows_but_not_stats() {
        let mut ledger = three_task_ledger();
        ledger.customers.push(customer("c2", "Taqueria"));
        ledger.progress.push(progress("p5", "c2", "t1"));
        ledger.progress[0].completed = true;

        let filter = OverviewFilter {
            search: Some("taq".into()),
            phase: None,
        };
        let view = overview(&ledger, &filter, 0, 7);
        assert_eq!(view.stats.total_customers, 2);
        assert_eq!(view.customers.len(), 1);
        assert_eq!(view.customers[0].customer.id, "c2");
        assert_eq!(view.verification_feed.len(), 1);

        let by_phase = overview(
            &ledger,
            &OverviewFilter {
                search: None,
                phase: Some(1),
            },
            0,
            7,
        );
        assert_eq!(by_phase.customers.len(), 1);
        assert_eq!(by_phase.customers[0].customer.id, "c1");
    }
}
