//! Core types for the onboarding tracker.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Phase number. Valid phases are `MIN_PHASE..=MAX_PHASE`.
pub type Phase = i32;

pub const MIN_PHASE: Phase = 0;
pub const MAX_PHASE: Phase = 4;

/// Check whether a phase number is one of the fixed onboarding phases.
pub fn is_valid_phase(phase: Phase) -> bool {
    (MIN_PHASE..=MAX_PHASE).contains(&phase)
}

/// Static metadata for one onboarding phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseInfo {
    pub phase: Phase,
    pub label: String,
    pub color: String,
}

/// A customer being onboarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    /// Display name of the assigned onboarding manager.
    pub assigned_om: String,
    /// Staff id of the assigned onboarding manager, when known.
    pub assigned_om_id: Option<String>,
    pub hidden_phases: BTreeSet<Phase>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Customer {
    pub fn is_phase_hidden(&self, phase: Phase) -> bool {
        self.hidden_phases.contains(&phase)
    }
}

/// Input for creating a customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    /// Staff id of the onboarding manager to assign.
    pub assigned_om_id: Option<String>,
}

/// Who is responsible for carrying out a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOwner {
    #[default]
    Customer,
    Om,
    Both,
}

impl TaskOwner {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOwner::Customer => "customer",
            TaskOwner::Om => "om",
            TaskOwner::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "customer" => Some(TaskOwner::Customer),
            "om" => Some(TaskOwner::Om),
            "both" => Some(TaskOwner::Both),
            _ => None,
        }
    }
}

/// Whether a task is a global template or scoped to one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "customer_id", rename_all = "snake_case")]
pub enum TaskScope {
    Global,
    Customer(String),
}

impl TaskScope {
    pub fn from_customer_id(customer_id: Option<&str>) -> Self {
        match customer_id {
            Some(id) => TaskScope::Customer(id.to_string()),
            None => TaskScope::Global,
        }
    }

    pub fn customer_id(&self) -> Option<&str> {
        match self {
            TaskScope::Global => None,
            TaskScope::Customer(id) => Some(id),
        }
    }
}

/// A task definition in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub phase: Phase,
    pub phase_name: String,
    pub task_name: String,
    pub description: Option<String>,
    pub owner: TaskOwner,
    pub est_time: Option<String>,
    pub sort_order: i32,
    pub is_success_gate: bool,
    /// Comma-separated report names this task unlocks.
    pub unlocks_report: Option<String>,
    pub requires_upload: bool,
    /// None for global templates.
    pub customer_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn scope(&self) -> TaskScope {
        TaskScope::from_customer_id(self.customer_id.as_deref())
    }

    pub fn is_global(&self) -> bool {
        self.customer_id.is_none()
    }

    /// Whether this task applies to the given customer.
    pub fn applies_to(&self, customer_id: &str) -> bool {
        match &self.customer_id {
            None => true,
            Some(id) => id == customer_id,
        }
    }

    /// Report names listed in `unlocks_report`.
    pub fn unlocked_report_names(&self) -> impl Iterator<Item = &str> {
        self.unlocks_report
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn unlocks(&self, report_name: &str) -> bool {
        self.unlocked_report_names().any(|n| n == report_name)
    }
}

/// Editable task fields, shared by create and update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub phase: Phase,
    pub task_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub owner: TaskOwner,
    pub est_time: Option<String>,
    #[serde(default)]
    pub is_success_gate: bool,
    pub unlocks_report: Option<String>,
    #[serde(default)]
    pub requires_upload: bool,
}

/// Partial update of a task. Never touches phase, sort order or scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub task_name: Option<String>,
    pub description: Option<Option<String>>,
    pub owner: Option<TaskOwner>,
    pub est_time: Option<Option<String>>,
    pub is_success_gate: Option<bool>,
    pub unlocks_report: Option<Option<String>>,
    pub requires_upload: Option<bool>,
}

/// Reorder direction within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// A customer-uploaded evidence file referenced from a progress row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub url: String,
    pub uploaded_at: i64,
}

/// Derived state of a progress row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    Pending,
    Completed,
    Verified,
}

/// Per-(customer, task) progress record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProgress {
    pub id: String,
    pub customer_id: String,
    pub task_id: String,
    pub completed: bool,
    pub completed_at: Option<i64>,
    pub verified: bool,
    pub verified_at: Option<i64>,
    pub verified_by: Option<String>,
    pub is_skipped: bool,
    pub files: Vec<UploadedFile>,
    /// Legacy free-text notes, superseded by comments.
    pub notes: Option<String>,
    pub updated_at: i64,
}

impl CustomerProgress {
    pub fn state(&self) -> ProgressState {
        match (self.completed, self.verified) {
            (true, true) => ProgressState::Verified,
            (true, false) => ProgressState::Completed,
            (false, _) => ProgressState::Pending,
        }
    }

    /// Completed, not yet verified, not skipped.
    pub fn awaits_verification(&self) -> bool {
        self.completed && !self.verified && !self.is_skipped
    }
}

/// Role of a comment author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRole {
    Customer,
    Om,
    Admin,
}

impl AuthorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorRole::Customer => "customer",
            AuthorRole::Om => "om",
            AuthorRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(AuthorRole::Customer),
            "om" => Some(AuthorRole::Om),
            "admin" => Some(AuthorRole::Admin),
            _ => None,
        }
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, AuthorRole::Customer)
    }
}

impl From<StaffRole> for AuthorRole {
    fn from(role: StaffRole) -> Self {
        match role {
            StaffRole::Admin => AuthorRole::Admin,
            StaffRole::Om => AuthorRole::Om,
        }
    }
}

/// A message on a progress row's thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: String,
    pub progress_id: String,
    pub customer_id: String,
    pub author_email: String,
    pub author_name: Option<String>,
    pub author_role: AuthorRole,
    pub message: String,
    pub created_at: i64,
}

/// Comment author details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub email: String,
    pub name: Option<String>,
    pub role: AuthorRole,
}

/// A report customers unlock by completing a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub name: String,
    pub phase: Phase,
    pub description: Option<String>,
    pub key_metric: Option<String>,
    pub report_url: Option<String>,
    pub sort_order: i32,
    pub unlocking_task_id: Option<String>,
    pub created_at: i64,
}

/// Input for creating a report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewReport {
    pub name: String,
    pub phase: Phase,
    pub description: Option<String>,
    pub key_metric: Option<String>,
    pub report_url: Option<String>,
    pub unlocking_task_id: Option<String>,
}

/// Kind of reference document attached to a task definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    #[default]
    Template,
    Guide,
    Example,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Template => "template",
            FileType::Guide => "guide",
            FileType::Example => "example",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "template" => Some(FileType::Template),
            "guide" => Some(FileType::Guide),
            "example" => Some(FileType::Example),
            _ => None,
        }
    }
}

/// A template/reference document on a global task definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFile {
    pub id: String,
    pub task_id: String,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub file_type: FileType,
    pub is_optional: bool,
    pub sort_order: i32,
    pub created_at: i64,
}

/// Input for attaching a task file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTaskFile {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    #[serde(default)]
    pub file_type: FileType,
    #[serde(default)]
    pub is_optional: bool,
}

/// Staff role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Admin,
    Om,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Admin => "admin",
            StaffRole::Om => "om",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(StaffRole::Admin),
            "om" => Some(StaffRole::Om),
            _ => None,
        }
    }
}

/// Entry in the staff directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: StaffRole,
    pub created_at: i64,
}

/// An OM with their customer count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmSummary {
    #[serde(flatten)]
    pub staff: StaffMember,
    pub customer_count: usize,
}

/// Normalize an email for lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
