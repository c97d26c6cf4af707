//! Onboarding service: the single entry point for every operation.
//!
//! Each call resolves the target, checks [`can`], performs the mutation and
//! logs it. Views are always computed from a fresh [`Ledger`] load.

use crate::access::{Actor, Operation, Resource, can};
use crate::aggregate::{
    self, ChecklistPhase, Ledger, Overview, OverviewFilter, PhaseGroup, ProgressSnapshot,
    ReportStatus,
};
use crate::blob::{self, BlobOwner, BlobStore};
use crate::config::Config;
use crate::db::{Database, now_ms};
use crate::error::{ServiceError, ServiceResult};
use crate::types::{
    Customer, CustomerProgress, Direction, NewCustomer, NewReport, NewTaskFile, OmSummary, Phase,
    PhaseInfo, Report, StaffMember, StaffRole, Task, TaskComment, TaskDefinition, TaskFile,
    TaskScope, TaskUpdate, UploadedFile, is_valid_phase,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a checklist page shows for one customer.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetail {
    pub customer: Customer,
    pub progress: ProgressSnapshot,
    pub current_phase: Phase,
    pub phases: Vec<ChecklistPhase>,
    pub reports: Vec<ReportStatus>,
    pub next_report: Option<ReportStatus>,
}

/// A global task with its template files, for the catalog editor.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub task: Task,
    pub files: Vec<TaskFile>,
}

#[derive(Clone)]
pub struct OnboardingService {
    db: Arc<Database>,
    blobs: Arc<dyn BlobStore>,
    config: Arc<Config>,
}

impl OnboardingService {
    pub fn new(db: Arc<Database>, blobs: Arc<dyn BlobStore>, config: Arc<Config>) -> Self {
        Self { db, blobs, config }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phases(&self) -> &[PhaseInfo] {
        &self.config.phases
    }

    fn authorize(
        &self,
        actor: &Actor,
        op: Operation,
        resource: Resource<'_>,
    ) -> ServiceResult<()> {
        if can(actor, op, resource) {
            Ok(())
        } else {
            warn!(actor = actor.email(), ?op, ?resource, "Permission denied");
            Err(ServiceError::permission_denied(op))
        }
    }

    fn require_task(&self, task_id: &str) -> ServiceResult<Task> {
        self.db
            .get_task(task_id)?
            .ok_or_else(|| ServiceError::task_not_found(task_id))
    }

    fn require_progress(&self, progress_id: &str) -> ServiceResult<CustomerProgress> {
        self.db
            .get_progress(progress_id)?
            .ok_or_else(|| ServiceError::progress_not_found(progress_id))
    }

    /// Check `op` against the customer owning a progress row.
    fn authorize_row(
        &self,
        actor: &Actor,
        op: Operation,
        progress: &CustomerProgress,
    ) -> ServiceResult<()> {
        self.authorize(actor, op, Resource::Customer(&progress.customer_id))
    }

    /// Global tasks need ManageGlobalCatalog; custom tasks need
    /// ManageCustomerCatalog for their customer.
    fn authorize_task(&self, actor: &Actor, task: &Task) -> ServiceResult<()> {
        self.authorize_scope(actor, &task.scope())
    }

    fn authorize_scope(&self, actor: &Actor, scope: &TaskScope) -> ServiceResult<()> {
        match scope {
            TaskScope::Global => {
                self.authorize(actor, Operation::ManageGlobalCatalog, Resource::Global)
            }
            TaskScope::Customer(c) => self.authorize(
                actor,
                Operation::ManageCustomerCatalog,
                Resource::Customer(c),
            ),
        }
    }

    fn checked_phase(&self, phase: Phase) -> ServiceResult<String> {
        if !is_valid_phase(phase) {
            return Err(ServiceError::invalid_value(
                "phase",
                "phase must be between 0 and 4",
            ));
        }
        Ok(self.config.phase_label(phase))
    }

    // ----- Identity -----

    /// Staff directory first, then customers by email.
    pub fn resolve_actor(&self, email: &str) -> ServiceResult<Actor> {
        if email.trim().is_empty() {
            return Err(ServiceError::unauthenticated(None));
        }
        if let Some(staff) = self.db.find_staff_by_email(email)? {
            return Ok(Actor::Staff {
                id: staff.id,
                email: staff.email,
                name: staff.name,
                role: staff.role,
            });
        }
        if let Some(customer) = self.db.find_customer_by_email(email)? {
            return Ok(Actor::Customer {
                id: customer.id,
                email: customer.email,
                name: customer.name,
            });
        }
        warn!(email, "No staff or customer record for email");
        Err(ServiceError::unauthenticated(Some(email)))
    }

    // ----- Views -----

    /// Reload every collection.
    pub fn refresh(&self) -> ServiceResult<Ledger> {
        let ledger = Ledger {
            customers: self.db.list_customers()?,
            tasks: self.db.list_tasks()?,
            progress: self.db.list_progress()?,
            comments: self.db.list_comments()?,
            reports: self.db.list_reports()?,
            task_files: self.db.list_task_files()?,
        };
        debug!(
            customers = ledger.customers.len(),
            tasks = ledger.tasks.len(),
            progress = ledger.progress.len(),
            comments = ledger.comments.len(),
            "Reloaded ledger"
        );
        Ok(ledger)
    }

    fn overview_unchecked(&self, filter: &OverviewFilter) -> ServiceResult<Overview> {
        let ledger = self.refresh()?;
        Ok(aggregate::overview(
            &ledger,
            filter,
            now_ms(),
            self.config.onboarding.stale_after_days,
        ))
    }

    /// Staff overview: stats, customer list, verification and unread feeds.
    pub fn admin_overview(
        &self,
        actor: &Actor,
        filter: &OverviewFilter,
    ) -> ServiceResult<Overview> {
        self.authorize(actor, Operation::ViewOverview, Resource::Global)?;
        if let Some(phase) = filter.phase {
            self.checked_phase(phase)?;
        }
        self.overview_unchecked(filter)
    }

    /// Unfiltered overview for local operator commands.
    pub fn operator_summary(&self) -> ServiceResult<Overview> {
        self.overview_unchecked(&OverviewFilter::default())
    }

    fn detail(
        &self,
        ledger: &Ledger,
        customer: &Customer,
        customer_facing: bool,
    ) -> CustomerDetail {
        let unread = aggregate::unreplied_customer_comments(&ledger.comments);
        let reports = aggregate::report_statuses(ledger, &customer.id);
        CustomerDetail {
            progress: aggregate::customer_snapshot(
                ledger,
                &customer.id,
                &unread,
                now_ms(),
                self.config.onboarding.stale_after_days,
            ),
            current_phase: aggregate::current_phase(ledger, &customer.id),
            phases: aggregate::checklist(ledger, customer, customer_facing),
            next_report: aggregate::next_report(&reports).cloned(),
            reports,
            customer: customer.clone(),
        }
    }

    /// Staff view of one customer's checklist, including hidden phases and
    /// skipped tasks.
    pub fn customer_detail(
        &self,
        actor: &Actor,
        customer_id: &str,
    ) -> ServiceResult<CustomerDetail> {
        self.authorize(
            actor,
            Operation::ViewCustomer,
            Resource::Customer(customer_id),
        )?;
        let ledger = self.refresh()?;
        let customer = ledger
            .customer(customer_id)
            .ok_or_else(|| ServiceError::customer_not_found(customer_id))?;
        Ok(self.detail(&ledger, customer, !actor.is_staff()))
    }

    /// The signed-in customer's own checklist.
    pub fn my_dashboard(&self, actor: &Actor) -> ServiceResult<CustomerDetail> {
        let Actor::Customer { id, .. } = actor else {
            return Err(ServiceError::invalid_state(
                "Only customers have a personal dashboard",
            ));
        };
        self.authorize(actor, Operation::ViewCustomer, Resource::Customer(id))?;
        let ledger = self.refresh()?;
        let customer = ledger
            .customer(id)
            .ok_or_else(|| ServiceError::customer_not_found(id))?;
        Ok(self.detail(&ledger, customer, true))
    }

    /// Global task catalog grouped by phase.
    pub fn catalog(&self, actor: &Actor) -> ServiceResult<Vec<PhaseGroup<CatalogEntry>>> {
        self.authorize(actor, Operation::ViewOverview, Resource::Global)?;
        let ledger = self.refresh()?;
        let entries = ledger
            .tasks
            .iter()
            .filter(|t| t.is_global())
            .map(|task| CatalogEntry {
                files: ledger
                    .task_files
                    .iter()
                    .filter(|f| f.task_id == task.id)
                    .cloned()
                    .collect(),
                task: task.clone(),
            });
        Ok(aggregate::group_by_phase(entries, |e| {
            (e.task.phase, e.task.phase_name.as_str())
        }))
    }

    // ----- Customers -----

    pub fn list_customers(&self, actor: &Actor) -> ServiceResult<Vec<Customer>> {
        self.authorize(actor, Operation::ViewOverview, Resource::Global)?;
        Ok(self.db.list_customers()?)
    }

    /// Staff member that may own customers.
    fn assignable_om(&self, staff_id: &str) -> ServiceResult<StaffMember> {
        self.db
            .get_staff(staff_id)?
            .ok_or_else(|| ServiceError::staff_not_found(staff_id))
    }

    pub fn create_customer(&self, actor: &Actor, input: NewCustomer) -> ServiceResult<Customer> {
        self.authorize(actor, Operation::CreateCustomer, Resource::Global)?;

        let om_name = match input.assigned_om_id.as_deref() {
            Some(staff_id) => self.assignable_om(staff_id)?.name,
            None => self.config.onboarding.default_om.clone(),
        };

        let customer = self.db.create_customer(input, &om_name)?;
        info!(
            customer_id = %customer.id,
            email = %customer.email,
            om = %customer.assigned_om,
            actor = actor.email(),
            "Created customer"
        );
        Ok(customer)
    }

    pub fn reassign_om(
        &self,
        actor: &Actor,
        customer_id: &str,
        staff_id: &str,
    ) -> ServiceResult<Customer> {
        self.authorize(actor, Operation::ReassignOm, Resource::Customer(customer_id))?;
        let om = self.assignable_om(staff_id)?;
        let customer = self.db.reassign_om(customer_id, &om.id, &om.name)?;
        info!(customer_id, om = %om.name, actor = actor.email(), "Reassigned OM");
        Ok(customer)
    }

    pub fn toggle_phase_visibility(
        &self,
        actor: &Actor,
        customer_id: &str,
        phase: Phase,
    ) -> ServiceResult<Customer> {
        self.authorize(
            actor,
            Operation::TogglePhaseVisibility,
            Resource::Customer(customer_id),
        )?;
        let customer = self.db.toggle_phase_visibility(customer_id, phase)?;
        info!(
            customer_id,
            phase,
            hidden = customer.is_phase_hidden(phase),
            actor = actor.email(),
            "Toggled phase visibility"
        );
        Ok(customer)
    }

    // ----- Task catalog -----

    pub fn create_task(
        &self,
        actor: &Actor,
        def: TaskDefinition,
        scope: TaskScope,
    ) -> ServiceResult<Task> {
        self.authorize_scope(actor, &scope)?;
        let phase_name = self.checked_phase(def.phase)?;
        let task = self.db.create_task(def, scope, &phase_name)?;
        info!(
            task_id = %task.id,
            phase = task.phase,
            customer_id = task.customer_id.as_deref().unwrap_or("global"),
            actor = actor.email(),
            "Created task"
        );
        Ok(task)
    }

    pub fn update_task(
        &self,
        actor: &Actor,
        task_id: &str,
        update: TaskUpdate,
    ) -> ServiceResult<Task> {
        let task = self.require_task(task_id)?;
        self.authorize_task(actor, &task)?;
        let task = self.db.update_task(task_id, update)?;
        info!(task_id, actor = actor.email(), "Updated task");
        Ok(task)
    }

    /// Delete a task with its progress rows, their comments and its files.
    pub fn delete_task(&self, actor: &Actor, task_id: &str) -> ServiceResult<usize> {
        let task = self.require_task(task_id)?;
        self.authorize_task(actor, &task)?;
        let removed = self.db.delete_task(task_id)?;
        info!(task_id, progress_rows = removed, actor = actor.email(), "Deleted task");
        Ok(removed)
    }

    pub fn duplicate_for_customer(
        &self,
        actor: &Actor,
        task_id: &str,
        customer_id: &str,
    ) -> ServiceResult<Task> {
        self.authorize_scope(actor, &TaskScope::Customer(customer_id.to_string()))?;
        let task = self.db.duplicate_for_customer(
            task_id,
            customer_id,
            &self.config.onboarding.custom_task_suffix,
        )?;
        info!(
            source_task_id = task_id,
            task_id = %task.id,
            customer_id,
            actor = actor.email(),
            "Duplicated task for customer"
        );
        Ok(task)
    }

    pub fn move_task(
        &self,
        actor: &Actor,
        task_id: &str,
        direction: Direction,
    ) -> ServiceResult<Task> {
        let task = self.require_task(task_id)?;
        self.authorize_task(actor, &task)?;
        let moved = self.db.move_in_direction(task_id, direction)?;
        debug!(
            task_id,
            ?direction,
            from = task.sort_order,
            to = moved.sort_order,
            "Moved task"
        );
        Ok(moved)
    }

    pub fn move_task_to_phase(
        &self,
        actor: &Actor,
        task_id: &str,
        phase: Phase,
    ) -> ServiceResult<Task> {
        let task = self.require_task(task_id)?;
        self.authorize_task(actor, &task)?;
        let phase_name = self.checked_phase(phase)?;
        let moved = self.db.move_to_phase(task_id, phase, &phase_name)?;
        info!(
            task_id,
            from = task.phase,
            to = phase,
            actor = actor.email(),
            "Moved task to phase"
        );
        Ok(moved)
    }

    // ----- Progress ledger -----

    pub fn mark_complete(
        &self,
        actor: &Actor,
        progress_id: &str,
    ) -> ServiceResult<CustomerProgress> {
        let progress = self.require_progress(progress_id)?;
        self.authorize_row(actor, Operation::ToggleCompletion, &progress)?;
        let updated = self.db.mark_complete(progress_id)?;
        info!(
            progress_id,
            customer_id = %updated.customer_id,
            actor = actor.email(),
            "Marked complete"
        );
        Ok(updated)
    }

    pub fn mark_incomplete(
        &self,
        actor: &Actor,
        progress_id: &str,
    ) -> ServiceResult<CustomerProgress> {
        let progress = self.require_progress(progress_id)?;
        self.authorize_row(actor, Operation::ToggleCompletion, &progress)?;
        let updated = self.db.mark_incomplete(progress_id)?;
        info!(
            progress_id,
            customer_id = %updated.customer_id,
            actor = actor.email(),
            "Marked incomplete"
        );
        Ok(updated)
    }

    pub fn verify(&self, actor: &Actor, progress_id: &str) -> ServiceResult<CustomerProgress> {
        let progress = self.require_progress(progress_id)?;
        self.authorize_row(actor, Operation::Verify, &progress)?;
        let updated = self.db.verify(progress_id, actor.display_name())?;
        info!(
            progress_id,
            customer_id = %updated.customer_id,
            by = actor.display_name(),
            "Verified"
        );
        Ok(updated)
    }

    pub fn unverify(&self, actor: &Actor, progress_id: &str) -> ServiceResult<CustomerProgress> {
        let progress = self.require_progress(progress_id)?;
        self.authorize_row(actor, Operation::Verify, &progress)?;
        let updated = self.db.unverify(progress_id)?;
        info!(
            progress_id,
            customer_id = %updated.customer_id,
            actor = actor.email(),
            "Unverified"
        );
        Ok(updated)
    }

    /// Verify every completed row of a customer. Returns the verified row ids.
    pub fn verify_all(&self, actor: &Actor, customer_id: &str) -> ServiceResult<Vec<String>> {
        self.authorize(actor, Operation::Verify, Resource::Customer(customer_id))?;
        let ids = self.db.verify_all(customer_id, actor.display_name())?;
        info!(customer_id, count = ids.len(), by = actor.display_name(), "Verified all");
        Ok(ids)
    }

    pub fn toggle_skip(&self, actor: &Actor, progress_id: &str) -> ServiceResult<CustomerProgress> {
        let progress = self.require_progress(progress_id)?;
        self.authorize_row(actor, Operation::ToggleSkip, &progress)?;
        let updated = self.db.toggle_skip(progress_id)?;
        info!(
            progress_id,
            skipped = updated.is_skipped,
            actor = actor.email(),
            "Toggled skip"
        );
        Ok(updated)
    }

    /// Attach an already-hosted file reference.
    pub fn attach_file(
        &self,
        actor: &Actor,
        progress_id: &str,
        file: UploadedFile,
    ) -> ServiceResult<CustomerProgress> {
        let progress = self.require_progress(progress_id)?;
        self.authorize_row(actor, Operation::AttachFile, &progress)?;
        let updated = self.db.attach_file(progress_id, file)?;
        info!(
            progress_id,
            files = updated.files.len(),
            actor = actor.email(),
            "Attached file"
        );
        Ok(updated)
    }

    /// Store evidence bytes in the blob store, then reference them on the progress row.
    pub async fn upload_progress_file(
        &self,
        actor: &Actor,
        progress_id: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> ServiceResult<CustomerProgress> {
        let progress = self.require_progress(progress_id)?;
        self.authorize_row(actor, Operation::AttachFile, &progress)?;
        if name.trim().is_empty() {
            return Err(ServiceError::missing_field("name"));
        }

        let now = now_ms();
        let path = blob::evidence_path(&progress.customer_id, &progress.task_id, now, name);
        let url = self.upload_blob(&path, bytes).await?;

        let file = UploadedFile {
            name: name.trim().to_string(),
            url,
            uploaded_at: now,
        };
        match self.db.attach_file(progress_id, file) {
            Ok(updated) => {
                info!(
                    progress_id,
                    path = %path,
                    actor = actor.email(),
                    "Uploaded evidence file"
                );
                Ok(updated)
            }
            Err(e) => {
                warn!(
                    path = %path,
                    progress_id,
                    error = %e,
                    "Blob stored but not referenced (orphaned)"
                );
                Err(e.into())
            }
        }
    }

    async fn upload_blob(&self, path: &str, bytes: Vec<u8>) -> ServiceResult<String> {
        let size = bytes.len();
        self.blobs.upload(path, bytes).await.map_err(|e| {
            warn!(path, size, error = %e, "Blob upload failed");
            ServiceError::external("blob store", e)
        })
    }

    /// Customers may read their own evidence and the shared templates; staff
    /// may read everything.
    pub fn authorize_blob_read(&self, actor: &Actor, path: &str) -> ServiceResult<()> {
        match blob::blob_owner(path) {
            BlobOwner::Templates => Ok(()),
            BlobOwner::Customer(customer_id) => self.authorize(
                actor,
                Operation::ViewCustomer,
                Resource::Customer(customer_id),
            ),
        }
    }

    // ----- Comments -----

    pub fn post_comment(
        &self,
        actor: &Actor,
        progress_id: &str,
        message: &str,
    ) -> ServiceResult<TaskComment> {
        let progress = self.require_progress(progress_id)?;
        self.authorize_row(actor, Operation::PostComment, &progress)?;
        let comment = self.db.post_comment(progress_id, &actor.as_author(), message)?;
        info!(
            progress_id,
            comment_id = %comment.id,
            role = comment.author_role.as_str(),
            actor = actor.email(),
            "Posted comment"
        );
        Ok(comment)
    }

    pub fn list_comments(
        &self,
        actor: &Actor,
        progress_id: &str,
    ) -> ServiceResult<Vec<TaskComment>> {
        let progress = self.require_progress(progress_id)?;
        self.authorize_row(actor, Operation::ViewCustomer, &progress)?;
        Ok(self.db.list_comments_for_progress(progress_id)?)
    }

    // ----- Reports and template files -----

    pub fn create_report(&self, actor: &Actor, input: NewReport) -> ServiceResult<Report> {
        self.authorize(actor, Operation::ManageGlobalCatalog, Resource::Global)?;
        let report = self.db.create_report(input)?;
        info!(
            report_id = %report.id,
            name = %report.name,
            actor = actor.email(),
            "Created report"
        );
        Ok(report)
    }

    pub fn list_reports(&self, actor: &Actor) -> ServiceResult<Vec<Report>> {
        self.authorize(actor, Operation::ViewOverview, Resource::Global)?;
        Ok(self.db.list_reports()?)
    }

    fn require_global_task(&self, actor: &Actor, task_id: &str) -> ServiceResult<Task> {
        self.authorize(actor, Operation::ManageGlobalCatalog, Resource::Global)?;
        let task = self.require_task(task_id)?;
        if !task.is_global() {
            return Err(
                ServiceError::invalid_state("Template files belong to global tasks only")
                    .with_details(format!("task_id={}", task_id)),
            );
        }
        Ok(task)
    }

    pub fn add_task_file(
        &self,
        actor: &Actor,
        task_id: &str,
        input: NewTaskFile,
    ) -> ServiceResult<TaskFile> {
        self.require_global_task(actor, task_id)?;
        let file = self.db.add_task_file(task_id, input)?;
        info!(task_id, file_id = %file.id, actor = actor.email(), "Added task file");
        Ok(file)
    }

    /// Store template bytes in the blob store and attach them to a global task.
    /// `input.url` is replaced by the stored blob's URL.
    pub async fn upload_task_file(
        &self,
        actor: &Actor,
        task_id: &str,
        input: NewTaskFile,
        bytes: Vec<u8>,
    ) -> ServiceResult<TaskFile> {
        self.require_global_task(actor, task_id)?;
        if input.name.trim().is_empty() {
            return Err(ServiceError::missing_field("name"));
        }

        let path = blob::template_path(task_id, now_ms(), &input.name);
        let url = self.upload_blob(&path, bytes).await?;

        match self.db.add_task_file(task_id, NewTaskFile { url, ..input }) {
            Ok(file) => {
                info!(
                    task_id,
                    file_id = %file.id,
                    path = %path,
                    actor = actor.email(),
                    "Uploaded task file"
                );
                Ok(file)
            }
            Err(e) => {
                warn!(
                    path = %path,
                    task_id,
                    error = %e,
                    "Blob stored but not referenced (orphaned)"
                );
                Err(e.into())
            }
        }
    }

    pub fn list_task_files(&self, actor: &Actor, task_id: &str) -> ServiceResult<Vec<TaskFile>> {
        self.authorize(actor, Operation::ViewOverview, Resource::Global)?;
        self.require_task(task_id)?;
        Ok(self.db.list_task_files_for_task(task_id)?)
    }

    pub fn delete_task_file(&self, actor: &Actor, file_id: &str) -> ServiceResult<TaskFile> {
        self.authorize(actor, Operation::ManageGlobalCatalog, Resource::Global)?;
        let file = self.db.delete_task_file(file_id)?;
        info!(
            file_id,
            task_id = %file.task_id,
            actor = actor.email(),
            "Deleted task file"
        );
        Ok(file)
    }

    // ----- Staff -----

    pub fn add_staff(
        &self,
        actor: &Actor,
        email: &str,
        name: &str,
        role: StaffRole,
    ) -> ServiceResult<StaffMember> {
        self.authorize(actor, Operation::ManageStaff, Resource::Global)?;
        self.bootstrap_staff(email, name, role)
    }

    /// Add a staff member without an acting user. Used by the CLI.
    pub fn bootstrap_staff(
        &self,
        email: &str,
        name: &str,
        role: StaffRole,
    ) -> ServiceResult<StaffMember> {
        let staff = self.db.add_staff(email, name, role)?;
        info!(
            staff_id = %staff.id,
            email = %staff.email,
            role = staff.role.as_str(),
            "Added staff member"
        );
        Ok(staff)
    }

    pub fn list_staff(&self, actor: &Actor) -> ServiceResult<Vec<StaffMember>> {
        self.authorize(actor, Operation::ViewStaff, Resource::Global)?;
        Ok(self.db.list_staff()?)
    }

    pub fn om_directory(&self, actor: &Actor) -> ServiceResult<Vec<OmSummary>> {
        self.authorize(actor, Operation::ViewStaff, Resource::Global)?;
        Ok(self.db.om_directory()?)
    }
}
