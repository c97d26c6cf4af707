//! End-to-end tests through `OnboardingService`: permissions, aggregation
//! scenarios, and uploads through the in-memory blob store.

use onboard_tracker::access::Actor;
use onboard_tracker::aggregate::OverviewFilter;
use onboard_tracker::blob::MemoryBlobStore;
use onboard_tracker::config::Config;
use onboard_tracker::db::Database;
use onboard_tracker::error::ErrorCode;
use onboard_tracker::service::OnboardingService;
use onboard_tracker::types::{
    Direction, NewCustomer, NewReport, NewTaskFile, StaffRole, Task, TaskDefinition, TaskScope,
};
use std::sync::Arc;

struct Fixture {
    service: OnboardingService,
    blobs: Arc<MemoryBlobStore>,
    admin: Actor,
    om: Actor,
}

fn fixture_with(blobs: MemoryBlobStore) -> Fixture {
    let db = Arc::new(Database::open_in_memory().expect("Failed to create in-memory database"));
    let blobs = Arc::new(blobs);
    let service = OnboardingService::new(db, blobs.clone(), Arc::new(Config::default()));

    service
        .bootstrap_staff("ada@staff.test", "Ada", StaffRole::Admin)
        .unwrap();
    service
        .bootstrap_staff("olive@staff.test", "Olive", StaffRole::Om)
        .unwrap();
    let admin = service.resolve_actor("ada@staff.test").unwrap();
    let om = service.resolve_actor("olive@staff.test").unwrap();

    Fixture {
        service,
        blobs,
        admin,
        om,
    }
}

fn fixture() -> Fixture {
    fixture_with(MemoryBlobStore::new())
}

impl Fixture {
    /// Create a customer and return their actor.
    fn customer(&self, name: &str) -> Actor {
        let email = format!("{}@customer.test", name.to_lowercase());
        self.service
            .create_customer(
                &self.om,
                NewCustomer {
                    name: name.to_string(),
                    email: email.clone(),
                    ..Default::default()
                },
            )
            .unwrap();
        self.service.resolve_actor(&email).unwrap()
    }

    fn global_task(&self, phase: i32, name: &str) -> Task {
        self.service
            .create_task(
                &self.admin,
                TaskDefinition {
                    phase,
                    task_name: name.to_string(),
                    ..Default::default()
                },
                TaskScope::Global,
            )
            .unwrap()
    }

    fn progress_id(&self, customer: &Actor, task: &Task) -> String {
        self.service
            .db()
            .find_progress(customer_id(customer), &task.id)
            .unwrap()
            .unwrap()
            .id
    }

    fn unread(&self) -> usize {
        self.service.operator_summary().unwrap().stats.unread_comments
    }
}

fn customer_id(actor: &Actor) -> &str {
    match actor {
        Actor::Customer { id, .. } => id,
        Actor::Staff { .. } => panic!("not a customer"),
    }
}

mod identity {
    use super::*;

    #[test]
    fn staff_win_over_customers_and_unknowns_are_rejected() {
        let f = fixture();
        assert!(f.admin.is_staff());

        let bistro = f.customer("Bistro");
        assert!(!bistro.is_staff());
        assert_eq!(bistro.email(), "bistro@customer.test");

        // Case and surrounding whitespace are ignored
        let again = f.service.resolve_actor("  BISTRO@customer.test ").unwrap();
        assert_eq!(again, bistro);

        let err = f.service.resolve_actor("stranger@nowhere.test").unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthenticated);
    }

    #[test]
    fn new_customer_gets_default_om_and_company() {
        let f = fixture();
        let bistro = f.customer("Bistro");
        let customer = f.service.db().get_customer(customer_id(&bistro)).unwrap().unwrap();
        assert_eq!(customer.assigned_om, "Unassigned");
        assert_eq!(customer.company.as_deref(), Some("Bistro"));
    }

    #[test]
    fn duplicate_customer_email_conflicts() {
        let f = fixture();
        f.customer("Bistro");
        let err = f
            .service
            .create_customer(
                &f.om,
                NewCustomer {
                    name: "Other".into(),
                    email: "Bistro@customer.test".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
    }

    #[test]
    fn reassign_om_records_id_and_name() {
        let f = fixture();
        let bistro = f.customer("Bistro");
        let Actor::Staff { id: olive_id, .. } = &f.om else {
            panic!("om fixture is staff");
        };

        let customer = f
            .service
            .reassign_om(&f.admin, customer_id(&bistro), olive_id)
            .unwrap();

        assert_eq!(customer.assigned_om, "Olive");
        assert_eq!(customer.assigned_om_id.as_deref(), Some(olive_id.as_str()));
        let directory = f.service.om_directory(&f.admin).unwrap();
        let olive = directory.iter().find(|o| o.staff.name == "Olive").unwrap();
        assert_eq!(olive.customer_count, 1);
    }
}

mod permissions {
    use super::*;

    #[test]
    fn om_cannot_touch_the_global_catalog() {
        let f = fixture();
        let err = f
            .service
            .create_task(
                &f.om,
                TaskDefinition {
                    phase: 1,
                    task_name: "Nope".into(),
                    ..Default::default()
                },
                TaskScope::Global,
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);

        let task = f.global_task(1, "Connect POS");
        assert_eq!(
            f.service.delete_task(&f.om, &task.id).unwrap_err().code,
            ErrorCode::PermissionDenied
        );
        assert_eq!(
            f.service.move_task(&f.om, &task.id, Direction::Down).unwrap_err().code,
            ErrorCode::PermissionDenied
        );
    }

    #[test]
    fn om_manages_custom_tasks() {
        let f = fixture();
        let bistro = f.customer("Bistro");
        let global = f.global_task(1, "Connect POS");

        let copy = f
            .service
            .duplicate_for_customer(&f.om, &global.id, customer_id(&bistro))
            .unwrap();
        assert_eq!(copy.task_name, "Connect POS (Custom)");

        assert_eq!(f.service.delete_task(&f.om, &copy.id).unwrap(), 1);
    }

    #[test]
    fn customer_is_confined_to_own_rows() {
        let f = fixture();
        let a = f.customer("Alpha");
        let b = f.customer("Beta");
        let task = f.global_task(1, "Connect POS");
        let a_row = f.progress_id(&a, &task);
        let b_row = f.progress_id(&b, &task);

        f.service.mark_complete(&a, &a_row).unwrap();
        f.service.post_comment(&a, &a_row, "Done!").unwrap();

        for err in [
            f.service.mark_complete(&a, &b_row).unwrap_err(),
            f.service.post_comment(&a, &b_row, "hi").unwrap_err(),
            f.service.verify(&a, &a_row).unwrap_err(),
            f.service.toggle_skip(&a, &a_row).unwrap_err(),
            f.service.customer_detail(&a, customer_id(&b)).unwrap_err(),
        ] {
            assert_eq!(err.code, ErrorCode::PermissionDenied);
        }

        assert_eq!(
            f.service
                .admin_overview(&a, &OverviewFilter::default())
                .unwrap_err()
                .code,
            ErrorCode::PermissionDenied
        );
    }

    #[test]
    fn only_admin_manages_staff() {
        let f = fixture();
        let err = f
            .service
            .add_staff(&f.om, "new@staff.test", "New", StaffRole::Om)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);

        f.service
            .add_staff(&f.admin, "new@staff.test", "New", StaffRole::Om)
            .unwrap();
        assert_eq!(f.service.list_staff(&f.om).unwrap().len(), 3);
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn complete_then_verify_moves_customer_through_the_feed() {
        let f = fixture();
        let a = f.customer("Alpha");
        let b = f.customer("Beta");
        let task = f.global_task(1, "Connect POS");

        let summary = f.service.operator_summary().unwrap();
        assert_eq!(summary.stats.total_customers, 2);
        assert!(summary.verification_feed.is_empty());

        let a_row = f.progress_id(&a, &task);
        f.service.mark_complete(&a, &a_row).unwrap();

        let detail = f.service.customer_detail(&f.om, customer_id(&a)).unwrap();
        assert_eq!(detail.progress.percentage, 100);
        assert_eq!(detail.progress.pending_verification, 1);
        let summary = f.service.operator_summary().unwrap();
        assert_eq!(summary.stats.pending_verification, 1);
        assert_eq!(summary.verification_feed.len(), 1);
        assert_eq!(summary.verification_feed[0].customer_id, customer_id(&a));

        let verified = f.service.verify(&f.om, &a_row).unwrap();
        assert_eq!(verified.verified_by.as_deref(), Some("Olive"));

        let detail = f.service.customer_detail(&f.om, customer_id(&a)).unwrap();
        assert_eq!(detail.progress.percentage, 100);
        assert_eq!(detail.progress.verified, 1);
        let summary = f.service.operator_summary().unwrap();
        assert_eq!(summary.stats.pending_verification, 0);
        assert!(summary.verification_feed.is_empty());

        let beta = f.service.customer_detail(&f.admin, customer_id(&b)).unwrap();
        assert_eq!(beta.progress.percentage, 0);
    }

    #[test]
    fn verify_on_pending_row_is_invalid_state() {
        let f = fixture();
        let a = f.customer("Alpha");
        let task = f.global_task(1, "Connect POS");
        let err = f.service.verify(&f.om, &f.progress_id(&a, &task)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[test]
    fn staff_reply_clears_exactly_one_unread_thread() {
        let f = fixture();
        let a = f.customer("Alpha");
        let t1 = f.global_task(1, "Connect POS");
        let t2 = f.global_task(1, "Upload menu");
        let r1 = f.progress_id(&a, &t1);
        let r2 = f.progress_id(&a, &t2);

        f.service.post_comment(&a, &r1, "Which POS?").unwrap();
        f.service.post_comment(&a, &r2, "Menu is attached").unwrap();
        assert_eq!(f.unread(), 2);

        f.service.post_comment(&f.om, &r1, "The one at the bar").unwrap();
        assert_eq!(f.unread(), 1);

        // Replying again to an answered thread changes nothing
        f.service.post_comment(&f.om, &r1, "Also the kitchen one").unwrap();
        assert_eq!(f.unread(), 1);

        let summary = f.service.operator_summary().unwrap();
        assert_eq!(summary.unread_feed.len(), 1);
        assert_eq!(summary.unread_feed[0].comment.progress_id, r2);
        assert_eq!(summary.unread_feed[0].task_name.as_deref(), Some("Upload menu"));
    }

    #[test]
    fn report_unlocks_on_completion_not_verification() {
        let f = fixture();
        let a = f.customer("Alpha");
        let task = f
            .service
            .create_task(
                &f.admin,
                TaskDefinition {
                    phase: 2,
                    task_name: "Connect POS".into(),
                    unlocks_report: Some("Sales by Hour".into()),
                    ..Default::default()
                },
                TaskScope::Global,
            )
            .unwrap();
        f.service
            .create_report(
                &f.admin,
                NewReport {
                    name: "Sales by Hour".into(),
                    phase: 2,
                    ..Default::default()
                },
            )
            .unwrap();

        let locked = f.service.my_dashboard(&a).unwrap();
        assert_eq!(locked.reports.len(), 1);
        assert!(!locked.reports[0].unlocked);
        let teaser = locked.next_report.expect("locked report is teased");
        assert_eq!(teaser.unlocking_task_name.as_deref(), Some("Connect POS"));

        f.service.mark_complete(&a, &f.progress_id(&a, &task)).unwrap();

        let unlocked = f.service.my_dashboard(&a).unwrap();
        assert!(unlocked.reports[0].unlocked);
        assert!(unlocked.next_report.is_none());
    }

    #[test]
    fn move_up_then_down_through_service_is_a_permutation() {
        let f = fixture();
        let a = f.global_task(1, "A");
        let b = f.global_task(1, "B");

        f.service.move_task(&f.admin, &b.id, Direction::Up).unwrap();
        f.service.move_task(&f.admin, &b.id, Direction::Down).unwrap();

        let a_now = f.service.db().get_task(&a.id).unwrap().unwrap();
        let b_now = f.service.db().get_task(&b.id).unwrap().unwrap();
        assert_eq!(a_now.sort_order, a.sort_order);
        assert_eq!(b_now.sort_order, b.sort_order);
    }

    #[test]
    fn customer_view_hides_hidden_phases_and_skipped_tasks() {
        let f = fixture();
        let a = f.customer("Alpha");
        f.global_task(0, "Kickoff call");
        let skipped = f.global_task(1, "Connect POS");
        f.global_task(1, "Upload menu");

        f.service
            .toggle_phase_visibility(&f.om, customer_id(&a), 0)
            .unwrap();
        f.service
            .toggle_skip(&f.om, &f.progress_id(&a, &skipped))
            .unwrap();

        let mine = f.service.my_dashboard(&a).unwrap();
        assert_eq!(mine.phases.len(), 1);
        assert_eq!(mine.phases[0].group.phase, 1);
        assert_eq!(mine.phases[0].group.items.len(), 1);

        let staff_view = f.service.customer_detail(&f.om, customer_id(&a)).unwrap();
        assert_eq!(staff_view.phases.len(), 2);
        assert!(staff_view.phases[0].hidden);
        assert_eq!(staff_view.phases[1].group.items.len(), 2);
        assert_eq!(staff_view.phases[1].counters.total, 1);
    }

    #[test]
    fn phase_visibility_toggles_back_and_rejects_unknown_phases() {
        let f = fixture();
        let a = f.customer("Alpha");

        let hidden = f
            .service
            .toggle_phase_visibility(&f.om, customer_id(&a), 2)
            .unwrap();
        assert!(hidden.is_phase_hidden(2));

        let shown = f
            .service
            .toggle_phase_visibility(&f.om, customer_id(&a), 2)
            .unwrap();
        assert!(!shown.is_phase_hidden(2));
        assert!(shown.hidden_phases.is_empty());

        let err = f
            .service
            .toggle_phase_visibility(&f.om, customer_id(&a), 5)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFieldValue);
    }

    #[test]
    fn overview_filter_narrows_rows_but_not_stats() {
        let f = fixture();
        f.customer("Alpha");
        f.customer("Beta");

        let filtered = f
            .service
            .admin_overview(
                &f.om,
                &OverviewFilter {
                    search: Some("ALPH".into()),
                    phase: None,
                },
            )
            .unwrap();
        assert_eq!(filtered.customers.len(), 1);
        assert_eq!(filtered.customers[0].customer.name, "Alpha");
        assert_eq!(filtered.stats.total_customers, 2);
    }
}

mod uploads {
    use super::*;

    #[tokio::test]
    async fn evidence_upload_stores_blob_and_references_it() {
        let f = fixture();
        let a = f.customer("Alpha");
        let task = f.global_task(1, "Upload menu");
        let row = f.progress_id(&a, &task);

        let updated = f
            .service
            .upload_progress_file(&a, &row, "menu.pdf", b"%PDF".to_vec())
            .await
            .unwrap();

        assert_eq!(updated.files.len(), 1);
        assert_eq!(updated.files[0].name, "menu.pdf");
        let paths = f.blobs.paths();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].starts_with(&format!("{}/{}/", customer_id(&a), task.id)));
        assert!(paths[0].ends_with("-menu.pdf"));
        assert_eq!(updated.files[0].url, format!("memory://{}", paths[0]));
        assert_eq!(f.blobs.get(&paths[0]).unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn failing_blob_store_is_an_external_error() {
        let f = fixture_with(MemoryBlobStore::failing());
        let a = f.customer("Alpha");
        let task = f.global_task(1, "Upload menu");
        let row = f.progress_id(&a, &task);

        let err = f
            .service
            .upload_progress_file(&a, &row, "menu.pdf", b"%PDF".to_vec())
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ExternalServiceError);
        let untouched = f.service.db().get_progress(&row).unwrap().unwrap();
        assert!(untouched.files.is_empty());
    }

    #[tokio::test]
    async fn template_upload_goes_under_templates() {
        let f = fixture();
        let task = f.global_task(1, "Upload menu");

        let file = f
            .service
            .upload_task_file(
                &f.admin,
                &task.id,
                NewTaskFile {
                    name: "menu-template.xlsx".into(),
                    ..Default::default()
                },
                vec![1, 2, 3],
            )
            .await
            .unwrap();

        assert!(file.url.starts_with(&format!("memory://templates/{}/", task.id)));
        let listed = f.service.list_task_files(&f.om, &task.id).unwrap();
        assert_eq!(listed.len(), 1);

        f.service.delete_task_file(&f.admin, &file.id).unwrap();
        assert!(f.service.list_task_files(&f.om, &task.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn template_files_need_a_global_task() {
        let f = fixture();
        let a = f.customer("Alpha");
        let custom = f
            .service
            .create_task(
                &f.om,
                TaskDefinition {
                    phase: 1,
                    task_name: "Mine".into(),
                    ..Default::default()
                },
                TaskScope::Customer(customer_id(&a).to_string()),
            )
            .unwrap();

        let err = f
            .service
            .upload_task_file(
                &f.admin,
                &custom.id,
                NewTaskFile {
                    name: "x.pdf".into(),
                    ..Default::default()
                },
                vec![],
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
        assert!(f.blobs.paths().is_empty());
    }
}
