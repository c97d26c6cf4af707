//! Integration tests for the progress ledger and comment threads.

use onboard_tracker::db::Database;
use onboard_tracker::error::{ErrorCode, ServiceError};
use onboard_tracker::types::{
    AuthorRole, CommentAuthor, CustomerProgress, NewCustomer, ProgressState, TaskDefinition,
    TaskScope, UploadedFile,
};

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn code(err: anyhow::Error) -> ErrorCode {
    ServiceError::from(err).code
}

/// One customer and `n` global tasks in phase 1; returns the customer id and progress rows.
fn seeded(db: &Database, n: usize) -> (String, Vec<CustomerProgress>) {
    let customer = db
        .create_customer(
            NewCustomer {
                name: "Bistro".into(),
                email: "owner@bistro.test".into(),
                ..Default::default()
            },
            "Unassigned",
        )
        .unwrap();
    let mut rows = Vec::new();
    for i in 0..n {
        let task = db
            .create_task(
                TaskDefinition {
                    phase: 1,
                    task_name: format!("Task {}", i),
                    ..Default::default()
                },
                TaskScope::Global,
                "Setup",
            )
            .unwrap();
        rows.push(db.find_progress(&customer.id, &task.id).unwrap().unwrap());
    }
    (customer.id, rows)
}

mod transitions {
    use super::*;

    #[test]
    fn complete_then_verify() {
        let db = setup_db();
        let (_, rows) = seeded(&db, 1);
        let id = &rows[0].id;

        let done = db.mark_complete(id).unwrap();
        assert_eq!(done.state(), ProgressState::Completed);
        assert!(done.completed_at.is_some());
        assert!(done.awaits_verification());

        let verified = db.verify(id, "Olive").unwrap();
        assert_eq!(verified.state(), ProgressState::Verified);
        assert_eq!(verified.verified_by.as_deref(), Some("Olive"));
        assert!(verified.verified_at.is_some());
        assert!(!verified.awaits_verification());
    }

    #[test]
    fn verify_refuses_pending_rows() {
        let db = setup_db();
        let (_, rows) = seeded(&db, 1);

        let err = db.verify(&rows[0].id, "Olive").unwrap_err();

        assert_eq!(code(err), ErrorCode::InvalidState);
        let row = db.get_progress(&rows[0].id).unwrap().unwrap();
        assert!(!row.verified);
    }

    #[test]
    fn mark_incomplete_clears_verification() {
        let db = setup_db();
        let (_, rows) = seeded(&db, 1);
        let id = &rows[0].id;
        db.mark_complete(id).unwrap();
        db.verify(id, "Olive").unwrap();

        let row = db.mark_incomplete(id).unwrap();

        assert_eq!(row.state(), ProgressState::Pending);
        assert!(row.completed_at.is_none());
        assert!(row.verified_at.is_none());
        assert!(row.verified_by.is_none());
    }

    #[test]
    fn repeated_transitions_keep_original_stamps() {
        let db = setup_db();
        let (_, rows) = seeded(&db, 1);
        let id = &rows[0].id;

        let first = db.mark_complete(id).unwrap();
        let again = db.mark_complete(id).unwrap();
        assert_eq!(again.completed_at, first.completed_at);

        let verified = db.verify(id, "Olive").unwrap();
        let reverified = db.verify(id, "Someone Else").unwrap();
        assert_eq!(reverified.verified_by.as_deref(), Some("Olive"));
        assert_eq!(reverified.verified_at, verified.verified_at);
    }

    #[test]
    fn unverify_keeps_completion() {
        let db = setup_db();
        let (_, rows) = seeded(&db, 1);
        let id = &rows[0].id;
        db.mark_complete(id).unwrap();
        db.verify(id, "Olive").unwrap();

        let row = db.unverify(id).unwrap();
        assert_eq!(row.state(), ProgressState::Completed);
        assert!(row.verified_by.is_none());

        // Already unverified
        let row = db.unverify(id).unwrap();
        assert_eq!(row.state(), ProgressState::Completed);
    }

    #[test]
    fn toggle_skip_flips_and_hides_from_verification() {
        let db = setup_db();
        let (_, rows) = seeded(&db, 1);
        let id = &rows[0].id;
        db.mark_complete(id).unwrap();

        let skipped = db.toggle_skip(id).unwrap();
        assert!(skipped.is_skipped);
        assert!(!skipped.awaits_verification());

        let restored = db.toggle_skip(id).unwrap();
        assert!(!restored.is_skipped);
        assert!(restored.awaits_verification());
    }

    #[test]
    fn missing_row_is_not_found() {
        let db = setup_db();
        assert_eq!(code(db.mark_complete("nope").unwrap_err()), ErrorCode::ProgressNotFound);
        assert_eq!(code(db.toggle_skip("nope").unwrap_err()), ErrorCode::ProgressNotFound);
    }
}

mod bulk {
    use super::*;

    #[test]
    fn verify_all_only_touches_completed_unverified_rows() {
        let db = setup_db();
        let (customer, rows) = seeded(&db, 4);
        db.mark_complete(&rows[0].id).unwrap();
        db.mark_complete(&rows[1].id).unwrap();
        db.mark_complete(&rows[2].id).unwrap();
        db.verify(&rows[2].id, "Earlier").unwrap();

        let mut verified = db.verify_all(&customer, "Olive").unwrap();
        verified.sort();
        let mut expected = vec![rows[0].id.clone(), rows[1].id.clone()];
        expected.sort();
        assert_eq!(verified, expected);

        let after = db.list_progress_for_customer(&customer).unwrap();
        assert!(after.iter().all(|p| !p.awaits_verification()));
        let earlier = db.get_progress(&rows[2].id).unwrap().unwrap();
        assert_eq!(earlier.verified_by.as_deref(), Some("Earlier"));
        let pending = db.get_progress(&rows[3].id).unwrap().unwrap();
        assert_eq!(pending.state(), ProgressState::Pending);
    }

    #[test]
    fn verify_all_for_unknown_customer_fails() {
        let db = setup_db();
        assert_eq!(
            code(db.verify_all("ghost", "Olive").unwrap_err()),
            ErrorCode::CustomerNotFound
        );
    }
}

mod files {
    use super::*;

    #[test]
    fn attach_file_appends_in_order() {
        let db = setup_db();
        let (_, rows) = seeded(&db, 1);
        let id = &rows[0].id;

        for (i, name) in ["menu.pdf", "floorplan.png"].iter().enumerate() {
            db.attach_file(
                id,
                UploadedFile {
                    name: name.to_string(),
                    url: format!("/files/{}", name),
                    uploaded_at: i as i64,
                },
            )
            .unwrap();
        }

        let row = db.get_progress(id).unwrap().unwrap();
        let names: Vec<_> = row.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["menu.pdf", "floorplan.png"]);
    }

    #[test]
    fn attach_file_requires_name_and_url() {
        let db = setup_db();
        let (_, rows) = seeded(&db, 1);
        let err = db
            .attach_file(
                &rows[0].id,
                UploadedFile {
                    name: "menu.pdf".into(),
                    url: " ".into(),
                    uploaded_at: 0,
                },
            )
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::MissingRequiredField);
    }
}

mod comments {
    use super::*;

    fn customer_author() -> CommentAuthor {
        CommentAuthor {
            email: "owner@bistro.test".into(),
            name: Some("Bistro".into()),
            role: AuthorRole::Customer,
        }
    }

    #[test]
    fn comments_copy_customer_and_keep_order() {
        let db = setup_db();
        let (customer, rows) = seeded(&db, 1);
        let id = &rows[0].id;

        db.post_comment(id, &customer_author(), "  Which POS model?  ").unwrap();
        db.post_comment(
            id,
            &CommentAuthor {
                email: "olive@staff.test".into(),
                name: Some("Olive".into()),
                role: AuthorRole::Om,
            },
            "The one at the bar",
        )
        .unwrap();

        let thread = db.list_comments_for_progress(id).unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].message, "Which POS model?");
        assert_eq!(thread[0].customer_id, customer);
        assert_eq!(thread[1].author_role, AuthorRole::Om);
        assert_eq!(db.list_comments_for_customer(&customer).unwrap().len(), 2);
    }

    #[test]
    fn empty_message_and_missing_row_are_rejected() {
        let db = setup_db();
        let (_, rows) = seeded(&db, 1);
        assert_eq!(
            code(db.post_comment(&rows[0].id, &customer_author(), "   ").unwrap_err()),
            ErrorCode::MissingRequiredField
        );
        assert_eq!(
            code(db.post_comment("nope", &customer_author(), "hi").unwrap_err()),
            ErrorCode::ProgressNotFound
        );
    }
}
