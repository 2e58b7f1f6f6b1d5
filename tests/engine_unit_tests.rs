//! Smoke unit tests for the lifecycle engine components.
//!
//! These span the crate and test behavior in isolation from the end-to-end
//! scenarios, mostly over the in-memory store.

use std::sync::Arc;

use pharmaqualify::audit::AuditTrail;
use pharmaqualify::error::Error;
use pharmaqualify::notify::NotificationCenter;
use pharmaqualify::records::audit_record::{ChecklistItem, NewAuditRecord};
use pharmaqualify::records::change::{ChangeCategory, ChangePriority, ChangeTask, NewChangeRequest, TaskState};
use pharmaqualify::records::coa::{CoaCategory, LineStatus, NewCoaRecord, SpecCategory, SpecLine};
use pharmaqualify::records::deviation::{DeviationRepository, NewDeviation, Severity};
use pharmaqualify::records::inventory::{MaterialCategory, NewInventoryItem};
use pharmaqualify::records::oos::NewOosRecord;
use pharmaqualify::records::stability::NewStabilityStudy;
use pharmaqualify::repository::{Filter, Repository};
use pharmaqualify::signature::{SignatureGate, SignatureGrant, SignatureMeaning, StaticSecret, DEFAULT_REMARK};
use pharmaqualify::store::{KvStore, MemoryStore};
use pharmaqualify::user::{Role, User};
use pharmaqualify::workflow::{Action, Status};

fn admin() -> User {
    User::new("admin", "Site Admin", Role::Admin, "QA", "admin@pharmaqualify.com")
}

fn operator() -> User {
    User::new("jdoe", "J. Doe", Role::Operator, "Production", "jdoe@pharmaqualify.com")
}

fn harness() -> (Arc<MemoryStore>, AuditTrail, NotificationCenter) {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn KvStore> = store.clone();
    let audit = AuditTrail::new(shared.clone());
    let notifier = NotificationCenter::new(shared);
    (store, audit, notifier)
}

fn grant(meaning: SignatureMeaning) -> SignatureGrant {
    let mut gate = SignatureGate::open("test action", meaning, Arc::new(StaticSecret::new("admin123")));
    gate.confirm(&admin(), "admin123", DEFAULT_REMARK, meaning)
        .expect("static secret accepted")
}

fn new_deviation() -> NewDeviation {
    NewDeviation {
        department: "QC Lab".into(),
        description: "OOS result in stability testing for Batch #X-102.".into(),
        severity: Severity::Medium,
        analysis: None,
    }
}

mod repository_guards {
    use super::*;

    /// A non-admin invoking an admin-only action must leave the record, the
    /// collection and the ledger byte-for-byte unchanged.
    #[test]
    fn unauthorized_action_mutates_nothing() {
        let (store, audit, notifier) = harness();
        let repo = DeviationRepository::new(store.clone(), audit, notifier);
        let dev = repo.log(new_deviation(), &operator()).unwrap();

        let collection_before = store.get(pharmaqualify::records::deviation::COLLECTION).unwrap();
        let ledger_before = store.get(pharmaqualify::audit::LEDGER_KEY).unwrap();

        let approval = grant(SignatureMeaning::Approval);
        let err = repo
            .transition(&dev.id, Action::Approve, &operator(), Some(&approval))
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));

        assert_eq!(
            store.get(pharmaqualify::records::deviation::COLLECTION).unwrap(),
            collection_before
        );
        assert_eq!(store.get(pharmaqualify::audit::LEDGER_KEY).unwrap(), ledger_before);
    }

    #[test]
    fn signature_gated_action_without_grant_is_refused_distinctly() {
        let (store, audit, notifier) = harness();
        let repo = DeviationRepository::new(store, audit, notifier);
        let dev = repo.log(new_deviation(), &operator()).unwrap();

        let err = repo.transition(&dev.id, Action::Approve, &admin(), None).unwrap_err();
        assert!(matches!(err, Error::SignatureRequired { action: Action::Approve }));
    }

    #[test]
    fn transition_on_missing_record_is_not_found() {
        let (store, audit, notifier) = harness();
        let repo = DeviationRepository::new(store, audit, notifier);
        let err = repo.transition("dev1missing", Action::Start, &operator(), None).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn closed_record_accepts_no_further_actions() {
        let (store, audit, notifier) = harness();
        let repo = DeviationRepository::new(store, audit, notifier);
        let dev = repo.log(new_deviation(), &operator()).unwrap();

        let approval = grant(SignatureMeaning::Approval);
        repo.transition(&dev.id, Action::Close, &admin(), Some(&approval)).unwrap();
        let err = repo
            .transition(&dev.id, Action::Approve, &admin(), Some(&approval))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { from: Status::Closed, .. }));
    }

    #[test]
    fn delete_is_admin_only_and_witnessed() {
        let (store, audit, notifier) = harness();
        let repo = DeviationRepository::new(store, audit.clone(), notifier);
        let dev = repo.log(new_deviation(), &operator()).unwrap();

        assert!(matches!(repo.delete(&dev.id, &operator()), Err(Error::Unauthorized { .. })));

        repo.delete(&dev.id, &admin()).unwrap();
        assert!(matches!(repo.find(&dev.id), Err(Error::NotFound { .. })));

        let entry = &audit.entries().unwrap()[0];
        assert_eq!(entry.action, "Deleted Deviation");
        assert!(entry.previous_value.as_deref().unwrap_or("").contains(&dev.number));
    }

    #[test]
    fn validation_failure_creates_nothing() {
        let (store, audit, notifier) = harness();
        let repo = DeviationRepository::new(store, audit.clone(), notifier);
        let err = repo
            .log(
                NewDeviation {
                    department: "QA".into(),
                    description: "   ".into(),
                    severity: Severity::Low,
                    analysis: None,
                },
                &operator(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(repo.list().unwrap().is_empty());
        assert!(audit.entries().unwrap().is_empty());
    }

    #[test]
    fn filter_matches_text_and_status() {
        let (store, audit, notifier) = harness();
        let repo = DeviationRepository::new(store, audit, notifier);
        repo.log(new_deviation(), &operator()).unwrap();
        repo.log(
            NewDeviation {
                department: "Packaging".into(),
                description: "Labeling machine misalignment causing skewed labels.".into(),
                severity: Severity::Low,
                analysis: None,
            },
            &operator(),
        )
        .unwrap();

        let hits = repo.list_filtered(&Filter::text("labeling")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].department, "Packaging");

        let hits = repo.list_filtered(&Filter::status(Status::Pending)).unwrap();
        assert_eq!(hits.len(), 2);

        let none = repo.list_filtered(&Filter::status(Status::Closed)).unwrap();
        assert!(none.is_empty());
    }

    /// Display numbers derive from the collection size, newest record first.
    #[test]
    fn records_list_newest_first_with_sequential_numbers() {
        let (store, audit, notifier) = harness();
        let repo = DeviationRepository::new(store, audit, notifier);
        let first = repo.log(new_deviation(), &operator()).unwrap();
        let second = repo.log(new_deviation(), &operator()).unwrap();

        let all = repo.list().unwrap();
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
        assert!(first.number.ends_with("501"));
        assert!(second.number.ends_with("502"));
    }
}

mod module_rules {
    use super::*;

    #[test]
    fn oos_lifecycle_mirrors_deviation_shape() {
        let (store, audit, _) = harness();
        let repo: Repository<pharmaqualify::records::oos::OosRecord> = Repository::new(store, audit);
        let record = repo
            .log(
                NewOosRecord {
                    batch_number: "X-102".into(),
                    test_name: "Assay".into(),
                    specification: "95.0% to 105.0%".into(),
                    result: "93.8%".into(),
                    analyst: "S. Chen".into(),
                },
                &operator(),
            )
            .unwrap();
        assert_eq!(record.status, Status::Pending);

        let approval = grant(SignatureMeaning::Approval);
        let record = repo.transition(&record.id, Action::Approve, &admin(), Some(&approval)).unwrap();
        let record = repo.transition(&record.id, Action::Close, &admin(), Some(&approval)).unwrap();
        assert_eq!(record.status, Status::Closed);
        assert!(record.closed_date.is_some());
    }

    #[test]
    fn stability_study_time_points_then_completion() {
        let (store, audit, _) = harness();
        let repo: Repository<pharmaqualify::records::stability::StabilityStudy> =
            Repository::new(store, audit);
        let study = repo
            .enroll(
                NewStabilityStudy {
                    product: "Metronidazole 400mg".into(),
                    batch_number: "MET-22-104".into(),
                    condition: "25C/60%RH".into(),
                    intervals: vec!["Initial".into(), "3M".into(), "6M".into()],
                },
                &operator(),
            )
            .unwrap();
        assert_eq!(study.status, Status::Ongoing);
        assert_eq!(study.next_time_point, "Initial");

        let study = repo.advance_time_point(&study.id, &operator()).unwrap();
        assert_eq!(study.next_time_point, "3M");
        let study = repo.advance_time_point(&study.id, &operator()).unwrap();
        assert_eq!(study.next_time_point, "6M");
        assert!(matches!(
            repo.advance_time_point(&study.id, &operator()),
            Err(Error::Validation { .. })
        ));

        let completion = grant(SignatureMeaning::Approval);
        let study = repo.transition(&study.id, Action::Complete, &admin(), Some(&completion)).unwrap();
        assert_eq!(study.status, Status::Completed);
        assert!(study.ended_date.is_some());
    }

    #[test]
    fn inventory_consumption_requires_release() {
        let (store, audit, _) = harness();
        let repo: Repository<pharmaqualify::records::inventory::InventoryItem> =
            Repository::new(store, audit);
        let item = repo
            .receive(
                NewInventoryItem {
                    name: "Paracetamol API".into(),
                    category: MaterialCategory::Api,
                    lot_number: "API-881".into(),
                    stock: 25.0,
                    unit: "kg".into(),
                    reorder_level: 5.0,
                    expiry_date: chrono::Utc::now().date_naive(),
                    manufacturer_name: "Granules Ltd".into(),
                    storage_condition: "Below 25C".into(),
                },
                &operator(),
            )
            .unwrap();
        assert_eq!(item.status, Status::Quarantine);

        // quarantined stock cannot be drawn down
        assert!(matches!(
            repo.consume(&item.id, 5.0, &operator()),
            Err(Error::Validation { .. })
        ));

        let release = grant(SignatureMeaning::TechnicalRelease);
        let item = repo.transition(&item.id, Action::Approve, &admin(), Some(&release)).unwrap();
        let item = repo.consume(&item.id, 5.0, &operator()).unwrap();
        assert_eq!(item.stock, 20.0);

        assert!(matches!(
            repo.consume(&item.id, 100.0, &operator()),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn audit_record_checklist_progress() {
        let (store, audit, _) = harness();
        let repo: Repository<pharmaqualify::records::audit_record::AuditRecord> =
            Repository::new(store, audit);
        let record = repo
            .schedule(
                NewAuditRecord {
                    department: "Warehouse".into(),
                    auditor: "M. Thompson".into(),
                    checklist: vec![ChecklistItem {
                        check_item: "Cold chain logs reviewed".into(),
                        regulatory_ref: "21 CFR 211.150".into(),
                        completed: false,
                    }],
                },
                &operator(),
            )
            .unwrap();

        let record = repo.set_checklist_item(&record.id, 0, true, &operator()).unwrap();
        assert!(record.checklist[0].completed);
        assert!(matches!(
            repo.set_checklist_item(&record.id, 5, true, &operator()),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn change_request_tasks_and_approval() {
        let (store, audit, _) = harness();
        let repo: Repository<pharmaqualify::records::change::ChangeRequest> =
            Repository::new(store, audit);
        let change = repo
            .raise(
                NewChangeRequest {
                    title: "Install new blister line".into(),
                    description: "Replace line 2 with serialized blister packer".into(),
                    category: ChangeCategory::Equipment,
                    priority: ChangePriority::Major,
                    impacts: vec!["Validation".into(), "Training".into()],
                    tasks: vec![ChangeTask {
                        description: "Draft IQ/OQ Protocol".into(),
                        owner: "M. Thompson".into(),
                        state: TaskState::Open,
                    }],
                },
                &operator(),
            )
            .unwrap();
        assert_eq!(change.initiated_by, "J. Doe");

        let change = repo.complete_task(&change.id, 0, &operator()).unwrap();
        assert_eq!(change.tasks[0].state, TaskState::Completed);

        let approval = grant(SignatureMeaning::Approval);
        let change = repo.transition(&change.id, Action::Approve, &admin(), Some(&approval)).unwrap();
        let change = repo.transition(&change.id, Action::Close, &admin(), Some(&approval)).unwrap();
        assert_eq!(change.status, Status::Closed);
    }

    #[test]
    fn coa_results_then_issue_stamps_release() {
        let (store, audit, _) = harness();
        let repo: Repository<pharmaqualify::records::coa::CoaRecord> = Repository::new(store, audit);
        let coa = repo
            .draft(
                NewCoaRecord {
                    product_name: "Paracetamol 500mg".into(),
                    dosage_form: "Tablet".into(),
                    batch_number: "PB-1001".into(),
                    batch_size: "100,000".into(),
                    category: CoaCategory::FinishedProduct,
                    specs: vec![SpecLine {
                        test: "Assay".into(),
                        specification: "95.0% to 105.0%".into(),
                        result: String::new(),
                        status: LineStatus::Pending,
                        category: SpecCategory::Chemical,
                    }],
                    manufacturer: "Example Pharma".into(),
                    storage_condition: "Below 30C".into(),
                },
                &operator(),
            )
            .unwrap();
        assert!(!coa.is_complying());

        let coa = repo
            .record_result(&coa.id, 0, "99.8%".into(), LineStatus::Pass, &operator())
            .unwrap();
        assert!(coa.is_complying());
        assert_eq!(coa.compliance_statement(), "COMPLYING");

        let release = grant(SignatureMeaning::TechnicalRelease);
        let coa = repo.transition(&coa.id, Action::Issue, &admin(), Some(&release)).unwrap();
        assert_eq!(coa.status, Status::Issued);
        assert_eq!(coa.released_by.as_deref(), Some("Site Admin"));
        assert!(coa.release_date.is_some());

        // an issued certificate no longer accepts results
        assert!(matches!(
            repo.record_result(&coa.id, 0, "x".into(), LineStatus::Fail, &operator()),
            Err(Error::Validation { .. })
        ));
    }
}

mod notifications {
    use super::*;
    use pharmaqualify::records::capa::{CapaRepository, CapaType, NewCapa};
    use pharmaqualify::repository::{RecordRef, RefKind};

    #[test]
    fn capa_creation_notifies_assignment_by_email() {
        let (store, audit, notifier) = harness();
        let repo = CapaRepository::new(store, audit, notifier.clone());
        repo.open(
            NewCapa {
                source: RecordRef::new(RefKind::Deviation, "D-25-501"),
                description: "Update HPLC Calibration SOP".into(),
                capa_type: CapaType::Corrective,
                owner: "S. Chen".into(),
                due_date: chrono::Utc::now().date_naive(),
            },
            &operator(),
        )
        .unwrap();

        let history = notifier.list().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].channel, pharmaqualify::notify::Channel::Email);
    }

    #[test]
    fn medium_deviation_raises_no_notification() {
        let (store, audit, notifier) = harness();
        let repo = DeviationRepository::new(store, audit, notifier.clone());
        repo.log(new_deviation(), &operator()).unwrap();
        assert!(notifier.list().unwrap().is_empty());
    }
}
