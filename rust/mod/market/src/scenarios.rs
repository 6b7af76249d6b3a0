//! End-to-end marketplace scenarios run against the service with a real
//! SQLite store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use vhub_sql::{Row, SQLError, SQLStore, SqliteStore, Statement, Value};

use crate::model::{
    AccountKind, Actor, Category, CreateOpportunity, OpportunityStatus, RegistrationStatus, SignUp,
    MAX_HOURS_NEEDED,
};
use crate::policy::DenyReason;
use crate::service::dashboard::Dashboard;
use crate::service::{testing, MarketError, MarketService};

/// SQLite that reports `Busy` for the next `failures` calls.
struct FlakyStore {
    inner: SqliteStore,
    failures: AtomicU32,
    atomic_calls: AtomicU32,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            failures: AtomicU32::new(0),
            atomic_calls: AtomicU32::new(0),
        }
    }

    fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn trip(&self) -> Result<(), SQLError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(SQLError::Busy("database is locked".into()));
        }
        Ok(())
    }
}

impl SQLStore for FlakyStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        self.trip()?;
        self.inner.query(sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        self.trip()?;
        self.inner.exec(sql, params)
    }

    fn exec_atomic(&self, statements: &[Statement]) -> Result<Vec<u64>, SQLError> {
        self.atomic_calls.fetch_add(1, Ordering::SeqCst);
        self.trip()?;
        self.inner.exec_atomic(statements)
    }
}

fn join(svc: &MarketService, name: &str, kind: AccountKind) -> Actor {
    let view = svc
        .sign_up(SignUp {
            email: format!("{}@example.org", name),
            password: "volunteer!".into(),
            kind,
            display_name: name.into(),
            phone: Some("555-0142".into()),
            address: None,
            city: Some("Springfield".into()),
            website: None,
            bio: None,
            service_hours_goal: None,
        })
        .unwrap();
    match kind {
        AccountKind::Student => Actor::Student { id: view.id },
        AccountKind::Organization => Actor::Organization {
            id: view.id,
            verified: false,
        },
    }
}

/// Verify an organization and return its refreshed actor.
fn verified(svc: &MarketService, org: &Actor) -> Actor {
    let id = org.id().unwrap();
    svc.set_verified(id, true).unwrap();
    Actor::Organization {
        id: id.to_string(),
        verified: true,
    }
}

fn food_drive(max_volunteers: i64) -> CreateOpportunity {
    CreateOpportunity {
        organization_id: None,
        title: "Food Drive".into(),
        description: "Collect and sort donations for the pantry".into(),
        category: Category::Health,
        hours_needed: 5,
        max_volunteers,
        date: "2026-11-21".into(),
        time: "10:00".into(),
        location: "Main Street Pantry".into(),
        city: "Springfield".into(),
        state: "IL".into(),
        zip_code: "62704".into(),
        requirements: None,
    }
}

fn students(svc: &MarketService, n: usize) -> Vec<Actor> {
    (0..n)
        .map(|i| join(svc, &format!("student{}", i), AccountKind::Student))
        .collect()
}

fn total_hours(svc: &MarketService, student: &Actor) -> i64 {
    svc.me(student).unwrap().total_hours_logged.unwrap()
}

#[test]
fn food_drive_fills_up_and_stays_active() {
    let (svc, _dir) = testing::service();
    let org = join(&svc, "pantry", AccountKind::Organization);
    let org = verified(&svc, &org);
    let opp = svc.create_opportunity(&org, food_drive(10)).unwrap();

    let kids = students(&svc, 11);
    for kid in &kids[..10] {
        svc.register(kid, &opp.id).unwrap();
    }

    let after = svc.get_opportunity(&org, &opp.id).unwrap();
    assert_eq!(after.current_volunteers, 10);
    assert_eq!(after.status, OpportunityStatus::Active);

    let err = svc.register(&kids[10], &opp.id).unwrap_err();
    assert!(matches!(
        err,
        MarketError::AuthorizationDenied {
            reason: DenyReason::CapacityExceeded
        }
    ));
    assert_eq!(svc.get_opportunity(&org, &opp.id).unwrap().current_volunteers, 10);
}

#[test]
fn logging_part_of_the_hours_completes_registration() {
    let (svc, _dir) = testing::service();
    let org = join(&svc, "library", AccountKind::Organization);
    let org = verified(&svc, &org);
    let opp = svc.create_opportunity(&org, food_drive(3)).unwrap();
    let kid = join(&svc, "riley", AccountKind::Student);

    let reg = svc.register(&kid, &opp.id).unwrap();
    let reg = svc.log_hours(&kid, &reg.id, 3).unwrap();
    assert_eq!(reg.status, RegistrationStatus::Completed);
    assert_eq!(reg.hours_completed, 3);
    assert_eq!(total_hours(&svc, &kid), 3);

    // Beyond what the opportunity needs.
    let err = svc.log_hours(&kid, &reg.id, 6).unwrap_err();
    assert!(matches!(
        err,
        MarketError::AuthorizationDenied {
            reason: DenyReason::InvalidRange
        }
    ));
    assert_eq!(total_hours(&svc, &kid), 3);
}

#[test]
fn oversized_hours_are_refused_before_any_total_is_touched() {
    let (svc, _dir) = testing::service();
    let org = join(&svc, "marathon", AccountKind::Organization);
    let org = verified(&svc, &org);

    let mut huge = food_drive(2);
    huge.hours_needed = i64::MAX;
    assert!(matches!(
        svc.create_opportunity(&org, huge),
        Err(MarketError::ValidationFailed { ref field, .. }) if field == "hours_needed"
    ));

    let mut longest = food_drive(2);
    longest.hours_needed = MAX_HOURS_NEEDED;
    let opp = svc.create_opportunity(&org, longest).unwrap();
    assert!(matches!(
        svc.update_opportunity(&org, &opp.id, serde_json::json!({"hours_needed": i64::MAX})),
        Err(MarketError::ValidationFailed { ref field, .. }) if field == "hours_needed"
    ));

    let kid = join(&svc, "quinn", AccountKind::Student);
    let reg = svc.register(&kid, &opp.id).unwrap();
    assert!(matches!(
        svc.log_hours(&kid, &reg.id, i64::MAX / 50),
        Err(MarketError::AuthorizationDenied {
            reason: DenyReason::InvalidRange
        })
    ));
    svc.log_hours(&kid, &reg.id, MAX_HOURS_NEEDED).unwrap();

    match svc.dashboard(&kid).unwrap() {
        Dashboard::Student(d) => {
            assert_eq!(d.total_hours_logged, MAX_HOURS_NEEDED);
            assert_eq!(d.progress_percent, 100);
        }
        other => panic!("unexpected dashboard {other:?}"),
    }
}

#[test]
fn students_are_never_verified() {
    let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
    let (svc, _dir) = testing::service_with(sql.clone());
    let kid = join(&svc, "jordan", AccountKind::Student);
    let id = kid.id().unwrap();

    assert!(matches!(
        svc.set_verified(id, true),
        Err(MarketError::ValidationFailed { ref field, .. }) if field == "verified"
    ));

    // Even a direct write is refused by the schema.
    let err = sql
        .exec("UPDATE accounts SET verified = 1 WHERE id = ?1", &[id.into()])
        .unwrap_err();
    assert!(matches!(err, SQLError::Constraint(_)));
    assert!(!svc.me(&kid).unwrap().verified);
}

#[test]
fn organization_can_post_once_verified() {
    let (svc, _dir) = testing::service();
    let org = join(&svc, "shelter", AccountKind::Organization);

    let err = svc.create_opportunity(&org, food_drive(5)).unwrap_err();
    assert!(matches!(
        err,
        MarketError::AuthorizationDenied {
            reason: DenyReason::NotVerified
        }
    ));

    let org = verified(&svc, &org);
    let opp = svc.create_opportunity(&org, food_drive(5)).unwrap();
    assert_eq!(opp.current_volunteers, 0);
    assert_eq!(opp.organization_id, org.id().unwrap());
}

#[test]
fn duplicate_registration_is_always_reported() {
    let (svc, _dir) = testing::service();
    let org = join(&svc, "garden", AccountKind::Organization);
    let org = verified(&svc, &org);
    let opp = svc.create_opportunity(&org, food_drive(1)).unwrap();
    let kid = join(&svc, "casey", AccountKind::Student);

    let reg = svc.register(&kid, &opp.id).unwrap();
    // Full now, but the duplicate wins over capacity.
    for _ in 0..2 {
        assert!(matches!(
            svc.register(&kid, &opp.id),
            Err(MarketError::AuthorizationDenied {
                reason: DenyReason::DuplicateRegistration
            })
        ));
    }

    svc.cancel_registration(&kid, &reg.id).unwrap();
    assert!(matches!(
        svc.register(&kid, &opp.id),
        Err(MarketError::AuthorizationDenied {
            reason: DenyReason::DuplicateRegistration
        })
    ));
}

#[test]
fn concurrent_registrations_never_overfill() {
    let (svc, _dir) = testing::service();
    let org = join(&svc, "museum", AccountKind::Organization);
    let org = verified(&svc, &org);
    let opp = svc.create_opportunity(&org, food_drive(3)).unwrap();
    let kids = students(&svc, 8);

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = kids
            .iter()
            .map(|kid| {
                let svc = &svc;
                let opp_id = opp.id.as_str();
                scope.spawn(move || svc.register(kid, opp_id))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                err,
                MarketError::ConflictFailed(_)
                    | MarketError::AuthorizationDenied {
                        reason: DenyReason::CapacityExceeded
                    }
            ),
            "unexpected error: {err}"
        );
    }

    let after = svc.get_opportunity(&org, &opp.id).unwrap();
    assert_eq!(after.current_volunteers, 3);
    assert_eq!(svc.list_volunteers(&org, &opp.id).unwrap().len(), 3);
}

#[test]
fn concurrent_hour_updates_keep_total_consistent() {
    let (svc, _dir) = testing::service();
    let org = join(&svc, "zoo", AccountKind::Organization);
    let org = verified(&svc, &org);
    let kid = join(&svc, "morgan", AccountKind::Student);

    let regs: Vec<_> = (0..4)
        .map(|_| {
            let opp = svc.create_opportunity(&org, food_drive(5)).unwrap();
            svc.register(&kid, &opp.id).unwrap()
        })
        .collect();

    std::thread::scope(|scope| {
        for (i, reg) in regs.iter().enumerate() {
            let svc = &svc;
            let kid = &kid;
            scope.spawn(move || {
                for hours in [1, 4, 2, 5, 0, (i as i64) + 1] {
                    svc.log_hours(kid, &reg.id, hours).unwrap();
                }
            });
        }
    });

    let logged: i64 = svc
        .list_my_registrations(&kid)
        .unwrap()
        .iter()
        .map(|r| r.hours_completed)
        .sum();
    assert_eq!(logged, 1 + 2 + 3 + 4);
    assert_eq!(total_hours(&svc, &kid), logged);
}

#[test]
fn busy_store_is_retried() {
    let flaky = Arc::new(FlakyStore::new());
    let (svc, _dir) = testing::service_with(flaky.clone());
    let org = join(&svc, "hospital", AccountKind::Organization);
    let org = verified(&svc, &org);
    let opp = svc.create_opportunity(&org, food_drive(2)).unwrap();

    // Within the retry allowance.
    flaky.fail_next(svc.config().store_retries);
    assert_eq!(svc.get_opportunity(&org, &opp.id).unwrap().id, opp.id);

    // One more than the allowance surfaces as unavailable.
    flaky.fail_next(svc.config().store_retries + 1);
    assert!(matches!(
        svc.get_opportunity(&org, &opp.id),
        Err(MarketError::StoreUnavailable(_))
    ));
    flaky.fail_next(0);
}

#[test]
fn lost_race_is_not_retried() {
    let flaky = Arc::new(FlakyStore::new());
    let (svc, _dir) = testing::service_with(flaky.clone());
    let org = join(&svc, "theater", AccountKind::Organization);
    let org = verified(&svc, &org);
    let opp = svc.create_opportunity(&org, food_drive(1)).unwrap();
    let kids = students(&svc, 2);

    let first = svc.prepare_registration(&kids[0], &opp.id).unwrap();
    let second = svc.prepare_registration(&kids[1], &opp.id).unwrap();
    svc.commit_registration(first).unwrap();

    flaky.atomic_calls.store(0, Ordering::SeqCst);
    assert!(matches!(
        svc.commit_registration(second),
        Err(MarketError::ConflictFailed(_))
    ));
    assert_eq!(flaky.atomic_calls.load(Ordering::SeqCst), 1);
}
