use serde::Serialize;

use vhub_sql::{Row, SQLError, Statement, Value};

use crate::model::{Registration, RegistrationStatus};
use crate::service::MarketError;

use super::{int, text, MarketStore};

const REGISTRATION_COLUMNS: &str =
    "id, user_id, opportunity_id, registered_at, status, hours_completed";

/// Recomputes a student's total from their registrations. Bound params:
/// `?1` student id, `?2` timestamp.
const RECOMPUTE_TOTAL: &str = "UPDATE accounts SET total_hours_logged = \
     (SELECT COALESCE(SUM(hours_completed), 0) FROM registrations WHERE user_id = ?1), \
     updated_at = ?2 \
     WHERE id = ?1 AND kind = 'student'";

/// Registration counts for one student.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudentStats {
    pub registered: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl MarketStore {
    /// Whether any registration (cancelled ones included) exists for the pair.
    pub fn registration_exists(&self, user_id: &str, opportunity_id: &str) -> Result<bool, MarketError> {
        let rows = self.db.query(
            "SELECT 1 AS hit FROM registrations WHERE user_id = ?1 AND opportunity_id = ?2",
            &[Value::from(user_id), Value::from(opportunity_id)],
        )?;
        Ok(!rows.is_empty())
    }

    /// Insert a registration and take one slot, atomically.
    ///
    /// The slot is taken only while the opportunity is active and below
    /// capacity; otherwise nothing is written and the call fails with
    /// `ConflictFailed`. A second registration for the same pair trips the
    /// unique index and fails the same way. A registration that points at a
    /// row no longer present fails with `NotFound`.
    pub fn register(&self, reg: &Registration, now: &str) -> Result<(), MarketError> {
        let batch = [
            Statement::new(
                format!(
                    "INSERT INTO registrations ({REGISTRATION_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                vec![
                    Value::from(reg.id.as_str()),
                    Value::from(reg.user_id.as_str()),
                    Value::from(reg.opportunity_id.as_str()),
                    Value::from(reg.registered_at.as_str()),
                    Value::from(reg.status.as_str()),
                    Value::from(reg.hours_completed),
                ],
            ),
            Statement::new(
                "UPDATE opportunities SET current_volunteers = current_volunteers + 1, \
                 updated_at = ?2 \
                 WHERE id = ?1 AND status = 'active' AND current_volunteers < max_volunteers",
                vec![Value::from(reg.opportunity_id.as_str()), Value::from(now)],
            )
            .expect_rows(1),
        ];
        match self.db.exec_atomic(&batch) {
            Ok(_) => Ok(()),
            Err(SQLError::Precondition { .. }) => Err(MarketError::ConflictFailed(format!(
                "opportunity {} is full or no longer active",
                reg.opportunity_id
            ))),
            Err(SQLError::Constraint(msg)) if msg.contains("UNIQUE") => {
                Err(MarketError::ConflictFailed(format!(
                    "already registered for opportunity {}",
                    reg.opportunity_id
                )))
            }
            // The opportunity or account row vanished between the read and
            // this write.
            Err(SQLError::Constraint(_)) => Err(MarketError::NotFound(format!(
                "opportunity {}",
                reg.opportunity_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a registration by ID.
    pub fn get_registration(&self, id: &str) -> Result<Registration, MarketError> {
        let rows = self.db.query(
            &format!("SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = ?1"),
            &[Value::from(id)],
        )?;
        let row = rows
            .first()
            .ok_or_else(|| MarketError::NotFound(format!("registration {id}")))?;
        row_to_registration(row)
    }

    /// Record hours on a live registration and recompute the student's
    /// total, atomically. The status follows the hours: completed when
    /// positive, registered at zero.
    ///
    /// The range check against `hours_needed` is repeated inside the
    /// write, so a concurrent lowering of `hours_needed` makes this fail
    /// with `ConflictFailed` rather than store out-of-range hours.
    pub fn log_hours(
        &self,
        id: &str,
        user_id: &str,
        hours: i64,
        now: &str,
    ) -> Result<(), MarketError> {
        let status = RegistrationStatus::for_hours(hours);
        let batch = [
            Statement::new(
                "UPDATE registrations SET hours_completed = ?1, status = ?2 \
                 WHERE id = ?3 AND user_id = ?4 AND status != 'cancelled' \
                 AND ?1 <= (SELECT o.hours_needed FROM opportunities o \
                            WHERE o.id = registrations.opportunity_id)",
                vec![
                    Value::from(hours),
                    Value::from(status.as_str()),
                    Value::from(id),
                    Value::from(user_id),
                ],
            )
            .expect_rows(1),
            Statement::new(RECOMPUTE_TOTAL, vec![Value::from(user_id), Value::from(now)])
                .expect_rows(1),
        ];
        match self.db.exec_atomic(&batch) {
            Ok(_) => Ok(()),
            Err(SQLError::Precondition { .. }) => Err(MarketError::ConflictFailed(format!(
                "registration {id} changed before hours could be logged"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Cancel a live registration: zero its hours, release its slot and
    /// recompute the student's total, atomically.
    pub fn cancel_registration(&self, reg: &Registration, now: &str) -> Result<(), MarketError> {
        let batch = [
            Statement::new(
                "UPDATE registrations SET status = 'cancelled', hours_completed = 0 \
                 WHERE id = ?1 AND user_id = ?2 AND status != 'cancelled'",
                vec![Value::from(reg.id.as_str()), Value::from(reg.user_id.as_str())],
            )
            .expect_rows(1),
            Statement::new(
                "UPDATE opportunities SET current_volunteers = current_volunteers - 1, \
                 updated_at = ?2 \
                 WHERE id = ?1 AND current_volunteers > 0",
                vec![Value::from(reg.opportunity_id.as_str()), Value::from(now)],
            )
            .expect_rows(1),
            Statement::new(
                RECOMPUTE_TOTAL,
                vec![Value::from(reg.user_id.as_str()), Value::from(now)],
            )
            .expect_rows(1),
        ];
        match self.db.exec_atomic(&batch) {
            Ok(_) => Ok(()),
            Err(SQLError::Precondition { .. }) => Err(MarketError::ConflictFailed(format!(
                "registration {} is already cancelled",
                reg.id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// A student's registrations, newest first.
    pub fn registrations_for_user(&self, user_id: &str) -> Result<Vec<Registration>, MarketError> {
        let rows = self.db.query(
            &format!(
                "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE user_id = ?1 \
                 ORDER BY registered_at DESC, id ASC"
            ),
            &[Value::from(user_id)],
        )?;
        rows.iter().map(row_to_registration).collect()
    }

    /// Registrations for one opportunity, oldest first.
    pub fn registrations_for_opportunity(
        &self,
        opportunity_id: &str,
    ) -> Result<Vec<Registration>, MarketError> {
        let rows = self.db.query(
            &format!(
                "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE opportunity_id = ?1 \
                 ORDER BY registered_at ASC, id ASC"
            ),
            &[Value::from(opportunity_id)],
        )?;
        rows.iter().map(row_to_registration).collect()
    }

    pub fn student_stats(&self, user_id: &str) -> Result<StudentStats, MarketError> {
        let rows = self.db.query(
            "SELECT status, COUNT(*) AS cnt FROM registrations WHERE user_id = ?1 GROUP BY status",
            &[Value::from(user_id)],
        )?;
        let mut stats = StudentStats::default();
        for row in &rows {
            let n = int(row, "cnt")?.max(0) as usize;
            match RegistrationStatus::from_str(&text(row, "status")?) {
                Some(RegistrationStatus::Registered) => stats.registered = n,
                Some(RegistrationStatus::Completed) => stats.completed = n,
                Some(RegistrationStatus::Cancelled) => stats.cancelled = n,
                None => {}
            }
        }
        Ok(stats)
    }
}

fn row_to_registration(row: &Row) -> Result<Registration, MarketError> {
    let status = text(row, "status")?;
    Ok(Registration {
        id: text(row, "id")?,
        user_id: text(row, "user_id")?,
        opportunity_id: text(row, "opportunity_id")?,
        registered_at: text(row, "registered_at")?,
        status: RegistrationStatus::from_str(&status)
            .ok_or_else(|| MarketError::Internal(format!("unknown registration status {status}")))?,
        hours_completed: int(row, "hours_completed")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::{registration, seeded};

    #[test]
    fn test_register_takes_a_slot() {
        let store = seeded(1, 2);
        store.register(&registration("r1", "s1", "opp1"), "now").unwrap();

        assert_eq!(store.get_opportunity("opp1").unwrap().current_volunteers, 1);
        assert!(store.registration_exists("s1", "opp1").unwrap());
        let reg = store.get_registration("r1").unwrap();
        assert_eq!(reg.status, RegistrationStatus::Registered);
        assert_eq!(reg.hours_completed, 0);
    }

    #[test]
    fn test_register_full_rolls_back() {
        let store = seeded(2, 1);
        store.register(&registration("r1", "s1", "opp1"), "now").unwrap();

        let err = store.register(&registration("r2", "s2", "opp1"), "now");
        assert!(matches!(err, Err(MarketError::ConflictFailed(_))));
        // The insert that preceded the failed guard was rolled back.
        assert!(!store.registration_exists("s2", "opp1").unwrap());
        assert_eq!(store.get_opportunity("opp1").unwrap().current_volunteers, 1);
    }

    #[test]
    fn test_duplicate_pair_conflicts() {
        let store = seeded(1, 5);
        store.register(&registration("r1", "s1", "opp1"), "now").unwrap();
        assert!(matches!(
            store.register(&registration("r2", "s1", "opp1"), "now"),
            Err(MarketError::ConflictFailed(_))
        ));
        assert_eq!(store.get_opportunity("opp1").unwrap().current_volunteers, 1);
    }

    #[test]
    fn test_register_vanished_opportunity_is_not_found() {
        let store = seeded(1, 5);
        store.delete_opportunity("opp1", "o1", "now").unwrap();

        match store.register(&registration("r1", "s1", "opp1"), "now") {
            Err(MarketError::NotFound(msg)) => assert!(!msg.contains("already registered")),
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(!store.registration_exists("s1", "opp1").unwrap());
    }

    #[test]
    fn test_log_hours_recomputes_total() {
        let store = seeded(1, 5);
        store.register(&registration("r1", "s1", "opp1"), "now").unwrap();

        store.log_hours("r1", "s1", 3, "now").unwrap();
        let reg = store.get_registration("r1").unwrap();
        assert_eq!(reg.status, RegistrationStatus::Completed);
        assert_eq!(reg.hours_completed, 3);
        assert_eq!(store.total_hours_logged("s1").unwrap(), 3);

        store.log_hours("r1", "s1", 0, "now").unwrap();
        assert_eq!(
            store.get_registration("r1").unwrap().status,
            RegistrationStatus::Registered
        );
        assert_eq!(store.total_hours_logged("s1").unwrap(), 0);
    }

    #[test]
    fn test_log_hours_over_needed_conflicts() {
        let store = seeded(1, 5);
        store.register(&registration("r1", "s1", "opp1"), "now").unwrap();
        assert!(matches!(
            store.log_hours("r1", "s1", 6, "now"),
            Err(MarketError::ConflictFailed(_))
        ));
        assert_eq!(store.get_registration("r1").unwrap().hours_completed, 0);
    }

    #[test]
    fn test_cancel_releases_slot() {
        let store = seeded(2, 1);
        store.register(&registration("r1", "s1", "opp1"), "now").unwrap();
        store.log_hours("r1", "s1", 2, "now").unwrap();

        let reg = store.get_registration("r1").unwrap();
        store.cancel_registration(&reg, "later").unwrap();

        let reg = store.get_registration("r1").unwrap();
        assert_eq!(reg.status, RegistrationStatus::Cancelled);
        assert_eq!(reg.hours_completed, 0);
        assert_eq!(store.total_hours_logged("s1").unwrap(), 0);
        assert_eq!(store.get_opportunity("opp1").unwrap().current_volunteers, 0);

        // Second cancel changes nothing.
        assert!(matches!(
            store.cancel_registration(&reg, "later"),
            Err(MarketError::ConflictFailed(_))
        ));

        // The freed slot is available to someone else.
        store.register(&registration("r2", "s2", "opp1"), "now").unwrap();
        assert_eq!(store.registrations_for_opportunity("opp1").unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_registrations_never_overfill() {
        let store = seeded(8, 3);
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (1..=8)
                .map(|i| {
                    let store = &store;
                    s.spawn(move || {
                        store.register(
                            &registration(&format!("r{i}"), &format!("s{i}"), "opp1"),
                            "now",
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 3);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, MarketError::ConflictFailed(_))));
        assert_eq!(store.get_opportunity("opp1").unwrap().current_volunteers, 3);
        assert_eq!(store.registrations_for_opportunity("opp1").unwrap().len(), 3);
    }

    #[test]
    fn test_student_stats() {
        let store = seeded(1, 5);
        let mut second = crate::store::fixtures::opportunity("opp2", "o1", 5);
        second.title = "Two".into();
        store.insert_opportunity(&second).unwrap();
        store.register(&registration("r1", "s1", "opp1"), "now").unwrap();
        store.register(&registration("r2", "s1", "opp2"), "now").unwrap();
        store.log_hours("r1", "s1", 1, "now").unwrap();

        let stats = store.student_stats("s1").unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.registered, 1);
        assert_eq!(stats.cancelled, 0);
    }
}
