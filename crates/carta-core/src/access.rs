//! Access policy: an ordered chain of checking strategies.
//!
//! The ledger's view is preferred; the authoritative database is the
//! fallback. Each strategy returns a verdict or an error — an error falls
//! through to the next strategy, and exhausting the chain denies
//! (fail-closed). The evaluation is idempotent and side-effect-free apart
//! from audit emission.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use carta_ledger::RecordLedger;
use carta_types::{PermissionType, RecordId, UserId};

use crate::db::RecordDatabase;
use crate::error::{CoreError, CoreResult};

// ============================================================================
// AccessStrategy
// ============================================================================

/// One way of answering "may `user` read `record`?".
#[async_trait]
pub trait AccessStrategy: Send + Sync {
    /// Strategy name for logs and audit.
    fn name(&self) -> &'static str;

    /// Returns the verdict, or an error if this strategy cannot decide
    /// (unreachable backend, missing data). Errors are not denials — the
    /// next strategy decides; only chain exhaustion denies.
    async fn check(&self, record_id: &RecordId, user_id: &UserId) -> CoreResult<bool>;
}

// ============================================================================
// LedgerAccessCheck
// ============================================================================

/// Asks the ledger's anchored access state.
pub struct LedgerAccessCheck {
    ledger: Arc<dyn RecordLedger>,
}

impl LedgerAccessCheck {
    pub fn new(ledger: Arc<dyn RecordLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl AccessStrategy for LedgerAccessCheck {
    fn name(&self) -> &'static str {
        "ledger"
    }

    async fn check(&self, record_id: &RecordId, user_id: &UserId) -> CoreResult<bool> {
        let outcome = self.ledger.check_access(record_id, user_id).await;

        if !outcome.success {
            return Err(CoreError::Connection(
                outcome
                    .error
                    .unwrap_or_else(|| "ledger unavailable".to_string()),
            ));
        }
        outcome
            .as_bool()
            .ok_or_else(|| CoreError::Connection("ledger returned non-boolean verdict".to_string()))
    }
}

// ============================================================================
// DatabaseAccessCheck
// ============================================================================

/// Applies the effective-grant rule over the authoritative database.
///
/// Owners (patient and creator) have implicit access; everyone else needs
/// an active, unexpired grant covering the read level.
pub struct DatabaseAccessCheck {
    db: Arc<dyn RecordDatabase>,
}

impl DatabaseAccessCheck {
    pub fn new(db: Arc<dyn RecordDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccessStrategy for DatabaseAccessCheck {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn check(&self, record_id: &RecordId, user_id: &UserId) -> CoreResult<bool> {
        let record = self
            .db
            .record(record_id)?
            .ok_or_else(|| CoreError::NotFound(record_id.to_string()))?;

        if record.is_owner(user_id) {
            return Ok(true);
        }

        let grant = self.db.effective_grant(record_id, user_id, Utc::now())?;
        Ok(grant.map_or(false, |g| g.permission.covers(PermissionType::Read)))
    }
}

// ============================================================================
// AuditSink
// ============================================================================

/// One access decision, for the audit trail.
#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub record_id: RecordId,
    pub user_id: UserId,
    pub allowed: bool,
    /// Strategy that decided, or `"exhausted"` for a fail-closed denial.
    pub decided_by: &'static str,
}

/// Receives every access decision.
pub trait AuditSink: Send + Sync {
    fn record_decision(&self, decision: &AccessDecision);
}

/// Emits decisions as structured `tracing` events.
#[derive(Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record_decision(&self, decision: &AccessDecision) {
        info!(
            record = %decision.record_id,
            user = %decision.user_id,
            allowed = decision.allowed,
            decided_by = decision.decided_by,
            "access decision"
        );
    }
}

// ============================================================================
// AccessPolicy
// ============================================================================

/// Evaluates strategies in order; the first verdict wins, errors fall
/// through, exhaustion denies.
pub struct AccessPolicy {
    strategies: Vec<Arc<dyn AccessStrategy>>,
    audit: Arc<dyn AuditSink>,
}

impl AccessPolicy {
    /// Creates a policy over an ordered strategy list.
    pub fn new(strategies: Vec<Arc<dyn AccessStrategy>>, audit: Arc<dyn AuditSink>) -> Self {
        Self { strategies, audit }
    }

    /// The standard chain: ledger first, database fallback.
    pub fn standard(ledger: Arc<dyn RecordLedger>, db: Arc<dyn RecordDatabase>) -> Self {
        Self::new(
            vec![
                Arc::new(LedgerAccessCheck::new(ledger)),
                Arc::new(DatabaseAccessCheck::new(db)),
            ],
            Arc::new(TracingAuditSink),
        )
    }

    /// Evaluates the chain for a read of `record_id` by `user_id`.
    pub async fn evaluate(&self, record_id: &RecordId, user_id: &UserId) -> bool {
        for strategy in &self.strategies {
            match strategy.check(record_id, user_id).await {
                Ok(allowed) => {
                    self.audit.record_decision(&AccessDecision {
                        record_id: record_id.clone(),
                        user_id: user_id.clone(),
                        allowed,
                        decided_by: strategy.name(),
                    });
                    return allowed;
                }
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        record = %record_id,
                        error = %e,
                        "access strategy could not decide; falling through"
                    );
                }
            }
        }

        // Fail-closed: no strategy could decide.
        self.audit.record_decision(&AccessDecision {
            record_id: record_id.clone(),
            user_id: user_id.clone(),
            allowed: false,
            decided_by: "exhausted",
        });
        false
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedStrategy {
        name: &'static str,
        result: Option<bool>,
    }

    #[async_trait]
    impl AccessStrategy for FixedStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn check(&self, _record: &RecordId, _user: &UserId) -> CoreResult<bool> {
            self.result
                .ok_or_else(|| CoreError::Connection("unreachable".to_string()))
        }
    }

    #[derive(Default)]
    struct CapturingSink {
        decisions: Mutex<Vec<AccessDecision>>,
    }

    impl AuditSink for CapturingSink {
        fn record_decision(&self, decision: &AccessDecision) {
            self.decisions.lock().unwrap().push(decision.clone());
        }
    }

    fn policy(
        strategies: Vec<Arc<dyn AccessStrategy>>,
    ) -> (AccessPolicy, Arc<CapturingSink>) {
        let sink = Arc::new(CapturingSink::default());
        (AccessPolicy::new(strategies, sink.clone()), sink)
    }

    fn ids() -> (RecordId, UserId) {
        (RecordId::new("record:1"), UserId::new("user-1"))
    }

    #[tokio::test]
    async fn first_verdict_short_circuits() {
        let (policy, sink) = policy(vec![
            Arc::new(FixedStrategy { name: "first", result: Some(true) }),
            Arc::new(FixedStrategy { name: "second", result: Some(false) }),
        ]);
        let (record, user) = ids();

        assert!(policy.evaluate(&record, &user).await);

        let decisions = sink.decisions.lock().unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decided_by, "first");
    }

    #[tokio::test]
    async fn error_falls_through_to_next_strategy() {
        let (policy, sink) = policy(vec![
            Arc::new(FixedStrategy { name: "flaky", result: None }),
            Arc::new(FixedStrategy { name: "fallback", result: Some(true) }),
        ]);
        let (record, user) = ids();

        assert!(policy.evaluate(&record, &user).await);
        assert_eq!(sink.decisions.lock().unwrap()[0].decided_by, "fallback");
    }

    #[tokio::test]
    async fn exhaustion_denies_fail_closed() {
        let (policy, sink) = policy(vec![
            Arc::new(FixedStrategy { name: "flaky-1", result: None }),
            Arc::new(FixedStrategy { name: "flaky-2", result: None }),
        ]);
        let (record, user) = ids();

        assert!(!policy.evaluate(&record, &user).await);

        let decisions = sink.decisions.lock().unwrap();
        assert_eq!(decisions.len(), 1);
        assert!(!decisions[0].allowed);
        assert_eq!(decisions[0].decided_by, "exhausted");
    }

    #[tokio::test]
    async fn explicit_denial_does_not_fall_through() {
        let (policy, _) = policy(vec![
            Arc::new(FixedStrategy { name: "denier", result: Some(false) }),
            Arc::new(FixedStrategy { name: "would-allow", result: Some(true) }),
        ]);
        let (record, user) = ids();

        assert!(!policy.evaluate(&record, &user).await);
    }

    #[tokio::test]
    async fn evaluation_is_idempotent() {
        let (policy, _) = policy(vec![Arc::new(FixedStrategy {
            name: "fixed",
            result: Some(true),
        })]);
        let (record, user) = ids();

        assert!(policy.evaluate(&record, &user).await);
        assert!(policy.evaluate(&record, &user).await);
    }
}
