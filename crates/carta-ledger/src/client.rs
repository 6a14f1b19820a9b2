//! The ledger client: connection state machine, bounded retry, and domain
//! wrappers for the record contract.
//!
//! One client is shared per process. Calls may be issued concurrently — the
//! ledger's ordering service serializes writes — but reconnection is guarded
//! so only a single reconnect attempt runs at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use carta_types::{Cid, PermissionType, RecordId, TxId, UserId};

use crate::error::LedgerError;
use crate::retry::RetryPolicy;
use crate::transport::LedgerTransport;

// ============================================================================
// ConnectionState
// ============================================================================

/// Connection lifecycle of the shared ledger client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No usable connection; the next call triggers reconnection.
    Disconnected,
    /// A reconnect attempt is in flight.
    Connecting,
    /// Calls are being served.
    Connected,
}

// ============================================================================
// Config / Outcomes
// ============================================================================

/// Static configuration for the ledger client.
#[derive(Debug, Clone)]
pub struct LedgerClientConfig {
    /// Ledger channel the contract is deployed on.
    pub channel: String,
    /// Name of the deployed contract program.
    pub contract: String,
    /// Retry policy applied to connectivity failures.
    pub retry: RetryPolicy,
}

impl Default for LedgerClientConfig {
    fn default() -> Self {
        Self {
            channel: "records".to_string(),
            contract: "emr".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of [`LedgerClient::initialize`] / [`LedgerClient::reset`].
#[derive(Debug, Clone)]
pub struct InitOutcome {
    /// True if the connection and diagnostic succeeded.
    pub success: bool,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
    /// Failure detail when not successful.
    pub error: Option<String>,
}

/// Result of a ledger call. The client never returns `Err` across its
/// public boundary; failures land here with `success == false`.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    /// True if the function executed (and, for submits, committed).
    pub success: bool,
    /// Function result when successful.
    pub data: Option<Value>,
    /// Failure detail when not successful.
    pub error: Option<String>,
}

impl From<Result<Value, LedgerError>> for TxOutcome {
    fn from(result: Result<Value, LedgerError>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.to_string()),
            },
        }
    }
}

impl TxOutcome {
    /// Extracts a transaction ID from the result payload, if present.
    pub fn tx_id(&self) -> Option<TxId> {
        let data = self.data.as_ref()?;
        match data {
            Value::String(s) => Some(TxId::new(s.clone())),
            Value::Object(map) => map
                .get("txId")
                .and_then(Value::as_str)
                .map(TxId::new),
            _ => None,
        }
    }

    /// Interprets the result payload as a boolean verdict.
    pub fn as_bool(&self) -> Option<bool> {
        match self.data.as_ref()? {
            Value::Bool(b) => Some(*b),
            Value::Object(map) => map.get("hasAccess").and_then(Value::as_bool),
            _ => None,
        }
    }
}

/// Introspection snapshot for health checks. Requires no network call.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    /// Current state machine position.
    pub state: ConnectionState,
    /// True when state is [`ConnectionState::Connected`].
    pub is_connected: bool,
    /// True if the transport currently holds an open connection.
    pub has_transport: bool,
    /// True if a channel is configured.
    pub has_channel: bool,
    /// True if a contract name is configured.
    pub has_contract: bool,
    /// Total connectivity retries performed since construction.
    pub retries: u32,
    /// Transport endpoint description.
    pub endpoint: String,
    /// The active configuration.
    pub config: LedgerClientConfig,
}

// ============================================================================
// Function names
// ============================================================================

/// Canonical write function for record creation.
const FN_CREATE_RECORD: &str = "CreateRecord";
/// Legacy alias still deployed on older ledger programs.
const FN_CREATE_RECORD_ALIAS: &str = "CreateMedicalRecord";
/// Canonical read function.
const FN_READ_RECORD: &str = "ReadRecord";
/// Legacy read alias.
const FN_READ_RECORD_ALIAS: &str = "GetRecord";
/// Update function with its legacy alias.
const FN_UPDATE_RECORD: &str = "UpdateRecord";
const FN_UPDATE_RECORD_ALIAS: &str = "UpdateMedicalRecord";

const FN_GRANT_ACCESS: &str = "GrantAccess";
const FN_REVOKE_ACCESS: &str = "RevokeAccess";
const FN_CHECK_ACCESS: &str = "CheckAccess";
const FN_VERIFY_RECORD: &str = "ValidateRecordIntegrity";
const FN_GET_ALL_ASSETS: &str = "GetAllAssets";
const FN_CONTRACT_INFO: &str = "GetContractInfo";

// ============================================================================
// RecordLedger
// ============================================================================

/// Domain surface of the ledger used by the orchestrator.
///
/// Behind a trait so tests and degraded deployments can substitute a fake
/// without a network in sight.
#[async_trait]
pub trait RecordLedger: Send + Sync {
    /// Anchors a record creation. The outcome's payload carries the
    /// transaction ID.
    async fn create_record(
        &self,
        record_id: &RecordId,
        patient_id: &UserId,
        creator_id: &UserId,
        payload_cid: &Cid,
        content_hash: &str,
    ) -> TxOutcome;

    /// Reads the anchored record state.
    async fn read_record(&self, record_id: &RecordId) -> TxOutcome;

    /// Mirrors a new version's hash and address onto the ledger.
    async fn update_record(
        &self,
        record_id: &RecordId,
        new_content_hash: &str,
        new_cid: &Cid,
    ) -> TxOutcome;

    /// Anchors an access grant.
    async fn grant_access(
        &self,
        record_id: &RecordId,
        grantee_id: &UserId,
        permission: PermissionType,
        expires_at: Option<DateTime<Utc>>,
    ) -> TxOutcome;

    /// Anchors an access revocation.
    async fn revoke_access(&self, record_id: &RecordId, grantee_id: &UserId) -> TxOutcome;

    /// Asks the ledger whether `user_id` may access `record_id`.
    async fn check_access(&self, record_id: &RecordId, user_id: &UserId) -> TxOutcome;

    /// Compares `content_hash` against the anchored hash.
    async fn verify_record(&self, record_id: &RecordId, content_hash: &str) -> TxOutcome;
}

// ============================================================================
// LedgerClient
// ============================================================================

/// Stateful client over a [`LedgerTransport`].
pub struct LedgerClient {
    config: LedgerClientConfig,
    transport: Arc<dyn LedgerTransport>,
    state: RwLock<ConnectionState>,
    /// Serializes reconnect attempts; callers either drive the reconnect or
    /// wait for the one in flight.
    reconnect_guard: Mutex<()>,
    retries: AtomicU32,
}

impl LedgerClient {
    /// Creates a client over `transport`.
    pub fn new(config: LedgerClientConfig, transport: Arc<dyn LedgerTransport>) -> Self {
        Self {
            config,
            transport,
            state: RwLock::new(ConnectionState::Disconnected),
            reconnect_guard: Mutex::new(()),
            retries: AtomicU32::new(0),
        }
    }

    /// Establishes the connection and runs a lightweight diagnostic before
    /// declaring success.
    pub async fn initialize(&self) -> InitOutcome {
        *self.state.write().await = ConnectionState::Connecting;

        let _guard = self.reconnect_guard.lock().await;

        if let Err(e) = self.transport.open().await {
            *self.state.write().await = ConnectionState::Disconnected;
            return InitOutcome {
                success: false,
                timestamp: Utc::now(),
                error: Some(e.to_string()),
            };
        }

        // Connectivity diagnostic. An older program without the info
        // function still proves the connection works.
        match self.transport.call(FN_CONTRACT_INFO, &[], false).await {
            Ok(_) | Err(LedgerError::FunctionNotFound(_)) => {
                *self.state.write().await = ConnectionState::Connected;
                debug!(endpoint = %self.transport.endpoint(), "ledger client connected");
                InitOutcome {
                    success: true,
                    timestamp: Utc::now(),
                    error: None,
                }
            }
            Err(e) => {
                self.transport.close().await;
                *self.state.write().await = ConnectionState::Disconnected;
                InitOutcome {
                    success: false,
                    timestamp: Utc::now(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Disconnects and reinitializes. Used after persistent failures.
    pub async fn reset(&self) -> InitOutcome {
        {
            let _guard = self.reconnect_guard.lock().await;
            self.transport.close().await;
            *self.state.write().await = ConnectionState::Disconnected;
        }
        self.initialize().await
    }

    /// Submits a write transaction (consensus ordering applies ledger-side).
    pub async fn submit_transaction(&self, function: &str, args: &[Value]) -> TxOutcome {
        self.invoke_raw(function, args, true).await.into()
    }

    /// Evaluates a read transaction (no consensus ordering).
    pub async fn evaluate_transaction(&self, function: &str, args: &[Value]) -> TxOutcome {
        self.invoke_raw(function, args, false).await.into()
    }

    /// Connection introspection for health checks. No network call.
    pub async fn connection_status(&self) -> ConnectionStatus {
        let state = *self.state.read().await;
        ConnectionStatus {
            state,
            is_connected: state == ConnectionState::Connected,
            has_transport: self.transport.is_open(),
            has_channel: !self.config.channel.is_empty(),
            has_contract: !self.config.contract.is_empty(),
            retries: self.retries.load(Ordering::Relaxed),
            endpoint: self.transport.endpoint(),
            config: self.config.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Drives one call through the retry loop.
    ///
    /// Connectivity failures transition to `Connecting` and retry per the
    /// policy; semantic rejections (bad arguments, unknown function,
    /// access denied) never retry. Exhaustion lands in `Disconnected`.
    async fn invoke_raw(
        &self,
        function: &str,
        args: &[Value],
        submit: bool,
    ) -> Result<Value, LedgerError> {
        let mut retry = 0u32;

        loop {
            if *self.state.read().await != ConnectionState::Connected {
                if let Err(e) = self.ensure_connected().await {
                    match self.config.retry.delay_for(retry + 1) {
                        Some(delay) => {
                            retry += 1;
                            self.retries.fetch_add(1, Ordering::Relaxed);
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        None => {
                            *self.state.write().await = ConnectionState::Disconnected;
                            return Err(e);
                        }
                    }
                }
            }

            match self.transport.call(function, args, submit).await {
                Ok(value) => return Ok(value),
                // Semantic faults are not connectivity problems; surface
                // them without burning retries.
                Err(e @ (LedgerError::FunctionNotFound(_) | LedgerError::Rejected(_))) => {
                    return Err(e);
                }
                Err(e) => {
                    warn!(function, error = %e, retry, "ledger call failed");
                    *self.state.write().await = ConnectionState::Connecting;

                    match self.config.retry.delay_for(retry + 1) {
                        Some(delay) => {
                            retry += 1;
                            self.retries.fetch_add(1, Ordering::Relaxed);
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            *self.state.write().await = ConnectionState::Disconnected;
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Reconnects under the guard. Concurrent callers wait for the attempt
    /// in flight and observe its result through the state.
    async fn ensure_connected(&self) -> Result<(), LedgerError> {
        let _guard = self.reconnect_guard.lock().await;

        // Another caller may have reconnected while we waited.
        if *self.state.read().await == ConnectionState::Connected {
            return Ok(());
        }

        *self.state.write().await = ConnectionState::Connecting;
        match self.transport.open().await {
            Ok(()) => {
                *self.state.write().await = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Calls `primary`, retrying once against `alias` if the deployed
    /// program does not know the primary name.
    ///
    /// This is a versioning-compatibility shim, not a semantic change: both
    /// names are the same function across ledger program versions.
    async fn invoke_with_alias(
        &self,
        primary: &str,
        alias: &str,
        args: &[Value],
        submit: bool,
    ) -> TxOutcome {
        match self.invoke_raw(primary, args, submit).await {
            Err(LedgerError::FunctionNotFound(_)) => {
                debug!(primary, alias, "ledger rejected function name; trying alias");
                self.invoke_raw(alias, args, submit).await.into()
            }
            result => result.into(),
        }
    }
}

#[async_trait]
impl RecordLedger for LedgerClient {
    async fn create_record(
        &self,
        record_id: &RecordId,
        patient_id: &UserId,
        creator_id: &UserId,
        payload_cid: &Cid,
        content_hash: &str,
    ) -> TxOutcome {
        let record_json = json!({
            "recordId": record_id.as_str(),
            "patientId": patient_id.as_str(),
            "creatorId": creator_id.as_str(),
            "ipfsCid": payload_cid.as_str(),
            "contentHash": content_hash,
            "timestamp": Utc::now().to_rfc3339(),
        });

        self.invoke_with_alias(
            FN_CREATE_RECORD,
            FN_CREATE_RECORD_ALIAS,
            &[Value::String(record_json.to_string())],
            true,
        )
        .await
    }

    async fn read_record(&self, record_id: &RecordId) -> TxOutcome {
        self.invoke_with_alias(
            FN_READ_RECORD,
            FN_READ_RECORD_ALIAS,
            &[Value::String(record_id.as_str().to_string())],
            false,
        )
        .await
    }

    async fn update_record(
        &self,
        record_id: &RecordId,
        new_content_hash: &str,
        new_cid: &Cid,
    ) -> TxOutcome {
        self.invoke_with_alias(
            FN_UPDATE_RECORD,
            FN_UPDATE_RECORD_ALIAS,
            &[
                Value::String(record_id.as_str().to_string()),
                Value::String(new_content_hash.to_string()),
                Value::String(new_cid.as_str().to_string()),
            ],
            true,
        )
        .await
    }

    async fn grant_access(
        &self,
        record_id: &RecordId,
        grantee_id: &UserId,
        permission: PermissionType,
        expires_at: Option<DateTime<Utc>>,
    ) -> TxOutcome {
        let expires = expires_at.map(|t| t.to_rfc3339()).unwrap_or_default();

        self.submit_transaction(
            FN_GRANT_ACCESS,
            &[
                Value::String(record_id.as_str().to_string()),
                Value::String(grantee_id.as_str().to_string()),
                Value::String(permission.as_action().to_string()),
                Value::String(expires),
            ],
        )
        .await
    }

    async fn revoke_access(&self, record_id: &RecordId, grantee_id: &UserId) -> TxOutcome {
        self.submit_transaction(
            FN_REVOKE_ACCESS,
            &[
                Value::String(record_id.as_str().to_string()),
                Value::String(grantee_id.as_str().to_string()),
            ],
        )
        .await
    }

    async fn check_access(&self, record_id: &RecordId, user_id: &UserId) -> TxOutcome {
        self.evaluate_transaction(
            FN_CHECK_ACCESS,
            &[
                Value::String(record_id.as_str().to_string()),
                Value::String(user_id.as_str().to_string()),
            ],
        )
        .await
    }

    async fn verify_record(&self, record_id: &RecordId, content_hash: &str) -> TxOutcome {
        self.evaluate_transaction(
            FN_VERIFY_RECORD,
            &[
                Value::String(record_id.as_str().to_string()),
                Value::String(content_hash.to_string()),
            ],
        )
        .await
    }
}

impl LedgerClient {
    /// Lists every anchored asset. Used by reconciliation tooling, not the
    /// hot path.
    pub async fn get_all_assets(&self) -> TxOutcome {
        self.evaluate_transaction(FN_GET_ALL_ASSETS, &[]).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicBool;
    use std::time::{Duration, Instant};

    /// Transport fake with a scripted sequence of replies.
    struct ScriptedTransport {
        replies: std::sync::Mutex<VecDeque<Result<Value, LedgerError>>>,
        open: AtomicBool,
        fail_open: AtomicBool,
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<Value, LedgerError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: std::sync::Mutex::new(replies.into()),
                open: AtomicBool::new(false),
                fail_open: AtomicBool::new(false),
                calls: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn unreachable() -> Arc<Self> {
            let transport = Self::new(vec![]);
            transport.fail_open.store(true, Ordering::Relaxed);
            transport
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LedgerTransport for ScriptedTransport {
        async fn open(&self) -> Result<(), LedgerError> {
            if self.fail_open.load(Ordering::Relaxed) {
                return Err(LedgerError::Timeout);
            }
            self.open.store(true, Ordering::Relaxed);
            Ok(())
        }

        async fn close(&self) {
            self.open.store(false, Ordering::Relaxed);
        }

        async fn call(
            &self,
            function: &str,
            _args: &[Value],
            _submit: bool,
        ) -> Result<Value, LedgerError> {
            self.calls.lock().unwrap().push(function.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Value::Null))
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::Relaxed)
        }

        fn endpoint(&self) -> String {
            "scripted:0".to_string()
        }
    }

    fn client_with(transport: Arc<ScriptedTransport>, retry: RetryPolicy) -> LedgerClient {
        let config = LedgerClientConfig {
            retry,
            ..LedgerClientConfig::default()
        };
        LedgerClient::new(config, transport)
    }

    #[tokio::test]
    async fn initialize_connects_and_runs_diagnostic() {
        let transport = ScriptedTransport::new(vec![Ok(json!({"contractName": "emr"}))]);
        let client = client_with(transport.clone(), RetryPolicy::none());

        let outcome = client.initialize().await;

        assert!(outcome.success);
        assert_eq!(transport.calls(), vec!["GetContractInfo"]);

        let status = client.connection_status().await;
        assert!(status.is_connected);
        assert_eq!(status.state, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn initialize_tolerates_missing_diagnostic_function() {
        let transport = ScriptedTransport::new(vec![Err(LedgerError::FunctionNotFound(
            "GetContractInfo".to_string(),
        ))]);
        let client = client_with(transport, RetryPolicy::none());

        let outcome = client.initialize().await;

        assert!(outcome.success);
    }

    #[tokio::test]
    async fn unreachable_ledger_reports_failure_without_panic() {
        let transport = ScriptedTransport::unreachable();
        let client = client_with(transport, RetryPolicy::none());

        let outcome = client.initialize().await;

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert_eq!(
            client.connection_status().await.state,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn submit_returns_outcome_on_success() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({})),                   // diagnostic
            Ok(json!({"txId": "tx-123"})),   // submit
        ]);
        let client = client_with(transport, RetryPolicy::none());
        client.initialize().await;

        let outcome = client.submit_transaction("GrantAccess", &[]).await;

        assert!(outcome.success);
        assert_eq!(outcome.tx_id(), Some(TxId::new("tx-123")));
    }

    #[tokio::test]
    async fn bounded_retry_fails_within_policy_and_never_throws() {
        let transport = ScriptedTransport::unreachable();
        let retry = RetryPolicy::fixed(1, Duration::from_millis(50));
        let client = client_with(transport, retry);

        let started = Instant::now();
        let outcome = client.submit_transaction("CreateRecord", &[]).await;
        let elapsed = started.elapsed();

        assert!(!outcome.success);
        // One retry at ~50ms; comfortably done well before 10x that
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(500));

        let status = client.connection_status().await;
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.retries, 1);
    }

    #[tokio::test]
    async fn connectivity_failure_retries_then_succeeds() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({})),                 // diagnostic
            Err(LedgerError::Timeout),     // first attempt drops
            Ok(json!({"txId": "tx-9"})),   // retry lands
        ]);
        let client = client_with(transport, RetryPolicy::fixed(2, Duration::from_millis(1)));
        client.initialize().await;

        let outcome = client.submit_transaction("CreateRecord", &[]).await;

        assert!(outcome.success);
        assert_eq!(outcome.tx_id(), Some(TxId::new("tx-9")));
    }

    #[tokio::test]
    async fn semantic_rejection_does_not_retry() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({})), // diagnostic
            Err(LedgerError::Rejected("ACCESS_DENIED: not owner".to_string())),
        ]);
        let client = client_with(
            transport.clone(),
            RetryPolicy::fixed(5, Duration::from_millis(1)),
        );
        client.initialize().await;

        let outcome = client.submit_transaction("GrantAccess", &[]).await;

        assert!(!outcome.success);
        // Diagnostic + the one rejected call; no retries burned
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn create_record_falls_back_to_legacy_alias() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({})), // diagnostic
            Err(LedgerError::FunctionNotFound("CreateRecord".to_string())),
            Ok(json!({"txId": "tx-legacy"})),
        ]);
        let client = client_with(transport.clone(), RetryPolicy::none());
        client.initialize().await;

        let outcome = client
            .create_record(
                &RecordId::new("record:1"),
                &UserId::new("patient-1"),
                &UserId::new("doctor-1"),
                &Cid::new("f01..aa"),
                "hash",
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.tx_id(), Some(TxId::new("tx-legacy")));
        assert_eq!(
            transport.calls(),
            vec!["GetContractInfo", "CreateRecord", "CreateMedicalRecord"]
        );
    }

    #[tokio::test]
    async fn read_record_falls_back_to_get_record() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({})), // diagnostic
            Err(LedgerError::FunctionNotFound("ReadRecord".to_string())),
            Ok(json!({"recordId": "record:1"})),
        ]);
        let client = client_with(transport.clone(), RetryPolicy::none());
        client.initialize().await;

        let outcome = client.read_record(&RecordId::new("record:1")).await;

        assert!(outcome.success);
        assert_eq!(
            transport.calls(),
            vec!["GetContractInfo", "ReadRecord", "GetRecord"]
        );
    }

    #[tokio::test]
    async fn alias_is_tried_exactly_once() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({})), // diagnostic
            Err(LedgerError::FunctionNotFound("CreateRecord".to_string())),
            Err(LedgerError::FunctionNotFound("CreateMedicalRecord".to_string())),
        ]);
        let client = client_with(transport.clone(), RetryPolicy::none());
        client.initialize().await;

        let outcome = client
            .create_record(
                &RecordId::new("record:1"),
                &UserId::new("p"),
                &UserId::new("c"),
                &Cid::new("f01..aa"),
                "hash",
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(transport.calls().len(), 3); // no second round of aliases
    }

    #[tokio::test]
    async fn check_access_outcome_carries_verdict() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({})),  // diagnostic
            Ok(json!(true)),
            Ok(json!(false)),
        ]);
        let client = client_with(transport, RetryPolicy::none());
        client.initialize().await;

        let allowed = client
            .check_access(&RecordId::new("record:1"), &UserId::new("doctor-1"))
            .await;
        let denied = client
            .check_access(&RecordId::new("record:1"), &UserId::new("intruder"))
            .await;

        assert_eq!(allowed.as_bool(), Some(true));
        assert_eq!(denied.as_bool(), Some(false));
    }

    #[tokio::test]
    async fn reset_disconnects_and_reinitializes() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({})), // first diagnostic
            Ok(json!({})), // second diagnostic after reset
        ]);
        let client = client_with(transport, RetryPolicy::none());

        client.initialize().await;
        let outcome = client.reset().await;

        assert!(outcome.success);
        assert!(client.connection_status().await.is_connected);
    }

    #[tokio::test]
    async fn status_requires_no_network() {
        let transport = ScriptedTransport::unreachable();
        let client = client_with(transport.clone(), RetryPolicy::none());

        let status = client.connection_status().await;

        assert!(!status.is_connected);
        assert!(status.has_channel);
        assert!(status.has_contract);
        assert_eq!(status.retries, 0);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn concurrent_reconnects_are_guarded() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({})), // diagnostic
            Ok(json!(true)),
            Ok(json!(true)),
            Ok(json!(true)),
            Ok(json!(true)),
        ]);
        let client = Arc::new(client_with(transport, RetryPolicy::none()));
        client.initialize().await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client.evaluate_transaction("CheckAccess", &[]).await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().success);
        }
    }
}
