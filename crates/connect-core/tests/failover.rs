//! Failover engine integration tests
//!
//! Drives `ConnectionAttemptProcessor` end to end with scripted fake
//! providers and a recording response sink, covering candidate ordering,
//! last-failure reporting, cancellation races, and exactly-once delivery.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use trunkline_connect_core::{
    AccountCapabilities, AccountHandle, AccountRecord, AttemptResponder, Call,
    CallClassifier, ConnectionAttemptProcessor, ConnectionProvider, ConnectionRequest,
    CreateConnectionResponse, DisconnectCode, EmergencyConfig, EstablishedConnection,
    InMemoryAccountRegistrar, InMemoryProviderRegistry, ProcessorState, ProviderId,
    StaticCallClassifier,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Success { account: AccountHandle },
    Failed { code: DisconnectCode, message: Option<String> },
    Cancelled,
}

struct RecordingResponse {
    outcomes: Arc<Mutex<Vec<Outcome>>>,
}

impl RecordingResponse {
    fn new() -> (Box<dyn CreateConnectionResponse>, Arc<Mutex<Vec<Outcome>>>) {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let response = Box::new(Self {
            outcomes: outcomes.clone(),
        });
        (response, outcomes)
    }
}

#[async_trait]
impl CreateConnectionResponse for RecordingResponse {
    async fn on_success(&self, request: ConnectionRequest, _connection: EstablishedConnection) {
        self.outcomes.lock().push(Outcome::Success {
            account: request.account,
        });
    }

    async fn on_failed(&self, code: DisconnectCode, message: Option<String>) {
        self.outcomes.lock().push(Outcome::Failed { code, message });
    }

    async fn on_cancelled(&self) {
        self.outcomes.lock().push(Outcome::Cancelled);
    }
}

/// Provider that resolves every attempt inline with a fixed script.
enum Script {
    Succeed,
    Fail(DisconnectCode, &'static str),
}

struct ScriptedProvider {
    id: ProviderId,
    script: Script,
    calls: AtomicUsize,
    aborts: AtomicUsize,
}

impl ScriptedProvider {
    fn new(id: &str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::new(id),
            script,
            calls: AtomicUsize::new(0),
            aborts: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ConnectionProvider for ScriptedProvider {
    fn provider_id(&self) -> ProviderId {
        self.id.clone()
    }

    async fn create_connection(
        &self,
        _call: Arc<Call>,
        request: ConnectionRequest,
        responder: AttemptResponder,
    ) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Succeed => {
                let connection =
                    EstablishedConnection::new(request.call_id, request.account.clone());
                responder.success(request, connection).await;
            }
            Script::Fail(code, message) => {
                responder.failed(*code, Some(message.to_string())).await;
            }
        }
    }

    async fn abort_connection(&self, _call: Arc<Call>) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Provider that parks every attempt and lets the test drive the responder.
struct ManualProvider {
    id: ProviderId,
    captured: Mutex<Vec<(ConnectionRequest, AttemptResponder)>>,
    aborts: AtomicUsize,
}

impl ManualProvider {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::new(id),
            captured: Mutex::new(Vec::new()),
            aborts: AtomicUsize::new(0),
        })
    }

    fn take_attempt(&self) -> (ConnectionRequest, AttemptResponder) {
        self.captured
            .lock()
            .pop()
            .expect("no captured connection attempt")
    }

    fn abort_count(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionProvider for ManualProvider {
    fn provider_id(&self) -> ProviderId {
        self.id.clone()
    }

    async fn create_connection(
        &self,
        _call: Arc<Call>,
        request: ConnectionRequest,
        responder: AttemptResponder,
    ) {
        self.captured.lock().push((request, responder));
    }

    async fn abort_connection(&self, _call: Arc<Call>) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

fn handle(provider: &str, id: &str) -> AccountHandle {
    AccountHandle::new(ProviderId::new(provider), id)
}

fn classifier(pstn: &[&str]) -> Arc<dyn CallClassifier> {
    Arc::new(StaticCallClassifier::new(EmergencyConfig {
        emergency_numbers: vec!["911".to_string()],
        pstn_providers: pstn.iter().map(|p| ProviderId::new(*p)).collect(),
    }))
}

struct Fixture {
    registry: Arc<InMemoryProviderRegistry>,
    registrar: Arc<InMemoryAccountRegistrar>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            registry: Arc::new(InMemoryProviderRegistry::new()),
            registrar: Arc::new(InMemoryAccountRegistrar::new()),
        }
    }

    fn add_account(&self, account: &AccountHandle, capabilities: AccountCapabilities) {
        self.registrar
            .register_account(AccountRecord::new(account.clone(), capabilities));
    }

    fn processor(
        &self,
        call: Arc<Call>,
        pstn: &[&str],
    ) -> (Arc<ConnectionAttemptProcessor>, Arc<Mutex<Vec<Outcome>>>) {
        let (response, outcomes) = RecordingResponse::new();
        let processor = ConnectionAttemptProcessor::new(
            call,
            self.registry.clone(),
            self.registrar.clone(),
            classifier(pstn),
            response,
        );
        (processor, outcomes)
    }
}

#[tokio::test]
async fn first_candidate_success_is_delivered_once() {
    let fixture = Fixture::new();
    let target = handle("carrier.gsm", "sub0");
    fixture.add_account(&target, AccountCapabilities::SIM_SUBSCRIPTION);
    fixture
        .registry
        .register(ScriptedProvider::new("carrier.gsm", Script::Succeed));

    let call = Arc::new(Call::new("5551234", Some(target.clone())));
    let (processor, outcomes) = fixture.processor(call.clone(), &[]);
    processor.process().await;

    assert_eq!(
        *outcomes.lock(),
        vec![Outcome::Success {
            account: target.clone()
        }]
    );
    assert_eq!(processor.state(), ProcessorState::Succeeded);
    // The winning provider stays bound to the call.
    assert_eq!(
        call.provider().map(|p| p.provider_id()),
        Some(ProviderId::new("carrier.gsm"))
    );
    assert_eq!(call.target_account(), Some(target));
}

#[tokio::test]
async fn missing_provider_is_skipped_without_touching_error_memo() {
    // Emergency dialing builds a multi-candidate list: A has no registered
    // provider, B fails busy, C succeeds.
    let fixture = Fixture::new();
    let a = handle("carrier.a", "sub0");
    let b = handle("carrier.b", "sub1");
    let c = handle("carrier.c", "sub2");
    for account in [&a, &b, &c] {
        fixture.add_account(account, AccountCapabilities::SIM_SUBSCRIPTION);
    }

    let busy = ScriptedProvider::new("carrier.b", Script::Fail(DisconnectCode(7), "busy"));
    let winner = ScriptedProvider::new("carrier.c", Script::Succeed);
    fixture.registry.register(busy.clone());
    fixture.registry.register(winner.clone());

    let call = Arc::new(Call::new("911", None));
    let (processor, outcomes) =
        fixture.processor(call, &["carrier.a", "carrier.b", "carrier.c"]);
    processor.process().await;

    assert_eq!(busy.calls.load(Ordering::SeqCst), 1);
    assert_eq!(winner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*outcomes.lock(), vec![Outcome::Success { account: c }]);
}

#[tokio::test]
async fn exhaustion_reports_last_recorded_failure() {
    let fixture = Fixture::new();
    let a = handle("carrier.a", "sub0");
    let b = handle("carrier.b", "sub1");
    fixture.add_account(&a, AccountCapabilities::SIM_SUBSCRIPTION);
    fixture.add_account(&b, AccountCapabilities::SIM_SUBSCRIPTION);
    fixture
        .registry
        .register(ScriptedProvider::new("carrier.a", Script::Fail(DisconnectCode(1), "x")));
    fixture
        .registry
        .register(ScriptedProvider::new("carrier.b", Script::Fail(DisconnectCode(2), "y")));

    let call = Arc::new(Call::new("911", None));
    let (processor, outcomes) = fixture.processor(call.clone(), &["carrier.a", "carrier.b"]);
    processor.process().await;

    assert_eq!(
        *outcomes.lock(),
        vec![Outcome::Failed {
            code: DisconnectCode(2),
            message: Some("y".to_string())
        }]
    );
    assert_eq!(processor.state(), ProcessorState::Failed);
    // The provider binding is released on terminal failure.
    assert!(call.provider().is_none());
}

#[tokio::test]
async fn empty_candidate_list_fails_with_default_code() {
    let fixture = Fixture::new();
    let bystander = ScriptedProvider::new("carrier.gsm", Script::Succeed);
    fixture.registry.register(bystander.clone());

    // No target account, not an emergency number: nothing to try.
    let call = Arc::new(Call::new("5551234", None));
    let (processor, outcomes) = fixture.processor(call, &[]);
    processor.process().await;

    assert_eq!(
        *outcomes.lock(),
        vec![Outcome::Failed {
            code: DisconnectCode::OUTGOING_FAILURE,
            message: None
        }]
    );
    assert_eq!(bystander.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn abort_during_flight_cancels_and_discards_late_success() {
    let fixture = Fixture::new();
    let target = handle("carrier.gsm", "sub0");
    fixture.add_account(&target, AccountCapabilities::SIM_SUBSCRIPTION);
    let provider = ManualProvider::new("carrier.gsm");
    fixture.registry.register(provider.clone());

    let call = Arc::new(Call::new("5551234", Some(target)));
    let (processor, outcomes) = fixture.processor(call.clone(), &[]);
    processor.process().await;

    let (request, responder) = provider.take_attempt();
    processor.abort().await;

    assert_eq!(*outcomes.lock(), vec![Outcome::Cancelled]);
    assert_eq!(processor.state(), ProcessorState::Cancelled);
    assert_eq!(provider.abort_count(), 1);
    assert!(call.provider().is_none());

    // A success racing in after the abort must discard the connection it
    // created instead of delivering.
    let connection = EstablishedConnection::new(request.call_id, request.account.clone());
    responder.success(request.clone(), connection).await;
    assert_eq!(*outcomes.lock(), vec![Outcome::Cancelled]);
    assert_eq!(provider.abort_count(), 2);

    // A late failure is a plain no-op.
    responder.failed(DisconnectCode::BUSY, Some("busy".to_string())).await;
    assert_eq!(*outcomes.lock(), vec![Outcome::Cancelled]);
}

#[tokio::test]
async fn abort_is_idempotent() {
    let fixture = Fixture::new();
    let target = handle("carrier.gsm", "sub0");
    fixture.add_account(&target, AccountCapabilities::SIM_SUBSCRIPTION);
    let provider = ManualProvider::new("carrier.gsm");
    fixture.registry.register(provider.clone());

    let call = Arc::new(Call::new("5551234", Some(target)));
    let (processor, outcomes) = fixture.processor(call, &[]);
    processor.process().await;

    processor.abort().await;
    processor.abort().await;

    assert_eq!(*outcomes.lock(), vec![Outcome::Cancelled]);
}

#[tokio::test]
async fn abort_before_process_preempts_everything() {
    let fixture = Fixture::new();
    let target = handle("carrier.gsm", "sub0");
    fixture.add_account(&target, AccountCapabilities::SIM_SUBSCRIPTION);
    let provider = ScriptedProvider::new("carrier.gsm", Script::Succeed);
    fixture.registry.register(provider.clone());

    let call = Arc::new(Call::new("5551234", Some(target)));
    let (processor, outcomes) = fixture.processor(call, &[]);

    processor.abort().await;
    processor.process().await;

    assert_eq!(*outcomes.lock(), vec![Outcome::Cancelled]);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn manager_insertion_routes_attempt_through_manager_provider() {
    let fixture = Fixture::new();
    let target = handle("carrier.gsm", "sub0");
    let manager = handle("manager.svc", "mgr");
    fixture.add_account(&target, AccountCapabilities::SIM_SUBSCRIPTION);
    fixture.registrar.set_designated_manager(Some(manager.clone()));

    let manager_provider = ManualProvider::new("manager.svc");
    let target_provider = ManualProvider::new("carrier.gsm");
    fixture.registry.register(manager_provider.clone());
    fixture.registry.register(target_provider.clone());

    let call = Arc::new(Call::new("5551234", Some(target.clone())));
    let (processor, _outcomes) = fixture.processor(call.clone(), &[]);
    processor.process().await;

    // The manager's provider receives the attempt, instructed to connect
    // as the original target.
    let (request, _responder) = manager_provider.take_attempt();
    assert_eq!(request.account, target);
    assert!(target_provider.captured.lock().is_empty());
    assert_eq!(call.manager_account(), Some(manager));
    assert_eq!(call.target_account(), Some(target));
}

#[tokio::test]
async fn emergency_override_ignores_manager_and_non_pstn_accounts() {
    let fixture = Fixture::new();
    let voip = handle("voip.app", "work");
    let gsm = handle("carrier.gsm", "sub0");
    let cdma = handle("carrier.cdma", "sub1");
    fixture.add_account(&voip, AccountCapabilities::CALL_PROVIDER);
    fixture.add_account(&gsm, AccountCapabilities::SIM_SUBSCRIPTION);
    fixture.add_account(&cdma, AccountCapabilities::SIM_SUBSCRIPTION);
    fixture
        .registrar
        .set_designated_manager(Some(handle("manager.svc", "mgr")));

    let voip_provider = ManualProvider::new("voip.app");
    let manager_provider = ManualProvider::new("manager.svc");
    fixture.registry.register(voip_provider.clone());
    fixture.registry.register(manager_provider.clone());
    fixture
        .registry
        .register(ScriptedProvider::new("carrier.gsm", Script::Fail(DisconnectCode(5), "congestion")));
    let cdma_provider = ScriptedProvider::new("carrier.cdma", Script::Succeed);
    fixture.registry.register(cdma_provider.clone());

    let call = Arc::new(Call::new("911", Some(voip.clone())));
    let (processor, outcomes) = fixture.processor(call, &["carrier.gsm", "carrier.cdma"]);
    processor.process().await;

    // Neither the explicit VoIP target nor the connection manager is
    // consulted for an emergency call; the PSTN accounts are tried in
    // registrar order.
    assert!(voip_provider.captured.lock().is_empty());
    assert!(manager_provider.captured.lock().is_empty());
    assert_eq!(cdma_provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*outcomes.lock(), vec![Outcome::Success { account: cdma }]);
}

#[tokio::test]
async fn duplicate_success_from_provider_is_delivered_once() {
    let fixture = Fixture::new();
    let target = handle("carrier.gsm", "sub0");
    fixture.add_account(&target, AccountCapabilities::SIM_SUBSCRIPTION);
    let provider = ManualProvider::new("carrier.gsm");
    fixture.registry.register(provider.clone());

    let call = Arc::new(Call::new("5551234", Some(target.clone())));
    let (processor, outcomes) = fixture.processor(call, &[]);
    processor.process().await;

    let (request, responder) = provider.take_attempt();
    let connection = EstablishedConnection::new(request.call_id, request.account.clone());
    responder.success(request.clone(), connection).await;

    let duplicate = EstablishedConnection::new(request.call_id, request.account.clone());
    responder.success(request, duplicate).await;

    assert_eq!(
        *outcomes.lock(),
        vec![Outcome::Success { account: target }]
    );
    // The duplicate is treated as a late success: its connection resource
    // is handed back to the provider for discard.
    assert_eq!(provider.abort_count(), 1);
}

#[tokio::test]
async fn failure_after_success_does_not_restart_draining() {
    let fixture = Fixture::new();
    let target = handle("carrier.gsm", "sub0");
    fixture.add_account(&target, AccountCapabilities::SIM_SUBSCRIPTION);
    let provider = ManualProvider::new("carrier.gsm");
    fixture.registry.register(provider.clone());

    let call = Arc::new(Call::new("5551234", Some(target.clone())));
    let (processor, outcomes) = fixture.processor(call, &[]);
    processor.process().await;

    let (request, responder) = provider.take_attempt();
    let connection = EstablishedConnection::new(request.call_id, request.account.clone());
    responder.success(request, connection).await;
    responder
        .failed(DisconnectCode::ERROR_UNSPECIFIED, Some("late".to_string()))
        .await;

    assert_eq!(
        *outcomes.lock(),
        vec![Outcome::Success { account: target }]
    );
    assert_eq!(processor.state(), ProcessorState::Succeeded);
}

#[tokio::test]
async fn provider_cancellation_terminates_processing() {
    let fixture = Fixture::new();
    let target = handle("carrier.gsm", "sub0");
    fixture.add_account(&target, AccountCapabilities::SIM_SUBSCRIPTION);
    let provider = ManualProvider::new("carrier.gsm");
    fixture.registry.register(provider.clone());

    let call = Arc::new(Call::new("5551234", Some(target)));
    let (processor, outcomes) = fixture.processor(call, &[]);
    processor.process().await;

    let (_request, responder) = provider.take_attempt();
    responder.cancelled().await;
    // A duplicate cancellation is ignored.
    responder.cancelled().await;

    assert_eq!(*outcomes.lock(), vec![Outcome::Cancelled]);
    assert_eq!(processor.state(), ProcessorState::Cancelled);
}
