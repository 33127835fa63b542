//! Turn coordinator: the async shell around the pure engines.
//!
//! One turn runs analysis, then a read/decide/apply/evaluate/commit cycle
//! under an optimistic version check, then overlay composition and
//! generation. Turns are serialized per session id inside the process; a
//! version conflict from another writer re-reads state and retries with
//! exponential backoff.

use backoff::future::retry_notify;
use backoff::ExponentialBackoffBuilder;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Action, ComponentContext, ConversationState, CoordinatorConfig, Decision, DecisionRule,
    EffectiveState, Module0Context, Phase, PhaseTransition, RenderedComponent, TriggerPoint,
    UnifiedAnalysis,
};
use crate::domain::ports::{
    ConversationRepository, GenerationRequest, MessageAnalyzer, ResponseGenerator,
};
use crate::infrastructure::logging::PiiScrubber;
use crate::services::{ComponentRegistry, ComponentRuleEngine, DecisionEngine, OverlayRegistry};

const MESSAGE_PREVIEW_CHARS: usize = 80;

/// Externally visible result of one processed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub session_id: Uuid,
    /// 1-based number of this turn.
    pub turn: u32,
    pub phase: Phase,
    pub action: Action,
    pub rule: DecisionRule,
    pub transition: Option<PhaseTransition>,
    pub reply: String,
    pub components: Vec<RenderedComponent>,
}

/// State and outputs of a successfully committed turn.
struct CommittedTurn {
    state: ConversationState,
    decision: Decision,
    trigger: TriggerPoint,
    components: Vec<RenderedComponent>,
}

pub struct TurnCoordinator<R: ConversationRepository> {
    repository: Arc<R>,
    analyzer: Arc<dyn MessageAnalyzer>,
    generator: Arc<dyn ResponseGenerator>,
    decision_engine: DecisionEngine,
    component_engine: ComponentRuleEngine,
    overlays: Arc<OverlayRegistry>,
    config: CoordinatorConfig,
    /// In-flight turn locks; an entry lives only while a turn holds or awaits it.
    session_locks: RwLock<HashMap<Uuid, Arc<Mutex<()>>>>,
    scrubber: PiiScrubber,
}

impl<R: ConversationRepository + 'static> TurnCoordinator<R> {
    /// Coordinator with default engine thresholds and built-in registries.
    pub fn new(
        repository: Arc<R>,
        analyzer: Arc<dyn MessageAnalyzer>,
        generator: Arc<dyn ResponseGenerator>,
    ) -> Self {
        Self {
            repository,
            analyzer,
            generator,
            decision_engine: DecisionEngine::default(),
            component_engine: ComponentRuleEngine::new(Arc::new(ComponentRegistry::builtin())),
            overlays: Arc::new(OverlayRegistry::builtin()),
            config: CoordinatorConfig::default(),
            session_locks: RwLock::new(HashMap::new()),
            scrubber: PiiScrubber::new(),
        }
    }

    pub fn with_decision_engine(mut self, engine: DecisionEngine) -> Self {
        self.decision_engine = engine;
        self
    }

    pub fn with_component_registry(mut self, registry: Arc<ComponentRegistry>) -> Self {
        self.component_engine = ComponentRuleEngine::new(registry);
        self
    }

    pub fn with_overlays(mut self, overlays: Arc<OverlayRegistry>) -> Self {
        self.overlays = overlays;
        self
    }

    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Create and persist a fresh session in the intake phase.
    #[instrument(skip(self, module0_context), err)]
    pub async fn start_session(
        &self,
        module0_context: Module0Context,
    ) -> DomainResult<ConversationState> {
        let state = ConversationState::new(
            module0_context,
            self.decision_engine.config().variety_window,
        );
        self.repository.create(&state).await?;
        info!(session_id = %state.session_id, "session started");
        Ok(state)
    }

    /// Current state of a session.
    pub async fn session(&self, session_id: Uuid) -> DomainResult<ConversationState> {
        self.load(session_id).await
    }

    /// Most recently updated sessions.
    pub async fn sessions(&self, limit: usize) -> DomainResult<Vec<ConversationState>> {
        self.repository.list(limit).await
    }

    /// Process one user message and produce the reply.
    ///
    /// Only persistence failures and a missing or corrupt session surface
    /// as errors. Analysis and generation failures degrade to neutral
    /// signals and the fallback reply.
    #[instrument(skip(self, message), fields(session_id = %session_id), err)]
    pub async fn process_turn(&self, session_id: Uuid, message: &str) -> DomainResult<TurnResponse> {
        let lock = self.session_lock(session_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.run_turn(session_id, message).await
        };
        self.release_session_lock(session_id, lock).await;
        result
    }

    async fn run_turn(&self, session_id: Uuid, message: &str) -> DomainResult<TurnResponse> {
        let before = self.load(session_id).await?;
        debug!(
            session_id = %session_id,
            message = %self.scrubber.preview(message, MESSAGE_PREVIEW_CHARS),
            "processing turn"
        );

        let analysis = match self.analyzer.analyze(&before, message).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "analysis failed; using neutral signals");
                UnifiedAnalysis::neutral()
            }
        };

        let committed = self.commit_turn(session_id, &analysis).await?;
        let decision = &committed.decision;

        let request = GenerationRequest {
            phase: decision.phase,
            action: decision.action,
            instructions: self.overlays.compose(decision.overlay),
            user_message: message.to_string(),
        };
        let reply = match self.generator.generate(&request).await {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => {
                warn!(session_id = %session_id, "generator returned an empty reply; using fallback");
                self.overlays.fallback_reply().to_string()
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "generation failed; using fallback reply");
                self.overlays.fallback_reply().to_string()
            }
        };

        info!(
            session_id = %session_id,
            turn = committed.state.turns_total,
            phase = %decision.phase,
            action = %decision.action,
            rule = %decision.rule,
            trigger = %committed.trigger,
            components = committed.components.len(),
            version = committed.state.version,
            "turn committed"
        );

        Ok(TurnResponse {
            session_id,
            turn: committed.state.turns_total,
            phase: decision.phase,
            action: decision.action,
            rule: decision.rule,
            transition: decision.transition,
            reply,
            components: committed.components,
        })
    }

    async fn commit_turn(
        &self,
        session_id: Uuid,
        analysis: &UnifiedAnalysis,
    ) -> DomainResult<CommittedTurn> {
        let conflicts = AtomicU32::new(0);
        let max_retries = self.config.max_commit_retries;
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.config.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();

        retry_notify(
            policy,
            || {
                let conflicts = &conflicts;
                async move {
                    match self.try_commit(session_id, analysis).await {
                        Ok(turn) => Ok(turn),
                        Err(e) if e.is_retryable() => {
                            let seen = conflicts.fetch_add(1, Ordering::SeqCst) + 1;
                            if seen > max_retries {
                                error!(
                                    session_id = %session_id,
                                    conflicts = seen,
                                    "giving up after repeated commit conflicts"
                                );
                                Err(backoff::Error::permanent(e))
                            } else {
                                Err(backoff::Error::transient(e))
                            }
                        }
                        Err(e) => Err(backoff::Error::permanent(e)),
                    }
                }
            },
            |e: DomainError, wait: Duration| {
                warn!(
                    session_id = %session_id,
                    error = %e,
                    retry_in_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "commit conflict; re-reading state"
                );
            },
        )
        .await
    }

    /// One read/decide/apply/evaluate/commit attempt.
    async fn try_commit(
        &self,
        session_id: Uuid,
        analysis: &UnifiedAnalysis,
    ) -> DomainResult<CommittedTurn> {
        let state = self.load(session_id).await?;
        if let Err(e) = state.check_invariants() {
            error!(session_id = %session_id, error = %e, "stored conversation state is invalid");
            return Err(e);
        }

        let decision = self.decision_engine.decide(&state, analysis);
        let effective = EffectiveState::derive(&state, analysis);

        let mut next = state.clone();
        next.apply(&decision);

        let trigger = TriggerPoint::for_decision(&decision);
        let outcome = self.component_engine.evaluate(
            trigger,
            &ComponentContext {
                state: &next,
                effective: &effective,
                decision: &decision,
            },
        );
        next.component_flags.merge(&outcome.flags);

        next.version = self.repository.commit(&next).await?;

        Ok(CommittedTurn {
            state: next,
            decision,
            trigger,
            components: outcome.rendered,
        })
    }

    async fn load(&self, session_id: Uuid) -> DomainResult<ConversationState> {
        self.repository
            .get(session_id)
            .await?
            .ok_or(DomainError::SessionNotFound(session_id))
    }

    async fn session_lock(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        if let Some(lock) = self.session_locks.read().await.get(&session_id) {
            return Arc::clone(lock);
        }
        let mut locks = self.session_locks.write().await;
        Arc::clone(locks.entry(session_id).or_default())
    }

    /// Drop the map entry once no other turn holds or awaits it.
    async fn release_session_lock(&self, session_id: Uuid, lock: Arc<Mutex<()>>) {
        let mut locks = self.session_locks.write().await;
        let idle = locks
            .get(&session_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(&session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryConversationRepository, OverlayEchoGenerator, ScriptedAnalyzer};

    fn coordinator() -> TurnCoordinator<InMemoryConversationRepository> {
        TurnCoordinator::new(
            Arc::new(InMemoryConversationRepository::new()),
            Arc::new(ScriptedAnalyzer::default()),
            Arc::new(OverlayEchoGenerator),
        )
    }

    #[tokio::test]
    async fn test_session_locks_are_released_after_turns() {
        let coordinator = coordinator();
        let a = coordinator.start_session(Module0Context::default()).await.unwrap();
        let b = coordinator.start_session(Module0Context::default()).await.unwrap();

        let (ra, rb, rc) = tokio::join!(
            coordinator.process_turn(a.session_id, "first"),
            coordinator.process_turn(a.session_id, "second"),
            coordinator.process_turn(b.session_id, "first"),
        );
        assert!(ra.is_ok() && rb.is_ok() && rc.is_ok());
        assert!(coordinator.session_locks.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_turn_releases_its_lock() {
        let coordinator = coordinator();
        let err = coordinator.process_turn(Uuid::new_v4(), "hello").await.unwrap_err();
        assert!(matches!(err, DomainError::SessionNotFound(_)));
        assert!(coordinator.session_locks.read().await.is_empty());
    }
}
