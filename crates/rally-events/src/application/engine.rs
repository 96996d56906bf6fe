//! The event engine: lifecycle of runs in every community.
//!
//! All mutation of a community's active run happens while holding that
//! community's lock from [`KeyedLocks`], as one read-modify-write against the
//! store. Rewards are paid and announcements sent only after the lock is
//! released.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rally_core::clock::Clock;
use rally_core::economy::{Inventory, Ledger};
use rally_core::error::{EngineError, Rejection};
use rally_core::ids::{CommunityId, ParticipantId};
use rally_core::locks::KeyedLocks;
use rally_core::notify::NotificationSink;
use rally_core::repository::StateRepository;
use rally_core::rng::DeterministicRng;
use rally_registry::application::loader::{ConfigIssue, load_from_path};
use rally_registry::application::registry::EventRegistry;
use rally_registry::domain::definition::EventDefinition;
use rally_rewards::application::distributor::{DistributionReport, RewardDistributor};
use rally_rewards::domain::plan::{Grant, RewardPlan, RewardReason};
use tracing::{debug, error, info, instrument, warn};

use super::config::EngineConfig;
use super::store::EventStore;
use super::tasks::TaskRegistry;
use crate::domain::handlers::{Advance, rank};
use crate::domain::outcomes::{
    EndOutcome, EventStatus, GrantOutcome, StartOutcome, StartupReport, TickOutcome,
};
use crate::domain::state::ActiveEventState;

/// External collaborators the engine drives.
pub struct Collaborators {
    /// Durable key/value store.
    pub repository: Arc<dyn StateRepository>,
    /// Currency ledger.
    pub ledger: Arc<dyn Ledger>,
    /// Item inventory.
    pub inventory: Arc<dyn Inventory>,
    /// Announcement channel.
    pub notifier: Arc<dyn NotificationSink>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Randomness for trigger rolls and reward rolls.
    pub rng: Box<dyn DeterministicRng>,
}

/// A run that has been finalized and cleared but not yet paid out.
pub(crate) struct ClosedRun {
    event_id: String,
    name: String,
    completed: bool,
    plan: RewardPlan,
    message: Option<String>,
}

/// Orchestrates community events.
pub struct EventEngine {
    config: EngineConfig,
    registry: RwLock<Arc<EventRegistry>>,
    registry_path: Option<PathBuf>,
    pub(crate) store: EventStore,
    pub(crate) distributor: RewardDistributor,
    notifier: Arc<dyn NotificationSink>,
    pub(crate) clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn DeterministicRng>>,
    pub(crate) locks: KeyedLocks<CommunityId>,
    tasks: TaskRegistry,
    ready: AtomicBool,
    startup_report: Mutex<Option<StartupReport>>,
}

impl EventEngine {
    /// Builds an engine. It accepts operator calls immediately but ignores
    /// scheduler ticks until [`EventEngine::startup`] has run.
    #[must_use]
    pub fn new(config: EngineConfig, registry: EventRegistry, collaborators: Collaborators) -> Self {
        let store = EventStore::new(collaborators.repository, config.persist_timeout);
        Self {
            registry: RwLock::new(Arc::new(registry)),
            registry_path: None,
            store,
            distributor: RewardDistributor::new(collaborators.ledger, collaborators.inventory),
            notifier: collaborators.notifier,
            clock: collaborators.clock,
            rng: Mutex::new(collaborators.rng),
            locks: KeyedLocks::new(),
            tasks: TaskRegistry::new(),
            ready: AtomicBool::new(false),
            startup_report: Mutex::new(None),
            config,
        }
    }

    /// Remembers where the registry was loaded from, enabling
    /// [`EventEngine::reload_registry`].
    #[must_use]
    pub fn with_registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = Some(path.into());
        self
    }

    /// Engine settings.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The current registry snapshot.
    #[must_use]
    pub fn registry(&self) -> Arc<EventRegistry> {
        Arc::clone(&self.registry.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Whether startup has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// What the last [`EventEngine::startup`] found, once it has run.
    #[must_use]
    pub fn startup_report(&self) -> Option<StartupReport> {
        self.startup_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn notifier(&self) -> &dyn NotificationSink {
        self.notifier.as_ref()
    }

    /// Background tasks per run.
    #[must_use]
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut dyn DeterministicRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(rng.as_mut())
    }

    /// Rehydrates every configured community and opens the engine to ticks.
    ///
    /// A persisted run whose end time has passed is discarded without any
    /// payout; its cooldown is still recorded. A run still in its window is
    /// resumed as-is.
    #[instrument(skip(self))]
    pub async fn startup(&self) -> StartupReport {
        let mut report = StartupReport::default();
        let now = self.clock.now();
        let registry = self.registry();

        for &community in &self.config.communities {
            let _guard = self.locks.lock(&community).await;
            match self.store.load_active(community).await {
                Ok(None) => {}
                Ok(Some(state)) if state.is_expired(now) => match self.discard_stale(&state).await {
                    Ok(()) => {
                        warn!(
                            %community,
                            event_id = %state.definition_id,
                            run_id = %state.run_id,
                            "stale event discarded without payout"
                        );
                        report.discarded.push((community, state.definition_id));
                    }
                    Err(e) => {
                        error!(%community, error = %e, "failed to discard stale event");
                        report.failed.push(community);
                    }
                },
                Ok(Some(state)) => {
                    let name = registry
                        .get(&state.definition_id)
                        .map_or_else(|| state.definition_id.clone(), |d| display_name(&d));
                    self.spawn_status_refresh(&state, name);
                    info!(
                        %community,
                        event_id = %state.definition_id,
                        run_id = %state.run_id,
                        ends_at = %state.ends_at,
                        "event resumed"
                    );
                    report.resumed.push((community, state.definition_id));
                }
                Err(e) => {
                    error!(%community, error = %e, "failed to load persisted event");
                    report.failed.push(community);
                }
            }
        }

        *self
            .startup_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        self.ready.store(true, Ordering::Release);
        info!(
            resumed = report.resumed.len(),
            discarded = report.discarded.len(),
            failed = report.failed.len(),
            "engine ready"
        );
        report
    }

    async fn discard_stale(&self, state: &ActiveEventState) -> Result<(), EngineError> {
        self.store
            .record_finished(state.community, &state.definition_id, state.ends_at)
            .await?;
        self.store.clear_active(state.community).await?;
        self.tasks.cancel(state.run_id);
        Ok(())
    }

    /// One scheduler pass over `community`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error. Nothing is half-applied: the run is either
    /// still stored as it was, or cleared.
    #[instrument(skip(self), fields(%community))]
    pub async fn tick(&self, community: CommunityId) -> Result<TickOutcome, EngineError> {
        if !self.is_ready() {
            return Ok(TickOutcome::NotReady);
        }
        let guard = self.locks.lock(&community).await;
        let now = self.clock.now();
        let registry = self.registry();

        if let Some(mut state) = self.store.load_active(community).await? {
            let definition = registry.get(&state.definition_id);
            let advance = state.sub_state.check_advance();
            if !state.is_expired(now)
                && advance == Advance::Active
                && let Some(definition) = &definition
            {
                if let Some(warning) = state.due_warning(now) {
                    state.warned.insert(warning);
                    self.store.save_active(&state).await?;
                    drop(guard);
                    info!(event_id = %state.definition_id, ?warning, "end warning sent");
                    let message = end_warning(&display_name(definition), state.ends_at - now);
                    self.notifier.announce(community, &message).await;
                }
                return Ok(TickOutcome::Continued {
                    event_id: state.definition_id,
                });
            }
            let closed = self.close_run(state, definition.as_deref()).await?;
            drop(guard);
            let outcome = TickOutcome::Ended {
                event_id: closed.event_id.clone(),
                completed: closed.completed,
            };
            self.pay_out(community, closed).await;
            return Ok(outcome);
        }

        let history = self.store.history(community).await?;
        let local = self.clock.local_now(self.config.utc_offset());
        for definition in registry.by_priority() {
            let schedule = &definition.schedule;
            if let Some(last) = history.get(&definition.id)
                && now < *last + schedule.cooldown()
            {
                debug!(event_id = %definition.id, "on cooldown");
                continue;
            }
            if !schedule.is_open(local) {
                continue;
            }
            if !schedule.always_fires() && !self.with_rng(|rng| rng.next_f64() < schedule.probability)
            {
                debug!(event_id = %definition.id, "trigger roll failed");
                continue;
            }
            let state = self.begin_run(community, definition).await?;
            drop(guard);
            self.announce_start(definition, &state).await;
            return Ok(TickOutcome::Started {
                event_id: state.definition_id,
                run_id: state.run_id,
            });
        }
        Ok(TickOutcome::Idle)
    }

    /// Starts `event_id` now, ignoring its schedule and cooldown.
    ///
    /// Only configured communities are accepted: no other community is ever
    /// ticked, so a run there could never expire.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    #[instrument(skip(self), fields(%community))]
    pub async fn start(
        &self,
        community: CommunityId,
        event_id: &str,
    ) -> Result<StartOutcome, EngineError> {
        if let Some(rejection) = self.unmanaged(community) {
            return Ok(StartOutcome::Rejected(rejection));
        }
        let Some(definition) = self.registry().get(event_id) else {
            return Ok(StartOutcome::Rejected(Rejection::UnknownEvent {
                event_id: event_id.to_owned(),
            }));
        };
        let guard = self.locks.lock(&community).await;
        if let Some(active) = self.store.load_active(community).await? {
            return Ok(StartOutcome::Rejected(Rejection::EventAlreadyRunning {
                active: active.definition_id,
            }));
        }
        let state = self.begin_run(community, &definition).await?;
        drop(guard);
        self.announce_start(&definition, &state).await;
        Ok(StartOutcome::Started {
            event_id: state.definition_id,
            run_id: state.run_id,
            ends_at: state.ends_at,
        })
    }

    /// Ends the running event now and pays out as if it had expired.
    ///
    /// # Errors
    ///
    /// Returns a persistence error; the run then stays active.
    #[instrument(skip(self), fields(%community))]
    pub async fn end(&self, community: CommunityId) -> Result<EndOutcome, EngineError> {
        if let Some(rejection) = self.unmanaged(community) {
            return Ok(EndOutcome::Rejected(rejection));
        }
        let guard = self.locks.lock(&community).await;
        let Some(state) = self.store.load_active(community).await? else {
            return Ok(EndOutcome::Rejected(Rejection::NoActiveEvent { community }));
        };
        let definition = self.registry().get(&state.definition_id);
        let closed = self.close_run(state, definition.as_deref()).await?;
        drop(guard);
        let event_id = closed.event_id.clone();
        let completed = closed.completed;
        let report = self.pay_out(community, closed).await;
        Ok(EndOutcome::Ended {
            event_id,
            completed,
            delivered: report.delivered,
            failed: report.failed.len(),
        })
    }

    /// The running event in `community`, if any.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    pub async fn status(&self, community: CommunityId) -> Result<Option<EventStatus>, EngineError> {
        let Some(state) = self.store.load_active(community).await? else {
            return Ok(None);
        };
        let definition = self.registry().get(&state.definition_id);
        let mut leaders = rank(&state.totals);
        leaders.truncate(3);
        Ok(Some(EventStatus {
            community,
            name: definition
                .as_deref()
                .map_or_else(|| state.definition_id.clone(), display_name),
            kind: definition.as_deref().map_or("unknown", |d| d.kind.label()),
            event_id: state.definition_id,
            run_id: state.run_id,
            started_at: state.started_at,
            ends_at: state.ends_at,
            progress: state.sub_state.progress(),
            sub_state: state.sub_state,
            participants: state.totals.len(),
            leaders,
            reached: state.reached.into_iter().collect(),
        }))
    }

    /// The value of effect `name` for the event running in `community`, or
    /// `default` when no run is active or its definition does not set it.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    pub async fn effect(
        &self,
        community: CommunityId,
        name: &str,
        default: f64,
    ) -> Result<f64, EngineError> {
        let Some(state) = self.store.load_active(community).await? else {
            return Ok(default);
        };
        if state.is_expired(self.clock.now()) {
            return Ok(default);
        }
        Ok(self
            .registry()
            .get(&state.definition_id)
            .and_then(|definition| definition.effects.get(name).copied())
            .unwrap_or(default))
    }

    /// Credits currency to a participant on an operator's behalf.
    ///
    /// # Errors
    ///
    /// Returns the ledger's error.
    #[instrument(skip(self), fields(%participant))]
    pub async fn grant_currency(
        &self,
        participant: ParticipantId,
        amount: u64,
    ) -> Result<GrantOutcome, EngineError> {
        if amount == 0 {
            return Ok(GrantOutcome::Rejected(Rejection::InvalidAmount));
        }
        let grant = Grant {
            participant,
            currency: amount,
            items: Vec::new(),
            reason: RewardReason::Operator,
        };
        self.distributor.apply_grant(&grant).await?;
        let balance = self.distributor.ledger().balance(participant).await?;
        Ok(GrantOutcome::Granted { balance })
    }

    /// The definition of the run `event_id` if it is the one active in
    /// `community`. Quest operations use this to scope themselves to a run.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    pub async fn active_definition(
        &self,
        community: CommunityId,
        event_id: &str,
    ) -> Result<Result<Arc<EventDefinition>, Rejection>, EngineError> {
        Ok(self
            .load_for_update(community, Some(event_id))
            .await?
            .map(|(_, definition)| definition))
    }

    /// Re-reads the registry file and swaps it in. Active runs keep going;
    /// a run whose definition disappeared is closed without payout on the
    /// next tick.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` if no path is known or the file
    /// cannot be read; the current registry is kept.
    #[instrument(skip(self))]
    pub async fn reload_registry(&self) -> Result<Vec<ConfigIssue>, EngineError> {
        let path = self
            .registry_path
            .clone()
            .ok_or_else(|| EngineError::Configuration("no registry path configured".into()))?;
        let report = tokio::task::spawn_blocking(move || load_from_path(&path))
            .await
            .map_err(|e| EngineError::Infrastructure(format!("registry reload task failed: {e}")))??;
        self.replace_registry(report.registry);
        Ok(report.issues)
    }

    /// Swaps in a new registry.
    pub fn replace_registry(&self, registry: EventRegistry) {
        info!(
            definitions = registry.len(),
            fingerprint = registry.fingerprint(),
            "event registry replaced"
        );
        *self.registry.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(registry);
    }

    /// Loads the active run for a mutation, checking it is the one the caller
    /// addressed. The caller must hold the community lock if it will write.
    pub(crate) async fn load_for_update(
        &self,
        community: CommunityId,
        event_id: Option<&str>,
    ) -> Result<Result<(ActiveEventState, Arc<EventDefinition>), Rejection>, EngineError> {
        if let Some(rejection) = self.unmanaged(community) {
            return Ok(Err(rejection));
        }
        let Some(state) = self.store.load_active(community).await? else {
            return Ok(Err(Rejection::NoActiveEvent { community }));
        };
        if let Some(requested) = event_id
            && requested != state.definition_id
        {
            return Ok(Err(Rejection::EventMismatch {
                requested: requested.to_owned(),
                active: state.definition_id,
            }));
        }
        if state.is_expired(self.clock.now()) {
            return Ok(Err(Rejection::NoActiveEvent { community }));
        }
        let Some(definition) = self.registry().get(&state.definition_id) else {
            return Ok(Err(Rejection::UnknownEvent {
                event_id: state.definition_id,
            }));
        };
        Ok(Ok((state, definition)))
    }

    fn unmanaged(&self, community: CommunityId) -> Option<Rejection> {
        (!self.config.communities.contains(&community))
            .then_some(Rejection::UnknownCommunity { community })
    }

    /// Persists a fresh run. The caller holds the community lock.
    async fn begin_run(
        &self,
        community: CommunityId,
        definition: &EventDefinition,
    ) -> Result<ActiveEventState, EngineError> {
        if let Some(active) = self.store.load_active(community).await? {
            return Err(EngineError::Invariant(format!(
                "refusing to start {} over running {} in community {community}",
                definition.id, active.definition_id
            )));
        }
        let state = ActiveEventState::begin(community, definition, self.clock.now())?;
        self.store.save_active(&state).await?;
        self.spawn_status_refresh(&state, display_name(definition));
        info!(
            %community,
            event_id = %definition.id,
            run_id = %state.run_id,
            ends_at = %state.ends_at,
            "event started"
        );
        Ok(state)
    }

    /// Finalizes a run and clears it. The caller holds the community lock.
    ///
    /// The cooldown is recorded before the state is cleared, so a failure
    /// part-way leaves the run active for the next tick to retry.
    async fn close_run(
        &self,
        state: ActiveEventState,
        definition: Option<&EventDefinition>,
    ) -> Result<ClosedRun, EngineError> {
        let community = state.community;
        let completed = state.sub_state.check_advance() == Advance::Completed;
        let (plan, name, message) = match definition {
            Some(definition) => (
                self.with_rng(|rng| state.sub_state.finalize(definition, &state.totals, rng)),
                display_name(definition),
                definition.messages.end.clone(),
            ),
            None => {
                warn!(
                    %community,
                    event_id = %state.definition_id,
                    "definition no longer registered; closing without payout"
                );
                (
                    RewardPlan::empty(RewardReason::EventEnd {
                        event_id: state.definition_id.clone(),
                        completed,
                    }),
                    state.definition_id.clone(),
                    None,
                )
            }
        };

        self.store
            .record_finished(community, &state.definition_id, self.clock.now())
            .await?;
        self.store.clear_active(community).await?;
        self.tasks.cancel(state.run_id);
        info!(
            %community,
            event_id = %state.definition_id,
            run_id = %state.run_id,
            completed,
            grants = plan.grants.len(),
            "event ended"
        );
        Ok(ClosedRun {
            event_id: state.definition_id,
            name,
            completed,
            plan,
            message,
        })
    }

    /// Pays out a closed run and announces the result.
    async fn pay_out(&self, community: CommunityId, closed: ClosedRun) -> DistributionReport {
        let report = self.distributor.distribute(&closed.plan).await;
        let message = closed.message.unwrap_or_else(|| {
            let result = if closed.completed {
                "goal reached"
            } else {
                "goal not reached"
            };
            match closed.plan.top_contributor {
                Some(top) => format!("{} has ended: {result}. Top contributor: {top}.", closed.name),
                None => format!("{} has ended: {result}.", closed.name),
            }
        });
        self.notifier.announce(community, &message).await;
        report
    }

    async fn announce_start(&self, definition: &EventDefinition, state: &ActiveEventState) {
        let message = definition.messages.start.clone().unwrap_or_else(|| {
            format!(
                "{} has started! It ends at {}.",
                display_name(definition),
                state.ends_at.format("%H:%M UTC")
            )
        });
        self.notifier.announce(state.community, &message).await;
    }

    /// Periodically announces progress until the run is gone or replaced.
    fn spawn_status_refresh(&self, state: &ActiveEventState, name: String) {
        let store = self.store.clone();
        let notifier = Arc::clone(&self.notifier);
        let community = state.community;
        let run_id = state.run_id;
        let period = self.config.status_refresh_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.load_active(community).await {
                    Ok(Some(current)) if current.run_id == run_id => {
                        notifier
                            .announce(community, &progress_line(&name, &current))
                            .await;
                    }
                    Ok(_) => break,
                    Err(e) => warn!(%community, %run_id, error = %e, "status refresh failed"),
                }
            }
        });
        self.tasks.register(run_id, handle);
    }
}

fn display_name(definition: &EventDefinition) -> String {
    if definition.name.is_empty() {
        definition.id.clone()
    } else {
        definition.name.clone()
    }
}

fn end_warning(name: &str, remaining: chrono::Duration) -> String {
    let hours = remaining.num_hours();
    let minutes = remaining.num_minutes() % 60;
    if hours > 0 {
        format!("{name} ends in {hours}h {minutes}m!")
    } else {
        format!("{name} ends in {minutes} minutes!")
    }
}

fn progress_line(name: &str, state: &ActiveEventState) -> String {
    match state.sub_state.progress() {
        Some(progress) => format!(
            "{name}: {}% ({}/{}), {} participants",
            progress.percent(),
            progress.current,
            progress.goal,
            state.totals.len()
        ),
        None => format!("{name}: {} participants so far", state.totals.len()),
    }
}
