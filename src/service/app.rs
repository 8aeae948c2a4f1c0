//! Application state and service coordination
//!
//! `AppState` wires the store, the notifier and the five coordinators
//! together, consumes commands from the broker, and runs the three periodic
//! tasks (pairing pass, expiry sweep, bracket check) plus a metrics refresh.

use crate::amqp::connection::{BrokerConfig, BrokerConnection};
use crate::amqp::consumer::{CommandConsumer, CommandHandler};
use crate::amqp::messages::Command;
use crate::amqp::publisher::{AmqpNotifier, PublisherConfig};
use crate::config::{default_map_pool, AppConfig};
use crate::draft::DraftCoordinator;
use crate::error::{LadderError, Result};
use crate::metrics::MetricsCollector;
use crate::notify::Notifier;
use crate::queue::{MatchLauncher, QueueManager};
use crate::rating::RatingConfig;
use crate::results::{BracketObserver, ModeratorDecision, ReportDecision, ResultsCoordinator};
use crate::service::health::{HealthServer, HealthServerConfig};
use crate::store::models::PlayerRecord;
use crate::store::{LadderStore, MemoryStore};
use crate::sweeper::ExpirySweeper;
use crate::tournament::TournamentCoordinator;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, error, info, warn};

/// Routes every inbound command to the coordinator that owns it
pub struct ServiceCommandRouter {
    store: Arc<dyn LadderStore>,
    queues: Arc<QueueManager>,
    drafts: Arc<DraftCoordinator>,
    results: Arc<ResultsCoordinator>,
    tournaments: Arc<TournamentCoordinator>,
    metrics: MetricsCollector,
    default_rating: i64,
}

impl ServiceCommandRouter {
    /// Verification completed on the platform side: create the ladder record
    fn register_player(&self, platform_id: String, nickname: String) -> Result<()> {
        if self.store.player_by_platform_id(&platform_id)?.is_some() {
            debug!("Player {} already registered", nickname);
            return Ok(());
        }
        if self.store.player(&nickname)?.is_some() {
            return Err(LadderError::InvalidCommand {
                reason: format!("nickname '{}' is already taken", nickname),
            }
            .into());
        }
        self.store.put_player(PlayerRecord::new(
            platform_id,
            nickname.clone(),
            self.default_rating,
        ))?;
        info!("Player {} registered on the ladder", nickname);
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for ServiceCommandRouter {
    async fn handle_command(&self, command: Command) -> Result<()> {
        match command {
            Command::RegisterPlayer {
                platform_id,
                nickname,
            } => self.register_player(platform_id, nickname),
            Command::Enqueue {
                platform_id,
                mode,
                reply_channel,
            } => {
                self.queues.enqueue(&platform_id, mode, reply_channel)?;
                self.metrics.players_queued_total.inc();
                Ok(())
            }
            Command::Dequeue { platform_id } => {
                self.queues.dequeue(&platform_id)?;
                Ok(())
            }
            Command::PickMap {
                match_id,
                platform_id,
                map,
            } => self.drafts.pick(match_id, &platform_id, &map).await,
            Command::SubmitResult {
                match_id,
                platform_id,
                score_for_submitter,
                score_for_opponent,
                evidence,
            } => {
                self.results
                    .submit_result(
                        match_id,
                        &platform_id,
                        score_for_submitter,
                        score_for_opponent,
                        evidence,
                    )
                    .await
            }
            Command::ConfirmResult {
                match_id,
                platform_id,
            } => {
                self.results.confirm_result(match_id, &platform_id).await?;
                self.metrics.results_verified_total.inc();
                Ok(())
            }
            Command::DisputeResult {
                match_id,
                platform_id,
            } => {
                self.results.dispute_result(match_id, &platform_id).await?;
                self.metrics.disputes_total.inc();
                Ok(())
            }
            Command::FileReport {
                match_id,
                platform_id,
                reason,
                evidence,
            } => {
                self.results
                    .file_report(match_id, &platform_id, reason, evidence)
                    .await?;
                self.metrics.reports_total.inc();
                Ok(())
            }
            Command::ResolveReport { match_id, decision } => {
                self.results.resolve_report(match_id, decision).await?;
                if decision == ReportDecision::Accept {
                    self.metrics.technical_losses_total.inc();
                }
                Ok(())
            }
            Command::ModeratorResolve { match_id, decision } => {
                let is_tech_loss = matches!(decision, ModeratorDecision::TechnicalLoss { .. });
                let is_confirm = decision == ModeratorDecision::Confirm;
                self.results.moderator_resolve(match_id, decision).await?;
                if is_tech_loss {
                    self.metrics.technical_losses_total.inc();
                } else if is_confirm {
                    self.metrics.results_verified_total.inc();
                }
                Ok(())
            }
            Command::Forfeit { platform_id } => {
                self.results.forfeit(&platform_id).await?;
                self.metrics.results_verified_total.inc();
                Ok(())
            }
            Command::CreateTournament { name, slots } => {
                self.tournaments.create_tournament(&name, slots)
            }
            Command::RegisterParticipant { name, platform_id } => {
                self.tournaments.register_participant(&name, &platform_id)
            }
            Command::UnregisterParticipant { name, platform_id } => {
                self.tournaments.unregister_participant(&name, &platform_id)
            }
            Command::StartTournament { name } => self.tournaments.start_tournament(&name).await,
            Command::BanParticipant { name, nickname } => {
                self.tournaments.ban_participant(&name, &nickname).await
            }
            Command::SetWinner {
                name,
                match_id,
                winner,
            } => self.tournaments.set_winner(&name, match_id, &winner).await,
        }
    }

    async fn handle_error(&self, error: anyhow::Error, message_data: &[u8]) {
        error!(
            "Command failed - error: {}, message_size: {} bytes",
            error,
            message_data.len()
        );
        if !message_data.is_empty() {
            let preview_len = std::cmp::min(200, message_data.len());
            let preview = String::from_utf8_lossy(&message_data[..preview_len]);
            debug!("Message preview: {:?}", preview);
        }
    }
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn LadderStore>,
    queues: Arc<QueueManager>,
    drafts: Arc<DraftCoordinator>,
    results: Arc<ResultsCoordinator>,
    tournaments: Arc<TournamentCoordinator>,
    sweeper: Arc<ExpirySweeper>,
    router: Arc<ServiceCommandRouter>,
    metrics: MetricsCollector,
    broker: Option<BrokerConnection>,
    command_consumer: Option<CommandConsumer>,
    background_tasks: Vec<JoinHandle<()>>,
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the production service: broker-backed notifier, in-memory
    /// store, all coordinators.
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing {} service", config.service.name);

        let mut broker_config = BrokerConfig::from_url(&config.amqp.url);
        broker_config.max_retries = config.amqp.max_retry_attempts;
        broker_config.retry_delay_ms = config.amqp.retry_delay_ms;
        let broker = BrokerConnection::connect(&broker_config).await?;

        let channel = broker
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| LadderError::BrokerConnectionFailed {
                message: format!("Failed to open publisher channel: {}", e),
            })?;
        let publisher_config = PublisherConfig {
            exchange: config.amqp.notice_exchange.clone(),
            max_retries: config.amqp.max_retry_attempts,
            retry_delay_ms: config.amqp.retry_delay_ms,
        };
        let notifier: Arc<dyn Notifier> =
            Arc::new(AmqpNotifier::new(channel, publisher_config).await?);

        let store: Arc<dyn LadderStore> = Arc::new(MemoryStore::new());
        Self::assemble(config, store, notifier, Some(broker))
    }

    /// Assemble the service on explicit collaborators, without a broker.
    /// This is the seam integration tests build on.
    pub fn offline(
        config: AppConfig,
        store: Arc<dyn LadderStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        Self::assemble(config, store, notifier, None)
    }

    fn assemble(
        config: AppConfig,
        store: Arc<dyn LadderStore>,
        notifier: Arc<dyn Notifier>,
        broker: Option<BrokerConnection>,
    ) -> Result<Self> {
        let metrics = MetricsCollector::new()?;
        let rating = RatingConfig::from_settings(&config.ladder);

        let drafts = Arc::new(DraftCoordinator::new(
            store.clone(),
            notifier.clone(),
            config.draft_pick_timeout(),
            default_map_pool(),
        ));
        let launcher = Arc::new(MatchLauncher::with_metrics(
            store.clone(),
            notifier.clone(),
            drafts.clone(),
            metrics.clone(),
        ));
        let tournaments = Arc::new(TournamentCoordinator::new(
            store.clone(),
            notifier.clone(),
            launcher.clone(),
            rating,
            config.ladder.tournament_mode,
        ));
        let results = Arc::new(ResultsCoordinator::new(
            store.clone(),
            notifier.clone(),
            rating,
            config.confirmation_window(),
            config.ladder.require_evidence,
            tournaments.clone() as Arc<dyn BracketObserver>,
        ));
        let queues = Arc::new(QueueManager::new(store.clone(), launcher));
        let sweeper = Arc::new(ExpirySweeper::new(
            store.clone(),
            notifier.clone(),
            rating,
            config.match_ttl(),
        ));

        let router = Arc::new(ServiceCommandRouter {
            store: store.clone(),
            queues: queues.clone(),
            drafts: drafts.clone(),
            results: results.clone(),
            tournaments: tournaments.clone(),
            metrics: metrics.clone(),
            default_rating: config.ladder.default_rating,
        });

        Ok(Self {
            config,
            store,
            queues,
            drafts,
            results,
            tournaments,
            sweeper,
            router,
            metrics,
            broker,
            command_consumer: None,
            background_tasks: Vec::new(),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start background services and command consumption
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting {} service", self.config.service.name);
        *self.is_running.write().await = true;

        // Best-effort recovery of durable state
        if let Err(e) = self.queues.restore_from_flags() {
            warn!("Queue restore failed: {}", e);
        }
        if let Err(e) = self.tournaments.resume() {
            warn!("Tournament resume failed: {}", e);
        }

        self.start_health_endpoint();
        self.start_command_consumption().await?;
        self.start_background_tasks();

        info!("{} service started", self.config.service.name);
        Ok(())
    }

    /// Graceful shutdown: stop consuming, then stop the periodic tasks
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down {} service", self.config.service.name);
        *self.is_running.write().await = false;

        if let Some(consumer) = &self.command_consumer {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop command consumer: {}", e);
            }
        }

        let task_count = self.background_tasks.len();
        for task in self.background_tasks.drain(..) {
            task.abort();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        info!("Stopped {} background tasks", task_count);

        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// The command router, for callers that bypass the broker
    pub fn router(&self) -> Arc<ServiceCommandRouter> {
        self.router.clone()
    }

    pub fn queues(&self) -> Arc<QueueManager> {
        self.queues.clone()
    }

    pub fn results(&self) -> Arc<ResultsCoordinator> {
        self.results.clone()
    }

    pub fn tournaments(&self) -> Arc<TournamentCoordinator> {
        self.tournaments.clone()
    }

    pub fn store(&self) -> Arc<dyn LadderStore> {
        self.store.clone()
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    fn start_health_endpoint(&mut self) {
        let server = HealthServer::new(
            HealthServerConfig {
                host: "0.0.0.0".to_string(),
                port: self.config.service.health_port,
            },
            self.metrics.clone(),
        );
        let handle = tokio::spawn(async move {
            if let Err(e) = server.serve().await {
                error!("Health endpoint failed: {}", e);
            }
        });
        self.background_tasks.push(handle);
    }

    async fn start_command_consumption(&mut self) -> Result<()> {
        let Some(broker) = &self.broker else {
            debug!("No broker connection, skipping command consumption");
            return Ok(());
        };

        let channel = broker
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| LadderError::BrokerConnectionFailed {
                message: format!("Failed to open consumer channel: {}", e),
            })?;

        let queue_name = self.config.amqp.command_queue.clone();
        let declare_args = amqprs::channel::QueueDeclareArguments::new(&queue_name)
            .durable(true)
            .auto_delete(false)
            .finish();
        channel
            .queue_declare(declare_args)
            .await
            .map_err(|e| LadderError::BrokerConnectionFailed {
                message: format!("Failed to declare queue {}: {}", queue_name, e),
            })?;

        let consumer = CommandConsumer::new(self.router.clone(), channel);
        consumer.start_consuming(&queue_name).await?;
        self.command_consumer = Some(consumer);

        Ok(())
    }

    fn start_background_tasks(&mut self) {
        // Pairing pass
        let pairing_task = {
            let queues = self.queues.clone();
            let pairing_interval = self.config.pairing_interval();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut ticker = interval(pairing_interval);
                while *is_running.read().await {
                    ticker.tick().await;
                    match queues.run_pairing_pass().await {
                        Ok(made) if made > 0 => info!("Pairing pass made {} matches", made),
                        Ok(_) => debug!("Pairing pass made no matches"),
                        // Abandoned for this tick, retried on the next one
                        Err(e) => warn!("Pairing pass failed: {}", e),
                    }
                }
            })
        };

        // Expiry sweep
        let sweep_task = {
            let sweeper = self.sweeper.clone();
            let metrics = self.metrics.clone();
            let sweep_interval = self.config.expiry_sweep_interval();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut ticker = interval(sweep_interval);
                while *is_running.read().await {
                    ticker.tick().await;
                    match sweeper.sweep().await {
                        Ok(closed) if closed > 0 => {
                            metrics.matches_expired_total.inc_by(closed as u64);
                            info!("Expiry sweep closed {} matches", closed);
                        }
                        Ok(_) => debug!("Expiry sweep found nothing stale"),
                        Err(e) => warn!("Expiry sweep failed: {}", e),
                    }
                }
            })
        };

        // Bracket completion check
        let bracket_task = {
            let tournaments = self.tournaments.clone();
            let check_interval = self.config.bracket_check_interval();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut ticker = interval(check_interval);
                while *is_running.read().await {
                    ticker.tick().await;
                    if let Err(e) = tournaments.check_all().await {
                        warn!("Bracket check failed: {}", e);
                    }
                }
            })
        };

        // Metrics refresh
        let metrics_task = {
            let queues = self.queues.clone();
            let drafts = self.drafts.clone();
            let results = self.results.clone();
            let tournaments = self.tournaments.clone();
            let metrics = self.metrics.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let started_at = Instant::now();
                let mut ticker = interval(Duration::from_secs(30));
                while *is_running.read().await {
                    ticker.tick().await;
                    for (mode, depth) in queues.queue_depths() {
                        metrics.set_queue_depth(mode, depth);
                    }
                    metrics.active_drafts.set(drafts.active_count() as i64);
                    metrics.pending_results.set(results.pending_count() as i64);
                    metrics
                        .active_tournaments
                        .set(tournaments.active_count() as i64);
                    metrics
                        .uptime_seconds
                        .set(started_at.elapsed().as_secs() as i64);
                }
            })
        };

        self.background_tasks.push(pairing_task);
        self.background_tasks.push(sweep_task);
        self.background_tasks.push(bracket_task);
        self.background_tasks.push(metrics_task);
        info!("Started 4 background tasks");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::types::{GameMode, QueueMode};

    fn offline_state() -> AppState {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        AppState::offline(AppConfig::default(), store, notifier).unwrap()
    }

    #[tokio::test]
    async fn test_router_registers_and_enqueues() {
        let state = offline_state();
        let router = state.router();

        router
            .handle_command(Command::RegisterPlayer {
                platform_id: "p-alice".to_string(),
                nickname: "alice".to_string(),
            })
            .await
            .unwrap();

        // Registration is idempotent per platform id
        router
            .handle_command(Command::RegisterPlayer {
                platform_id: "p-alice".to_string(),
                nickname: "alice".to_string(),
            })
            .await
            .unwrap();

        router
            .handle_command(Command::Enqueue {
                platform_id: "p-alice".to_string(),
                mode: QueueMode::Mode(GameMode::Flags),
                reply_channel: None,
            })
            .await
            .unwrap();

        let depths: usize = state.queues().queue_depths().iter().map(|(_, d)| d).sum();
        assert_eq!(depths, 1);
        assert_eq!(state.metrics().players_queued_total.get(), 1);
    }

    #[tokio::test]
    async fn test_router_rejects_taken_nickname() {
        let state = offline_state();
        let router = state.router();

        router
            .handle_command(Command::RegisterPlayer {
                platform_id: "p-1".to_string(),
                nickname: "alice".to_string(),
            })
            .await
            .unwrap();

        let err = router
            .handle_command(Command::RegisterPlayer {
                platform_id: "p-2".to_string(),
                nickname: "alice".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::InvalidCommand { .. })
        ));
    }

    #[tokio::test]
    async fn test_offline_state_starts_and_stops() {
        let mut state = offline_state();
        // Pick a port unlikely to collide across test runs
        state.config.service.health_port = 18736;

        state.start().await.unwrap();
        assert!(state.is_running().await);

        state.shutdown().await.unwrap();
        assert!(!state.is_running().await);
    }
}
