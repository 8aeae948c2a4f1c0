//! The confirmation state machine around pending results and reports
//!
//! AwaitingSubmission -> AwaitingOpponentConfirmation -> Verified, with
//! disputes, lapsed windows and reports all converging on moderator
//! adjudication. Confirmation-window timers are abortable handles stored
//! with the pending result; a timer that fires after its submission was
//! superseded re-checks the sequence number and does nothing.

use crate::error::{LadderError, Result};
use crate::notify::{Notice, Notifier, Recipient, RESULTS_CHANNEL};
use crate::rating::RatingConfig;
use crate::results::apply::{apply_outcome, rollback_outcome, OutcomeApplication};
use crate::results::pending::{ModeratorDecision, PendingReport, PendingResult, ReportDecision};
use crate::store::models::MatchRecord;
use crate::store::LadderStore;
use crate::types::{MatchId, MatchKind, MatchStatus, PlatformId};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Hook invoked after a tournament-tagged match verifies, so the bracket
/// can advance without the results layer depending on tournament internals.
#[async_trait]
pub trait BracketObserver: Send + Sync {
    async fn match_verified(&self, record: &MatchRecord);
}

/// Observer for deployments (and tests) without tournaments
#[derive(Debug, Default)]
pub struct NoopBracketObserver;

#[async_trait]
impl BracketObserver for NoopBracketObserver {
    async fn match_verified(&self, _record: &MatchRecord) {}
}

struct PendingEntry {
    result: PendingResult,
    timer: Option<JoinHandle<()>>,
}

/// Drives submitted results to Verified or back to AwaitingSubmission
pub struct ResultsCoordinator {
    pending: RwLock<HashMap<MatchId, PendingEntry>>,
    reports: RwLock<HashMap<MatchId, PendingReport>>,
    store: Arc<dyn LadderStore>,
    notifier: Arc<dyn Notifier>,
    rating: RatingConfig,
    window: Duration,
    require_evidence: bool,
    observer: Arc<dyn BracketObserver>,
    submission_seq: AtomicU64,
}

impl ResultsCoordinator {
    pub fn new(
        store: Arc<dyn LadderStore>,
        notifier: Arc<dyn Notifier>,
        rating: RatingConfig,
        window: Duration,
        require_evidence: bool,
        observer: Arc<dyn BracketObserver>,
    ) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            reports: RwLock::new(HashMap::new()),
            store,
            notifier,
            rating,
            window,
            require_evidence,
            observer,
            submission_seq: AtomicU64::new(0),
        }
    }

    fn lock_err(what: &str) -> LadderError {
        LadderError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }

    /// Results currently awaiting confirmation or adjudication
    pub fn pending_count(&self) -> usize {
        self.pending.read().map(|p| p.len()).unwrap_or(0)
    }

    /// Reports currently awaiting a moderator
    pub fn open_report_count(&self) -> usize {
        self.reports.read().map(|r| r.len()).unwrap_or(0)
    }

    fn nickname_of(&self, platform_id: &PlatformId) -> Result<String> {
        self.store
            .player_by_platform_id(platform_id)?
            .map(|p| p.nickname)
            .ok_or_else(|| {
                LadderError::PlayerNotFound {
                    player: platform_id.clone(),
                }
                .into()
            })
    }

    /// Deliver a notice to a player addressed by nickname
    async fn notify_player(&self, nickname: &str, notice: Notice) {
        match self.store.player(nickname) {
            Ok(Some(player)) => {
                self.notifier
                    .send(Recipient::Player(player.platform_id), notice)
                    .await;
            }
            Ok(None) => debug!("Dropping notice for unknown player {}", nickname),
            Err(e) => warn!("Player lookup for notice failed ({}): {}", nickname, e),
        }
    }

    /// A participant submits the outcome of their match. Scores are given
    /// from the submitter's perspective and normalized to the match sides.
    pub async fn submit_result(
        self: &Arc<Self>,
        match_id: MatchId,
        submitter: &PlatformId,
        score_for_submitter: u32,
        score_for_opponent: u32,
        evidence: Option<String>,
    ) -> Result<()> {
        let record = self
            .store
            .match_record(match_id)?
            .ok_or(LadderError::MatchNotFound { match_id })?;

        {
            let reports = self.reports.read().map_err(|_| Self::lock_err("reports"))?;
            if reports.contains_key(&match_id) {
                return Err(LadderError::ReportPending { match_id }.into());
            }
        }

        match record.status {
            MatchStatus::Verified => {
                return Err(LadderError::MatchClosed { match_id }.into());
            }
            MatchStatus::AwaitingOpponentConfirmation | MatchStatus::AwaitingModeratorDecision => {
                return Err(LadderError::ResultPending { match_id }.into());
            }
            MatchStatus::AwaitingSubmission => {}
        }

        if score_for_submitter == score_for_opponent {
            return Err(LadderError::ScoresEqual {
                score_a: score_for_submitter,
                score_b: score_for_opponent,
            }
            .into());
        }
        if self.require_evidence && evidence.is_none() {
            return Err(LadderError::EvidenceRequired.into());
        }

        let submitter_nick = self.nickname_of(submitter)?;
        let opponent_nick = record
            .opponent_of(&submitter_nick)
            .ok_or_else(|| LadderError::NotAParticipant {
                player: submitter_nick.clone(),
                match_id,
            })?
            .to_string();

        let (score_a, score_b) = if record.player_a == submitter_nick {
            (score_for_submitter, score_for_opponent)
        } else {
            (score_for_opponent, score_for_submitter)
        };

        let mut frozen = record;
        frozen.status = MatchStatus::AwaitingOpponentConfirmation;
        self.store.put_match(frozen)?;

        let seq = self.submission_seq.fetch_add(1, Ordering::SeqCst);
        let result = PendingResult {
            match_id,
            score_a,
            score_b,
            evidence: evidence.clone(),
            submitter: submitter_nick.clone(),
            opponent: opponent_nick.clone(),
            submitted_at: current_timestamp(),
            seq,
        };

        {
            let mut pending = self.pending.write().map_err(|_| Self::lock_err("pending"))?;
            pending.insert(
                match_id,
                PendingEntry {
                    result,
                    timer: None,
                },
            );
        }

        info!(
            "Result {}-{} submitted for match {} by {}, awaiting {}",
            score_a, score_b, match_id, submitter_nick, opponent_nick
        );

        self.notify_player(
            &opponent_nick,
            Notice::ConfirmationRequested {
                match_id,
                scores: (score_a, score_b),
                evidence,
                window_seconds: self.window.as_secs(),
            },
        )
        .await;

        self.arm_window_timer(match_id, seq)?;
        Ok(())
    }

    /// The designated opponent accepts the submitted result
    pub async fn confirm_result(
        self: &Arc<Self>,
        match_id: MatchId,
        confirmer: &PlatformId,
    ) -> Result<()> {
        let confirmer_nick = self.nickname_of(confirmer)?;

        let record = self
            .store
            .match_record(match_id)?
            .ok_or(LadderError::MatchNotFound { match_id })?;
        if record.status != MatchStatus::AwaitingOpponentConfirmation {
            return Err(LadderError::NoPendingResult { match_id }.into());
        }

        let entry = {
            let mut pending = self.pending.write().map_err(|_| Self::lock_err("pending"))?;
            match pending.get(&match_id) {
                None => return Err(LadderError::NoPendingResult { match_id }.into()),
                Some(entry) if entry.result.opponent != confirmer_nick => {
                    return Err(LadderError::NotAParticipant {
                        player: confirmer_nick,
                        match_id,
                    }
                    .into());
                }
                Some(_) => {}
            }
            let mut entry = pending.remove(&match_id).expect("checked above");
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
            entry
        };

        let (score_a, score_b) = (entry.result.score_a, entry.result.score_b);
        match self.finalize_verified(record, score_a, score_b).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // Keep the submission so the store hiccup is retryable
                let mut pending =
                    self.pending.write().map_err(|_| Self::lock_err("pending"))?;
                pending.insert(match_id, entry);
                Err(e)
            }
        }
    }

    /// The designated opponent contests the submitted result
    pub async fn dispute_result(
        self: &Arc<Self>,
        match_id: MatchId,
        disputer: &PlatformId,
    ) -> Result<()> {
        let disputer_nick = self.nickname_of(disputer)?;

        let result = {
            let mut pending = self.pending.write().map_err(|_| Self::lock_err("pending"))?;
            let entry = pending
                .get_mut(&match_id)
                .ok_or(LadderError::NoPendingResult { match_id })?;
            if entry.result.opponent != disputer_nick {
                return Err(LadderError::NotAParticipant {
                    player: disputer_nick,
                    match_id,
                }
                .into());
            }
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
            entry.result.clone()
        };

        let mut record = self
            .store
            .match_record(match_id)?
            .ok_or(LadderError::MatchNotFound { match_id })?;
        if record.status == MatchStatus::AwaitingOpponentConfirmation {
            record.status = MatchStatus::AwaitingModeratorDecision;
            self.store.put_match(record)?;
        }

        info!(
            "Result for match {} disputed by {}, escalating to moderator",
            match_id, disputer_nick
        );

        self.notifier
            .send(
                Recipient::Moderator,
                Notice::ModeratorReview {
                    match_id,
                    submitter: result.submitter,
                    opponent: result.opponent,
                    scores: (result.score_a, result.score_b),
                    evidence: result.evidence,
                },
            )
            .await;

        Ok(())
    }

    /// Moderator settles an adjudicated result
    pub async fn moderator_resolve(
        self: &Arc<Self>,
        match_id: MatchId,
        decision: ModeratorDecision,
    ) -> Result<()> {
        let record = self
            .store
            .match_record(match_id)?
            .ok_or(LadderError::MatchNotFound { match_id })?;

        match decision {
            ModeratorDecision::Confirm => {
                let entry = self.take_pending(match_id)?;
                let (score_a, score_b) = (entry.result.score_a, entry.result.score_b);
                match self.finalize_verified(record, score_a, score_b).await {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        let mut pending =
                            self.pending.write().map_err(|_| Self::lock_err("pending"))?;
                        pending.insert(match_id, entry);
                        Err(e)
                    }
                }
            }
            ModeratorDecision::Reject => {
                let entry = self.take_pending(match_id)?;

                let mut reopened = record;
                reopened.status = MatchStatus::AwaitingSubmission;
                self.store.put_match(reopened)?;

                info!("Result for match {} rejected by moderator", match_id);
                self.notify_player(
                    &entry.result.submitter,
                    Notice::ResultRejected { match_id },
                )
                .await;
                Ok(())
            }
            ModeratorDecision::TechnicalLoss { offender } => {
                if !record.has_participant(&offender) {
                    return Err(LadderError::NotAParticipant {
                        player: offender,
                        match_id,
                    }
                    .into());
                }
                self.apply_technical_loss(record, &offender).await
            }
        }
    }

    /// Any participant files a rule-violation report. The match freezes
    /// until a moderator accepts or rejects it; a pending confirmation is
    /// discarded (the result can be resubmitted if the report is rejected).
    pub async fn file_report(
        self: &Arc<Self>,
        match_id: MatchId,
        reporter: &PlatformId,
        reason: String,
        evidence: Option<String>,
    ) -> Result<()> {
        let record = self
            .store
            .match_record(match_id)?
            .ok_or(LadderError::MatchNotFound { match_id })?;

        let reporter_nick = self.nickname_of(reporter)?;
        let accused = record
            .opponent_of(&reporter_nick)
            .ok_or_else(|| LadderError::NotAParticipant {
                player: reporter_nick.clone(),
                match_id,
            })?
            .to_string();

        {
            let reports = self.reports.read().map_err(|_| Self::lock_err("reports"))?;
            if reports.contains_key(&match_id) {
                return Err(LadderError::ReportPending { match_id }.into());
            }
        }

        self.discard_pending(match_id)?;

        if record.status != MatchStatus::Verified {
            let mut frozen = record;
            frozen.status = MatchStatus::AwaitingModeratorDecision;
            self.store.put_match(frozen)?;
        }

        let report = PendingReport {
            match_id,
            reporter: reporter_nick.clone(),
            accused: accused.clone(),
            reason: reason.clone(),
            evidence: evidence.clone(),
            filed_at: current_timestamp(),
        };
        {
            let mut reports = self.reports.write().map_err(|_| Self::lock_err("reports"))?;
            reports.insert(match_id, report);
        }

        info!(
            "Report filed on match {} by {} against {}",
            match_id, reporter_nick, accused
        );

        self.notifier
            .send(
                Recipient::Moderator,
                Notice::ReportFiled {
                    match_id,
                    reporter: reporter_nick,
                    accused,
                    reason,
                    evidence,
                },
            )
            .await;

        Ok(())
    }

    /// Moderator acts on a filed report
    pub async fn resolve_report(
        self: &Arc<Self>,
        match_id: MatchId,
        decision: ReportDecision,
    ) -> Result<()> {
        let report = {
            let mut reports = self.reports.write().map_err(|_| Self::lock_err("reports"))?;
            reports
                .remove(&match_id)
                .ok_or(LadderError::NoOpenReport { match_id })?
        };

        let record = self
            .store
            .match_record(match_id)?
            .ok_or(LadderError::MatchNotFound { match_id })?;

        match decision {
            ReportDecision::Accept => {
                let accused = report.accused.clone();
                match self.apply_technical_loss(record, &accused).await {
                    Ok(()) => {
                        self.notify_player(&report.reporter, Notice::ReportAccepted { match_id })
                            .await;
                        Ok(())
                    }
                    Err(e) => {
                        let mut reports =
                            self.reports.write().map_err(|_| Self::lock_err("reports"))?;
                        reports.insert(match_id, report);
                        Err(e)
                    }
                }
            }
            ReportDecision::Reject => {
                if record.status == MatchStatus::AwaitingModeratorDecision {
                    let mut reopened = record;
                    reopened.status = MatchStatus::AwaitingSubmission;
                    self.store.put_match(reopened)?;
                }
                info!("Report on match {} rejected", match_id);
                self.notify_player(&report.reporter, Notice::ReportRejected { match_id })
                    .await;
                Ok(())
            }
        }
    }

    /// A participant concedes their unresolved match: an immediate walkover
    /// for the opponent with full rating application.
    pub async fn forfeit(self: &Arc<Self>, player: &PlatformId) -> Result<MatchId> {
        let nickname = self.nickname_of(player)?;

        let record = match self
            .store
            .unresolved_match_for(&nickname, MatchKind::Ladder)?
        {
            Some(record) => record,
            None => self
                .store
                .unresolved_match_for(&nickname, MatchKind::Tournament)?
                .ok_or(LadderError::NoActiveMatch { player: nickname.clone() })?,
        };
        let match_id = record.id;

        self.discard_pending(match_id)?;
        {
            let mut reports = self.reports.write().map_err(|_| Self::lock_err("reports"))?;
            reports.remove(&match_id);
        }

        let winner = record
            .opponent_of(&nickname)
            .expect("forfeiting player is a participant")
            .to_string();
        let (score_a, score_b) = if record.player_a == winner { (1, 0) } else { (0, 1) };

        let application = apply_outcome(self.store.as_ref(), &self.rating, record, score_a, score_b)?;

        info!(
            "Match {} forfeited by {}, walkover for {}",
            match_id, nickname, winner
        );

        let notice = Notice::MatchForfeited {
            match_id,
            winner: winner.clone(),
            loser: nickname.clone(),
            rating_changes: application.rating_changes.clone(),
        };
        self.notify_player(&winner, notice.clone()).await;
        self.notify_player(&nickname, notice.clone()).await;
        self.notifier
            .send(Recipient::Channel(RESULTS_CHANNEL.to_string()), notice)
            .await;

        if application.record.kind == MatchKind::Tournament {
            self.observer.match_verified(&application.record).await;
        }

        Ok(match_id)
    }

    /// Walkover in favor of the offender's opponent. If the match had
    /// already verified, the recorded deltas and counters are reversed
    /// first, so the net effect equals a technical loss from the start.
    async fn apply_technical_loss(
        self: &Arc<Self>,
        mut record: MatchRecord,
        offender: &str,
    ) -> Result<()> {
        let match_id = record.id;
        let winner = record
            .opponent_of(offender)
            .ok_or_else(|| LadderError::NotAParticipant {
                player: offender.to_string(),
                match_id,
            })?
            .to_string();

        self.discard_pending(match_id)?;

        if record.status == MatchStatus::Verified {
            rollback_outcome(self.store.as_ref(), &mut record)?;
        }

        let (score_a, score_b) = if record.player_a == winner { (1, 0) } else { (0, 1) };
        let application = apply_outcome(self.store.as_ref(), &self.rating, record, score_a, score_b)?;

        info!(
            "Technical loss on match {}: walkover for {} over {}",
            match_id, winner, offender
        );

        let notice = Notice::TechnicalLoss {
            match_id,
            winner: winner.clone(),
            loser: offender.to_string(),
            rating_changes: application.rating_changes.clone(),
        };
        self.notify_player(&winner, notice.clone()).await;
        self.notify_player(offender, notice.clone()).await;
        self.notifier
            .send(Recipient::Channel(RESULTS_CHANNEL.to_string()), notice)
            .await;

        if application.record.kind == MatchKind::Tournament {
            self.observer.match_verified(&application.record).await;
        }

        Ok(())
    }

    /// Apply a confirmed result and fan out the verification notices
    async fn finalize_verified(
        self: &Arc<Self>,
        record: MatchRecord,
        score_a: u32,
        score_b: u32,
    ) -> Result<OutcomeApplication> {
        let application =
            apply_outcome(self.store.as_ref(), &self.rating, record, score_a, score_b)?;
        let record = &application.record;

        let winner = application
            .winner
            .clone()
            .unwrap_or_else(|| record.player_a.clone());
        let notice = Notice::ResultVerified {
            match_id: record.id,
            mode: record.mode,
            winner,
            scores: (score_a, score_b),
            rating_changes: application.rating_changes.clone(),
        };

        info!(
            "Match {} verified: {} {}-{} {}",
            record.id, record.player_a, score_a, score_b, record.player_b
        );

        self.notify_player(&record.player_a, notice.clone()).await;
        self.notify_player(&record.player_b, notice.clone()).await;
        self.notifier
            .send(Recipient::Channel(RESULTS_CHANNEL.to_string()), notice)
            .await;

        if record.kind == MatchKind::Tournament {
            self.observer.match_verified(record).await;
        }

        Ok(application)
    }

    /// Remove and return the pending entry, aborting its window timer
    fn take_pending(&self, match_id: MatchId) -> Result<PendingEntry> {
        let mut pending = self.pending.write().map_err(|_| Self::lock_err("pending"))?;
        let mut entry = pending
            .remove(&match_id)
            .ok_or(LadderError::NoPendingResult { match_id })?;
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }
        Ok(entry)
    }

    /// Drop a pending entry if one exists (superseding flows: reports,
    /// technical losses, forfeits)
    fn discard_pending(&self, match_id: MatchId) -> Result<()> {
        let mut pending = self.pending.write().map_err(|_| Self::lock_err("pending"))?;
        if let Some(mut entry) = pending.remove(&match_id) {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
            debug!("Discarded pending result for match {}", match_id);
        }
        Ok(())
    }

    /// Arm the confirmation-window timer for a submission
    fn arm_window_timer(self: &Arc<Self>, match_id: MatchId, seq: u64) -> Result<()> {
        let coordinator = Arc::clone(self);
        let window = self.window;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            coordinator.handle_window_timeout(match_id, seq).await;
        });

        let mut pending = self.pending.write().map_err(|_| Self::lock_err("pending"))?;
        match pending.get_mut(&match_id) {
            Some(entry) if entry.result.seq == seq => {
                if let Some(old) = entry.timer.replace(handle) {
                    old.abort();
                }
            }
            // The submission was resolved before the timer was armed
            _ => handle.abort(),
        }
        Ok(())
    }

    /// The opponent never responded: escalate to the moderator exactly as a
    /// dispute would, telling both players the window lapsed.
    async fn handle_window_timeout(self: Arc<Self>, match_id: MatchId, seq: u64) {
        let result = {
            let mut pending = match self.pending.write() {
                Ok(p) => p,
                Err(_) => return,
            };
            match pending.get_mut(&match_id) {
                Some(entry) if entry.result.seq == seq => {
                    entry.timer = None;
                    entry.result.clone()
                }
                _ => {
                    debug!("Stale confirmation timer for match {}", match_id);
                    return;
                }
            }
        };

        let record = match self.store.match_record(match_id) {
            Ok(Some(record)) => record,
            _ => return,
        };
        if record.status != MatchStatus::AwaitingOpponentConfirmation {
            return;
        }

        let mut escalated = record;
        escalated.status = MatchStatus::AwaitingModeratorDecision;
        if let Err(e) = self.store.put_match(escalated) {
            warn!(
                "Failed to escalate match {} after lapsed window: {}",
                match_id, e
            );
            return;
        }

        info!(
            "Confirmation window for match {} lapsed, escalating to moderator",
            match_id
        );

        self.notify_player(&result.submitter, Notice::ConfirmationLapsed { match_id })
            .await;
        self.notify_player(&result.opponent, Notice::ConfirmationLapsed { match_id })
            .await;
        self.notifier
            .send(
                Recipient::Moderator,
                Notice::ModeratorReview {
                    match_id,
                    submitter: result.submitter,
                    opponent: result.opponent,
                    scores: (result.score_a, result.score_b),
                    evidence: result.evidence,
                },
            )
            .await;
    }
}
