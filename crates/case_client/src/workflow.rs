use std::{
    fmt,
    future::Future,
    sync::{Arc, Weak},
    time::Duration,
};

use shared::{
    domain::{CandidateDiagnosis, CaseId, CaseInput, FeedbackStats},
    error::ValidationError,
    protocol::FeedbackAck,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    config::WorkflowConfig,
    notification::{Notification, NotificationKind, NotificationManager},
    selection::CandidateSelection,
    CaseBackend, CaseHandle, FeedbackError, PollError, PollOutcome, SubmissionError,
    WorkflowEvent,
};

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowPhase {
    Idle,
    Submitting,
    AwaitingResult {
        case_id: CaseId,
    },
    Diagnosed {
        case_id: CaseId,
        candidates: Vec<CandidateDiagnosis>,
        selected: Option<String>,
    },
    SubmittingFeedback {
        case_id: CaseId,
        disease: String,
        accepted: bool,
    },
    Resetting {
        case_id: CaseId,
    },
}

impl WorkflowPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::AwaitingResult { .. } => "awaiting_result",
            Self::Diagnosed { .. } => "diagnosed",
            Self::SubmittingFeedback { .. } => "submitting_feedback",
            Self::Resetting { .. } => "resetting",
        }
    }

    pub fn case_id(&self) -> Option<CaseId> {
        match self {
            Self::Idle | Self::Submitting => None,
            Self::AwaitingResult { case_id }
            | Self::Diagnosed { case_id, .. }
            | Self::SubmittingFeedback { case_id, .. }
            | Self::Resetting { case_id } => Some(*case_id),
        }
    }

    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            Self::Submitting | Self::SubmittingFeedback { .. } | Self::Resetting { .. }
        )
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.case_id() {
            Some(case_id) => write!(f, "{} (case {case_id})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Invalid(ValidationError),
    Busy,
    NoActiveCase,
    NotDiagnosed,
    NoSelection,
    UnknownCandidate,
    FeedbackAlreadySent,
}

/// Backend failures never escape the controller; they end up as `Failed`
/// plus an error notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    Applied,
    Rejected(RejectReason),
    Failed,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FeedbackStatus {
    NotSent,
    InFlight { disease: String, accepted: bool },
    Sent,
}

struct CaseState {
    // Bumped whenever case-scoped data is discarded; in-flight calls compare
    // against it to drop responses for a case that no longer exists.
    epoch: u64,
    submitting: bool,
    handle: Option<CaseHandle>,
    poll_in_flight: bool,
    diagnosis: Option<CandidateSelection>,
    feedback: FeedbackStatus,
}

impl CaseState {
    fn new() -> Self {
        Self {
            epoch: 0,
            submitting: false,
            handle: None,
            poll_in_flight: false,
            diagnosis: None,
            feedback: FeedbackStatus::NotSent,
        }
    }

    fn discard_case(&mut self) {
        self.epoch += 1;
        self.submitting = false;
        self.handle = None;
        self.poll_in_flight = false;
        self.diagnosis = None;
        self.feedback = FeedbackStatus::NotSent;
    }

    // Clears whichever call flag belongs to a call that will never complete.
    fn release_in_flight(&mut self) {
        self.submitting = false;
        self.poll_in_flight = false;
        if matches!(self.feedback, FeedbackStatus::InFlight { .. }) {
            self.feedback = FeedbackStatus::NotSent;
        }
    }

    fn phase(&self) -> WorkflowPhase {
        if self.submitting {
            return WorkflowPhase::Submitting;
        }
        let Some(handle) = self.handle else {
            return WorkflowPhase::Idle;
        };
        let case_id = handle.case_id;
        match (&self.feedback, &self.diagnosis) {
            (FeedbackStatus::Sent, _) => WorkflowPhase::Resetting { case_id },
            (FeedbackStatus::InFlight { disease, accepted }, _) => {
                WorkflowPhase::SubmittingFeedback {
                    case_id,
                    disease: disease.clone(),
                    accepted: *accepted,
                }
            }
            (FeedbackStatus::NotSent, Some(selection)) => WorkflowPhase::Diagnosed {
                case_id,
                candidates: selection.candidates().to_vec(),
                selected: selection.selected_disease().map(str::to_string),
            },
            (FeedbackStatus::NotSent, None) => WorkflowPhase::AwaitingResult { case_id },
        }
    }
}

fn validation_message(err: &ValidationError) -> &'static str {
    match err {
        ValidationError::EmptySymptoms => "Please describe the symptoms before submitting.",
        ValidationError::EmptyGender => "Please enter the patient's gender before submitting.",
    }
}

fn poll_failure_message(err: &PollError) -> String {
    match err {
        PollError::NoActiveCase => "Submit a case first.".to_string(),
        PollError::CaseNotFound(case_id) => format!("Case {case_id} was not found on the server."),
        PollError::Backend(_) => "Failed to fetch the diagnosis result.".to_string(),
    }
}

/// Intents may be invoked concurrently; the guards reject the ones that would
/// overlap. Backend calls run on detached tasks, so dropping an intent future
/// never leaves a call flag set.
pub struct CaseWorkflow {
    backend: Arc<dyn CaseBackend>,
    config: WorkflowConfig,
    state: Mutex<CaseState>,
    notifications: NotificationManager,
    events: broadcast::Sender<WorkflowEvent>,
}

impl CaseWorkflow {
    pub fn new(backend: Arc<dyn CaseBackend>, config: WorkflowConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            backend,
            config,
            state: Mutex::new(CaseState::new()),
            notifications: NotificationManager::new(config.notification_ttl, events.clone()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> WorkflowPhase {
        self.state.lock().await.phase()
    }

    pub async fn notification(&self) -> Option<Notification> {
        self.notifications.current().await
    }

    pub async fn selected_candidate(&self) -> Option<CandidateDiagnosis> {
        let state = self.state.lock().await;
        state
            .diagnosis
            .as_ref()
            .and_then(|selection| selection.current().cloned())
    }

    fn publish_phase(&self, state: &CaseState) {
        let phase = state.phase();
        debug!(phase = %phase, epoch = state.epoch, "workflow phase changed");
        let _ = self.events.send(WorkflowEvent::PhaseChanged(phase));
    }

    async fn detach<F>(self: &Arc<Self>, epoch: u64, call: F) -> IntentOutcome
    where
        F: Future<Output = IntentOutcome> + Send + 'static,
    {
        let workflow = Arc::clone(self);
        let task = tokio::spawn(async move {
            match tokio::spawn(call).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, epoch, "backend call aborted");
                    let mut state = workflow.state.lock().await;
                    if state.epoch == epoch {
                        state.release_in_flight();
                        workflow.publish_phase(&state);
                    }
                    IntentOutcome::Failed
                }
            }
        });
        task.await.unwrap_or_else(|err| {
            warn!(error = %err, epoch, "workflow task aborted");
            IntentOutcome::Failed
        })
    }

    pub async fn submit(
        self: &Arc<Self>,
        age: u32,
        gender: &str,
        symptoms: &str,
    ) -> IntentOutcome {
        match CaseInput::new(age, gender, symptoms) {
            Ok(input) => self.submit_case(input).await,
            Err(err) => {
                warn!(error = %err, "case input rejected");
                self.notifications
                    .show(NotificationKind::Error, validation_message(&err))
                    .await;
                IntentOutcome::Rejected(RejectReason::Invalid(err))
            }
        }
    }

    /// Any case that has not reached feedback is discarded first.
    pub async fn submit_case(self: &Arc<Self>, input: CaseInput) -> IntentOutcome {
        let epoch = {
            let mut state = self.state.lock().await;
            if state.phase().is_transitional() {
                debug!(phase = %state.phase(), "submit ignored while busy");
                return IntentOutcome::Rejected(RejectReason::Busy);
            }
            state.discard_case();
            state.submitting = true;
            self.publish_phase(&state);
            self.notifications.clear().await;
            state.epoch
        };

        info!(age = input.age(), gender = %input.gender(), "submitting case");
        let workflow = Arc::clone(self);
        self.detach(epoch, async move {
            let result = workflow.backend.submit(&input).await;
            workflow.complete_submission(epoch, result).await
        })
        .await
    }

    async fn complete_submission(
        &self,
        epoch: u64,
        result: Result<CaseHandle, SubmissionError>,
    ) -> IntentOutcome {
        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            debug!(epoch, "discarding stale submission response");
            return IntentOutcome::Stale;
        }
        state.submitting = false;
        match result {
            Ok(handle) => {
                state.handle = Some(handle);
                self.publish_phase(&state);
                self.notifications
                    .show(
                        NotificationKind::Info,
                        format!(
                            "Case {} submitted; the agent is analysing the symptoms.",
                            handle.case_id
                        ),
                    )
                    .await;
                IntentOutcome::Applied
            }
            Err(err) => {
                warn!(error = %err, "case submission failed");
                self.publish_phase(&state);
                self.notifications
                    .show(
                        NotificationKind::Error,
                        "Failed to send the case to the backend.",
                    )
                    .await;
                IntentOutcome::Failed
            }
        }
    }

    pub async fn check_result(self: &Arc<Self>) -> IntentOutcome {
        let (epoch, handle) = {
            let mut state = self.state.lock().await;
            let Some(handle) = state.handle else {
                if state.submitting {
                    return IntentOutcome::Rejected(RejectReason::Busy);
                }
                self.notifications
                    .show(
                        NotificationKind::Error,
                        poll_failure_message(&PollError::NoActiveCase),
                    )
                    .await;
                return IntentOutcome::Rejected(RejectReason::NoActiveCase);
            };
            if state.poll_in_flight || state.feedback != FeedbackStatus::NotSent {
                debug!(case_id = %handle.case_id, "result check ignored while busy");
                return IntentOutcome::Rejected(RejectReason::Busy);
            }
            state.poll_in_flight = true;
            (state.epoch, handle)
        };

        debug!(case_id = %handle.case_id, "polling case result");
        let workflow = Arc::clone(self);
        self.detach(epoch, async move {
            let result = workflow.backend.poll(&handle).await;
            workflow.complete_poll(epoch, handle, result).await
        })
        .await
    }

    async fn complete_poll(
        &self,
        epoch: u64,
        handle: CaseHandle,
        result: Result<PollOutcome, PollError>,
    ) -> IntentOutcome {
        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            debug!(case_id = %handle.case_id, epoch, "discarding stale poll response");
            return IntentOutcome::Stale;
        }
        state.poll_in_flight = false;
        match result {
            Ok(PollOutcome::Pending { status }) => {
                info!(case_id = %handle.case_id, status = ?status, "case still processing");
                self.notifications
                    .show(
                        NotificationKind::Info,
                        "The agent is still processing the case.",
                    )
                    .await;
                IntentOutcome::Applied
            }
            Ok(PollOutcome::Diagnosed(candidates)) if candidates.is_empty() => {
                warn!(case_id = %handle.case_id, "diagnosis arrived without candidates");
                self.notifications
                    .show(
                        NotificationKind::Error,
                        "No candidate diagnoses are available for this case.",
                    )
                    .await;
                IntentOutcome::Failed
            }
            Ok(PollOutcome::Diagnosed(candidates)) => {
                let count = candidates.len();
                let selection = state.diagnosis.get_or_insert_with(CandidateSelection::default);
                selection.replace(candidates);
                let summary = selection
                    .current()
                    .map(|top| format!("{} ({}%)", top.disease, top.confidence_percent()))
                    .unwrap_or_default();
                info!(case_id = %handle.case_id, count, "diagnosis installed");
                self.publish_phase(&state);
                self.notifications
                    .show(
                        NotificationKind::Info,
                        format!("Diagnosis ready: {count} candidate(s), top {summary}."),
                    )
                    .await;
                IntentOutcome::Applied
            }
            Err(err) => {
                warn!(case_id = %handle.case_id, error = %err, "result poll failed");
                self.notifications
                    .show(NotificationKind::Error, poll_failure_message(&err))
                    .await;
                IntentOutcome::Failed
            }
        }
    }

    pub async fn wait_for_result(
        self: &Arc<Self>,
        attempts: u32,
        interval: Duration,
    ) -> IntentOutcome {
        let attempts = attempts.max(1);
        let case_id = self.phase().await.case_id();
        let mut outcome = IntentOutcome::Rejected(RejectReason::NoActiveCase);
        for attempt in 1..=attempts {
            outcome = self.check_result().await;
            if outcome != IntentOutcome::Applied {
                return outcome;
            }
            match self.phase().await {
                WorkflowPhase::AwaitingResult { case_id: current } if Some(current) == case_id => {}
                _ => return outcome,
            }
            if attempt < attempts {
                debug!(attempt, attempts, "result pending; waiting before next poll");
                tokio::time::sleep(interval).await;
            }
        }
        outcome
    }

    pub async fn select_candidate(&self, disease: &str) -> IntentOutcome {
        let mut state = self.state.lock().await;
        if state.feedback != FeedbackStatus::NotSent {
            return IntentOutcome::Rejected(RejectReason::Busy);
        }
        let Some(selection) = state.diagnosis.as_mut() else {
            return IntentOutcome::Rejected(RejectReason::NotDiagnosed);
        };
        if !selection.select(disease) {
            debug!(disease, "ignoring selection of unknown candidate");
            return IntentOutcome::Rejected(RejectReason::UnknownCandidate);
        }
        self.publish_phase(&state);
        IntentOutcome::Applied
    }

    /// At most one successful feedback per case; a success schedules the reset.
    pub async fn give_feedback(self: &Arc<Self>, accepted: bool) -> IntentOutcome {
        let (epoch, handle, candidate) = {
            let mut state = self.state.lock().await;
            if state.feedback != FeedbackStatus::NotSent {
                debug!("duplicate feedback intent ignored");
                return IntentOutcome::Rejected(RejectReason::FeedbackAlreadySent);
            }
            if state.submitting || state.poll_in_flight {
                return IntentOutcome::Rejected(RejectReason::Busy);
            }
            let Some(handle) = state.handle else {
                self.notifications
                    .show(NotificationKind::Error, "Submit a case first.")
                    .await;
                return IntentOutcome::Rejected(RejectReason::NoActiveCase);
            };
            let Some(candidate) = state
                .diagnosis
                .as_ref()
                .and_then(|selection| selection.current().cloned())
            else {
                self.notifications
                    .show(NotificationKind::Error, "Choose a diagnosis first.")
                    .await;
                return IntentOutcome::Rejected(RejectReason::NoSelection);
            };
            state.feedback = FeedbackStatus::InFlight {
                disease: candidate.disease.clone(),
                accepted,
            };
            self.publish_phase(&state);
            (state.epoch, handle, candidate)
        };

        info!(case_id = %handle.case_id, disease = %candidate.disease, accepted, "sending feedback");
        let workflow = Arc::clone(self);
        self.detach(epoch, async move {
            let result = workflow
                .backend
                .send_feedback(&handle, &candidate, accepted)
                .await;
            workflow
                .complete_feedback(epoch, handle, candidate, accepted, result)
                .await
        })
        .await
    }

    async fn complete_feedback(
        self: &Arc<Self>,
        epoch: u64,
        handle: CaseHandle,
        candidate: CandidateDiagnosis,
        accepted: bool,
        result: Result<FeedbackAck, FeedbackError>,
    ) -> IntentOutcome {
        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            debug!(case_id = %handle.case_id, epoch, "discarding stale feedback response");
            return IntentOutcome::Stale;
        }
        match result {
            Ok(_) => {
                state.feedback = FeedbackStatus::Sent;
                self.publish_phase(&state);
                let text = if accepted {
                    format!("Diagnosis '{}' accepted. Thank you for confirming.", candidate.disease)
                } else {
                    format!("Diagnosis '{}' rejected. Thank you for the feedback.", candidate.disease)
                };
                self.notifications
                    .show(NotificationKind::Success, text)
                    .await;
                self.schedule_reset(epoch);
                IntentOutcome::Applied
            }
            Err(err) => {
                warn!(case_id = %handle.case_id, error = %err, "feedback dispatch failed");
                state.feedback = FeedbackStatus::NotSent;
                self.publish_phase(&state);
                self.notifications
                    .show(NotificationKind::Error, "Failed to send feedback.")
                    .await;
                IntentOutcome::Failed
            }
        }
    }

    fn schedule_reset(self: &Arc<Self>, epoch: u64) {
        let workflow: Weak<Self> = Arc::downgrade(self);
        let delay = self.config.reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(workflow) = workflow.upgrade() {
                workflow.finish_reset(epoch).await;
            }
        });
    }

    async fn finish_reset(&self, epoch: u64) {
        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            return;
        }
        let case_id = state.handle.map(|handle| handle.case_id);
        state.discard_case();
        info!(case_id = ?case_id, "case workflow reset");
        self.publish_phase(&state);
    }

    pub async fn fetch_stats(&self) -> Option<FeedbackStats> {
        match self.backend.stats().await {
            Ok(stats) => Some(stats),
            Err(err) => {
                warn!(error = %err, "feedback statistics unavailable");
                self.notifications
                    .show(
                        NotificationKind::Error,
                        "Failed to load feedback statistics.",
                    )
                    .await;
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
