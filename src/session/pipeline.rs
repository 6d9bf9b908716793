//! Session Pipeline
//!
//! Drives frames through OCR, grouping and matching, one pass at a time.
//!
//! `SessionPipeline` is the single owner of the scan session. Each accepted
//! frame becomes a pass running on its own tokio task with its own
//! cancellation token; a newer accepted frame cancels the pass in flight, and
//! a cancelled pass can never reach the merge because its result channel is
//! dropped with it. Merging happens only on the owner, in `finish_pass`.
//!
//! ```text
//! Idle -> Scanning -> (Processing <-> Scanning) -> Stopped
//! ```

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{RecognizedWine, ScanSession};
use crate::capture::{CameraAuthorization, CameraEvent, CapturedFrame};
use crate::config::PipelineConfig;
use crate::error::{Result, ScanError};
use crate::matching::{MatchQuery, Matcher};
use crate::shared::{RuntimeState, SessionEvent};
use crate::vision::{CandidateGrouper, VisionPipeline};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// Not started yet
    #[default]
    Idle,
    /// Waiting for the next frame
    Scanning,
    /// A pass is in flight
    Processing,
    /// Stopped by the user or a camera failure
    Stopped,
}

impl ScanState {
    pub fn is_active(&self) -> bool {
        matches!(self, ScanState::Scanning | ScanState::Processing)
    }
}

/// What happened to a submitted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    /// A new pass started for the frame
    Started { generation: u64 },
    /// Dropped: the minimum interval since the last pass has not elapsed
    Throttled,
    /// Dropped: not scanning
    Ignored,
}

/// What a merged pass contributed to the session
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub generation: u64,
    /// Frame sequence number
    pub sequence: u64,
    /// Entries new to the session
    pub added: Vec<RecognizedWine>,
    /// Admitted candidates without a match
    pub unresolved: Vec<RecognizedWine>,
    /// The recognizer failed on this frame
    pub recognition_failed: bool,
}

/// Read-only view of the session's matches, shareable across threads
#[derive(Debug, Clone, Default)]
pub struct MatchSnapshot(Arc<RwLock<Vec<RecognizedWine>>>);

impl MatchSnapshot {
    /// Copy of the current matches
    pub fn current(&self) -> Vec<RecognizedWine> {
        self.0.read().clone()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    fn replace(&self, wines: &[RecognizedWine]) {
        *self.0.write() = wines.to_vec();
    }
}

/// Result of a pass before it is merged
#[derive(Debug)]
struct PassOutcome {
    sequence: u64,
    matches: Vec<RecognizedWine>,
    unresolved: Vec<RecognizedWine>,
    recognition_failed: bool,
    elapsed: Duration,
}

/// Collaborators shared by every pass
struct PassContext {
    vision: VisionPipeline,
    grouper: CandidateGrouper,
    matcher: Matcher,
}

struct InFlight {
    generation: u64,
    sequence: u64,
    cancel: CancellationToken,
    result: oneshot::Receiver<Option<PassOutcome>>,
}

/// Owner of one scanning session
pub struct SessionPipeline {
    ctx: Arc<PassContext>,
    config: PipelineConfig,
    state: ScanState,
    session: ScanSession,
    snapshot: MatchSnapshot,
    runtime: Arc<RwLock<RuntimeState>>,
    subscribers: Vec<Sender<SessionEvent>>,
    in_flight: Option<InFlight>,
    last_pass_started: Option<Instant>,
    next_generation: u64,
}

impl SessionPipeline {
    /// Build a pipeline from constructed collaborators
    pub fn new(
        vision: VisionPipeline,
        grouper: CandidateGrouper,
        matcher: Matcher,
        config: PipelineConfig,
    ) -> Self {
        Self {
            ctx: Arc::new(PassContext {
                vision,
                grouper,
                matcher,
            }),
            config,
            state: ScanState::Idle,
            session: ScanSession::new(),
            snapshot: MatchSnapshot::default(),
            runtime: Arc::new(RwLock::new(RuntimeState::default())),
            subscribers: Vec::new(),
            in_flight: None,
            last_pass_started: None,
            next_generation: 0,
        }
    }

    /// Continue an existing session (e.g., one with a location attached)
    pub fn with_session(mut self, session: ScanSession) -> Self {
        self.snapshot.replace(&session.wines);
        self.session = session;
        self
    }

    /// Receive change notifications
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Snapshot of the accumulated matches
    pub fn current_matches(&self) -> Vec<RecognizedWine> {
        self.snapshot.current()
    }

    /// Shareable handle to the match snapshot
    pub fn snapshot(&self) -> MatchSnapshot {
        self.snapshot.clone()
    }

    /// Copy of the runtime state
    pub fn runtime_state(&self) -> RuntimeState {
        self.runtime.read().clone()
    }

    /// Shareable handle to the runtime state
    pub fn runtime_handle(&self) -> Arc<RwLock<RuntimeState>> {
        Arc::clone(&self.runtime)
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn into_session(self) -> ScanSession {
        self.session
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.is_some()
    }

    fn emit(&mut self, event: SessionEvent) {
        // Drop subscribers that went away
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_state(&mut self, state: ScanState) {
        self.state = state;
        self.runtime.write().scan_state = state;
    }

    /// Start scanning once the camera reports its authorization.
    ///
    /// A stopped session can be restarted and keeps its entries.
    pub fn start(&mut self, authorization: CameraAuthorization) -> Result<()> {
        if self.state.is_active() {
            return Err(ScanError::InvalidState("already scanning".to_string()));
        }
        if let Some(err) = authorization.into_error() {
            self.surface_camera_error(&err);
            return Err(err);
        }

        self.runtime.write().camera_error = None;
        self.set_state(ScanState::Scanning);
        info!("Scanning started ({} wines in session)", self.session.len());
        self.emit(SessionEvent::Started);
        Ok(())
    }

    /// Submit a camera frame now
    pub fn submit_frame(&mut self, frame: CapturedFrame) -> FrameDecision {
        self.submit_frame_at(frame, Instant::now())
    }

    /// Submit a camera frame observed at `now`.
    ///
    /// Must be called inside a tokio runtime; accepted frames spawn a pass.
    pub fn submit_frame_at(&mut self, frame: CapturedFrame, now: Instant) -> FrameDecision {
        self.runtime.write().frames_received += 1;

        if !self.state.is_active() {
            return FrameDecision::Ignored;
        }

        if let Some(last) = self.last_pass_started {
            if now.saturating_duration_since(last) < self.config.frame_interval() {
                self.runtime.write().frames_throttled += 1;
                return FrameDecision::Throttled;
            }
        }

        self.cancel_in_flight();

        let generation = self.next_generation;
        self.next_generation += 1;
        let sequence = frame.sequence;

        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let ctx = Arc::clone(&self.ctx);
        let token = cancel.clone();
        tokio::spawn(async move {
            let outcome = run_pass(&ctx, frame, &token).await;
            // Receiver is gone when the pass was superseded
            let _ = tx.send(outcome);
        });

        debug!("Pass {} started for frame {}", generation, sequence);
        self.in_flight = Some(InFlight {
            generation,
            sequence,
            cancel,
            result: rx,
        });
        self.last_pass_started = Some(now);
        self.runtime.write().passes_started += 1;
        self.set_state(ScanState::Processing);

        FrameDecision::Started { generation }
    }

    fn cancel_in_flight(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                in_flight.cancel.cancel();
                self.runtime.write().passes_cancelled += 1;
                debug!(
                    "Pass {} for frame {} cancelled",
                    in_flight.generation, in_flight.sequence
                );
                true
            }
            None => false,
        }
    }

    /// Wait for the pass in flight and merge its results.
    ///
    /// Pending forever when nothing is in flight, so it can sit in a
    /// `select!` next to the camera feed. Cancel safe: dropping the future
    /// before it resolves leaves the pass in flight.
    pub async fn finish_pass(&mut self) -> Option<PassReport> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return std::future::pending().await;
        };
        let received = (&mut in_flight.result).await;
        let in_flight = self.in_flight.take()?;

        if self.state == ScanState::Processing {
            self.set_state(ScanState::Scanning);
        }

        match received {
            Ok(Some(outcome)) if !in_flight.cancel.is_cancelled() => {
                Some(self.apply_outcome(in_flight.generation, outcome))
            }
            Ok(_) => None,
            Err(_) => {
                error!("Pass {} ended without a result", in_flight.generation);
                None
            }
        }
    }

    /// Finish the pass in flight, if any
    pub async fn drain(&mut self) -> Option<PassReport> {
        if self.in_flight.is_some() {
            self.finish_pass().await
        } else {
            None
        }
    }

    fn apply_outcome(&mut self, generation: u64, outcome: PassOutcome) -> PassReport {
        let matched = outcome.matches.len();
        let added = self.session.merge(outcome.matches);

        {
            let mut runtime = self.runtime.write();
            runtime.passes_completed += 1;
            if outcome.recognition_failed {
                runtime.recognition_failures += 1;
            }
        }

        if !added.is_empty() {
            self.snapshot.replace(&self.session.wines);
            for wine in &added {
                if let Some(record) = &wine.matched_wine {
                    info!(
                        "New wine: {} (score {}, confidence {:.2})",
                        record.display_name(),
                        record.score,
                        wine.match_confidence
                    );
                }
            }
            self.emit(SessionEvent::MatchesAdded {
                wines: added.clone(),
                total: self.session.len(),
            });
        }

        self.emit(SessionEvent::FrameProcessed {
            sequence: outcome.sequence,
            matched,
            unresolved: outcome.unresolved.clone(),
            elapsed_ms: outcome.elapsed.as_millis() as u64,
        });

        self.refresh_recognizer_health();

        PassReport {
            generation,
            sequence: outcome.sequence,
            added,
            unresolved: outcome.unresolved,
            recognition_failed: outcome.recognition_failed,
        }
    }

    /// Mirror recognizer degradation into runtime state, notifying once each
    fn refresh_recognizer_health(&mut self) {
        let health = self.ctx.vision.health();
        let (newly_degraded, newly_faulted) = {
            let mut runtime = self.runtime.write();
            let newly_degraded = health.is_degraded() && !runtime.ocr_degraded;
            let newly_faulted = health.faulted && !runtime.recognizer_faulted;
            runtime.ocr_degraded |= health.is_degraded();
            runtime.recognizer_faulted |= health.faulted;
            if newly_faulted {
                runtime.set_error("Text recognition keeps failing");
            }
            (newly_degraded, newly_faulted)
        };

        if newly_degraded {
            warn!("Text recognition degraded to fast mode; scanning continues");
            self.emit(SessionEvent::OcrDegraded);
        }
        if newly_faulted {
            self.emit(SessionEvent::RecognizerFaulted);
        }
    }

    /// Stop scanning and cancel the pass in flight. Entries are kept.
    pub fn stop(&mut self) {
        if !self.state.is_active() {
            return;
        }
        self.cancel_in_flight();
        self.set_state(ScanState::Stopped);
        info!("Scanning stopped with {} wines in session", self.session.len());
        self.emit(SessionEvent::Stopped);
    }

    /// The camera failed while scanning
    pub fn camera_failed(&mut self, err: ScanError) {
        self.surface_camera_error(&err);
        self.stop();
    }

    fn surface_camera_error(&mut self, err: &ScanError) {
        error!("Camera failure: {}", err);
        {
            let mut runtime = self.runtime.write();
            runtime.camera_error = Some(err.to_string());
            runtime.set_error(err.to_string());
        }
        self.emit(SessionEvent::CameraFailed(err.to_string()));
    }

    /// Discard all session entries
    pub fn clear_session(&mut self) {
        self.session.clear();
        self.snapshot.replace(&[]);
        info!("Session cleared");
        self.emit(SessionEvent::Cleared);
    }
}

/// One OCR -> group -> match pass, checking for cancellation between stages
/// and around every suspension point
async fn run_pass(
    ctx: &PassContext,
    frame: CapturedFrame,
    cancel: &CancellationToken,
) -> Option<PassOutcome> {
    let start = Instant::now();
    if cancel.is_cancelled() {
        return None;
    }

    let recognized = tokio::select! {
        biased;
        _ = cancel.cancelled() => return None,
        result = ctx.vision.process(&frame) => result,
    };
    if cancel.is_cancelled() {
        return None;
    }

    let (fragments, recognition_failed) = match recognized {
        Ok(result) => (result.fragments, false),
        Err(e) => {
            debug!("Frame {} produced nothing: {}", frame.sequence, e);
            (Vec::new(), true)
        }
    };

    let candidates = ctx.grouper.admitted(&fragments);
    if cancel.is_cancelled() {
        return None;
    }

    let mut matches = Vec::new();
    let mut unresolved = Vec::new();

    for candidate in &candidates {
        let query = MatchQuery::from_candidate(candidate);
        let mut result = ctx.matcher.match_local(&query);
        if cancel.is_cancelled() {
            return None;
        }

        if result.is_none() && ctx.matcher.has_remote() {
            result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                found = ctx.matcher.search_remote(&query) => found,
            };
            if cancel.is_cancelled() {
                return None;
            }
        }

        match result {
            Some(found) => matches.push(RecognizedWine::from_match(candidate, found)),
            None => unresolved.push(RecognizedWine::unresolved(candidate)),
        }
    }

    let elapsed = start.elapsed();
    debug!(
        "Frame {} processed in {:?}: {} fragments, {} candidates, {} matched",
        frame.sequence,
        elapsed,
        fragments.len(),
        candidates.len(),
        matches.len()
    );

    Some(PassOutcome {
        sequence: frame.sequence,
        matches,
        unresolved,
        recognition_failed,
        elapsed,
    })
}

/// Drive a started pipeline from a camera feed until it closes, fails or
/// `shutdown` is cancelled. Returns the pipeline so the caller can read or
/// save the session.
///
/// A closed feed lets the pass in flight finish unless shutdown arrives
/// first, which cancels it. Camera errors that are not session fatal are
/// logged and the feed keeps going.
pub async fn run_scan_loop(
    mut pipeline: SessionPipeline,
    mut events: mpsc::Receiver<CameraEvent>,
    shutdown: CancellationToken,
) -> SessionPipeline {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                pipeline.stop();
                break;
            }
            _ = pipeline.finish_pass() => {}
            event = events.recv() => match event {
                Some(CameraEvent::Frame(frame)) => {
                    if pipeline.submit_frame(frame) == FrameDecision::Ignored {
                        debug!("Frame ignored, pipeline is {:?}", pipeline.state());
                    }
                }
                Some(CameraEvent::Failed(err)) if err.is_session_fatal() => {
                    pipeline.camera_failed(err);
                    break;
                }
                Some(CameraEvent::Failed(err)) => {
                    warn!("Camera reported {}; scanning continues", err);
                }
                Some(CameraEvent::Closed) | None => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {}
                        _ = pipeline.drain() => {}
                    }
                    // cancels the pass if shutdown won
                    pipeline.stop();
                    break;
                }
            },
        }
    }
    pipeline
}
