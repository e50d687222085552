/*!
 * Diagnoser Controller
 *
 * Drives one tracing session per benchmark case through the host-signal
 * sequence and owns the results table for the whole run.
 *
 * # Provider toggling
 *
 * The runtime provider is armed before the target process starts, silenced
 * while the harness sets up, and re-armed for the actual run. Window markers
 * on the engine provider then gate what is counted.
 *
 * # Failure handling
 *
 * Failures to open a session or configure a provider skip the case and
 * record it as unavailable. A stream fault closes the session from the pump
 * thread and marks the case unavailable. Only a session that cannot be
 * released is returned as an error.
 */

use super::aggregator::AllocationAggregator;
use super::config::DiagnoserConfig;
use super::gate::MeasurementWindowGate;
use super::handlers::attach_allocation_handlers;
use super::results::{CaseResult, ResultsTable, UnavailableReason};
use super::signals::{BenchmarkCaseId, DiagnoserActionParameters, HostSignal, ProcessInfo, RunMode};
use super::state::DiagnoserState;
use crate::core::errors::{DiagnoserError, DiagnoserResult};
use crate::core::guard::{CancellationRegistry, PumpGuard};
use crate::core::limits::{DIAGNOSER_ID, PUMP_THREAD_PREFIX};
use crate::monitoring::{span_case, CaseSpan};
use crate::session::backend::TraceBackend;
use crate::session::provider::{
    Keywords, ProviderConfig, ProviderId, ProviderOptions, TraceLevel,
};
use crate::session::{EventArchive, TracingSession};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Fault reported by the pump thread, if any
type FaultSlot = Arc<Mutex<Option<DiagnoserError>>>;

/// Per-case resources, recreated for every case
struct CaseRun {
    session: Arc<TracingSession>,
    aggregator: Arc<AllocationAggregator>,
    gate: Arc<MeasurementWindowGate>,
    runtime: ProviderConfig,
    pump: Option<PumpGuard>,
    fault: FaultSlot,
}

struct ActiveCase {
    id: BenchmarkCaseId,
    display_info: String,
    span: CaseSpan,
    run: CaseRun,
}

/// Allocation diagnoser driven by harness host signals
pub struct DiagnoserController {
    backend: Arc<dyn TraceBackend>,
    config: DiagnoserConfig,
    cancellation: CancellationRegistry,
    state: DiagnoserState,
    active: Option<ActiveCase>,
    archive: Option<EventArchive>,
    results: ResultsTable,
}

impl DiagnoserController {
    pub fn new<B>(backend: B) -> Self
    where
        B: TraceBackend + 'static,
    {
        Self::from_shared(Arc::new(backend))
    }

    pub fn from_shared(backend: Arc<dyn TraceBackend>) -> Self {
        Self {
            backend,
            config: DiagnoserConfig::default(),
            cancellation: CancellationRegistry::new(),
            state: DiagnoserState::Idle,
            active: None,
            archive: None,
            results: ResultsTable::new(),
        }
    }

    pub fn with_config(mut self, config: DiagnoserConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an interrupt registry, e.g. one wired to Ctrl+C
    pub fn with_cancellation(mut self, registry: CancellationRegistry) -> Self {
        self.cancellation = registry;
        self
    }

    #[inline]
    pub fn config(&self) -> &DiagnoserConfig {
        &self.config
    }

    #[inline]
    pub fn cancellation_registry(&self) -> &CancellationRegistry {
        &self.cancellation
    }

    pub fn ids(&self) -> Vec<&'static str> {
        vec![DIAGNOSER_ID]
    }

    pub fn run_mode(&self) -> RunMode {
        RunMode::ExtraRun
    }

    /// Current lifecycle state
    pub fn state(&self) -> DiagnoserState {
        match &self.active {
            Some(active) if active.run.session.was_cancelled() => DiagnoserState::Stopped,
            Some(active)
                if self.state == DiagnoserState::ProvidersArmed && active.run.gate.is_open() =>
            {
                DiagnoserState::Collecting
            }
            _ => self.state,
        }
    }

    /// Handle one host signal
    ///
    /// Returns `Err` only for fatal failures; everything else is recorded
    /// against the case.
    pub fn handle(
        &mut self,
        signal: HostSignal,
        parameters: &DiagnoserActionParameters,
    ) -> DiagnoserResult<()> {
        self.reap_cancelled();

        if signal == HostSignal::AfterAll {
            return self.finish_run();
        }

        if self.state.transition(signal).is_none() {
            debug!(signal = %signal, state = %self.state, "host signal ignored");
            return Ok(());
        }

        match signal {
            HostSignal::BeforeProcessStart => self.start_case(parameters),
            HostSignal::BeforeAnythingElse => self.silence_runtime(),
            HostSignal::BeforeActualRun => self.arm_runtime(),
            HostSignal::AfterActualRun => self.stop_case(),
            _ => Ok(()),
        }
    }

    /// Result for a case; `None` until the case has stopped
    pub fn get_results(&self, id: &BenchmarkCaseId) -> Option<CaseResult> {
        if let Some(active) = &self.active {
            if &active.id == id && active.run.session.was_cancelled() {
                return Some(CaseResult::Unavailable(UnavailableReason::Cancelled));
            }
        }
        self.results.get(id).cloned()
    }

    #[inline]
    pub fn results(&self) -> &ResultsTable {
        &self.results
    }

    /// Deliver an external interrupt and finalize the in-flight case
    pub fn cancel(&mut self) -> usize {
        let hooks = self.cancellation.trigger();
        self.reap_cancelled();
        hooks
    }

    pub fn display_results(&self) {
        self.results.display_results();
    }

    fn start_case(&mut self, parameters: &DiagnoserActionParameters) -> DiagnoserResult<()> {
        let case = &parameters.case;
        let id = case.id();
        let session_name = case.session_name(&self.config.session_name_prefix);
        let span = span_case(&case.display_info, &session_name);

        let launched = {
            let _entered = span.enter();
            self.launch(&session_name, &parameters.process)
        };

        match launched {
            Ok(run) => {
                self.active = Some(ActiveCase {
                    id,
                    display_info: case.display_info.clone(),
                    span,
                    run,
                });
                self.state = DiagnoserState::SessionOpen;
                Ok(())
            }
            Err(e) => {
                span.record_outcome("unavailable");
                self.state = DiagnoserState::Stopped;
                self.results.insert(
                    id,
                    case.display_info.clone(),
                    CaseResult::Unavailable(UnavailableReason::from(&e)),
                );
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(session = %session_name, error = %e, "skipping benchmark case");
                Ok(())
            }
        }
    }

    /// Open the session, wire handlers, enable providers, start the pump
    fn launch(&mut self, session_name: &str, process: &ProcessInfo) -> DiagnoserResult<CaseRun> {
        let session = Arc::new(TracingSession::open_with_attempts(
            self.backend.as_ref(),
            session_name,
            self.config.max_release_attempts,
        )?);
        session.register_cancellation(&self.cancellation);

        let aggregator = Arc::new(AllocationAggregator::new());
        let gate = Arc::new(MeasurementWindowGate::new());
        let stream = session.event_stream();
        attach_allocation_handlers(&stream, Arc::clone(&aggregator), Arc::clone(&gate));
        if let Some(archive) = self.archive() {
            archive.attach(&stream);
        }

        let runtime = self.runtime_config(process);
        if let Err(e) = self.enable_providers(&session, &runtime) {
            session.close()?;
            return Err(e);
        }

        let fault: FaultSlot = Arc::new(Mutex::new(None));
        let pump_session = Arc::clone(&session);
        let pump_fault = Arc::clone(&fault);
        let spawned = PumpGuard::spawn(
            format!("{}-{}", PUMP_THREAD_PREFIX, session_name),
            move || {
                let outcome = pump_session.process();
                if let Err(e) = &outcome {
                    *pump_fault.lock() = Some(e.clone());
                    if let Err(close_err) = pump_session.close() {
                        error!(error = %close_err, "could not close session after stream fault");
                    }
                }
                outcome
            },
        );

        let pump = match spawned {
            Ok(pump) => pump,
            Err(e) => {
                session.close()?;
                return Err(DiagnoserError::StreamProcessingFault(format!(
                    "failed to start event pump: {}",
                    e
                )));
            }
        };
        pump.wait_until_started(self.config.startup_poll_interval);
        debug!(session = session_name, "event pump running");

        Ok(CaseRun {
            session,
            aggregator,
            gate,
            runtime,
            pump: Some(pump),
            fault,
        })
    }

    fn runtime_config(&self, process: &ProcessInfo) -> ProviderConfig {
        let mut options = ProviderOptions::new();
        if self.config.stacks_enabled {
            options = options.with_stacks();
        }
        if let Some(name) = process.executable_name() {
            options = options.with_process_name(name);
        }

        ProviderConfig::new(
            ProviderId::Runtime,
            self.config.verbosity,
            self.config.allocation_keywords,
        )
        .with_options(options)
    }

    fn enable_providers(
        &self,
        session: &TracingSession,
        runtime: &ProviderConfig,
    ) -> DiagnoserResult<()> {
        session.enable_provider(ProviderConfig::new(
            ProviderId::Engine,
            TraceLevel::Informational,
            Keywords::ALL,
        ))?;
        if self.config.enable_image_load {
            session.enable_provider(ProviderConfig::new(
                ProviderId::KernelImageLoad,
                TraceLevel::Informational,
                Keywords::IMAGE_LOAD,
            ))?;
        }
        session.enable_provider(runtime.clone())
    }

    /// Shared run-wide archive, created on first use
    fn archive(&mut self) -> Option<EventArchive> {
        if self.archive.is_none() {
            let path = self.config.archive_path.as_ref()?;
            match EventArchive::create(path) {
                Ok(archive) => self.archive = Some(archive),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "event archive disabled");
                    self.config.archive_path = None;
                }
            }
        }
        self.archive.clone()
    }

    /// Whether the pump already faulted and closed the session
    fn stream_faulted(&self) -> bool {
        self.active
            .as_ref()
            .map(|active| active.run.fault.lock().is_some())
            .unwrap_or(false)
    }

    /// Record a case whose pump faulted before the actual run stopped
    fn end_faulted_case(&mut self) -> DiagnoserResult<()> {
        self.state = DiagnoserState::Stopped;
        match self.active.take() {
            Some(active) => {
                let closed = active.run.session.close();
                self.finalize(active, None);
                closed
            }
            None => Ok(()),
        }
    }

    fn silence_runtime(&mut self) -> DiagnoserResult<()> {
        if self.stream_faulted() {
            return self.end_faulted_case();
        }
        let outcome = match &self.active {
            Some(active) => active.run.session.disable_provider(ProviderId::Runtime),
            None => return Ok(()),
        };
        match outcome {
            Ok(()) => Ok(()),
            Err(e) => self.abort_case(e),
        }
    }

    fn arm_runtime(&mut self) -> DiagnoserResult<()> {
        if self.stream_faulted() {
            return self.end_faulted_case();
        }
        let outcome = match &self.active {
            Some(active) => active.run.session.enable_provider(active.run.runtime.clone()),
            None => return Ok(()),
        };
        match outcome {
            Ok(()) => {
                self.state = DiagnoserState::ProvidersArmed;
                Ok(())
            }
            Err(e) => self.abort_case(e),
        }
    }

    fn stop_case(&mut self) -> DiagnoserResult<()> {
        let active = match self.active.take() {
            Some(active) => active,
            None => {
                self.state = DiagnoserState::Stopped;
                return Ok(());
            }
        };

        // Absorb delivery latency before cutting the stream
        std::thread::sleep(self.config.grace_period);
        let closed = active.run.session.close();
        self.finalize(active, None);
        self.state = DiagnoserState::Stopped;
        closed
    }

    /// End the in-flight case after a case-local failure
    fn abort_case(&mut self, cause: DiagnoserError) -> DiagnoserResult<()> {
        warn!(error = %cause, "aborting benchmark case");
        self.state = DiagnoserState::Stopped;
        match self.active.take() {
            Some(active) => {
                let closed = active.run.session.close();
                self.finalize(active, Some(UnavailableReason::from(&cause)));
                closed
            }
            None => Ok(()),
        }
    }

    fn finish_run(&mut self) -> DiagnoserResult<()> {
        match self.active.take() {
            Some(active) => {
                warn!(case = %active.id, "run ended with an open tracing session");
                self.state = DiagnoserState::Stopped;
                let closed = active.run.session.close();
                self.finalize(active, Some(UnavailableReason::Abandoned));
                closed
            }
            None => Ok(()),
        }
    }

    /// Finalize a case whose session was closed by an interrupt
    fn reap_cancelled(&mut self) {
        let cancelled = self
            .active
            .as_ref()
            .map(|active| active.run.session.was_cancelled())
            .unwrap_or(false);

        if cancelled {
            if let Some(active) = self.active.take() {
                self.finalize(active, None);
                self.state = DiagnoserState::Stopped;
            }
        }
    }

    /// Join the pump and record the case result
    fn finalize(&mut self, active: ActiveCase, forced: Option<UnavailableReason>) {
        let ActiveCase {
            id,
            display_info,
            span,
            mut run,
        } = active;

        // A pump on an unreleased session never returns; leave it detached
        let pump_outcome = match run.pump.take() {
            Some(pump) if run.session.is_closed() => pump.join(),
            _ => Ok(()),
        };

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.flush() {
                warn!(error = %e, "failed to flush event archive");
            }
        }

        let fault = run.fault.lock().take().or(pump_outcome.err());
        // A stream fault is the root cause of any later provider failure
        let result = if run.session.was_cancelled() {
            CaseResult::Unavailable(UnavailableReason::Cancelled)
        } else if let Some(err) = fault {
            CaseResult::Unavailable(UnavailableReason::from(&err))
        } else if let Some(reason) = forced {
            CaseResult::Unavailable(reason)
        } else if !run.session.is_closed() {
            CaseResult::Unavailable(UnavailableReason::ReleaseFailed(format!(
                "session '{}' is still open",
                run.session.name()
            )))
        } else {
            CaseResult::Available(run.aggregator.snapshot())
        };

        {
            let _entered = span.enter();
            match &result {
                CaseResult::Available(rows) => {
                    span.record_outcome("available");
                    info!(
                        case = %id,
                        types = rows.len(),
                        windows = run.gate.windows_opened(),
                        "allocation profile collected"
                    );
                }
                CaseResult::Unavailable(reason) => {
                    span.record_outcome("unavailable");
                    warn!(case = %id, reason = %reason, "allocation profile unavailable");
                }
            }
        }

        self.results.insert(id, display_info, result);
    }
}

impl Drop for DiagnoserController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            if let Err(e) = active.run.session.close() {
                error!(case = %active.id, error = %e, "failed to release session on shutdown");
            }
            self.finalize(active, Some(UnavailableReason::Abandoned));
        }
    }
}

impl std::fmt::Debug for DiagnoserController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnoserController")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .field("active_case", &self.active.as_ref().map(|a| a.id.as_str()))
            .field("cases", &self.results.len())
            .finish()
    }
}
