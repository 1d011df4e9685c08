//! Workload Runner: sequences top-level phases, owns the clock origin,
//! propagates abort between phases, and hands the frozen history to the
//! Checker Pipeline once every phase has returned.

use crate::abort::AbortSignal;
use crate::checkers::CheckerPipeline;
use crate::clock::WorkloadClock;
use crate::config::EngineConfig;
use crate::ensemble::Ensemble;
use crate::history::{ActiveHistories, History};
use crate::registry::ResolvedWorkload;
use crate::scheduler::{run_group, SchedulerContext};
use crate::ui::PhaseProgress;
use crate::verdict::ExitVerdict;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

pub struct WorkloadRunner {
    ensemble: Arc<Ensemble>,
    config: Arc<EngineConfig>,
    abort: AbortSignal,
    ui: Option<Arc<PhaseProgress>>,
}

impl WorkloadRunner {
    pub fn new(ensemble: Ensemble, config: EngineConfig) -> Self {
        Self { ensemble: Arc::new(ensemble), config: Arc::new(config), abort: AbortSignal::new(), ui: None }
    }

    /// Attach a phase-progress display driven by this run (optional, for
    /// interactive CLI use — headless callers never set this).
    pub fn with_ui(mut self, ui: Arc<PhaseProgress>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// A handle callers can use to request abort from outside the run.
    pub fn abort_handle(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Run a resolved workload to completion: iterate phases sequentially,
    /// checking the abort flag between each (refusing to launch further
    /// phases once it is set), then evaluate the checker pipeline against
    /// the frozen history.
    pub async fn run(&self, workload: ResolvedWorkload) -> (Vec<crate::history::Operation>, ExitVerdict) {
        let clock = WorkloadClock::start();
        let history = Arc::new(History::new());
        let histories = ActiveHistories::with_primary(history.clone());

        let ctx = SchedulerContext {
            ensemble: self.ensemble.clone(),
            histories,
            clock: clock.clone(),
            abort: self.abort.clone(),
            concurrency: Arc::new(Semaphore::new(self.config.max_in_flight_tasks)),
            config: self.config.clone(),
        };

        let mut aborted = false;
        for (index, group) in workload.phases.into_iter().enumerate() {
            if self.abort.is_aborted() {
                info!(phase = index, "abort set, refusing to launch further phases");
                aborted = true;
                break;
            }
            if let Some(ui) = &self.ui {
                ui.start_phase(index);
            }
            run_group(group, ctx.clone()).await;
            if let Some(ui) = &self.ui {
                ui.phase_done();
            }
        }
        if self.abort.is_aborted() {
            aborted = true;
        }

        let frozen = history.snapshot();
        let pipeline = CheckerPipeline::new(workload.checkers, workload.artifact_checkers);
        let pipeline_verdict = pipeline.evaluate(&frozen, &self.config.artifact_dir);

        let verdict = ExitVerdict::from_pipeline(pipeline_verdict, frozen.len(), clock.now_ns(), aborted);
        if let Some(ui) = &self.ui {
            if aborted {
                ui.aborted();
            } else {
                ui.finish(verdict.is_pass());
            }
        }
        (frozen, verdict)
    }
}
