//! Phase Scheduler — the core algorithm.
//!
//! Runs the direct children of one sub-phase group concurrently, enforces
//! lifetime rules, and recurses into nested sub-phases. A nested sub-phase
//! is opaque to its parent: from the parent's perspective it is a single
//! child that completes when its own scheduler returns.

use crate::abort::AbortSignal;
use crate::clock::WorkloadClock;
use crate::config::EngineConfig;
use crate::ensemble::Ensemble;
use crate::errors::EngineError;
use crate::history::{ActiveHistories, OpType, Operation, OperationValue};
use crate::module::{Emitter, Lifetime, ModuleInstance, ModuleState, RunToEndMethod};
use crate::resolved::{ResolvedChild, ResolvedGroup, ResolvedPhase};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tracing::{info_span, warn, Instrument};

/// Shared `unfinished_run_once_modules` counter for one sub-phase group.
/// RUN_TO_END_OF_PHASE siblings wait on this, not on each other.
#[derive(Clone)]
struct PhaseBarrier {
    unfinished: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl PhaseBarrier {
    fn new(run_once_count: usize) -> Self {
        Self { unfinished: Arc::new(AtomicUsize::new(run_once_count)), notify: Arc::new(Notify::new()) }
    }

    /// Completion callbacks of a RUN_ONCE module (or an opaque nested phase)
    /// happen-before any observation of the decremented counter.
    fn decrement(&self) {
        let previous = self.unfinished.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            self.notify.notify_waiters();
        }
    }

    fn remaining(&self) -> usize {
        self.unfinished.load(Ordering::SeqCst)
    }

    /// A read-only probe a module can poll via its `Emitter`, without
    /// granting it the ability to decrement the barrier itself.
    fn as_probe(&self) -> crate::module::UnfinishedProbe {
        let unfinished = self.unfinished.clone();
        Arc::new(move || unfinished.load(Ordering::SeqCst))
    }
}

/// Shared, read-only context threaded through every scheduler invocation.
#[derive(Clone)]
pub struct SchedulerContext {
    pub ensemble: Arc<Ensemble>,
    pub histories: ActiveHistories,
    pub clock: WorkloadClock,
    pub abort: AbortSignal,
    pub config: Arc<EngineConfig>,
    /// Bounds how many module tasks run concurrently across the whole
    /// engine, independent of any single phase's fan-out.
    pub concurrency: Arc<Semaphore>,
}

fn per_instance_timeout(instance: &ModuleInstance, config: &EngineConfig) -> Duration {
    match instance.properties.get("timeout_ms").and_then(|v| v.as_u64()) {
        Some(ms) => Duration::from_millis(ms),
        None => config.default_phase_timeout,
    }
}

/// Run one RUN_ONCE module to completion, bracketed by `invoke`/`end`
/// lifecycle markers.
async fn run_run_once(mut instance: ModuleInstance, ctx: SchedulerContext, barrier: PhaseBarrier) {
    run_module_once(&mut instance, &ctx, &barrier).await;
    barrier.decrement();
}

/// Run one RUN_TO_END_OF_PHASE module per its `run_to_end_method`, honoring
/// the per-phase timeout.
async fn run_run_to_end(mut instance: ModuleInstance, ctx: SchedulerContext, barrier: PhaseBarrier) {
    let timeout = per_instance_timeout(&instance, &ctx.config);
    let process_id = instance.instance_name.clone();
    let module_ref = instance.name.clone();

    let body = async {
        match instance.run_to_end_method {
            RunToEndMethod::Manual => {
                // `run` is invoked exactly once; it is the module's own
                // responsibility to poll `Emitter::unfinished_run_once_modules`
                // (backed by this same barrier) and return when appropriate.
                run_module_once(&mut instance, &ctx, &barrier).await;
            }
            RunToEndMethod::Automatic => {
                loop {
                    run_module_body(&mut instance, &ctx, &barrier).await;
                    if barrier.remaining() == 0 || ctx.abort.is_aborted() {
                        break;
                    }
                }
                if instance.module.use_global_setup_teardown() {
                    run_teardown(&mut instance, &ctx).await;
                }
                mark_end(&mut instance, &ctx);
            }
        }
    };

    if tokio::time::timeout(timeout, body).await.is_err() {
        warn!(instance = %process_id, module = %module_ref, "phase timed out");
        ctx.histories.append(Operation::synthetic_error(
            ctx.clock.now_ns(),
            process_id,
            module_ref,
            "timeout",
        ));
    }
}

/// Run a nested sub-phase as a single opaque child of its parent group.
fn run_nested_phase(phase: ResolvedPhase, ctx: SchedulerContext) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        for group in phase {
            if ctx.abort.is_aborted() {
                return;
            }
            run_group(group, ctx.clone()).await;
        }
    })
}

/// Run one sub-phase group: classify its direct children, launch them
/// concurrently, and await them all before returning.
pub fn run_group(group: ResolvedGroup, ctx: SchedulerContext) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let run_once_count = group
            .values()
            .filter(|child| match child {
                ResolvedChild::Module(m) => m.lifetime == Lifetime::RunOnce,
                ResolvedChild::Phase(_) => true,
            })
            .count();

        let barrier = PhaseBarrier::new(run_once_count);
        let mut handles = Vec::with_capacity(group.len());

        for (instance_name, child) in group {
            let ctx = ctx.clone();
            let barrier = barrier.clone();
            let span = info_span!("module", instance = %instance_name);
            match child {
                ResolvedChild::Module(instance) => {
                    let lifetime = instance.lifetime;
                    let concurrency = ctx.concurrency.clone();
                    handles.push(tokio::spawn(
                        async move {
                            let _permit = concurrency.acquire_owned().await;
                            match lifetime {
                                Lifetime::RunOnce => run_run_once(instance, ctx, barrier).await,
                                Lifetime::RunToEndOfPhase => run_run_to_end(instance, ctx, barrier).await,
                            }
                        }
                        .instrument(span),
                    ));
                }
                ResolvedChild::Phase(nested) => {
                    let concurrency = ctx.concurrency.clone();
                    handles.push(tokio::spawn(
                        async move {
                            let _permit = concurrency.acquire_owned().await;
                            run_nested_phase(nested, ctx).await;
                            barrier.decrement();
                        }
                        .instrument(span),
                    ));
                }
            }
        }

        for handle in handles {
            // A hung worker is abandoned best-effort, not forcibly killed; a
            // panicking module task still lets its siblings finish since
            // each handle is awaited independently.
            let _ = handle.await;
        }
    })
}

/// Execute the setup → run → teardown lifecycle exactly once, recording
/// protocol markers and converting any escaping error to a history entry.
async fn run_module_once(instance: &mut ModuleInstance, ctx: &SchedulerContext, barrier: &PhaseBarrier) {
    mark_invoke(instance, ctx);
    let running = Arc::new(AtomicBool::new(false));
    run_setup(instance, ctx).await;
    running.store(true, Ordering::SeqCst);
    instance.state = ModuleState::Running;

    let emitter = make_emitter(instance, ctx, running.clone(), barrier);
    if let Err(message) = run_with_abort_check(instance, ctx, &emitter).await {
        record_module_failure(instance, ctx, message);
    }

    running.store(false, Ordering::SeqCst);
    if emitter.emitted_count() == 0 {
        record_no_emission(instance, ctx);
    }
    run_teardown(instance, ctx).await;
    mark_end(instance, ctx);
}

/// One iteration of an AUTOMATIC RUN_TO_END_OF_PHASE module's loop body —
/// everything `run_module_once` does except `invoke`/`end`, which only
/// happen once, at the loop's edges (see `run_run_to_end`). Setup and
/// teardown run once at the edges too, unless the module opts into
/// per-iteration setup/teardown via `use_global_setup_teardown() == false`.
async fn run_module_body(instance: &mut ModuleInstance, ctx: &SchedulerContext, barrier: &PhaseBarrier) {
    let first_iteration = instance.state == ModuleState::Created;
    let per_iteration_setup_teardown = !instance.module.use_global_setup_teardown();

    if first_iteration {
        mark_invoke(instance, ctx);
    }
    if first_iteration || per_iteration_setup_teardown {
        run_setup(instance, ctx).await;
    }
    instance.state = ModuleState::Running;

    let running = Arc::new(AtomicBool::new(true));
    let emitter = make_emitter(instance, ctx, running.clone(), barrier);
    if let Err(message) = run_with_abort_check(instance, ctx, &emitter).await {
        record_module_failure(instance, ctx, message);
    }
    running.store(false, Ordering::SeqCst);
    if emitter.emitted_count() == 0 {
        record_no_emission(instance, ctx);
    }

    if per_iteration_setup_teardown {
        run_teardown(instance, ctx).await;
    }
}

fn make_emitter(instance: &ModuleInstance, ctx: &SchedulerContext, running: Arc<AtomicBool>, barrier: &PhaseBarrier) -> Emitter {
    Emitter::with_abort_signal(
        ctx.histories.clone(),
        ctx.clock.clone(),
        instance.instance_name.clone(),
        instance.name.clone(),
        running,
        ctx.abort.clone(),
    )
    .with_unfinished_probe(barrier.as_probe())
}

fn mark_invoke(instance: &ModuleInstance, ctx: &SchedulerContext) {
    ctx.histories.append(Operation::new(
        OpType::Invoke,
        ctx.clock.now_ns(),
        instance.instance_name.clone(),
        instance.name.clone(),
        "text/plain",
        OperationValue::None,
    ));
}

fn mark_end(instance: &mut ModuleInstance, ctx: &SchedulerContext) {
    instance.state = ModuleState::Completed;
    ctx.histories.append(Operation::new(
        OpType::End,
        ctx.clock.now_ns(),
        instance.instance_name.clone(),
        instance.name.clone(),
        "text/plain",
        OperationValue::None,
    ));
}

async fn run_setup(instance: &mut ModuleInstance, ctx: &SchedulerContext) {
    match instance.module.setup(&ctx.ensemble, &instance.properties).await {
        Ok(()) => instance.state = ModuleState::SetupOk,
        Err(err) => {
            instance.state = ModuleState::SetupFailed;
            record_module_failure(instance, ctx, err.to_string());
        }
    }
}

async fn run_teardown(instance: &mut ModuleInstance, ctx: &SchedulerContext) {
    if let Err(err) = instance.module.teardown(&ctx.ensemble, &instance.properties).await {
        record_module_failure(instance, ctx, err.to_string());
    }
    instance.state = ModuleState::TornDown;
}

/// Invoke the module's `run`. Responsiveness to abort is the module's own
/// responsibility via `Emitter::is_aborted` — the scheduler does not
/// forcibly race or cancel it.
async fn run_with_abort_check(instance: &mut ModuleInstance, ctx: &SchedulerContext, emitter: &Emitter) -> Result<(), String> {
    instance.module.run(&ctx.ensemble, &instance.properties, emitter).await.map_err(|e| e.to_string())
}

fn record_module_failure(instance: &ModuleInstance, ctx: &SchedulerContext, message: String) {
    let err = EngineError::ModuleFailed { instance: instance.instance_name.clone(), message: message.clone() };
    ctx.histories.append(Operation::synthetic_error(
        ctx.clock.now_ns(),
        instance.instance_name.clone(),
        instance.name.clone(),
        err.as_operation_message(),
    ));
}

fn record_no_emission(instance: &ModuleInstance, ctx: &SchedulerContext) {
    ctx.histories.append(Operation::synthetic_error(
        ctx.clock.now_ns(),
        instance.instance_name.clone(),
        instance.name.clone(),
        EngineError::NoEmission.as_operation_message(),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::History;
    use crate::module::{Module, ModuleInstance, Properties, PropertyValue};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct Noop;
    #[async_trait]
    impl Module for Noop {
        async fn run(&self, _e: &Ensemble, _p: &Properties, emitter: &Emitter) -> anyhow::Result<()> {
            emitter.ok("done")?;
            Ok(())
        }
    }

    struct SilentModule;
    #[async_trait]
    impl Module for SilentModule {
        async fn run(&self, _e: &Ensemble, _p: &Properties, _emitter: &Emitter) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn context() -> SchedulerContext {
        SchedulerContext {
            ensemble: Arc::new(Ensemble::empty("t1")),
            histories: ActiveHistories::with_primary(Arc::new(History::new())),
            clock: WorkloadClock::start(),
            abort: AbortSignal::new(),
            concurrency: Arc::new(Semaphore::new(256)),
            config: Arc::new(EngineConfig::default()),
        }
    }

    #[tokio::test]
    async fn run_once_module_reaches_completed_and_emits_invoke_end() {
        let ctx = context();
        let instance = ModuleInstance::new(
            "noop",
            "m1",
            Properties::new(),
            Lifetime::RunOnce,
            RunToEndMethod::Automatic,
            Arc::new(Noop),
        );
        let mut group: ResolvedGroup = HashMap::new();
        group.insert("m1".to_string(), ResolvedChild::Module(instance));

        run_group(group, ctx.clone()).await;

        let snap = ctx.histories.primary().unwrap().snapshot();
        let types: Vec<_> = snap.iter().map(|o| o.op_type).collect();
        assert_eq!(types.first(), Some(&OpType::Invoke));
        assert_eq!(types.last(), Some(&OpType::End));
        assert!(types.contains(&OpType::Ok));
    }

    #[tokio::test]
    async fn silent_module_gets_synthetic_no_emission_error() {
        let ctx = context();
        let instance = ModuleInstance::new(
            "silent",
            "m1",
            Properties::new(),
            Lifetime::RunOnce,
            RunToEndMethod::Automatic,
            Arc::new(SilentModule),
        );
        let mut group: ResolvedGroup = HashMap::new();
        group.insert("m1".to_string(), ResolvedChild::Module(instance));

        run_group(group, ctx.clone()).await;

        let snap = ctx.histories.primary().unwrap().snapshot();
        let error_op = snap.iter().find(|o| o.op_type == OpType::Error).unwrap();
        assert_eq!(error_op.value.as_str(), Some("No Operations were emitted during run"));
    }

    #[tokio::test]
    async fn phase_with_only_run_to_end_modules_completes_immediately() {
        let ctx = context();
        let instance = ModuleInstance::new(
            "noop",
            "m1",
            Properties::new(),
            Lifetime::RunToEndOfPhase,
            RunToEndMethod::Automatic,
            Arc::new(Noop),
        );
        let mut group: ResolvedGroup = HashMap::new();
        group.insert("m1".to_string(), ResolvedChild::Module(instance));

        run_group(group, ctx.clone()).await;

        let snap = ctx.histories.primary().unwrap().snapshot();
        assert!(snap.iter().any(|o| o.op_type == OpType::Ok));
    }

    #[tokio::test]
    async fn run_once_before_run_to_end_of_phase_coexist() {
        let ctx = context();
        let mut run_once_props = Properties::new();
        run_once_props.insert("duration_ms".to_string(), PropertyValue::Int(20));
        let run_once = ModuleInstance::new(
            "sleep",
            "sleep0",
            run_once_props,
            Lifetime::RunOnce,
            RunToEndMethod::Automatic,
            Arc::new(crate::modules::sleep::SleepModule),
        );
        let mut phase_props = Properties::new();
        phase_props.insert("duration_ms".to_string(), PropertyValue::Int(5));
        let phase_sleep = ModuleInstance::new(
            "sleep",
            "phase_lifetime_sleep",
            phase_props,
            Lifetime::RunToEndOfPhase,
            RunToEndMethod::Automatic,
            Arc::new(crate::modules::sleep::SleepModule),
        );

        let mut group: ResolvedGroup = HashMap::new();
        group.insert("sleep0".to_string(), ResolvedChild::Module(run_once));
        group.insert("phase_lifetime_sleep".to_string(), ResolvedChild::Module(phase_sleep));

        run_group(group, ctx.clone()).await;

        let snap = ctx.histories.primary().unwrap().snapshot();
        let phase_sleep_oks = snap
            .iter()
            .filter(|o| o.process_id == "phase_lifetime_sleep" && o.op_type == OpType::Ok)
            .count();
        assert!(phase_sleep_oks >= 4 && phase_sleep_oks <= 6, "got {phase_sleep_oks} ok operations");
    }
}
