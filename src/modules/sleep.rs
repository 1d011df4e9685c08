//! `sleep`: sleeps `duration_ms` and emits one `ok` Operation. Supports both
//! lifetimes — as RUN_ONCE it sleeps once; as RUN_TO_END_OF_PHASE/AUTOMATIC
//! the scheduler's own loop re-invokes `run` until the phase's run-once
//! modules have all completed.

use crate::ensemble::Ensemble;
use crate::module::{Emitter, Module, Properties, PropertySpec, PropertyValue};
use async_trait::async_trait;
use std::time::Duration;

pub struct SleepModule;

#[async_trait]
impl Module for SleepModule {
    fn property_specs(&self) -> Vec<PropertySpec> {
        vec![PropertySpec::optional("duration_ms", PropertyValue::Int(10))]
    }

    async fn run(&self, _ensemble: &Ensemble, props: &Properties, emitter: &Emitter) -> anyhow::Result<()> {
        let duration_ms = props.get("duration_ms").and_then(|v| v.as_u64()).unwrap_or(10);
        tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        emitter.ok(format!("slept {duration_ms}ms"))?;
        Ok(())
    }
}
