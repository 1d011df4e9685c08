//! `emit`: emits the `value` property as a single `ok` Operation. With
//! `worker_threads` and `count` set, spawns that many concurrent tasks each
//! emitting `count` distinct strings, to exercise concurrent emission from a
//! single module instance.

use crate::ensemble::Ensemble;
use crate::module::{Emitter, Module, Properties, PropertySpec, PropertyValue};
use async_trait::async_trait;

pub struct EmitModule;

#[async_trait]
impl Module for EmitModule {
    fn property_specs(&self) -> Vec<PropertySpec> {
        vec![
            PropertySpec::optional("value", PropertyValue::Str(String::new())),
            PropertySpec::optional("worker_threads", PropertyValue::Int(1)),
            PropertySpec::optional("count", PropertyValue::Int(1)),
        ]
    }

    async fn run(&self, _ensemble: &Ensemble, props: &Properties, emitter: &Emitter) -> anyhow::Result<()> {
        let worker_threads = props.get("worker_threads").and_then(|v| v.as_u64()).unwrap_or(1);
        let count = props.get("count").and_then(|v| v.as_u64()).unwrap_or(1);

        if worker_threads <= 1 && count <= 1 {
            let value = props.get("value").and_then(|v| v.as_str()).unwrap_or_default();
            emitter.ok(value.to_string())?;
            return Ok(());
        }

        let process_id = emitter.process_id().to_string();
        let mut handles = Vec::with_capacity(worker_threads as usize);
        for t in 0..worker_threads {
            let emitter = emitter.clone();
            let process_id = process_id.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..count {
                    emitter.ok(format!("emission {process_id}:{t}:{n}")).ok();
                }
            }));
        }
        for handle in handles {
            handle.await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::WorkloadClock;
    use crate::history::{ActiveHistories, History};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn emitter(histories: &ActiveHistories) -> Emitter {
        Emitter::new(
            histories.clone(),
            WorkloadClock::start(),
            "text1".into(),
            "emit".into(),
            Arc::new(AtomicBool::new(true)),
        )
    }

    #[tokio::test]
    async fn emits_configured_value_once() {
        let histories = ActiveHistories::with_primary(Arc::new(History::new()));
        let e = emitter(&histories);
        let ensemble = Ensemble::empty("t1");
        let mut props = Properties::new();
        props.insert("value".into(), PropertyValue::Str("a".into()));

        EmitModule.run(&ensemble, &props, &e).await.unwrap();

        let snap = histories.primary().unwrap().snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].value.as_str(), Some("a"));
    }

    #[tokio::test]
    async fn concurrent_workers_lose_no_emissions() {
        let histories = ActiveHistories::with_primary(Arc::new(History::new()));
        let e = emitter(&histories);
        let ensemble = Ensemble::empty("t1");
        let mut props = Properties::new();
        props.insert("worker_threads".into(), PropertyValue::Int(3));
        props.insert("count".into(), PropertyValue::Int(50));

        EmitModule.run(&ensemble, &props, &e).await.unwrap();

        assert_eq!(histories.primary().unwrap().len(), 150);
    }
}
