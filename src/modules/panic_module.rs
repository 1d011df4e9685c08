//! `panic`: always returns an error from `run`. The scheduler converts this
//! into an `error` Operation without affecting sibling modules.

use crate::ensemble::Ensemble;
use crate::module::{Emitter, Module, Properties, PropertySpec, PropertyValue};
use async_trait::async_trait;

pub struct PanicModule;

#[async_trait]
impl Module for PanicModule {
    fn property_specs(&self) -> Vec<PropertySpec> {
        vec![PropertySpec::optional("message", PropertyValue::Str("module panicked".into()))]
    }

    async fn run(&self, _ensemble: &Ensemble, props: &Properties, _emitter: &Emitter) -> anyhow::Result<()> {
        let message = props.get("message").and_then(|v| v.as_str()).unwrap_or("module panicked").to_string();
        anyhow::bail!(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::WorkloadClock;
    use crate::history::{ActiveHistories, History};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[tokio::test]
    async fn run_always_fails() {
        let histories = ActiveHistories::with_primary(Arc::new(History::new()));
        let emitter = Emitter::new(
            histories,
            WorkloadClock::start(),
            "p1".into(),
            "panic".into(),
            Arc::new(AtomicBool::new(true)),
        );
        let ensemble = Ensemble::empty("t1");
        let err = PanicModule.run(&ensemble, &Properties::new(), &emitter).await.unwrap_err();
        assert_eq!(err.to_string(), "module panicked");
    }
}
