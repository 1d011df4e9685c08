//! Built-in module library — used both in tests and as a starter set any
//! real workload can reference without pulling in an external module
//! provider.

pub mod emit;
pub mod panic_module;
pub mod sleep;

use crate::module::Module;
use crate::registry::{ModuleFactory, Registry};
use std::sync::Arc;

pub fn register_builtins(modules: &mut Registry<ModuleFactory>) {
    modules.register("sleep", Arc::new(|| Arc::new(sleep::SleepModule) as Arc<dyn Module>) as ModuleFactory);
    modules.register("emit", Arc::new(|| Arc::new(emit::EmitModule) as Arc<dyn Module>) as ModuleFactory);
    modules.register(
        "panic",
        Arc::new(|| Arc::new(panic_module::PanicModule) as Arc<dyn Module>) as ModuleFactory,
    );
}
