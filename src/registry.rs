//! Property / Component Registry.
//!
//! Resolves module/checker/artifact-checker short names from the workload
//! tree to concrete implementations, validating each property group against
//! the implementation's declared `PropertySpec`s before construction.
//! Registry lookup failures are a fatal workload-load error.

use crate::checkers::{ArtifactChecker, Checker};
use crate::ensemble::Ensemble;
use crate::errors::LoadError;
use crate::module::{Lifetime, Module, ModuleInstance, PropertySpec, PropertyValue, Properties, RunToEndMethod};
use crate::resolved::{ResolvedChild, ResolvedGroup, ResolvedPhase};
use crate::workload::{CheckerSpec, ModuleSpec, PhaseChild, Workload};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub type ModuleFactory = Arc<dyn Fn() -> Arc<dyn Module> + Send + Sync>;
pub type CheckerFactory = Arc<dyn Fn() -> Box<dyn Checker> + Send + Sync>;
pub type ArtifactCheckerFactory = Arc<dyn Fn() -> Box<dyn ArtifactChecker> + Send + Sync>;

/// A name-keyed map of factories, used for modules, checkers, and artifact
/// checkers alike.
#[derive(Clone)]
pub struct Registry<F> {
    factories: HashMap<String, F>,
}

impl<F: Clone> Registry<F> {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register(&mut self, short_name: impl Into<String>, factory: F) {
        self.factories.insert(short_name.into(), factory);
    }

    pub fn get(&self, short_name: &str) -> Option<F> {
        self.factories.get(short_name).cloned()
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.factories.contains_key(short_name)
    }
}

impl<F: Clone> Default for Registry<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// All three registries a resolved engine run needs.
pub struct Registries {
    pub modules: Registry<ModuleFactory>,
    pub checkers: Registry<CheckerFactory>,
    pub artifact_checkers: Registry<ArtifactCheckerFactory>,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            modules: Registry::new(),
            checkers: Registry::new(),
            artifact_checkers: Registry::new(),
        }
    }

    /// A registry pre-populated with the built-in module and checker
    /// library.
    pub fn with_builtins() -> Self {
        let mut registries = Self::new();
        crate::modules::register_builtins(&mut registries.modules);
        crate::checkers::register_builtins(&mut registries.checkers, &mut registries.artifact_checkers);
        registries
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a raw property group against a module's/checker's declared
/// `PropertySpec`s, filling in defaults and rejecting unknown requirements.
pub fn validate_properties(
    specs: &[PropertySpec],
    given: &HashMap<String, PropertyValue>,
) -> Result<Properties, String> {
    let mut resolved = Properties::new();

    for spec in specs {
        let value = match given.get(&spec.name) {
            Some(v) => v.clone(),
            None => match &spec.default {
                Some(default) => default.clone(),
                None => {
                    if spec.required {
                        return Err(format!("missing required property '{}'", spec.name));
                    }
                    continue;
                }
            },
        };

        if let Some(pattern) = &spec.pattern
            && let Some(s) = value.as_str()
        {
            let re = Regex::new(pattern).map_err(|e| format!("invalid pattern for '{}': {e}", spec.name))?;
            if !re.is_match(s) {
                return Err(format!("property '{}' value '{}' does not match pattern '{}'", spec.name, s, pattern));
            }
        }

        if let Some(options) = &spec.options
            && let Some(s) = value.as_str()
            && !options.iter().any(|o| o == s)
        {
            return Err(format!(
                "property '{}' value '{}' is not one of {:?}",
                spec.name, s, options
            ));
        }

        resolved.insert(spec.name.clone(), value);
    }

    // Carry through properties not in the declared spec list (e.g.
    // `lifetime`, which every module accepts even though it is not part of
    // any particular module's own property_specs()).
    for (key, value) in given {
        resolved.entry(key.clone()).or_insert_with(|| value.clone());
    }

    Ok(resolved)
}

/// Resolve a module instance's effective lifetime from its properties,
/// honoring a hard-coded class lifetime when the module declares one.
fn resolve_lifetime(module: &dyn Module, properties: &Properties) -> Result<Lifetime, String> {
    if let Some(fixed) = module.fixed_lifetime() {
        return Ok(fixed);
    }
    match properties.get("lifetime").and_then(|v| v.as_str()) {
        Some(raw) => Lifetime::lazy_value_of(raw).map_err(|v| format!("'{v}' is not a valid lifetime")),
        None => Ok(Lifetime::RunOnce),
    }
}

fn resolve_run_to_end_method(properties: &Properties) -> RunToEndMethod {
    match properties.get("run_to_end_method").and_then(|v| v.as_str()) {
        Some(s) if s.eq_ignore_ascii_case("manual") => RunToEndMethod::Manual,
        _ => RunToEndMethod::Automatic,
    }
}

/// Resolve one `ModuleSpec` leaf into a `ModuleInstance`, validating its
/// properties and checking its declared providers against the ensemble.
fn resolve_module(
    instance_name: &str,
    spec: &ModuleSpec,
    registries: &Registries,
    ensemble: &Ensemble,
) -> Result<ModuleInstance, LoadError> {
    let factory = registries
        .modules
        .get(&spec.module)
        .ok_or_else(|| LoadError::UnknownModule(spec.module.clone()))?;
    let module = factory();

    let properties = validate_properties(&module.property_specs(), &spec.properties).map_err(|message| {
        LoadError::InvalidProperties { instance: instance_name.to_string(), message }
    })?;

    let available = ensemble.all_providers();
    for provider in module.required_providers() {
        if !available.contains(provider.as_str()) {
            return Err(LoadError::MissingProvider { module: spec.module.clone(), provider });
        }
    }

    let lifetime = resolve_lifetime(module.as_ref(), &properties)
        .map_err(|value| LoadError::InvalidLifetime { value })?;
    let run_to_end_method = resolve_run_to_end_method(&properties);

    Ok(ModuleInstance::new(
        spec.module.clone(),
        instance_name.to_string(),
        properties,
        lifetime,
        run_to_end_method,
        module,
    ))
}

/// Resolve an entire phase tree, recursing into nested phases.
fn resolve_phase(
    phase: &crate::workload::Phase,
    registries: &Registries,
    ensemble: &Ensemble,
    seen_names: &mut HashSet<String>,
) -> Result<ResolvedPhase, LoadError> {
    let mut resolved_groups = Vec::with_capacity(phase.len());
    for group in phase {
        let mut resolved_group: ResolvedGroup = HashMap::new();
        for (instance_name, child) in group {
            if !seen_names.insert(instance_name.clone()) {
                return Err(LoadError::DuplicateInstanceName(instance_name.clone()));
            }
            let resolved_child = match child {
                PhaseChild::Module(spec) => {
                    ResolvedChild::Module(resolve_module(instance_name, spec, registries, ensemble)?)
                }
                PhaseChild::Phase(nested) => {
                    ResolvedChild::Phase(resolve_phase(nested, registries, ensemble, seen_names)?)
                }
            };
            resolved_group.insert(instance_name.clone(), resolved_child);
        }
        resolved_groups.push(resolved_group);
    }
    Ok(resolved_groups)
}

/// A workload with every module resolved and every checker/artifact-checker
/// spec validated against its registry entry, ready for the Runner.
pub struct ResolvedWorkload {
    pub phases: ResolvedPhase,
    pub checkers: Vec<(String, Box<dyn Checker>, Properties)>,
    pub artifact_checkers: Vec<(String, Box<dyn ArtifactChecker>, Properties)>,
}

fn resolve_checker(
    name: &str,
    spec: &CheckerSpec,
    registries: &Registries,
) -> Result<(String, Box<dyn Checker>, Properties), LoadError> {
    let factory = registries
        .checkers
        .get(&spec.checker)
        .ok_or_else(|| LoadError::UnknownChecker(spec.checker.clone()))?;
    let checker = factory();
    let properties = validate_properties(&checker.property_specs(), &spec.properties)
        .map_err(|message| LoadError::InvalidProperties { instance: name.to_string(), message })?;
    Ok((name.to_string(), checker, properties))
}

/// Resolve a full `Workload` against the given registries and ensemble.
/// This is the single entry point that can fail with a fatal `LoadError`;
/// failure here means no history is recorded and no phase ever runs.
pub fn resolve_workload(
    workload: &Workload,
    registries: &Registries,
    ensemble: &Ensemble,
) -> Result<ResolvedWorkload, LoadError> {
    let mut seen_names = HashSet::new();
    let phases = resolve_phase(&workload.phases, registries, ensemble, &mut seen_names)?;

    let mut checkers = Vec::with_capacity(workload.checkers.len());
    for (name, spec) in &workload.checkers {
        checkers.push(resolve_checker(name, spec, registries)?);
    }

    let mut artifact_checkers = Vec::with_capacity(workload.artifact_checkers.len());
    for (name, spec) in &workload.artifact_checkers {
        let factory = registries
            .artifact_checkers
            .get(&spec.artifact_checker)
            .ok_or_else(|| LoadError::UnknownArtifactChecker(spec.artifact_checker.clone()))?;
        let checker = factory();
        let properties = validate_properties(&checker.property_specs(), &spec.properties)
            .map_err(|message| LoadError::InvalidProperties { instance: name.to_string(), message })?;
        artifact_checkers.push((name.clone(), checker, properties));
    }

    Ok(ResolvedWorkload { phases, checkers, artifact_checkers })
}
