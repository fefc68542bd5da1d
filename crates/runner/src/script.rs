//! The scripting runtime contract and its rhai implementation.
//!
//! Scripts see every top-level state key as a scope variable and can
//! introduce new ones; the scope is read back into the state map after
//! each run, which is how values flow from one request to the next.

use thiserror::Error;

/// State shared between scripts and template substitution.
pub type State = serde_json::Map<String, serde_json::Value>;

/// An opaque script evaluation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ScriptError(pub String);

/// The runtime the executor drives. One instance lives for exactly one
/// drovefile run.
pub trait ScriptEngine {
    fn set_state(&mut self, state: State);
    fn state(&self) -> State;
    fn run(&mut self, source: &str) -> std::result::Result<(), ScriptError>;
}

/// Creates a fresh engine per drovefile execution.
pub type EngineFactory = Box<dyn Fn() -> Box<dyn ScriptEngine> + Send + Sync>;

/// Script engine backed by an embedded rhai interpreter.
pub struct RhaiEngine {
    engine: rhai::Engine,
    scope: rhai::Scope<'static>,
}

impl RhaiEngine {
    pub fn new() -> Self {
        let mut engine = rhai::Engine::new();

        engine.register_fn("assert", |cond: bool| -> Result<(), Box<rhai::EvalAltResult>> {
            if cond {
                Ok(())
            } else {
                Err("assertion failed".into())
            }
        });
        engine.register_fn(
            "assert",
            |cond: bool, msg: &str| -> Result<(), Box<rhai::EvalAltResult>> {
                if cond {
                    Ok(())
                } else {
                    Err(format!("assertion failed: {msg}").into())
                }
            },
        );
        engine.register_fn("info", |msg: &str| {
            tracing::info!(target: "script", "{msg}");
        });
        engine.register_fn("warn", |msg: &str| {
            tracing::warn!(target: "script", "{msg}");
        });
        engine.on_print(|text| tracing::info!(target: "script", "{text}"));
        engine.on_debug(|text, _, _| tracing::debug!(target: "script", "{text}"));

        Self {
            engine,
            scope: rhai::Scope::new(),
        }
    }
}

impl Default for RhaiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for RhaiEngine {
    fn set_state(&mut self, state: State) {
        for (key, value) in state {
            let dynamic = rhai::serde::to_dynamic(&value).unwrap_or(rhai::Dynamic::UNIT);
            self.scope.set_value(key, dynamic);
        }
    }

    fn state(&self) -> State {
        let mut out = State::new();
        for (name, _, value) in self.scope.iter() {
            if let Ok(json) = rhai::serde::from_dynamic(&value) {
                out.insert(name.to_string(), json);
            }
        }
        out
    }

    fn run(&mut self, source: &str) -> std::result::Result<(), ScriptError> {
        self.engine
            .run_with_scope(&mut self.scope, source)
            .map_err(|err| ScriptError(err.to_string()))
    }
}
