//! Drovefile execution engine.
//!
//! The [`Executor`] walks a parsed drovefile phase by phase: setup,
//! then for each test its setup-each / test / teardown-each steps,
//! then teardown. Teardown phases run on every exit path. Failures
//! either abort the batch or accumulate into a multi-error, governed
//! by the per-request `alwaysAbort` / `noAbort` options and the
//! executor-wide no-abort switch.
//!
//! The two collaborators the engine drives are pluggable: a
//! [`Requester`] dispatches HTTP requests (default: reqwest) and a
//! [`ScriptEngine`] evaluates pre/post scripts against a shared state
//! map (default: rhai).

pub mod error;
pub mod executor;
pub mod options;
pub mod requester;
pub mod response;
pub mod script;
pub mod waiter;

pub use error::{Error, Errors, Result};
pub use executor::Executor;
pub use options::{AbortOptions, ExecOptions, RequestOptions};
pub use requester::{build_http_request, HttpRequest, Requester, ReqwestDispatcher};
pub use response::Response;
pub use script::{EngineFactory, RhaiEngine, ScriptEngine, ScriptError, State};
pub use waiter::{NoopWaiter, PromptWaiter, Waiter};
