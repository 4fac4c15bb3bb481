//! Sandboxed code executor: static safety validation plus guarded
//! execution of agent-generated code.
//!
//! Two stages, always in this order:
//!
//! 1. **Validation** — a pure, deterministic scan of the code against a
//!    versioned rule set ([`rules`], [`validator`]). Rejected code never
//!    reaches stage two, in any mode.
//! 2. **Execution** — only in execute mode, and only for allowed code:
//!    the source runs under an isolated interpreter with a whitelisted
//!    builtin namespace and the registered tools bridged in over stdio
//!    ([`harness`], [`executor`]).
//!
//! The mode (preview or execute) is fixed when the executor is
//! constructed; there is no runtime toggle.

pub mod code;
pub mod executor;
pub mod harness;
pub mod rules;
pub mod validator;

pub use code::{CodeBlock, Language};
pub use executor::{
    CodeExecutor, ExecError, ExecMode, ExecutionOutcome, NoTools, ResourceLimits, ToolBridge,
};
pub use rules::{Construct, Rule, RuleSet};
pub use validator::{CodeValidator, Verdict, Violation};
