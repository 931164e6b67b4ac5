//! codeedit-engine: the verified structural code-editing engine.
//!
//! Layered on top of `codeedit-core`'s language registry and graph builder:
//! a locator resolver, a three-tier edit algebra (AST surgery, templates,
//! fragments) plus a legacy text-operator tier, a layered pre/post-edit
//! verifier, a transactional mutation protocol, and a plan interpreter
//! tying all of the above together for the `verify_plan`/`execute_step`
//! entry points the CLI calls.

pub mod dsl;
pub mod error;
pub mod fragment;
pub mod interpreter;
pub mod legacy;
pub mod locator;
pub mod mutate;
pub mod plan;
pub mod template;
pub mod transaction;
pub mod verify;

pub use error::{Error, Result};
pub use interpreter::{execute_step, verify_plan, PlanVerification};
pub use locator::{Locator, StructuredLocator};
pub use plan::{ComposedOperatorDef, FragmentAction, LegacyOp, Plan, Step, SurgeryOp};
pub use transaction::{PostEditChecks, TransactionOutcome};
pub use verify::{Finding, Severity, VerificationResult};
