//! Input and output data types for rule synthesis.
//!
//! ## Flow
//!
//! ```text
//! SynthesisRequest (assignments) → synthesize() → SynthesisPlan (rules + cleanup)
//! ```

pub mod assignment;
pub mod plan;

pub use assignment::{Assignment, DomainWide, ReferenceCatalog, ScriptType, SynthesisRequest};
pub use plan::{
    CleanupPredicate, Location, MemberRef, PlanStatus, RuleRole, RuleScope, RuleSpec,
    SkipReason, SkippedGroup, SynthesisPlan,
};
