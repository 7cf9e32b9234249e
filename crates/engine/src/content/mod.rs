mod compiler;
mod database;
mod discovery;
mod pipeline;
mod types;

pub use compiler::{compile_def_database, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{
    DefDatabase, HazardDef, HazardDefId, HazardKind, ImmunityRule, PlayerDef, PlayerDefId,
};
pub use pipeline::{build_def_database, ContentPipelineError};
pub use types::{ContentPlanError, ContentPlanRequest};
