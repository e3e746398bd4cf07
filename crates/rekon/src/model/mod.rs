//! Resource and change data model.

pub mod change;
pub mod resource;

pub use change::{
    ChangeResult, ChangeStatus, ChangeSummary, ExecutionError, Operation, ResourceChange,
    StateChange, CODE_EXECUTION_FAILED,
};
pub use resource::{
    ObjectMeta, Resource, ResourceRef, ResourceType, ANNOTATION_BYPASS_VALIDATIONS,
    ANNOTATION_DELETE, ANNOTATION_IGNORE, ANNOTATION_RECONCILED_AT,
};
