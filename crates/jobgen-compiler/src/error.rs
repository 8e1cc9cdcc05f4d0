//! Failure taxonomy of job graph generation.
//!
//! `GenerationError` is what the individual steps return. The traversal
//! wraps every step failure, together with the node being processed, into a
//! `CompileError::Translation`; nothing is swallowed and no partial graph is
//! returned.

use std::fmt;

use thiserror::Error;

use jobgen_core::descriptor::SerializerDescriptor;
use jobgen_core::id::NodeId;
use jobgen_core::plan::PlanNode;

/// Failure of a single generation step.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The plan breaks an assumption the generator relies on. Always an
    /// optimizer bug; never retried.
    #[error("optimizer contract violated: {0}")]
    ContractViolation(String),

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("conflicting serializers on one input: expected {expected}, found {found}")]
    SerializerMismatch {
        expected: SerializerDescriptor,
        found: SerializerDescriptor,
    },

    #[error(transparent)]
    Graph(#[from] jobgen_core::Error),
}

impl GenerationError {
    pub fn contract(msg: impl Into<String>) -> Self {
        GenerationError::ContractViolation(msg.into())
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, GenerationError::ContractViolation(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, GenerationError::Unsupported(_))
    }

    pub fn is_serializer_mismatch(&self) -> bool {
        matches!(self, GenerationError::SerializerMismatch { .. })
    }
}

/// Which traversal callback was running when a step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitPhase {
    /// Pre-visit: vertex or chain record creation.
    Materialize,
    /// Post-visit: wiring inputs and resolving chains.
    Wire,
}

impl fmt::Display for VisitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitPhase::Materialize => f.write_str("materialize"),
            VisitPhase::Wire => f.write_str("wire"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("error translating node {node} during {phase}: {cause}")]
    Translation {
        node: String,
        node_id: NodeId,
        phase: VisitPhase,
        #[source]
        cause: GenerationError,
    },

    #[error("the plan produced no vertices")]
    EmptyPlan,

    #[error("error finalizing job graph: {0}")]
    Finalize(#[source] GenerationError),

    #[error("invalid generator configuration: {0}")]
    Config(#[source] jobgen_core::Error),
}

impl CompileError {
    pub(crate) fn translation(node: &PlanNode, phase: VisitPhase, cause: GenerationError) -> Self {
        CompileError::Translation {
            node: node.to_string(),
            node_id: node.id,
            phase,
            cause,
        }
    }

    /// The underlying step failure, if any.
    pub fn cause(&self) -> Option<&GenerationError> {
        match self {
            CompileError::Translation { cause, .. } => Some(cause),
            CompileError::Finalize(cause) => Some(cause),
            CompileError::EmptyPlan | CompileError::Config(_) => None,
        }
    }

    /// The plan node being translated when the failure happened.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            CompileError::Translation { node_id, .. } => Some(*node_id),
            _ => None,
        }
    }
}
