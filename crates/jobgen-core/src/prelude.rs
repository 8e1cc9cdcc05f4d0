//! Convenient re-exports for downstream crates.

pub use crate::config::{ConfigValue, Configuration, GeneratorConfig};
pub use crate::descriptor::{ComparatorDescriptor, PairComparatorDescriptor, SerializerDescriptor, UserCode};
pub use crate::error::{Error, Result};
pub use crate::id::{ChainId, ChannelId, JobId, NodeId, VertexId};
pub use crate::job::{ChannelType, DistributionPattern, JobEdge, JobGraph, JobVertex, TaskClass, VertexKind};
pub use crate::plan::{Channel, ChannelSpec, NodeKind, NodeSpec, OptimizedPlan, PlanBuilder, PlanNode, PlanVisitor};
pub use crate::strategy::{DriverStrategy, LocalStrategy, ShipStrategy, TempMode};
pub use crate::task_config::{ResourceBudget, TaskConfig};
