//! Strategy enums decided by the optimizer and carried through unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How records are routed between producer and consumer subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipStrategy {
    /// Not set by the optimizer. Never valid on a wired channel.
    None,
    Forward,
    PartitionLocalHash,
    PartitionRandom,
    Broadcast,
    PartitionHash,
    PartitionRange,
}

impl fmt::Display for ShipStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShipStrategy::None => "NONE",
            ShipStrategy::Forward => "FORWARD",
            ShipStrategy::PartitionLocalHash => "PARTITION_LOCAL_HASH",
            ShipStrategy::PartitionRandom => "PARTITION_RANDOM",
            ShipStrategy::Broadcast => "BROADCAST",
            ShipStrategy::PartitionHash => "PARTITION_HASH",
            ShipStrategy::PartitionRange => "PARTITION_RANGE",
        };
        f.write_str(s)
    }
}

/// Pre-processing applied to an input before the operator consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocalStrategy {
    None,
    Sort,
    CombiningSort,
}

impl fmt::Display for LocalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LocalStrategy::None => "NONE",
            LocalStrategy::Sort => "SORT",
            LocalStrategy::CombiningSort => "COMBININGSORT",
        };
        f.write_str(s)
    }
}

/// Buffering policy of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TempMode {
    None,
    PipelineBreaker,
    Cached,
    CachingPipelineBreaker,
}

impl TempMode {
    /// Whether the buffer dams the input until it is fully consumed.
    pub fn breaks_pipeline(self) -> bool {
        matches!(
            self,
            TempMode::PipelineBreaker | TempMode::CachingPipelineBreaker
        )
    }

    /// Whether the buffered data can be read more than once.
    pub fn is_replayable(self) -> bool {
        matches!(self, TempMode::Cached | TempMode::CachingPipelineBreaker)
    }
}

/// The local algorithm an operator runs, decided by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverStrategy {
    None,
    Map,
    FlatMap,
    PartialGroup,
    SortedGroup,
    AllGroup,
    Merge,
    HybridHashBuildFirst,
    HybridHashBuildSecond,
    CoGroup,
    NestedLoopBlockedOuterFirst,
    NestedLoopBlockedOuterSecond,
    NestedLoopStreamedOuterFirst,
    NestedLoopStreamedOuterSecond,
}

impl DriverStrategy {
    /// Identifier of the driver that runs this strategy in its own task.
    pub fn driver_id(self) -> Option<&'static str> {
        use DriverStrategy::*;
        match self {
            None => Option::None,
            Map => Some("MapDriver"),
            FlatMap => Some("FlatMapDriver"),
            PartialGroup => Some("CombineDriver"),
            SortedGroup => Some("ReduceDriver"),
            AllGroup => Some("AllReduceDriver"),
            Merge | HybridHashBuildFirst | HybridHashBuildSecond => Some("MatchDriver"),
            CoGroup => Some("CoGroupDriver"),
            NestedLoopBlockedOuterFirst
            | NestedLoopBlockedOuterSecond
            | NestedLoopStreamedOuterFirst
            | NestedLoopStreamedOuterSecond => Some("CrossDriver"),
        }
    }

    /// Identifier of the push-based driver that can run fused into its
    /// predecessor's thread, if this strategy has one.
    pub fn push_chain_driver_id(self) -> Option<&'static str> {
        match self {
            DriverStrategy::Map => Some("ChainedMapDriver"),
            DriverStrategy::FlatMap => Some("ChainedFlatMapDriver"),
            DriverStrategy::PartialGroup => Some("ChainedCombineDriver"),
            _ => None,
        }
    }

    pub fn num_inputs(self) -> usize {
        use DriverStrategy::*;
        match self {
            None => 0,
            Map | FlatMap | PartialGroup | SortedGroup | AllGroup => 1,
            Merge
            | HybridHashBuildFirst
            | HybridHashBuildSecond
            | CoGroup
            | NestedLoopBlockedOuterFirst
            | NestedLoopBlockedOuterSecond
            | NestedLoopStreamedOuterFirst
            | NestedLoopStreamedOuterSecond => 2,
        }
    }
}

impl fmt::Display for DriverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
