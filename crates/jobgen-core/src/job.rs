//! The physical job graph handed to the cluster runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::hash::{hash_serde, Hash256};
use crate::id::{JobId, VertexId};
use crate::task_config::TaskConfig;

/// Physical transport of a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    InMemory,
    Network,
}

/// How producer subtasks connect to consumer subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionPattern {
    /// Subtask i feeds subtask i.
    Pointwise,
    /// Every producer subtask feeds every consumer subtask.
    Bipartite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexKind {
    Input,
    Task,
    Output,
}

/// The runtime task that a vertex's subtasks execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskClass {
    DataSourceTask,
    RegularTask,
    DataSinkTask,
}

/// Outgoing connection of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireConnection {
    pub target: VertexId,
    pub channel_type: ChannelType,
    pub pattern: DistributionPattern,
}

/// A directed wire, as seen from the whole graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobEdge {
    pub source: VertexId,
    pub target: VertexId,
    pub channel_type: ChannelType,
    pub pattern: DistributionPattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobVertex {
    pub id: VertexId,
    pub name: String,
    pub kind: VertexKind,
    pub task_class: TaskClass,
    pub parallelism: u32,
    pub subtasks_per_instance: Option<u32>,
    pub config: TaskConfig,
    pub instance_type: Option<String>,
    /// Vertex whose cluster instances this one shares; itself for the anchor.
    pub share_instances_with: VertexId,
    pub connections: Vec<WireConnection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobGraph {
    id: JobId,
    name: String,
    config: Configuration,
    vertices: Vec<JobVertex>,
}

/// The structural part of a graph; what `fingerprint` hashes.
#[derive(Serialize)]
struct Structure<'a> {
    name: &'a str,
    config: &'a Configuration,
    vertices: &'a [JobVertex],
}

impl JobGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: JobId::generate(),
            name: name.into(),
            config: Configuration::new(),
            vertices: Vec::new(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Job-wide configuration.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    /// Create a vertex with parallelism 1 that shares instances with itself.
    pub fn add_vertex(&mut self, name: impl Into<String>, kind: VertexKind, task_class: TaskClass) -> VertexId {
        let id = VertexId::new(self.vertices.len() as u64);
        self.vertices.push(JobVertex {
            id,
            name: name.into(),
            kind,
            task_class,
            parallelism: 1,
            subtasks_per_instance: None,
            config: TaskConfig::new(),
            instance_type: None,
            share_instances_with: id,
            connections: Vec::new(),
        });
        id
    }

    pub fn vertex(&self, id: VertexId) -> Result<&JobVertex> {
        self.vertices
            .get(id.index())
            .ok_or_else(|| Error::Graph(format!("unknown vertex {id}")))
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Result<&mut JobVertex> {
        self.vertices
            .get_mut(id.index())
            .ok_or_else(|| Error::Graph(format!("unknown vertex {id}")))
    }

    pub fn vertices(&self) -> &[JobVertex] {
        &self.vertices
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.iter().map(|v| v.id)
    }

    pub fn vertex_by_name(&self, name: &str) -> Option<&JobVertex> {
        self.vertices.iter().find(|v| v.name == name)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Add a wire `source -> target`.
    pub fn connect(
        &mut self,
        source: VertexId,
        target: VertexId,
        channel_type: ChannelType,
        pattern: DistributionPattern,
    ) -> Result<()> {
        if source == target {
            return Err(Error::Graph(format!("cannot connect {source} to itself")));
        }
        self.vertex(target)?;
        self.vertex_mut(source)?.connections.push(WireConnection {
            target,
            channel_type,
            pattern,
        });
        Ok(())
    }

    /// All wires, ordered by source vertex then insertion.
    pub fn edges(&self) -> impl Iterator<Item = JobEdge> + '_ {
        self.vertices.iter().flat_map(|v| {
            v.connections.iter().map(move |c| JobEdge {
                source: v.id,
                target: c.target,
                channel_type: c.channel_type,
                pattern: c.pattern,
            })
        })
    }

    /// Wires that end at `target`.
    pub fn incoming(&self, target: VertexId) -> Vec<JobEdge> {
        self.edges().filter(|e| e.target == target).collect()
    }

    /// Stable hash of name, configuration and vertices. The random job id is
    /// not part of it.
    pub fn fingerprint(&self) -> Result<Hash256> {
        hash_serde(&Structure {
            name: &self.name,
            config: &self.config,
            vertices: &self.vertices,
        })
    }
}

impl fmt::Display for JobGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "job '{}' ({} vertices)", self.name, self.vertices.len())?;
        for v in &self.vertices {
            write!(
                f,
                "  {} '{}' {:?} dop={} shares={}",
                v.id, v.name, v.kind, v.parallelism, v.share_instances_with
            )?;
            let chained = v.config.chained_tasks();
            if !chained.is_empty() {
                let names: Vec<&str> = chained.iter().map(|t| t.name.as_str()).collect();
                write!(f, " chain=[{}]", names.join(", "))?;
            }
            writeln!(f)?;
            for c in &v.connections {
                writeln!(f, "    -> {} {:?}/{:?}", c.target, c.channel_type, c.pattern)?;
            }
        }
        Ok(())
    }
}
