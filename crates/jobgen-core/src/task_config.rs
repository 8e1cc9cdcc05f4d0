//! Per-vertex task configuration.
//!
//! A `TaskConfig` is filled in by several steps of job graph generation
//! (materialization, every incoming wire, every outgoing wire, chain
//! finalization). All mutators append or set a slot; nothing is removed.
//! `to_configuration` flattens the typed form into the key/value blob the
//! runtime reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::descriptor::{ComparatorDescriptor, PairComparatorDescriptor, SerializerDescriptor, UserCode};
use crate::error::Result;
use crate::strategy::{DriverStrategy, LocalStrategy, ShipStrategy};

/// Memory and spilling budget of a driver or an input's local strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceBudget {
    pub memory_bytes: u64,
    pub max_fan_in: u32,
    pub spilling_threshold: f32,
}

/// Settings of one logical input slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Number of physical wires feeding this slot (k for a k-way union).
    pub group_size: u32,
    pub serializer: Option<SerializerDescriptor>,
    pub local_strategy: Option<LocalStrategy>,
    pub comparator: Option<ComparatorDescriptor>,
    pub resources: Option<ResourceBudget>,
    pub dammed: bool,
    pub replayable: bool,
    pub dam_memory: Option<u64>,
}

/// Settings of one output slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub ship_strategy: ShipStrategy,
    pub comparator: Option<ComparatorDescriptor>,
}

/// A task fused into the hosting vertex's thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainedTaskDescriptor {
    pub driver: String,
    pub config: TaskConfig,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    user_code: Option<UserCode>,
    driver: Option<String>,
    driver_strategy: Option<DriverStrategy>,
    driver_comparators: BTreeMap<usize, ComparatorDescriptor>,
    driver_pair_comparator: Option<PairComparatorDescriptor>,
    driver_resources: Option<ResourceBudget>,
    sink_parallelism: Option<u32>,
    inputs: BTreeMap<usize, InputConfig>,
    outputs: Vec<OutputConfig>,
    output_serializer: Option<SerializerDescriptor>,
    chained_tasks: Vec<ChainedTaskDescriptor>,
}

impl TaskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // --- user code and driver ---

    pub fn set_user_code(&mut self, user_code: UserCode) {
        self.user_code = Some(user_code);
    }

    pub fn user_code(&self) -> Option<&UserCode> {
        self.user_code.as_ref()
    }

    pub fn set_driver(&mut self, driver: impl Into<String>) {
        self.driver = Some(driver.into());
    }

    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    pub fn set_driver_strategy(&mut self, strategy: DriverStrategy) {
        self.driver_strategy = Some(strategy);
    }

    pub fn driver_strategy(&self) -> Option<DriverStrategy> {
        self.driver_strategy
    }

    pub fn set_driver_comparator(&mut self, comparator: ComparatorDescriptor, input: usize) {
        self.driver_comparators.insert(input, comparator);
    }

    pub fn driver_comparator(&self, input: usize) -> Option<&ComparatorDescriptor> {
        self.driver_comparators.get(&input)
    }

    pub fn set_driver_pair_comparator(&mut self, comparator: PairComparatorDescriptor) {
        self.driver_pair_comparator = Some(comparator);
    }

    pub fn driver_pair_comparator(&self) -> Option<&PairComparatorDescriptor> {
        self.driver_pair_comparator.as_ref()
    }

    pub fn set_driver_resources(&mut self, budget: ResourceBudget) {
        self.driver_resources = Some(budget);
    }

    pub fn driver_resources(&self) -> Option<&ResourceBudget> {
        self.driver_resources.as_ref()
    }

    pub fn set_sink_parallelism(&mut self, dop: u32) {
        self.sink_parallelism = Some(dop);
    }

    pub fn sink_parallelism(&self) -> Option<u32> {
        self.sink_parallelism
    }

    // --- inputs ---

    fn input_mut(&mut self, input: usize) -> &mut InputConfig {
        self.inputs.entry(input).or_default()
    }

    /// Register one more wire feeding input group `input`.
    pub fn add_input_to_group(&mut self, input: usize) {
        self.input_mut(input).group_size += 1;
    }

    pub fn set_input_serializer(&mut self, serializer: SerializerDescriptor, input: usize) {
        self.input_mut(input).serializer = Some(serializer);
    }

    pub fn set_input_local_strategy(&mut self, input: usize, strategy: LocalStrategy) {
        self.input_mut(input).local_strategy = Some(strategy);
    }

    pub fn set_input_comparator(&mut self, comparator: ComparatorDescriptor, input: usize) {
        self.input_mut(input).comparator = Some(comparator);
    }

    pub fn set_input_resources(&mut self, input: usize, budget: ResourceBudget) {
        self.input_mut(input).resources = Some(budget);
    }

    pub fn set_input_dammed(&mut self, input: usize, dammed: bool) {
        self.input_mut(input).dammed = dammed;
    }

    pub fn set_input_replayable(&mut self, input: usize, replayable: bool) {
        self.input_mut(input).replayable = replayable;
    }

    pub fn set_input_dam_memory(&mut self, input: usize, bytes: u64) {
        self.input_mut(input).dam_memory = Some(bytes);
    }

    pub fn input(&self, input: usize) -> Option<&InputConfig> {
        self.inputs.get(&input)
    }

    /// Number of logical input groups configured.
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    // --- outputs ---

    pub fn add_output_ship_strategy(&mut self, strategy: ShipStrategy) {
        self.outputs.push(OutputConfig {
            ship_strategy: strategy,
            comparator: None,
        });
    }

    /// Attach a comparator to an output slot that already exists.
    pub fn set_output_comparator(&mut self, comparator: ComparatorDescriptor, output: usize) -> bool {
        match self.outputs.get_mut(output) {
            Some(slot) => {
                slot.comparator = Some(comparator);
                true
            }
            None => false,
        }
    }

    pub fn set_output_serializer(&mut self, serializer: SerializerDescriptor) {
        self.output_serializer = Some(serializer);
    }

    pub fn output_serializer(&self) -> Option<&SerializerDescriptor> {
        self.output_serializer.as_ref()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn outputs(&self) -> &[OutputConfig] {
        &self.outputs
    }

    // --- chaining ---

    pub fn add_chained_task(&mut self, driver: impl Into<String>, config: TaskConfig, name: impl Into<String>) {
        self.chained_tasks.push(ChainedTaskDescriptor {
            driver: driver.into(),
            config,
            name: name.into(),
        });
    }

    /// Fused tasks in execution order.
    pub fn chained_tasks(&self) -> &[ChainedTaskDescriptor] {
        &self.chained_tasks
    }

    /// Flatten into the key/value form shipped to the runtime. Descriptors
    /// are embedded as JSON; chained task configs are nested under
    /// `chaining.<i>.config.`.
    pub fn to_configuration(&self) -> Result<Configuration> {
        let mut out = Configuration::new();
        self.write_into(&mut out)?;
        Ok(out)
    }

    fn write_into(&self, out: &mut Configuration) -> Result<()> {
        if let Some(uc) = &self.user_code {
            out.set("stub.class", uc.class.as_str());
            out.merge_prefixed("stub.param.", &uc.parameters);
        }
        if let Some(d) = &self.driver {
            out.set("driver.class", d.as_str());
        }
        if let Some(ds) = self.driver_strategy {
            out.set("driver.strategy", format!("{ds:?}"));
        }
        for (i, c) in &self.driver_comparators {
            out.set(format!("driver.comparator.{i}"), serde_json::to_string(c)?);
        }
        if let Some(pc) = &self.driver_pair_comparator {
            out.set("driver.pair-comparator", serde_json::to_string(pc)?);
        }
        if let Some(r) = &self.driver_resources {
            write_budget(out, "driver", r);
        }
        if let Some(dop) = self.sink_parallelism {
            out.set("sink.dop", i64::from(dop));
        }

        out.set("in.num", self.inputs.len() as i64);
        for (i, input) in &self.inputs {
            let p = format!("in.{i}");
            out.set(format!("{p}.group-size"), i64::from(input.group_size));
            if let Some(s) = &input.serializer {
                out.set(format!("{p}.serializer"), serde_json::to_string(s)?);
            }
            if let Some(ls) = input.local_strategy {
                out.set(format!("{p}.local-strategy"), ls.to_string());
            }
            if let Some(c) = &input.comparator {
                out.set(format!("{p}.comparator"), serde_json::to_string(c)?);
            }
            if let Some(r) = &input.resources {
                write_budget(out, &p, r);
            }
            if input.dammed {
                out.set(format!("{p}.dammed"), true);
            }
            if input.replayable {
                out.set(format!("{p}.replayable"), true);
            }
            if let Some(m) = input.dam_memory {
                out.set(format!("{p}.dam-memory"), m as i64);
            }
        }

        out.set("out.num", self.outputs.len() as i64);
        for (i, o) in self.outputs.iter().enumerate() {
            out.set(format!("out.{i}.ship-strategy"), o.ship_strategy.to_string());
            if let Some(c) = &o.comparator {
                out.set(format!("out.{i}.comparator"), serde_json::to_string(c)?);
            }
        }
        if let Some(s) = &self.output_serializer {
            out.set("out.serializer", serde_json::to_string(s)?);
        }

        if !self.chained_tasks.is_empty() {
            out.set("chaining.num", self.chained_tasks.len() as i64);
        }
        for (i, t) in self.chained_tasks.iter().enumerate() {
            out.set(format!("chaining.{i}.class"), t.driver.as_str());
            out.set(format!("chaining.{i}.name"), t.name.as_str());
            let nested = t.config.to_configuration()?;
            out.merge_prefixed(&format!("chaining.{i}.config."), &nested);
        }
        Ok(())
    }
}

fn write_budget(out: &mut Configuration, prefix: &str, r: &ResourceBudget) {
    out.set(format!("{prefix}.memory"), r.memory_bytes as i64);
    out.set(format!("{prefix}.max-fan"), i64::from(r.max_fan_in));
    out.set(format!("{prefix}.spill-threshold"), f64::from(r.spilling_threshold));
}
