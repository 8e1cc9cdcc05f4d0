//! Memory budgets for drivers and local strategies.
//!
//! Both assignments stamp the same max fan-in and spill threshold taken from
//! the generator's `GeneratorConfig`; only the memory size differs.

use jobgen_core::config::GeneratorConfig;
use jobgen_core::task_config::{ResourceBudget, TaskConfig};

fn budget(defaults: &GeneratorConfig, memory_bytes: u64) -> ResourceBudget {
    ResourceBudget {
        memory_bytes,
        max_fan_in: defaults.spilling_max_fan,
        spilling_threshold: defaults.sort_spilling_threshold,
    }
}

/// Record the operator's own processing budget. Nothing is written when the
/// node declares no memory.
pub fn assign_driver_resources(config: &mut TaskConfig, defaults: &GeneratorConfig, memory_bytes: u64) -> bool {
    if memory_bytes == 0 {
        return false;
    }
    config.set_driver_resources(budget(defaults, memory_bytes));
    true
}

/// Record the budget of one input's local strategy (e.g. its sorter).
pub fn assign_local_strategy_resources(
    config: &mut TaskConfig,
    defaults: &GeneratorConfig,
    input: usize,
    memory_bytes: u64,
) -> bool {
    if memory_bytes == 0 {
        return false;
    }
    config.set_input_resources(input, budget(defaults, memory_bytes));
    true
}
