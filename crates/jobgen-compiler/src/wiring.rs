//! Channel wiring: turns one plan channel into one physical wire.
//!
//! The ship strategy alone decides the wire's transport and distribution
//! pattern. Every wire appends an output slot on the producing config and
//! counts one more wire in the consumer's input group.

use jobgen_core::config::GeneratorConfig;
use jobgen_core::id::VertexId;
use jobgen_core::job::{ChannelType, DistributionPattern};
use jobgen_core::plan::Channel;
use jobgen_core::strategy::{LocalStrategy, ShipStrategy, TempMode};
use jobgen_core::task_config::TaskConfig;

use crate::context::{CompileContext, SourceEndpoint};
use crate::error::GenerationError;
use crate::resources::assign_local_strategy_resources;

/// Transport and distribution pattern for a ship strategy.
///
/// Range partitioning is a legal plan value the runtime cannot wire yet and
/// fails as `Unsupported`; an unset strategy is an optimizer bug.
pub fn wire_for(strategy: ShipStrategy) -> Result<(ChannelType, DistributionPattern), GenerationError> {
    match strategy {
        ShipStrategy::Forward | ShipStrategy::PartitionLocalHash => {
            Ok((ChannelType::InMemory, DistributionPattern::Pointwise))
        }
        ShipStrategy::PartitionRandom | ShipStrategy::Broadcast | ShipStrategy::PartitionHash => {
            Ok((ChannelType::Network, DistributionPattern::Bipartite))
        }
        ShipStrategy::PartitionRange => Err(GenerationError::Unsupported(
            "range partitioning is not yet supported".to_string(),
        )),
        ShipStrategy::None => Err(GenerationError::contract(format!(
            "unrecognized ship strategy {strategy} on a wired channel"
        ))),
    }
}

/// Wire `channel` from its resolved producer into input group `input` of
/// `target`.
pub(crate) fn connect_job_vertices(
    ctx: &mut CompileContext,
    channel: &Channel,
    source: SourceEndpoint,
    target: VertexId,
    input: usize,
) -> Result<(), GenerationError> {
    // Checked before anything is mutated.
    let (channel_type, pattern) = wire_for(channel.ship_strategy)?;

    ctx.graph.connect(source.vertex, target, channel_type, pattern)?;

    let source_config = ctx.config_mut(source.config)?;
    source_config.add_output_ship_strategy(channel.ship_strategy);
    let output = source_config.num_outputs() - 1;
    if output == 0 {
        source_config.set_output_serializer(channel.serializer.clone());
    }
    if let Some(comparator) = &channel.ship_comparator {
        source_config.set_output_comparator(comparator.clone(), output);
    }

    ctx.graph.vertex_mut(target)?.config.add_input_to_group(input);

    #[cfg(feature = "tracing")]
    tracing::trace!(
        channel = %channel.id,
        source = %source.vertex,
        target = %target,
        ship = %channel.ship_strategy,
        ?channel_type,
        ?pattern,
        "wire connected"
    );
    Ok(())
}

/// Record the per-input metadata of one input slot. Called once per slot,
/// however many wires feed it.
pub(crate) fn add_local_info(config: &mut TaskConfig, defaults: &GeneratorConfig, channel: &Channel, input: usize) {
    config.set_input_serializer(channel.serializer.clone(), input);

    if channel.local_strategy != LocalStrategy::None {
        config.set_input_local_strategy(input, channel.local_strategy);
        if let Some(comparator) = &channel.local_comparator {
            config.set_input_comparator(comparator.clone(), input);
        }
    }
    assign_local_strategy_resources(config, defaults, input, channel.local_strategy_memory);

    let mode = channel.temp_mode;
    if mode.breaks_pipeline() {
        config.set_input_dammed(input, true);
    }
    if mode.is_replayable() {
        config.set_input_replayable(input, true);
    }
    if mode != TempMode::None {
        config.set_input_dam_memory(input, channel.temp_memory);
    }
}
