use std::collections::HashMap;

use crate::access::{Access, AccessMask, PipelineStage};
use crate::error::{CompileError, Result};
use crate::handle::{PassId, ResourceHandle};
use crate::pass::{Pass, ResourceUse};

/// Last known (stage, access) of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceState {
    pub stage: PipelineStage,
    pub access: AccessMask,
}

impl ResourceState {
    /// A resource nothing has touched yet; there is nothing to wait on.
    pub const UNUSED: Self = Self {
        stage: PipelineStage::empty(),
        access: AccessMask::empty(),
    };

    pub fn from_access(access: Access) -> Self {
        let (access, stage) = access.masks();
        Self { stage, access }
    }

    pub fn is_unused(&self) -> bool {
        self.stage.is_empty() && self.access.is_empty()
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::UNUSED
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Barrier {
    pub resource: ResourceHandle,
    pub src_stage: PipelineStage,
    pub src_access: AccessMask,
    pub dst_stage: PipelineStage,
    pub dst_access: AccessMask,
}

/// Barriers for every scheduled pass plus where each resource ended up.
#[derive(Debug, Default)]
pub struct BarrierPlan {
    pub per_pass: HashMap<PassId, Vec<Barrier>>,
    pub final_states: HashMap<ResourceHandle, ResourceState>,
}

struct Tracked {
    state: ResourceState,
    /// Stages of pure reads since the last state change.
    readers: PipelineStage,
}

/// Walks `order` and emits the barriers each pass needs before it runs.
///
/// `initial` must hold an entry for every handle a scheduled pass uses.
pub fn synthesize(
    passes: &[Pass],
    order: &[PassId],
    initial: &HashMap<ResourceHandle, ResourceState>,
) -> Result<BarrierPlan> {
    let mut tracked: HashMap<ResourceHandle, Tracked> = initial
        .iter()
        .map(|(handle, state)| {
            (
                *handle,
                Tracked {
                    state: *state,
                    readers: PipelineStage::empty(),
                },
            )
        })
        .collect();

    let mut plan = BarrierPlan::default();

    for id in order {
        let Some(pass) = passes.get(id.index()) else {
            return Err(CompileError::UnknownPass { pass: *id });
        };

        let mut barriers = Vec::new();
        for group in use_groups(pass) {
            for resource_use in group {
                let entry = tracked.get_mut(&resource_use.handle).ok_or(
                    CompileError::StaleOrUnknownHandle {
                        handle: resource_use.handle,
                    },
                )?;
                if let Some(barrier) = transition(entry, resource_use) {
                    log::trace!(
                        "Barrier before '{}' on {}: {:?}/{:?} -> {:?}/{:?}",
                        pass.name(),
                        barrier.resource,
                        barrier.src_stage,
                        barrier.src_access,
                        barrier.dst_stage,
                        barrier.dst_access
                    );
                    barriers.push(barrier);
                }
            }
        }
        plan.per_pass.insert(*id, barriers);
    }

    plan.final_states = tracked
        .into_iter()
        .map(|(handle, entry)| (handle, entry.state))
        .collect();
    Ok(plan)
}

/// Uses in barrier order: external writes, internal writes, external reads,
/// internal reads. Declaration order is kept within each group.
fn use_groups(pass: &Pass) -> [impl Iterator<Item = &ResourceUse>; 4] {
    let select = move |external: bool, write: bool| {
        pass.uses().iter().filter(move |resource_use| {
            resource_use.handle.is_external() == external
                && resource_use.kind.is_plain_write() == write
        })
    };
    [
        select(true, true),
        select(false, true),
        select(true, false),
        select(false, false),
    ]
}

fn transition(entry: &mut Tracked, resource_use: &ResourceUse) -> Option<Barrier> {
    let writes = resource_use.access.is_write();
    let src_stage = if writes {
        entry.state.stage | entry.readers
    } else {
        entry.state.stage
    };
    let src_access = entry.state.access;

    let barrier = (!src_stage.is_empty() || !src_access.is_empty()).then_some(Barrier {
        resource: resource_use.handle,
        src_stage,
        src_access,
        dst_stage: resource_use.stage,
        dst_access: resource_use.access_mask,
    });

    if writes {
        entry.state = ResourceState {
            stage: resource_use.stage,
            access: resource_use.access_mask,
        };
        entry.readers = PipelineStage::empty();
    } else {
        entry.readers |= resource_use.stage;
    }

    barrier
}
