use std::collections::HashMap;

use crate::access::{Access, PassKind};
use crate::barrier::{Barrier, ResourceState, synthesize};
use crate::descriptor::Extent2d;
use crate::device::Device;
use crate::error::{CompileError, ExecuteError, Result};
use crate::handle::{PassId, ResourceHandle};
use crate::pass::{Pass, PassBuilder, PassCallback, PassContext};
use crate::pool::{PoolStats, ResourcePool};
use crate::resolve::{Schedule, resolve};
use crate::resources::FrameResources;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameGraphConfig {
    /// Log every compiled frame's order and barrier count at `info`.
    pub verbose: bool,
    /// Report culled passes at `warn` instead of `debug`.
    pub warn_on_culled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Declaring,
    Compiled,
    Executing,
}

pub struct FrameGraph<D: Device> {
    device: D,
    config: FrameGraphConfig,
    pool: ResourcePool<D>,
    pub(crate) passes: Vec<Pass>,
    callbacks: Vec<Option<PassCallback<D>>>,
    pub(crate) resources: FrameResources<D>,
    pub(crate) presentation: Option<String>,
    pub(crate) state: FrameState,
    pub(crate) error: Option<CompileError>,
    schedule: Schedule,
    barriers: HashMap<PassId, Vec<Barrier>>,
    final_states: HashMap<ResourceHandle, ResourceState>,
    surface: Extent2d,
}

impl<D: Device> FrameGraph<D> {
    pub fn new(device: D) -> Self {
        Self::with_config(device, FrameGraphConfig::default())
    }

    pub fn with_config(device: D, config: FrameGraphConfig) -> Self {
        Self {
            device,
            config,
            pool: ResourcePool::new(),
            passes: Vec::new(),
            callbacks: Vec::new(),
            resources: FrameResources::new(),
            presentation: None,
            state: FrameState::Declaring,
            error: None,
            schedule: Schedule::default(),
            barriers: HashMap::new(),
            final_states: HashMap::new(),
            surface: Extent2d::default(),
        }
    }

    pub fn begin_pass(&mut self, name: &str, kind: PassKind) -> PassBuilder<'_, D> {
        let id = PassId::new(self.passes.len());
        if self.state == FrameState::Declaring {
            self.passes.push(Pass::new(id, name, kind));
            self.callbacks.push(None);
        } else {
            log::warn!("Pass '{name}' declared on a frame that is already compiled");
        }
        PassBuilder { graph: self, id }
    }

    pub fn add_graphics_pass(&mut self, name: &str) -> PassBuilder<'_, D> {
        self.begin_pass(name, PassKind::Graphics)
    }

    pub fn add_compute_pass(&mut self, name: &str) -> PassBuilder<'_, D> {
        self.begin_pass(name, PassKind::Compute)
    }

    pub fn add_transfer_pass(&mut self, name: &str) -> PassBuilder<'_, D> {
        self.begin_pass(name, PassKind::Transfer)
    }

    pub fn set_callback<F>(&mut self, pass: PassId, callback: F) -> Result<()>
    where
        F: FnOnce(&mut PassContext<'_, D>) -> std::result::Result<(), ExecuteError> + 'static,
    {
        if self.state != FrameState::Declaring {
            return Err(CompileError::AlreadyCompiled);
        }
        let slot = self
            .callbacks
            .get_mut(pass.index())
            .ok_or(CompileError::UnknownPass { pass })?;
        *slot = Some(Box::new(callback));
        Ok(())
    }

    /// Orders `pass` after `dependency` even without a resource between them.
    pub fn add_dependency(&mut self, pass: PassId, dependency: PassId) -> Result<()> {
        if self.state != FrameState::Declaring {
            return Err(CompileError::AlreadyCompiled);
        }
        let count = self.passes.len();
        let unknown = [pass, dependency].into_iter().find(|id| id.index() >= count);
        if let Some(unknown) = unknown {
            let error = CompileError::UnknownPass { pass: unknown };
            self.error.get_or_insert_with(|| error.clone());
            return Err(error);
        }
        self.passes[pass.index()].add_dependency(dependency);
        Ok(())
    }

    /// Registers a caller-owned image no pass writes this frame, such as a
    /// texture uploaded elsewhere. `last_access` is how it was last used.
    pub fn import_image(
        &mut self,
        name: &str,
        image: D::Image,
        last_access: Access,
    ) -> Result<ResourceHandle> {
        self.import(name, |resources| {
            resources.add_external_image(image, ResourceState::from_access(last_access))
        })
    }

    pub fn import_buffer(
        &mut self,
        name: &str,
        buffer: D::Buffer,
        last_access: Access,
    ) -> Result<ResourceHandle> {
        self.import(name, |resources| {
            resources.add_external_buffer(buffer, ResourceState::from_access(last_access))
        })
    }

    fn import(
        &mut self,
        name: &str,
        add: impl FnOnce(&mut FrameResources<D>) -> ResourceHandle,
    ) -> Result<ResourceHandle> {
        if self.state != FrameState::Declaring {
            return Err(CompileError::AlreadyCompiled);
        }
        if self.resources.contains_name(name) {
            let error = CompileError::DuplicateResourceName {
                pass: "<import>".to_string(),
                name: name.to_string(),
            };
            self.error.get_or_insert_with(|| error.clone());
            return Err(error);
        }
        let handle = add(&mut self.resources);
        self.resources.bind_name(name, handle, None);
        Ok(handle)
    }

    pub fn compile_for_surface(&mut self) -> Result<()> {
        let size = self.device.output_surface_size();
        self.compile(size)
    }

    /// Orders the declared passes, synthesizes their barriers and binds a
    /// backend instance to every transient resource a scheduled pass uses.
    ///
    /// On failure the frame is discarded and nothing reaches the device.
    pub fn compile(&mut self, output_size: Extent2d) -> Result<()> {
        if self.state != FrameState::Declaring {
            return Err(CompileError::AlreadyCompiled);
        }

        match self.try_compile(output_size) {
            Ok(()) => {
                self.state = FrameState::Compiled;
                Ok(())
            }
            Err(error) => {
                log::warn!(
                    "Discarding frame {}: {error}",
                    self.resources.frame()
                );
                self.clear_frame(false);
                Err(error)
            }
        }
    }

    fn try_compile(&mut self, surface: Extent2d) -> Result<()> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }

        let schedule = resolve(
            &self.passes,
            self.resources.names(),
            self.presentation.as_deref(),
        )?;

        for id in &schedule.culled {
            let name = self.passes[id.index()].name();
            if self.config.warn_on_culled {
                log::warn!("Culling pass '{name}': nothing presented depends on it");
            } else {
                log::debug!("Culling pass '{name}'");
            }
        }

        self.resources.claim_history(&mut self.pool);
        let plan = synthesize(
            &self.passes,
            &schedule.order,
            &self.resources.initial_states(),
        )?;

        self.pool.evict_stale(&mut self.device, surface);
        for id in &schedule.order {
            for resource_use in self.passes[id.index()].uses() {
                self.resources
                    .allocate(resource_use.handle, &mut self.pool, &mut self.device, surface);
            }
        }

        let barrier_count: usize = plan.per_pass.values().map(Vec::len).sum();
        let order: Vec<&str> = schedule
            .order
            .iter()
            .map(|id| self.passes[id.index()].name())
            .collect();
        if self.config.verbose {
            log::info!(
                "Frame {} compiled at {}x{}: {order:?}, {barrier_count} barrier(s)",
                self.resources.frame(),
                surface.width,
                surface.height
            );
        } else {
            log::debug!(
                "Frame {} compiled: {} pass(es), {} culled, {barrier_count} barrier(s)",
                self.resources.frame(),
                order.len(),
                schedule.culled.len()
            );
        }

        self.surface = surface;
        self.schedule = schedule;
        self.barriers = plan.per_pass;
        self.final_states = plan.final_states;
        Ok(())
    }

    /// Records and submits every scheduled pass, then resets for the next
    /// frame.
    pub fn execute(&mut self) -> std::result::Result<(), ExecuteError> {
        if self.state != FrameState::Compiled {
            return Err(ExecuteError::NotCompiled);
        }
        self.state = FrameState::Executing;

        let mut outcome = Ok(());
        for id in &self.schedule.order {
            let pass = &self.passes[id.index()];
            let mut recorder = self.device.open_command_recorder(pass.name());

            for barrier in self.barriers.get(id).into_iter().flatten() {
                self.device.record_barrier(&mut recorder, barrier);
            }

            if let Some(callback) = self.callbacks.get_mut(id.index()).and_then(Option::take) {
                let mut context = PassContext {
                    pass: pass.name(),
                    recorder: &mut recorder,
                    resources: &self.resources,
                };
                if let Err(error) = callback(&mut context) {
                    log::error!("Pass '{}' failed, abandoning the frame: {error}", pass.name());
                    outcome = Err(error);
                    break;
                }
            }

            self.device.submit(recorder);
        }

        self.pool.begin_release_cycle();
        self.clear_frame(true);
        outcome
    }

    /// Abandons the current frame without submitting anything.
    pub fn discard_frame(&mut self) {
        if self.state == FrameState::Compiled || !self.passes.is_empty() {
            log::debug!("Discarding frame {}", self.resources.frame());
        }
        self.clear_frame(false);
    }

    fn clear_frame(&mut self, executed: bool) {
        self.resources
            .release_into(&mut self.pool, executed.then_some(&self.final_states));
        self.passes.clear();
        self.callbacks.clear();
        self.presentation = None;
        self.error = None;
        self.schedule.order.clear();
        self.schedule.culled.clear();
        self.barriers.clear();
        self.final_states.clear();
        self.state = FrameState::Declaring;
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &FrameGraphConfig {
        &self.config
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Generation stamped into handles minted this frame.
    pub fn frame_index(&self) -> u32 {
        self.resources.frame()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn presentation(&self) -> Option<&str> {
        self.presentation.as_deref()
    }

    /// Names of the scheduled passes in execution order, once compiled.
    pub fn pass_order(&self) -> Vec<&str> {
        self.names_of(&self.schedule.order)
    }

    pub fn culled_passes(&self) -> Vec<&str> {
        self.names_of(&self.schedule.culled)
    }

    /// Barriers recorded before `pass` runs.
    pub fn barriers(&self, pass: PassId) -> &[Barrier] {
        self.barriers.get(&pass).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Barriers of the scheduled pass called `name`.
    pub fn barriers_for(&self, name: &str) -> &[Barrier] {
        self.passes
            .iter()
            .find(|pass| pass.name() == name)
            .map(|pass| self.barriers(pass.id()))
            .unwrap_or(&[])
    }

    /// Size transient surface-relative images were allocated at.
    pub fn compiled_surface(&self) -> Extent2d {
        self.surface
    }

    fn names_of(&self, ids: &[PassId]) -> Vec<&str> {
        ids.iter()
            .filter_map(|id| self.passes.get(id.index()))
            .map(Pass::name)
            .collect()
    }
}

impl<D: Device> Drop for FrameGraph<D> {
    fn drop(&mut self) {
        self.clear_frame(false);
        self.pool.destroy_all(&mut self.device);
    }
}
