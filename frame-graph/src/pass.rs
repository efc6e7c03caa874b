use crate::access::{Access, AccessMask, PassKind, PipelineStage};
use crate::barrier::ResourceState;
use crate::descriptor::{BufferDesc, Extent2d, ImageDesc};
use crate::device::Device;
use crate::error::{CompileError, ExecuteError, Result};
use crate::graph::{FrameGraph, FrameState};
use crate::handle::{PassId, ResourceHandle, ResourceKind};
use crate::resources::FrameResources;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseKind {
    Read,
    /// Registers a new resource under the use's name.
    Write,
    /// Reads `read_from` and publishes the same resource under the use's name.
    ReadWrite,
    /// Reads what was written under the use's name last frame.
    History,
}

impl UseKind {
    /// True only for uses that produce a resource from scratch.
    pub fn is_plain_write(self) -> bool {
        matches!(self, Self::Write)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUse {
    pub name: String,
    pub handle: ResourceHandle,
    pub kind: UseKind,
    pub access: Access,
    pub access_mask: AccessMask,
    pub stage: PipelineStage,
    pub read_from: Option<String>,
}

impl ResourceUse {
    fn new(name: &str, handle: ResourceHandle, kind: UseKind, access: Access) -> Self {
        let (access_mask, stage) = access.masks();
        Self {
            name: name.to_string(),
            handle,
            kind,
            access,
            access_mask,
            stage,
            read_from: None,
        }
    }

    /// The name whose current producer this use depends on.
    pub fn reads_name(&self) -> Option<&str> {
        match self.kind {
            UseKind::Read => Some(&self.name),
            UseKind::ReadWrite => self.read_from.as_deref(),
            UseKind::Write | UseKind::History => None,
        }
    }

    /// The name this use publishes for later readers.
    pub fn writes_name(&self) -> Option<&str> {
        match self.kind {
            UseKind::Write | UseKind::ReadWrite => Some(&self.name),
            UseKind::Read | UseKind::History => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(
        name: &str,
        handle: ResourceHandle,
        kind: UseKind,
        access: Access,
    ) -> Self {
        Self::new(name, handle, kind, access)
    }

    #[cfg(test)]
    pub(crate) fn reading(mut self, input: &str) -> Self {
        self.read_from = Some(input.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Pass {
    id: PassId,
    name: String,
    kind: PassKind,
    uses: Vec<ResourceUse>,
    depends_on: Vec<PassId>,
}

impl Pass {
    pub(crate) fn new(id: PassId, name: &str, kind: PassKind) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            uses: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn id(&self) -> PassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    pub fn uses(&self) -> &[ResourceUse] {
        &self.uses
    }

    /// Passes this one was explicitly ordered after.
    pub fn explicit_dependencies(&self) -> &[PassId] {
        &self.depends_on
    }

    pub(crate) fn add_dependency(&mut self, dependency: PassId) {
        if !self.depends_on.contains(&dependency) {
            self.depends_on.push(dependency);
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(
        index: usize,
        name: &str,
        kind: PassKind,
        uses: Vec<ResourceUse>,
    ) -> Self {
        Self {
            id: PassId::new(index),
            name: name.to_string(),
            kind,
            uses,
            depends_on: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn after(mut self, dependency: usize) -> Self {
        self.depends_on.push(PassId::new(dependency));
        self
    }
}

pub type PassCallback<D> =
    Box<dyn FnOnce(&mut PassContext<'_, D>) -> std::result::Result<(), ExecuteError>>;

/// What a pass body sees while it records.
pub struct PassContext<'a, D: Device> {
    pub(crate) pass: &'a str,
    pub(crate) recorder: &'a mut D::Recorder,
    pub(crate) resources: &'a FrameResources<D>,
}

impl<'a, D: Device> PassContext<'a, D> {
    pub fn pass_name(&self) -> &str {
        self.pass
    }

    pub fn recorder(&mut self) -> &mut D::Recorder {
        &mut *self.recorder
    }

    pub fn image(&self, handle: ResourceHandle) -> std::result::Result<&'a D::Image, ExecuteError> {
        self.resources
            .image(handle)
            .ok_or_else(|| self.not_bound(handle, "image"))
    }

    pub fn buffer(
        &self,
        handle: ResourceHandle,
    ) -> std::result::Result<&'a D::Buffer, ExecuteError> {
        self.resources
            .buffer(handle)
            .ok_or_else(|| self.not_bound(handle, "buffer"))
    }

    /// Concrete size of a transient image. External images are sized by
    /// their owner.
    pub fn image_extent(
        &self,
        handle: ResourceHandle,
    ) -> std::result::Result<Extent2d, ExecuteError> {
        self.resources
            .image_extent(handle)
            .ok_or_else(|| self.not_bound(handle, "transient image"))
    }

    fn not_bound(&self, handle: ResourceHandle, expected: &'static str) -> ExecuteError {
        ExecuteError::ResourceNotBound {
            pass: self.pass.to_string(),
            handle,
            expected,
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Read,
    Write,
    ReadWrite,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "read-write",
        }
    }

    fn accepts(self, access: Access) -> bool {
        match self {
            Self::Read => !access.is_empty() && Access::ANY_READ.contains(access),
            Self::Write => !access.is_empty() && Access::ANY_WRITE.contains(access),
            Self::ReadWrite => access.is_write(),
        }
    }
}

fn kind_label(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::InternalImage => "a transient image",
        ResourceKind::InternalBuffer => "a transient buffer",
        ResourceKind::ExternalImage | ResourceKind::ExternalBuffer => "an external resource",
    }
}

/// Declares the resources of one pass.
///
/// Every call validates immediately. The first error of a frame is also
/// remembered by the graph, so `compile` fails even if the result is ignored.
pub struct PassBuilder<'a, D: Device> {
    pub(crate) graph: &'a mut FrameGraph<D>,
    pub(crate) id: PassId,
}

impl<'a, D: Device> PassBuilder<'a, D> {
    pub fn id(&self) -> PassId {
        self.id
    }

    pub fn write_image(
        &mut self,
        name: &str,
        desc: ImageDesc,
        access: Access,
    ) -> Result<ResourceHandle> {
        self.declare(|builder| {
            builder.check_access(name, access, Direction::Write, true)?;
            builder.check_unique(name)?;
            let handle = builder.graph.resources.add_image(name, desc);
            builder.publish(name, handle);
            builder.push_use(ResourceUse::new(name, handle, UseKind::Write, access));
            Ok(handle)
        })
    }

    pub fn write_buffer(
        &mut self,
        name: &str,
        desc: BufferDesc,
        access: Access,
    ) -> Result<ResourceHandle> {
        self.declare(|builder| {
            builder.check_access(name, access, Direction::Write, false)?;
            builder.check_unique(name)?;
            let handle = builder.graph.resources.add_buffer(name, desc);
            builder.publish(name, handle);
            builder.push_use(ResourceUse::new(name, handle, UseKind::Write, access));
            Ok(handle)
        })
    }

    pub fn read_image(&mut self, name: &str, access: Access) -> Result<ResourceHandle> {
        self.declare(|builder| {
            let handle = builder.resolve(name, &[ResourceKind::InternalImage])?;
            builder.check_access(name, access, Direction::Read, true)?;
            builder.push_use(ResourceUse::new(name, handle, UseKind::Read, access));
            Ok(handle)
        })
    }

    pub fn read_buffer(&mut self, name: &str, access: Access) -> Result<ResourceHandle> {
        self.declare(|builder| {
            let handle = builder.resolve(name, &[ResourceKind::InternalBuffer])?;
            builder.check_access(name, access, Direction::Read, false)?;
            builder.push_use(ResourceUse::new(name, handle, UseKind::Read, access));
            Ok(handle)
        })
    }

    pub fn read_external(&mut self, name: &str, access: Access) -> Result<ResourceHandle> {
        self.declare(|builder| {
            let handle = builder.resolve(
                name,
                &[ResourceKind::ExternalImage, ResourceKind::ExternalBuffer],
            )?;
            builder.check_access(name, access, Direction::Read, handle.is_image())?;
            builder.push_use(ResourceUse::new(name, handle, UseKind::Read, access));
            Ok(handle)
        })
    }

    /// Reads the latest version of a resource declared earlier this frame.
    /// A handle from `read_history_buffer` reads the same history buffer.
    pub fn read(&mut self, handle: ResourceHandle, access: Access) -> Result<ResourceHandle> {
        if self.graph.state != FrameState::Declaring {
            return Err(CompileError::AlreadyCompiled);
        }
        if !self.graph.resources.is_valid(handle) {
            return self.declare(|_| Err(CompileError::StaleOrUnknownHandle { handle }));
        }
        if let Some((name, desc)) = self.graph.resources.history_entry(handle) {
            return self.read_history_buffer(&name, desc, access);
        }
        let Some(name) = self.graph.resources.latest_name(handle).map(str::to_string) else {
            return self.declare(|_| Err(CompileError::StaleOrUnknownHandle { handle }));
        };
        match handle.kind() {
            ResourceKind::InternalImage => self.read_image(&name, access),
            ResourceKind::InternalBuffer => self.read_buffer(&name, access),
            ResourceKind::ExternalImage | ResourceKind::ExternalBuffer => {
                self.read_external(&name, access)
            }
        }
    }

    /// Modifies the transient image `input` in place and publishes the result
    /// as `output`. Later readers must use `output`.
    pub fn read_write_image(
        &mut self,
        input: &str,
        output: &str,
        access: Access,
    ) -> Result<ResourceHandle> {
        self.read_write(input, output, access, &[ResourceKind::InternalImage])
    }

    pub fn read_write_buffer(
        &mut self,
        input: &str,
        output: &str,
        access: Access,
    ) -> Result<ResourceHandle> {
        self.read_write(input, output, access, &[ResourceKind::InternalBuffer])
    }

    /// Read-modify-write of an external resource. Modifying the presentation
    /// target moves the presentation to `output`.
    pub fn read_write_external(
        &mut self,
        input: &str,
        output: &str,
        access: Access,
    ) -> Result<ResourceHandle> {
        let handle = self.read_write(
            input,
            output,
            access,
            &[ResourceKind::ExternalImage, ResourceKind::ExternalBuffer],
        )?;
        if self.graph.presentation.as_deref() == Some(input) {
            self.graph.presentation = Some(output.to_string());
        }
        Ok(handle)
    }

    fn read_write(
        &mut self,
        input: &str,
        output: &str,
        access: Access,
        kinds: &[ResourceKind],
    ) -> Result<ResourceHandle> {
        self.declare(|builder| {
            let handle = builder.resolve(input, kinds)?;
            builder.check_access(output, access, Direction::ReadWrite, handle.is_image())?;
            builder.check_unique(output)?;
            builder.publish(output, handle);
            let mut resource_use = ResourceUse::new(output, handle, UseKind::ReadWrite, access);
            resource_use.read_from = Some(input.to_string());
            builder.push_use(resource_use);
            Ok(handle)
        })
    }

    pub fn write_external_image(
        &mut self,
        name: &str,
        image: D::Image,
        access: Access,
    ) -> Result<ResourceHandle> {
        self.declare(|builder| {
            builder.check_access(name, access, Direction::Write, true)?;
            builder.check_unique(name)?;
            let handle = builder
                .graph
                .resources
                .add_external_image(image, ResourceState::UNUSED);
            builder.publish(name, handle);
            builder.push_use(ResourceUse::new(name, handle, UseKind::Write, access));
            Ok(handle)
        })
    }

    pub fn write_external_buffer(
        &mut self,
        name: &str,
        buffer: D::Buffer,
        access: Access,
    ) -> Result<ResourceHandle> {
        self.declare(|builder| {
            builder.check_access(name, access, Direction::Write, false)?;
            builder.check_unique(name)?;
            let handle = builder
                .graph
                .resources
                .add_external_buffer(buffer, ResourceState::UNUSED);
            builder.publish(name, handle);
            builder.push_use(ResourceUse::new(name, handle, UseKind::Write, access));
            Ok(handle)
        })
    }

    /// Writes the image that leaves the frame, e.g. the surface texture.
    pub fn write_presentation(
        &mut self,
        name: &str,
        image: D::Image,
        access: Access,
    ) -> Result<ResourceHandle> {
        let handle = self.write_external_image(name, image, access)?;
        if let Some(previous) = self.graph.presentation.replace(name.to_string()) {
            log::warn!("Presentation target '{previous}' replaced by '{name}'");
        }
        Ok(handle)
    }

    /// Reads the buffer written under `name` during the previous frame.
    pub fn read_history_buffer(
        &mut self,
        name: &str,
        desc: BufferDesc,
        access: Access,
    ) -> Result<ResourceHandle> {
        self.declare(|builder| {
            builder.check_access(name, access, Direction::Read, false)?;
            if !desc.history {
                return Err(CompileError::NotHistoryBuffer {
                    pass: builder.pass_name(),
                    name: name.to_string(),
                });
            }
            let existing = builder.graph.resources.lookup_history(name);
            if let Some(existing) = existing {
                if builder.graph.resources.history_desc(existing) != Some(desc) {
                    return Err(CompileError::ResourceKindMismatch {
                        pass: builder.pass_name(),
                        name: name.to_string(),
                        expected: "the same history descriptor",
                        actual: existing.kind(),
                    });
                }
            }
            let handle = builder.graph.resources.history_buffer(name, desc);
            builder.push_use(ResourceUse::new(name, handle, UseKind::History, access));
            Ok(handle)
        })
    }

    /// Orders this pass after `pass` even without a resource between them.
    pub fn depends_on(&mut self, pass: PassId) -> Result<()> {
        self.graph.add_dependency(self.id, pass)
    }

    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut PassContext<'_, D>) -> std::result::Result<(), ExecuteError> + 'static,
    {
        if let Err(error) = self.graph.set_callback(self.id, callback) {
            log::warn!("Dropping callback: {error}");
        }
    }

    fn declare<T>(&mut self, declaration: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.graph.state != FrameState::Declaring {
            return Err(CompileError::AlreadyCompiled);
        }
        let result = declaration(self);
        if let Err(error) = &result {
            self.graph.error.get_or_insert_with(|| error.clone());
        }
        result
    }

    fn pass(&self) -> Option<&Pass> {
        self.graph.passes.get(self.id.index())
    }

    fn pass_name(&self) -> String {
        self.pass().map(|pass| pass.name.clone()).unwrap_or_default()
    }

    fn pass_kind(&self) -> PassKind {
        self.pass().map_or(PassKind::Graphics, |pass| pass.kind)
    }

    fn check_unique(&self, name: &str) -> Result<()> {
        if self.graph.resources.contains_name(name) {
            return Err(CompileError::DuplicateResourceName {
                pass: self.pass_name(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn check_access(
        &self,
        name: &str,
        access: Access,
        direction: Direction,
        image: bool,
    ) -> Result<()> {
        if !direction.accepts(access) {
            return Err(CompileError::InvalidAccess {
                pass: self.pass_name(),
                name: name.to_string(),
                access,
                usage: direction.label(),
            });
        }

        let kind = self.pass_kind();
        if !kind.allows(access) {
            return Err(CompileError::KindMismatch {
                pass: self.pass_name(),
                kind,
                access,
            });
        }

        let (forbidden, usage) = if image {
            (Access::BUFFER_ONLY, "image")
        } else {
            (Access::IMAGE_ONLY, "buffer")
        };
        if access.intersects(forbidden) {
            return Err(CompileError::InvalidAccess {
                pass: self.pass_name(),
                name: name.to_string(),
                access,
                usage,
            });
        }
        Ok(())
    }

    fn resolve(&self, name: &str, kinds: &[ResourceKind]) -> Result<ResourceHandle> {
        let Some(entry) = self.graph.resources.lookup(name) else {
            return Err(CompileError::UnresolvedResource {
                pass: self.pass_name(),
                name: name.to_string(),
            });
        };
        if !kinds.contains(&entry.handle.kind()) {
            return Err(CompileError::ResourceKindMismatch {
                pass: self.pass_name(),
                name: name.to_string(),
                expected: kinds.first().copied().map_or("a resource", kind_label),
                actual: entry.handle.kind(),
            });
        }
        Ok(entry.handle)
    }

    fn publish(&mut self, name: &str, handle: ResourceHandle) {
        self.graph
            .resources
            .bind_name(name, handle, Some(self.id));
    }

    fn push_use(&mut self, resource_use: ResourceUse) {
        if let Some(pass) = self.graph.passes.get_mut(self.id.index()) {
            pass.uses.push(resource_use);
        }
    }
}
