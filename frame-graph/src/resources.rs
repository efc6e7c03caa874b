//! Per-frame resource tables.
//!
//! Everything here is cleared at the end of every frame. The backing storage
//! of the tables is kept so steady-state frames do not reallocate them.

use std::collections::HashMap;

use crate::barrier::ResourceState;
use crate::descriptor::{BufferDesc, Extent2d, ImageDesc};
use crate::device::Device;
use crate::handle::{PassId, ResourceHandle, ResourceKind};
use crate::pool::{PooledImage, ResourcePool};

/// What a symbolic name currently refers to.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NameEntry {
    pub handle: ResourceHandle,
    /// `None` for resources imported from outside the graph.
    pub writer: Option<PassId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BufferOrigin {
    Transient,
    /// Last frame's instance, read through `read_history_buffer`.
    History,
}

struct ImageSlot<I> {
    name: String,
    desc: ImageDesc,
    instance: Option<PooledImage<I>>,
}

struct BufferSlot<B> {
    name: String,
    desc: BufferDesc,
    origin: BufferOrigin,
    instance: Option<B>,
    initial: ResourceState,
}

struct ExternalSlot<R> {
    resource: R,
    initial: ResourceState,
}

pub struct FrameResources<D: Device> {
    frame: u32,
    names: HashMap<String, NameEntry>,
    latest_names: HashMap<ResourceHandle, String>,
    history: HashMap<String, ResourceHandle>,
    images: Vec<ImageSlot<D::Image>>,
    buffers: Vec<BufferSlot<D::Buffer>>,
    external_images: Vec<ExternalSlot<D::Image>>,
    external_buffers: Vec<ExternalSlot<D::Buffer>>,
}

impl<D: Device> FrameResources<D> {
    pub(crate) fn new() -> Self {
        Self {
            frame: 0,
            names: HashMap::new(),
            latest_names: HashMap::new(),
            history: HashMap::new(),
            images: Vec::new(),
            buffers: Vec::new(),
            external_images: Vec::new(),
            external_buffers: Vec::new(),
        }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub(crate) fn names(&self) -> &HashMap<String, NameEntry> {
        &self.names
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<NameEntry> {
        self.names.get(name).copied()
    }

    pub(crate) fn contains_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Points `name` at `handle`. The caller has already rejected duplicates.
    pub(crate) fn bind_name(&mut self, name: &str, handle: ResourceHandle, writer: Option<PassId>) {
        self.names
            .insert(name.to_string(), NameEntry { handle, writer });
        self.latest_names.insert(handle, name.to_string());
    }

    /// The most recent name written for `handle` this frame.
    pub(crate) fn latest_name(&self, handle: ResourceHandle) -> Option<&str> {
        if handle.frame() != self.frame {
            return None;
        }
        self.latest_names.get(&handle).map(String::as_str)
    }

    pub(crate) fn add_image(&mut self, name: &str, desc: ImageDesc) -> ResourceHandle {
        self.images.push(ImageSlot {
            name: name.to_string(),
            desc,
            instance: None,
        });
        ResourceHandle::new(ResourceKind::InternalImage, self.images.len() - 1, self.frame)
    }

    pub(crate) fn add_buffer(&mut self, name: &str, desc: BufferDesc) -> ResourceHandle {
        self.push_buffer(name, desc, BufferOrigin::Transient)
    }

    /// The slot standing in for last frame's `name`, shared by every reader.
    pub(crate) fn history_buffer(&mut self, name: &str, desc: BufferDesc) -> ResourceHandle {
        if let Some(handle) = self.history.get(name) {
            return *handle;
        }
        let handle = self.push_buffer(name, desc, BufferOrigin::History);
        self.history.insert(name.to_string(), handle);
        handle
    }

    fn push_buffer(
        &mut self,
        name: &str,
        desc: BufferDesc,
        origin: BufferOrigin,
    ) -> ResourceHandle {
        self.buffers.push(BufferSlot {
            name: name.to_string(),
            desc,
            origin,
            instance: None,
            initial: ResourceState::UNUSED,
        });
        ResourceHandle::new(ResourceKind::InternalBuffer, self.buffers.len() - 1, self.frame)
    }

    pub(crate) fn lookup_history(&self, name: &str) -> Option<ResourceHandle> {
        self.history.get(name).copied()
    }

    pub(crate) fn history_desc(&self, handle: ResourceHandle) -> Option<BufferDesc> {
        self.buffers
            .get(handle.index())
            .filter(|slot| slot.origin == BufferOrigin::History)
            .map(|slot| slot.desc)
    }

    pub(crate) fn add_external_image(
        &mut self,
        image: D::Image,
        initial: ResourceState,
    ) -> ResourceHandle {
        self.external_images.push(ExternalSlot {
            resource: image,
            initial,
        });
        ResourceHandle::new(
            ResourceKind::ExternalImage,
            self.external_images.len() - 1,
            self.frame,
        )
    }

    pub(crate) fn add_external_buffer(
        &mut self,
        buffer: D::Buffer,
        initial: ResourceState,
    ) -> ResourceHandle {
        self.external_buffers.push(ExternalSlot {
            resource: buffer,
            initial,
        });
        ResourceHandle::new(
            ResourceKind::ExternalBuffer,
            self.external_buffers.len() - 1,
            self.frame,
        )
    }

    /// Name and descriptor of the history slot behind `handle`, if it is one.
    pub(crate) fn history_entry(&self, handle: ResourceHandle) -> Option<(String, BufferDesc)> {
        if handle.frame() != self.frame || handle.kind() != ResourceKind::InternalBuffer {
            return None;
        }
        self.buffers
            .get(handle.index())
            .filter(|slot| slot.origin == BufferOrigin::History)
            .map(|slot| (slot.name.clone(), slot.desc))
    }

    /// Whether `handle` was minted this frame and points at a live slot.
    pub(crate) fn is_valid(&self, handle: ResourceHandle) -> bool {
        if handle.frame() != self.frame {
            return false;
        }
        let len = match handle.kind() {
            ResourceKind::InternalImage => self.images.len(),
            ResourceKind::InternalBuffer => self.buffers.len(),
            ResourceKind::ExternalImage => self.external_images.len(),
            ResourceKind::ExternalBuffer => self.external_buffers.len(),
        };
        handle.index() < len
    }

    /// Starting state of every resource this frame, for barrier synthesis.
    pub(crate) fn initial_states(&self) -> HashMap<ResourceHandle, ResourceState> {
        let frame = self.frame;
        let images = (0..self.images.len()).map(|index| {
            (
                ResourceHandle::new(ResourceKind::InternalImage, index, frame),
                ResourceState::UNUSED,
            )
        });
        let buffers = self.buffers.iter().enumerate().map(|(index, slot)| {
            (
                ResourceHandle::new(ResourceKind::InternalBuffer, index, frame),
                slot.initial,
            )
        });
        let external_images = self.external_images.iter().enumerate().map(|(index, slot)| {
            (
                ResourceHandle::new(ResourceKind::ExternalImage, index, frame),
                slot.initial,
            )
        });
        let external_buffers = self.external_buffers.iter().enumerate().map(|(index, slot)| {
            (
                ResourceHandle::new(ResourceKind::ExternalBuffer, index, frame),
                slot.initial,
            )
        });
        images
            .chain(buffers)
            .chain(external_images)
            .chain(external_buffers)
            .collect()
    }

    /// Moves last frame's history buffers into the slots that read them.
    pub(crate) fn claim_history(&mut self, pool: &mut ResourcePool<D>) {
        for slot in self
            .buffers
            .iter_mut()
            .filter(|slot| slot.origin == BufferOrigin::History && slot.instance.is_none())
        {
            match pool.take_history(&slot.desc, &slot.name) {
                Some((buffer, state)) => {
                    slot.instance = Some(buffer);
                    slot.initial = state;
                }
                None => log::debug!(
                    "No history kept for '{}', reading a fresh buffer",
                    slot.name
                ),
            }
        }
    }

    /// Gives `handle` a backend instance if it does not have one yet.
    pub(crate) fn allocate(
        &mut self,
        handle: ResourceHandle,
        pool: &mut ResourcePool<D>,
        device: &mut D,
        surface: Extent2d,
    ) {
        match handle.kind() {
            ResourceKind::InternalImage => {
                if let Some(slot) = self.images.get_mut(handle.index()) {
                    if slot.instance.is_none() {
                        let extent = slot.desc.extent(surface);
                        slot.instance =
                            Some(pool.acquire_image(device, &slot.name, &slot.desc, extent));
                    }
                }
            }
            ResourceKind::InternalBuffer => {
                if let Some(slot) = self.buffers.get_mut(handle.index()) {
                    if slot.instance.is_none() {
                        slot.instance = Some(pool.acquire_buffer(device, &slot.name, &slot.desc));
                    }
                }
            }
            ResourceKind::ExternalImage | ResourceKind::ExternalBuffer => {}
        }
    }

    pub(crate) fn image(&self, handle: ResourceHandle) -> Option<&D::Image> {
        if handle.frame() != self.frame {
            return None;
        }
        match handle.kind() {
            ResourceKind::InternalImage => self
                .images
                .get(handle.index())?
                .instance
                .as_ref()
                .map(PooledImage::image),
            ResourceKind::ExternalImage => self
                .external_images
                .get(handle.index())
                .map(|slot| &slot.resource),
            _ => None,
        }
    }

    pub(crate) fn buffer(&self, handle: ResourceHandle) -> Option<&D::Buffer> {
        if handle.frame() != self.frame {
            return None;
        }
        match handle.kind() {
            ResourceKind::InternalBuffer => self.buffers.get(handle.index())?.instance.as_ref(),
            ResourceKind::ExternalBuffer => self
                .external_buffers
                .get(handle.index())
                .map(|slot| &slot.resource),
            _ => None,
        }
    }

    pub(crate) fn image_extent(&self, handle: ResourceHandle) -> Option<Extent2d> {
        if handle.frame() != self.frame || handle.kind() != ResourceKind::InternalImage {
            return None;
        }
        self.images
            .get(handle.index())?
            .instance
            .as_ref()
            .map(PooledImage::extent)
    }

    /// Returns every instance to the pool and resets the tables for the next
    /// frame.
    ///
    /// `final_states` is present when the frame executed. Without it nothing
    /// was written, so history read this frame stays the newest history and
    /// buffers allocated this frame hold nothing worth keeping.
    pub(crate) fn release_into(
        &mut self,
        pool: &mut ResourcePool<D>,
        final_states: Option<&HashMap<ResourceHandle, ResourceState>>,
    ) {
        for slot in self.images.drain(..) {
            if let Some(instance) = slot.instance {
                pool.release_image(slot.desc, instance);
            }
        }

        for (index, slot) in self.buffers.drain(..).enumerate() {
            let Some(buffer) = slot.instance else {
                continue;
            };
            match (slot.origin, final_states) {
                (BufferOrigin::History, Some(_)) | (BufferOrigin::Transient, None) => {
                    pool.retire_buffer(slot.desc, buffer);
                }
                (BufferOrigin::History, None) => {
                    pool.release_buffer(slot.desc, &slot.name, buffer, slot.initial);
                }
                (BufferOrigin::Transient, Some(states)) => {
                    let handle =
                        ResourceHandle::new(ResourceKind::InternalBuffer, index, self.frame);
                    let state = states.get(&handle).copied().unwrap_or_default();
                    pool.release_buffer(slot.desc, &slot.name, buffer, state);
                }
            }
        }

        self.external_images.clear();
        self.external_buffers.clear();
        self.names.clear();
        self.latest_names.clear();
        self.history.clear();
        self.frame = self.frame.wrapping_add(1);
    }
}
