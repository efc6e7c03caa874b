//! Cross-frame pool of transient backend resources.
//!
//! Instances are keyed by their descriptor. An instance lives in exactly one
//! place at a time: a free list, the deferred-reuse table, or a frame's
//! resource table. Moving the owning value between those places is the only
//! way it changes hands, so a single instance can never be handed out twice.

use std::collections::HashMap;

use crate::barrier::ResourceState;
use crate::descriptor::{BufferDesc, Extent2d, ImageDesc};
use crate::device::Device;

/// An owned image instance together with the size it was created at.
#[derive(Debug)]
pub struct PooledImage<I> {
    image: I,
    extent: Extent2d,
}

impl<I> PooledImage<I> {
    pub fn image(&self) -> &I {
        &self.image
    }

    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    fn into_inner(self) -> I {
        self.image
    }
}

/// A history buffer waiting out its extra frame.
struct DeferredBuffer<B> {
    name: String,
    buffer: B,
    last_state: ResourceState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub free_images: usize,
    pub free_buffers: usize,
    pub deferred_buffers: usize,
    pub images_created: u64,
    pub buffers_created: u64,
    pub images_destroyed: u64,
    pub buffers_destroyed: u64,
}

pub struct ResourcePool<D: Device> {
    free_images: HashMap<ImageDesc, Vec<PooledImage<D::Image>>>,
    free_buffers: HashMap<BufferDesc, Vec<D::Buffer>>,
    deferred_buffers: HashMap<BufferDesc, Vec<DeferredBuffer<D::Buffer>>>,
    images_created: u64,
    buffers_created: u64,
    images_destroyed: u64,
    buffers_destroyed: u64,
}

impl<D: Device> ResourcePool<D> {
    pub fn new() -> Self {
        Self {
            free_images: HashMap::new(),
            free_buffers: HashMap::new(),
            deferred_buffers: HashMap::new(),
            images_created: 0,
            buffers_created: 0,
            images_destroyed: 0,
            buffers_destroyed: 0,
        }
    }

    pub fn acquire_image(
        &mut self,
        device: &mut D,
        label: &str,
        desc: &ImageDesc,
        extent: Extent2d,
    ) -> PooledImage<D::Image> {
        if let Some(free) = self.free_images.get_mut(desc) {
            while let Some(pooled) = free.pop() {
                if pooled.extent == extent {
                    return pooled;
                }
                // Only reachable if eviction was skipped for this size change.
                log::debug!(
                    "Discarding pooled image {desc:?} at {:?}, {extent:?} requested",
                    pooled.extent
                );
                device.destroy_image(pooled.into_inner());
                self.images_destroyed += 1;
            }
        }

        log::trace!("Creating image '{label}' {desc:?} at {extent:?}");
        self.images_created += 1;
        PooledImage {
            image: device.create_image(label, desc, extent),
            extent,
        }
    }

    pub fn acquire_buffer(&mut self, device: &mut D, label: &str, desc: &BufferDesc) -> D::Buffer {
        if let Some(buffer) = self.free_buffers.get_mut(desc).and_then(Vec::pop) {
            return buffer;
        }

        log::trace!("Creating buffer '{label}' {desc:?}");
        self.buffers_created += 1;
        device.create_buffer(label, desc)
    }

    pub fn release_image(&mut self, desc: ImageDesc, image: PooledImage<D::Image>) {
        self.free_images.entry(desc).or_default().push(image);
    }

    /// Returns a buffer at the end of the frame that last used it.
    ///
    /// History buffers are quarantined under `name` until the next release
    /// cycle so the following frame can still read them.
    pub fn release_buffer(
        &mut self,
        desc: BufferDesc,
        name: &str,
        buffer: D::Buffer,
        last_state: ResourceState,
    ) {
        if desc.history {
            self.deferred_buffers
                .entry(desc)
                .or_default()
                .push(DeferredBuffer {
                    name: name.to_string(),
                    buffer,
                    last_state,
                });
        } else {
            self.free_buffers.entry(desc).or_default().push(buffer);
        }
    }

    /// Returns a buffer straight to its free list, skipping quarantine.
    pub fn retire_buffer(&mut self, desc: BufferDesc, buffer: D::Buffer) {
        self.free_buffers.entry(desc).or_default().push(buffer);
    }

    /// Claims last frame's history buffer written under `name`.
    pub fn take_history(
        &mut self,
        desc: &BufferDesc,
        name: &str,
    ) -> Option<(D::Buffer, ResourceState)> {
        let deferred = self.deferred_buffers.get_mut(desc)?;
        let position = deferred.iter().position(|entry| entry.name == name)?;
        let entry = deferred.swap_remove(position);
        Some((entry.buffer, entry.last_state))
    }

    /// Ends the quarantine of everything deferred during the previous cycle.
    pub fn begin_release_cycle(&mut self) {
        for (desc, deferred) in self.deferred_buffers.iter_mut() {
            if deferred.is_empty() {
                continue;
            }
            self.free_buffers
                .entry(*desc)
                .or_default()
                .extend(deferred.drain(..).map(|entry| entry.buffer));
        }
    }

    /// Destroys surface-relative images whose size no longer matches `surface`.
    pub fn evict_stale(&mut self, device: &mut D, surface: Extent2d) {
        let stale: Vec<ImageDesc> = self
            .free_images
            .iter()
            .filter(|(desc, images)| {
                desc.is_surface_relative()
                    && images
                        .first()
                        .is_some_and(|pooled| pooled.extent != desc.extent(surface))
            })
            .map(|(desc, _)| *desc)
            .collect();

        for desc in stale {
            let Some(images) = self.free_images.remove(&desc) else {
                continue;
            };
            log::debug!(
                "Evicting {} pooled image(s) of {desc:?} after resize to {}x{}",
                images.len(),
                surface.width,
                surface.height
            );
            for pooled in images {
                device.destroy_image(pooled.into_inner());
                self.images_destroyed += 1;
            }
        }
    }

    pub fn destroy_all(&mut self, device: &mut D) {
        for (_, images) in self.free_images.drain() {
            for pooled in images {
                device.destroy_image(pooled.into_inner());
                self.images_destroyed += 1;
            }
        }
        for (_, buffers) in self.free_buffers.drain() {
            for buffer in buffers {
                device.destroy_buffer(buffer);
                self.buffers_destroyed += 1;
            }
        }
        for (_, deferred) in self.deferred_buffers.drain() {
            for entry in deferred {
                device.destroy_buffer(entry.buffer);
                self.buffers_destroyed += 1;
            }
        }
    }

    pub fn free_image_count(&self, desc: &ImageDesc) -> usize {
        self.free_images.get(desc).map_or(0, Vec::len)
    }

    pub fn free_buffer_count(&self, desc: &BufferDesc) -> usize {
        self.free_buffers.get(desc).map_or(0, Vec::len)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            free_images: self.free_images.values().map(Vec::len).sum(),
            free_buffers: self.free_buffers.values().map(Vec::len).sum(),
            deferred_buffers: self.deferred_buffers.values().map(Vec::len).sum(),
            images_created: self.images_created,
            buffers_created: self.buffers_created,
            images_destroyed: self.images_destroyed,
            buffers_destroyed: self.buffers_destroyed,
        }
    }
}

impl<D: Device> Default for ResourcePool<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::Barrier;
    use crate::descriptor::ImageFormat;
    use std::collections::HashSet;

    #[derive(Default)]
    struct CountingDevice {
        next_id: u32,
        destroyed: Vec<u32>,
    }

    impl Device for CountingDevice {
        type Image = u32;
        type Buffer = u32;
        type Recorder = ();

        fn create_image(&mut self, _: &str, _: &ImageDesc, _: Extent2d) -> u32 {
            self.next_id += 1;
            self.next_id
        }

        fn create_buffer(&mut self, _: &str, _: &BufferDesc) -> u32 {
            self.next_id += 1;
            self.next_id
        }

        fn destroy_image(&mut self, image: u32) {
            self.destroyed.push(image);
        }

        fn destroy_buffer(&mut self, buffer: u32) {
            self.destroyed.push(buffer);
        }

        fn open_command_recorder(&mut self, _: &str) {}

        fn record_barrier(&mut self, _: &mut (), _: &Barrier) {}

        fn submit(&mut self, _: ()) {}

        fn output_surface_size(&self) -> Extent2d {
            Extent2d::new(800, 600)
        }
    }

    #[test]
    fn concurrently_acquired_images_are_distinct() {
        let mut device = CountingDevice::default();
        let mut pool = ResourcePool::<CountingDevice>::new();
        let desc = ImageDesc::surface(ImageFormat::Rgba8Unorm);
        let extent = Extent2d::new(800, 600);

        let first = pool.acquire_image(&mut device, "a", &desc, extent);
        let second = pool.acquire_image(&mut device, "b", &desc, extent);
        assert_ne!(first.image(), second.image());

        pool.release_image(desc, first);
        pool.release_image(desc, second);

        let ids: HashSet<u32> = (0..2)
            .map(|_| *pool.acquire_image(&mut device, "c", &desc, extent).image())
            .collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(pool.stats().images_created, 2);
    }

    #[test]
    fn released_buffers_are_reused() {
        let mut device = CountingDevice::default();
        let mut pool = ResourcePool::<CountingDevice>::new();
        let desc = BufferDesc::new(1024);

        let buffer = pool.acquire_buffer(&mut device, "counts", &desc);
        pool.release_buffer(desc, "counts", buffer, ResourceState::UNUSED);
        assert_eq!(pool.free_buffer_count(&desc), 1);

        assert_eq!(pool.acquire_buffer(&mut device, "counts", &desc), buffer);
        assert_eq!(pool.stats().buffers_created, 1);
    }

    #[test]
    fn history_buffers_wait_one_release_cycle() {
        let mut device = CountingDevice::default();
        let mut pool = ResourcePool::<CountingDevice>::new();
        let desc = BufferDesc::new(64).with_history();

        let buffer = pool.acquire_buffer(&mut device, "luma", &desc);
        pool.begin_release_cycle();
        pool.release_buffer(desc, "luma", buffer, ResourceState::UNUSED);
        assert_eq!(pool.free_buffer_count(&desc), 0);
        assert_eq!(pool.stats().deferred_buffers, 1);

        pool.begin_release_cycle();
        assert_eq!(pool.free_buffer_count(&desc), 1);
        assert_eq!(pool.stats().deferred_buffers, 0);
    }

    #[test]
    fn history_can_be_claimed_by_name() {
        let mut device = CountingDevice::default();
        let mut pool = ResourcePool::<CountingDevice>::new();
        let desc = BufferDesc::new(64).with_history();

        let buffer = pool.acquire_buffer(&mut device, "luma", &desc);
        pool.release_buffer(desc, "luma", buffer, ResourceState::UNUSED);

        assert!(pool.take_history(&desc, "other").is_none());
        let (claimed, _) = pool.take_history(&desc, "luma").unwrap();
        assert_eq!(claimed, buffer);
        assert!(pool.take_history(&desc, "luma").is_none());
    }

    #[test]
    fn resize_evicts_surface_relative_images() {
        let mut device = CountingDevice::default();
        let mut pool = ResourcePool::<CountingDevice>::new();
        let relative = ImageDesc::surface(ImageFormat::Rgba16Float);
        let fixed = ImageDesc::fixed(ImageFormat::R32Float, 32, 32);

        let old = pool.acquire_image(&mut device, "hdr", &relative, Extent2d::new(800, 600));
        let old_id = *old.image();
        pool.release_image(relative, old);
        let lut = pool.acquire_image(&mut device, "lut", &fixed, Extent2d::new(32, 32));
        pool.release_image(fixed, lut);

        pool.evict_stale(&mut device, Extent2d::new(1024, 768));
        assert_eq!(device.destroyed, vec![old_id]);
        assert_eq!(pool.free_image_count(&relative), 0);
        assert_eq!(pool.free_image_count(&fixed), 1);

        let fresh = pool.acquire_image(&mut device, "hdr", &relative, Extent2d::new(1024, 768));
        assert_ne!(*fresh.image(), old_id);
        assert_eq!(fresh.extent(), Extent2d::new(1024, 768));
    }

    #[test]
    fn destroy_all_empties_every_table() {
        let mut device = CountingDevice::default();
        let mut pool = ResourcePool::<CountingDevice>::new();
        let image_desc = ImageDesc::surface(ImageFormat::Rgba8Unorm);
        let history = BufferDesc::new(16).with_history();

        let image = pool.acquire_image(&mut device, "a", &image_desc, Extent2d::new(4, 4));
        pool.release_image(image_desc, image);
        let buffer = pool.acquire_buffer(&mut device, "b", &history);
        pool.release_buffer(history, "b", buffer, ResourceState::UNUSED);

        pool.destroy_all(&mut device);
        assert_eq!(device.destroyed.len(), 2);
        let stats = pool.stats();
        assert_eq!(stats.free_images + stats.free_buffers + stats.deferred_buffers, 0);
    }
}
