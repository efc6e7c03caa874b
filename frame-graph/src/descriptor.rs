#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Extent2d {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    R32Uint,
    Depth32Float,
}

impl ImageFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float)
    }
}

/// How the concrete size of a transient image is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    /// Follows the output surface; pooled instances are evicted when it resizes.
    Surface,
    Fixed { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    pub format: ImageFormat,
    pub size: SizeClass,
    pub mip_levels: u32,
    pub array_layers: u32,
}

impl ImageDesc {
    pub fn surface(format: ImageFormat) -> Self {
        Self {
            format,
            size: SizeClass::Surface,
            mip_levels: 1,
            array_layers: 1,
        }
    }

    pub fn fixed(format: ImageFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            size: SizeClass::Fixed { width, height },
            mip_levels: 1,
            array_layers: 1,
        }
    }

    pub fn mip_levels(mut self, levels: u32) -> Self {
        self.mip_levels = levels.max(1);
        self
    }

    pub fn array_layers(mut self, layers: u32) -> Self {
        self.array_layers = layers.max(1);
        self
    }

    pub fn is_surface_relative(&self) -> bool {
        matches!(self.size, SizeClass::Surface)
    }

    /// Concrete size of an instance of this descriptor for the given output surface.
    pub fn extent(&self, surface: Extent2d) -> Extent2d {
        match self.size {
            SizeClass::Surface => Extent2d::new(surface.width.max(1), surface.height.max(1)),
            SizeClass::Fixed { width, height } => Extent2d::new(width, height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size: u64,
    /// Keep the backing instance alive for one extra frame so next frame can
    /// read what this frame wrote.
    pub history: bool,
}

impl BufferDesc {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            history: false,
        }
    }

    pub fn with_history(mut self) -> Self {
        self.history = true;
        self
    }
}
