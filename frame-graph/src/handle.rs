use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    InternalImage,
    InternalBuffer,
    ExternalImage,
    ExternalBuffer,
}

impl ResourceKind {
    pub fn is_external(self) -> bool {
        matches!(self, Self::ExternalImage | Self::ExternalBuffer)
    }

    pub fn is_image(self) -> bool {
        matches!(self, Self::InternalImage | Self::ExternalImage)
    }
}

/// Reference to a resource declared in one frame.
///
/// Handles are only meaningful inside the frame that minted them. Every reset
/// advances the frame generation, so a handle kept across frames is detected
/// as stale instead of silently aliasing a new resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    kind: ResourceKind,
    index: u32,
    frame: u32,
}

impl ResourceHandle {
    pub(crate) fn new(kind: ResourceKind, index: usize, frame: u32) -> Self {
        Self {
            kind,
            index: index as u32,
            frame,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn is_external(&self) -> bool {
        self.kind.is_external()
    }

    pub fn is_image(&self) -> bool {
        self.kind.is_image()
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}@{}", self.kind, self.index, self.frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub u32);

impl PassId {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}
