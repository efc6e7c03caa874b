use bitflags::bitflags;

bitflags! {
    /// How a pass touches a resource, in the vocabulary producers think in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u32 {
        const COLOR_WRITE = 1 << 0;
        const COLOR_READ = 1 << 1;
        const DEPTH_STENCIL_READ = 1 << 2;
        const DEPTH_STENCIL_WRITE = 1 << 3;
        const VERTEX_READ = 1 << 4;
        const INDEX_READ = 1 << 5;
        const INDIRECT_READ = 1 << 6;
        const COMPUTE_READ = 1 << 7;
        const COMPUTE_WRITE = 1 << 8;
        const TRANSFER_READ = 1 << 9;
        const TRANSFER_WRITE = 1 << 10;
        const FRAGMENT_STORAGE_READ = 1 << 11;
        const COMPUTE_SAMPLE = 1 << 12;
        const FRAGMENT_SAMPLE = 1 << 13;
        const SHADER_READ = 1 << 14;

        const COLOR_READ_WRITE = Self::COLOR_READ.bits() | Self::COLOR_WRITE.bits();
        const DEPTH_STENCIL_READ_WRITE =
            Self::DEPTH_STENCIL_READ.bits() | Self::DEPTH_STENCIL_WRITE.bits();
        const COMPUTE_READ_WRITE = Self::COMPUTE_READ.bits() | Self::COMPUTE_WRITE.bits();

        const ANY_READ = Self::COLOR_READ.bits()
            | Self::DEPTH_STENCIL_READ.bits()
            | Self::VERTEX_READ.bits()
            | Self::INDEX_READ.bits()
            | Self::INDIRECT_READ.bits()
            | Self::COMPUTE_READ.bits()
            | Self::TRANSFER_READ.bits()
            | Self::FRAGMENT_STORAGE_READ.bits()
            | Self::COMPUTE_SAMPLE.bits()
            | Self::FRAGMENT_SAMPLE.bits()
            | Self::SHADER_READ.bits();
        const ANY_WRITE = Self::COLOR_WRITE.bits()
            | Self::DEPTH_STENCIL_WRITE.bits()
            | Self::COMPUTE_WRITE.bits()
            | Self::TRANSFER_WRITE.bits();

        /// Attachment and sampling access only make sense for images.
        const IMAGE_ONLY = Self::COLOR_READ_WRITE.bits()
            | Self::DEPTH_STENCIL_READ_WRITE.bits()
            | Self::COMPUTE_SAMPLE.bits()
            | Self::FRAGMENT_SAMPLE.bits();
        /// Fixed-function buffer fetches.
        const BUFFER_ONLY = Self::VERTEX_READ.bits()
            | Self::INDEX_READ.bits()
            | Self::INDIRECT_READ.bits();
    }
}

bitflags! {
    /// Memory access mask carried by a barrier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMask: u32 {
        const COLOR_ATTACHMENT_READ = 1 << 0;
        const COLOR_ATTACHMENT_WRITE = 1 << 1;
        const DEPTH_STENCIL_READ = 1 << 2;
        const DEPTH_STENCIL_WRITE = 1 << 3;
        const VERTEX_ATTRIBUTE_READ = 1 << 4;
        const INDEX_READ = 1 << 5;
        const INDIRECT_COMMAND_READ = 1 << 6;
        const SHADER_READ = 1 << 7;
        const SHADER_WRITE = 1 << 8;
        const SHADER_SAMPLED_READ = 1 << 9;
        const SHADER_STORAGE_READ = 1 << 10;
        const TRANSFER_READ = 1 << 11;
        const TRANSFER_WRITE = 1 << 12;

        const ANY_WRITE = Self::COLOR_ATTACHMENT_WRITE.bits()
            | Self::DEPTH_STENCIL_WRITE.bits()
            | Self::SHADER_WRITE.bits()
            | Self::TRANSFER_WRITE.bits();
    }
}

bitflags! {
    /// Pipeline stage mask carried by a barrier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStage: u32 {
        const DRAW_INDIRECT = 1 << 0;
        const VERTEX_INPUT = 1 << 1;
        const VERTEX_SHADER = 1 << 2;
        const FRAGMENT_SHADER = 1 << 3;
        const EARLY_FRAGMENT_TESTS = 1 << 4;
        const LATE_FRAGMENT_TESTS = 1 << 5;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 6;
        const COMPUTE_SHADER = 1 << 7;
        const TRANSFER = 1 << 8;

        const FRAGMENT_TESTS = Self::EARLY_FRAGMENT_TESTS.bits() | Self::LATE_FRAGMENT_TESTS.bits();
    }
}

impl Access {
    pub fn is_read(self) -> bool {
        self.intersects(Self::ANY_READ)
    }

    pub fn is_write(self) -> bool {
        self.intersects(Self::ANY_WRITE)
    }

    /// Translates to the access and stage masks a backend barrier needs.
    pub fn masks(self) -> (AccessMask, PipelineStage) {
        const TABLE: [(Access, AccessMask, PipelineStage); 15] = [
            (
                Access::COLOR_WRITE,
                AccessMask::COLOR_ATTACHMENT_WRITE,
                PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            ),
            (
                Access::COLOR_READ,
                AccessMask::COLOR_ATTACHMENT_READ,
                PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            ),
            (
                Access::DEPTH_STENCIL_READ,
                AccessMask::DEPTH_STENCIL_READ,
                PipelineStage::FRAGMENT_TESTS,
            ),
            (
                Access::DEPTH_STENCIL_WRITE,
                AccessMask::DEPTH_STENCIL_WRITE,
                PipelineStage::FRAGMENT_TESTS,
            ),
            (
                Access::VERTEX_READ,
                AccessMask::VERTEX_ATTRIBUTE_READ,
                PipelineStage::VERTEX_INPUT,
            ),
            (
                Access::INDEX_READ,
                AccessMask::INDEX_READ,
                PipelineStage::VERTEX_INPUT,
            ),
            (
                Access::INDIRECT_READ,
                AccessMask::INDIRECT_COMMAND_READ,
                PipelineStage::DRAW_INDIRECT,
            ),
            (
                Access::COMPUTE_READ,
                AccessMask::SHADER_READ,
                PipelineStage::COMPUTE_SHADER,
            ),
            (
                Access::COMPUTE_WRITE,
                AccessMask::SHADER_WRITE,
                PipelineStage::COMPUTE_SHADER,
            ),
            (
                Access::COMPUTE_SAMPLE,
                AccessMask::SHADER_SAMPLED_READ,
                PipelineStage::COMPUTE_SHADER,
            ),
            (
                Access::FRAGMENT_SAMPLE,
                AccessMask::SHADER_SAMPLED_READ,
                PipelineStage::FRAGMENT_SHADER,
            ),
            (
                Access::FRAGMENT_STORAGE_READ,
                AccessMask::SHADER_STORAGE_READ,
                PipelineStage::FRAGMENT_SHADER,
            ),
            (
                Access::SHADER_READ,
                AccessMask::SHADER_READ,
                PipelineStage::VERTEX_SHADER
                    .union(PipelineStage::FRAGMENT_SHADER)
                    .union(PipelineStage::COMPUTE_SHADER),
            ),
            (
                Access::TRANSFER_READ,
                AccessMask::TRANSFER_READ,
                PipelineStage::TRANSFER,
            ),
            (
                Access::TRANSFER_WRITE,
                AccessMask::TRANSFER_WRITE,
                PipelineStage::TRANSFER,
            ),
        ];

        TABLE.iter().filter(|(access, ..)| self.contains(*access)).fold(
            (AccessMask::empty(), PipelineStage::empty()),
            |(mask, stage), (_, access_mask, access_stage)| {
                (mask | *access_mask, stage | *access_stage)
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Graphics,
    Compute,
    Transfer,
}

impl PassKind {
    /// Every access a pass of this kind may declare.
    pub fn allowed_access(self) -> Access {
        match self {
            Self::Transfer => Access::TRANSFER_READ | Access::TRANSFER_WRITE,
            Self::Compute => {
                Access::COMPUTE_READ_WRITE
                    | Access::COMPUTE_SAMPLE
                    | Access::SHADER_READ
                    | Access::INDIRECT_READ
                    | Access::TRANSFER_READ
                    | Access::TRANSFER_WRITE
            }
            Self::Graphics => {
                Access::all()
                    - Access::COMPUTE_READ_WRITE
                    - Access::COMPUTE_SAMPLE
            }
        }
    }

    pub fn allows(self, access: Access) -> bool {
        self.allowed_access().contains(access)
    }
}
