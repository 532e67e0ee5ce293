use std::fmt;

use crate::error::DispatchError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelHandle(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// Fixed per kernel program, only ever queried
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadGroupSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl ThreadGroupSize {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub fn lanes(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl fmt::Display for ThreadGroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchGrid {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl DispatchGrid {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub fn group_count(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl fmt::Display for DispatchGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridAxis {
    X,
    Y,
    Z,
}

impl fmt::Display for GridAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridAxis::X => write!(f, "x"),
            GridAxis::Y => write!(f, "y"),
            GridAxis::Z => write!(f, "z"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Input,
    Filter,
    Bias,
    Output,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferRole::Input => "Input",
            BufferRole::Filter => "Filter",
            BufferRole::Bias => "Bias",
            BufferRole::Output => "Output",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeName {
    InputShape,
    FilterShape,
    OutputShape,
}

impl fmt::Display for ShapeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeName::InputShape => "InputShape",
            ShapeName::FilterShape => "FilterShape",
            ShapeName::OutputShape => "OutputShape",
        };
        f.write_str(name)
    }
}

/// Capabilities a compute backend exposes to the kernel dispatcher.
pub trait ComputeResource {
    fn find_kernel(&self, name: &str) -> Result<KernelHandle, DispatchError>;

    fn kernel_name(&self, kernel: KernelHandle) -> String;

    fn thread_group_size(&self, kernel: KernelHandle) -> Result<ThreadGroupSize, DispatchError>;

    // Buffer lifetime, counted in f32 elements
    fn allocate(&self, len: usize) -> Result<BufferHandle, DispatchError>;

    fn upload(&self, buffer: BufferHandle, data: &[f32]) -> Result<(), DispatchError>;

    fn download(&self, buffer: BufferHandle, out: &mut [f32]) -> Result<(), DispatchError>;

    // Cannot fail, it runs from Drop
    fn release(&self, buffer: BufferHandle);

    fn set_buffer(
        &self,
        kernel: KernelHandle,
        role: BufferRole,
        buffer: BufferHandle,
    ) -> Result<(), DispatchError>;

    fn set_ints(&self, name: ShapeName, values: &[u32]) -> Result<(), DispatchError>;

    // Blocks until every group has finished
    fn dispatch(&self, kernel: KernelHandle, grid: DispatchGrid) -> Result<(), DispatchError>;
}
