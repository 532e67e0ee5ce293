use thiserror::Error;

use crate::compute::resource::{BufferRole, GridAxis, ShapeName, ThreadGroupSize};

#[derive(Error, Debug)]
pub enum DispatchError {
    // Kernel resolution and configuration
    #[error("Kernel not found: {0}")]
    KernelNotFound(String),

    #[error("Kernel {kernel} has an unusable thread group size {group}: {reason}")]
    InvalidThreadGroup {
        kernel: String,
        group: ThreadGroupSize,
        reason: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Shape and divisibility preconditions
    #[error("Kernel {kernel}: {dimension} {extent} is not divisible by thread group size {group} on axis {axis}")]
    NotDivisible {
        kernel: String,
        dimension: &'static str,
        axis: GridAxis,
        extent: usize,
        group: u32,
    },

    #[error("{param} has {actual} elements but the input has {expected} channels")]
    ParameterLength {
        param: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Expected a rank {expected} tensor, got shape {shape:?}")]
    RankMismatch { expected: usize, shape: Vec<usize> },

    #[error("Filter must be rank 4 [kh, kw, a, b], got shape {0:?}")]
    FilterRank(Vec<usize>),

    #[error("Shape {shape:?} needs {expected} elements, got {actual}")]
    DataLength {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("Expected {expected} channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("Dimension {0} does not fit in a 32 bit shape vector")]
    ShapeOverflow(usize),

    // Device resources
    #[error("Out of memory error: {0}")]
    OutOfMemory(String),

    #[error("Invalid buffer handle: {0}")]
    InvalidBuffer(u64),

    #[error("Buffer {handle} holds {capacity} elements, got {len}")]
    BufferSize { handle: u64, capacity: usize, len: usize },

    #[error("Kernel {kernel} has no buffer bound as {role}")]
    MissingBinding { kernel: String, role: BufferRole },

    #[error("Kernel {kernel} needs {name} but it was never published")]
    MissingShape { kernel: String, name: ShapeName },

    #[error("Kernel {kernel} wrote index {index} past the end of a {len} element output")]
    KernelOutOfBounds {
        kernel: String,
        index: usize,
        len: usize,
    },

    #[error("Kernel {kernel} panicked: {message}")]
    KernelPanicked { kernel: String, message: String },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Compute resource lock poisoned")]
    LockPoisoned,
}
