//! Kernel dispatch for an image-to-image translation generator.

pub mod compute;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod tensor;

pub use compute::{
    BufferHandle, BufferRole, ComputeResource, DeviceBuffer, DispatchGrid, GridAxis, KernelHandle,
    ShapeName, ThreadGroupSize,
};
pub use dispatch::{convolution_output_shape, ConvolutionMode, KernelDispatcher, SAMPLING_FACTOR};
pub use error::DispatchError;
pub use host::{HostCompute, HostComputeConfig, HostKernel};
pub use tensor::Tensor;
