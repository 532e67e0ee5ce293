pub mod convolution;
pub mod dispatcher;
pub mod grid;
pub mod normalization;
pub mod pointwise;

pub use convolution::{convolution_output_shape, ConvolutionMode, SAMPLING_FACTOR};
pub use dispatcher::KernelDispatcher;
