pub mod rgb;
pub mod tensor;

pub use tensor::{shape_to_u32, Tensor};
