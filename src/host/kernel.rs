use std::fmt;
use std::sync::Arc;

use crate::compute::resource::{BufferRole, ShapeName, ThreadGroupSize};
use crate::error::DispatchError;

// Run once per lane, pushing (output index, value) pairs
pub type KernelFn =
    dyn Fn(&KernelArgs<'_>, ThreadId, &mut Vec<(usize, f32)>) -> Result<(), DispatchError>
        + Send
        + Sync;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadId {
    pub group: [u32; 3],
    pub local: [u32; 3],
    pub global: [u64; 3],
}

#[derive(Clone)]
pub struct HostKernel {
    name: String,
    group: ThreadGroupSize,
    func: Arc<KernelFn>,
}

impl HostKernel {
    pub fn new<F>(name: impl Into<String>, group: ThreadGroupSize, func: F) -> Self
    where
        F: Fn(&KernelArgs<'_>, ThreadId, &mut Vec<(usize, f32)>) -> Result<(), DispatchError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            group,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> ThreadGroupSize {
        self.group
    }

    pub(crate) fn run(
        &self,
        args: &KernelArgs<'_>,
        id: ThreadId,
        out: &mut Vec<(usize, f32)>,
    ) -> Result<(), DispatchError> {
        (self.func)(args, id, out)
    }
}

impl fmt::Debug for HostKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostKernel")
            .field("name", &self.name)
            .field("group", &self.group)
            .finish()
    }
}

pub struct KernelArgs<'a> {
    pub(crate) kernel: &'a str,
    pub(crate) input: Option<&'a [f32]>,
    pub(crate) filter: Option<&'a [f32]>,
    pub(crate) bias: Option<&'a [f32]>,
    pub(crate) output_len: usize,
    pub(crate) input_shape: Option<&'a [u32]>,
    pub(crate) filter_shape: Option<&'a [u32]>,
    pub(crate) output_shape: Option<&'a [u32]>,
}

impl<'a> KernelArgs<'a> {
    pub fn input(&self) -> Result<&'a [f32], DispatchError> {
        self.input.ok_or_else(|| self.missing_binding(BufferRole::Input))
    }

    pub fn filter(&self) -> Result<&'a [f32], DispatchError> {
        self.filter.ok_or_else(|| self.missing_binding(BufferRole::Filter))
    }

    pub fn bias(&self) -> Result<&'a [f32], DispatchError> {
        self.bias.ok_or_else(|| self.missing_binding(BufferRole::Bias))
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    pub fn shape(&self, name: ShapeName) -> Result<&'a [u32], DispatchError> {
        let shape = match name {
            ShapeName::InputShape => self.input_shape,
            ShapeName::FilterShape => self.filter_shape,
            ShapeName::OutputShape => self.output_shape,
        };
        shape.ok_or_else(|| DispatchError::MissingShape {
            kernel: self.kernel.to_string(),
            name,
        })
    }

    /// First `N` entries of a shape vector, widened to usize.
    pub fn dims<const N: usize>(&self, name: ShapeName) -> Result<[usize; N], DispatchError> {
        let shape = self.shape(name)?;
        if shape.len() < N {
            return Err(DispatchError::RankMismatch {
                expected: N,
                shape: shape.iter().map(|&d| d as usize).collect(),
            });
        }
        let mut dims = [0usize; N];
        for (dim, &value) in dims.iter_mut().zip(shape) {
            *dim = value as usize;
        }
        Ok(dims)
    }

    fn missing_binding(&self, role: BufferRole) -> DispatchError {
        DispatchError::MissingBinding {
            kernel: self.kernel.to_string(),
            role,
        }
    }
}

// Out of range reads yield zero, the way robust buffer access behaves on a GPU
#[inline]
pub fn fetch(buffer: &[f32], index: usize) -> f32 {
    buffer.get(index).copied().unwrap_or(0.0)
}
