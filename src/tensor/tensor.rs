use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::DispatchError;

// Activations are rank 3 [height, width, channels], filters rank 4, biases rank 1
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>) -> Self {
        let size = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; size],
        }
    }

    pub fn from_vec(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, DispatchError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(DispatchError::DataLength {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    // Caller guarantees data.len() matches the shape
    pub(crate) fn from_raw_parts(shape: Vec<usize>, data: Vec<f32>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        Self { shape, data }
    }

    pub fn filled(shape: Vec<usize>, value: f32) -> Self {
        let size = shape.iter().product();
        Self {
            shape,
            data: vec![value; size],
        }
    }

    // Uniform in [-1, 1), reproducible for a given seed
    pub fn random(shape: Vec<usize>, seed: u64) -> Self {
        let size = shape.iter().product();
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = Uniform::new(-1.0f32, 1.0);
        let data = (0..size).map(|_| dist.sample(&mut rng)).collect();
        Self { shape, data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn dims3(&self) -> Result<[usize; 3], DispatchError> {
        match self.shape.as_slice() {
            &[h, w, c] => Ok([h, w, c]),
            _ => Err(DispatchError::RankMismatch {
                expected: 3,
                shape: self.shape.clone(),
            }),
        }
    }

    pub fn height(&self) -> Result<usize, DispatchError> {
        Ok(self.dims3()?[0])
    }

    pub fn width(&self) -> Result<usize, DispatchError> {
        Ok(self.dims3()?[1])
    }

    pub fn channels(&self) -> Result<usize, DispatchError> {
        Ok(self.dims3()?[2])
    }

    // Shape as the 32 bit integer vector kernels read
    pub fn shape_u32(&self) -> Result<Vec<u32>, DispatchError> {
        shape_to_u32(&self.shape)
    }
}

pub fn shape_to_u32(shape: &[usize]) -> Result<Vec<u32>, DispatchError> {
    shape
        .iter()
        .map(|&d| u32::try_from(d).map_err(|_| DispatchError::ShapeOverflow(d)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_zero_filled() {
        let t = Tensor::new(vec![2, 3, 4]);
        assert_eq!(t.len(), 24);
        assert!(t.data().iter().all(|&v| v == 0.0));
        assert_eq!(t.dims3().unwrap(), [2, 3, 4]);
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(Tensor::from_vec(vec![2, 2, 1], vec![1.0; 4]).is_ok());
        match Tensor::from_vec(vec![2, 2, 1], vec![1.0; 3]) {
            Err(DispatchError::DataLength {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("expected DataLength, got {:?}", other),
        }
    }

    #[test]
    fn dims3_rejects_other_ranks() {
        let filter = Tensor::new(vec![3, 3, 4, 8]);
        assert!(matches!(
            filter.dims3(),
            Err(DispatchError::RankMismatch { expected: 3, .. })
        ));
        assert_eq!(filter.rank(), 4);
    }

    #[test]
    fn random_is_seeded() {
        let a = Tensor::random(vec![4, 4, 2], 7);
        let b = Tensor::random(vec![4, 4, 2], 7);
        let c = Tensor::random(vec![4, 4, 2], 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.data().iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn shape_overflow_is_reported() {
        let too_big = u32::MAX as usize + 1;
        assert!(matches!(
            shape_to_u32(&[1, too_big]),
            Err(DispatchError::ShapeOverflow(d)) if d == too_big
        ));
    }
}
