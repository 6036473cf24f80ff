use anyhow::{anyhow, ensure, Result};
use candle_core::{Device, IndexOp, Tensor};
use qlearn_core::replay_buffer::BatchBase;

/// Column storage of tensors in a replay buffer.
///
/// The first dimension of the tensor is the batch dimension. Storage is
/// allocated on the CPU at the first push, with the shape and the data type
/// of the pushed tensor.
#[derive(Clone, Debug)]
pub struct TensorBatch {
    buf: Option<Tensor>,
    capacity: usize,
}

impl TensorBatch {
    /// Wraps a tensor, its first dimension being the batch dimension.
    pub fn from_tensor(t: Tensor) -> Self {
        let capacity = t.dims().first().copied().unwrap_or(0);
        Self {
            buf: Some(t),
            capacity,
        }
    }

    /// Returns the number of items the batch can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl BatchBase for TensorBatch {
    fn new(capacity: usize) -> Self {
        Self {
            buf: None,
            capacity,
        }
    }

    fn push(&mut self, index: usize, data: Self) -> Result<()> {
        let data = match data.buf {
            Some(data) => data,
            None => return Ok(()),
        };
        let batch_size = data.dims()[0];
        if batch_size == 0 {
            return Ok(());
        }
        ensure!(
            batch_size <= self.capacity,
            "{} items do not fit in the capacity {}",
            batch_size,
            self.capacity
        );

        if self.buf.is_none() {
            let mut shape = data.dims().to_vec();
            shape[0] = self.capacity;
            self.buf = Some(Tensor::zeros(shape, data.dtype(), &Device::Cpu)?);
        }
        let buf = self
            .buf
            .as_ref()
            .ok_or_else(|| anyhow!("The storage is not allocated"))?;
        let data = data.to_device(&Device::Cpu)?;

        if index + batch_size > self.capacity {
            let n = self.capacity - index;
            buf.slice_set(&data.i(..n)?.contiguous()?, 0, index)?;
            buf.slice_set(&data.i(n..)?.contiguous()?, 0, 0)?;
        } else {
            buf.slice_set(&data, 0, index)?;
        }

        Ok(())
    }

    fn sample(&self, ixs: &[usize]) -> Result<Self> {
        let buf = self
            .buf
            .as_ref()
            .ok_or_else(|| anyhow!("Sampling from an empty storage"))?;
        let capacity = ixs.len();
        let ixs = {
            let ixs = ixs.iter().map(|&x| x as u32).collect::<Vec<_>>();
            Tensor::from_vec(ixs, &[capacity], buf.device())?
        };
        let buf = Some(buf.index_select(&ixs, 0)?);
        Ok(Self { buf, capacity })
    }
}

impl TryFrom<TensorBatch> for Tensor {
    type Error = anyhow::Error;

    fn try_from(b: TensorBatch) -> Result<Self> {
        b.buf.ok_or_else(|| anyhow!("The batch holds no tensor"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(values: &[i64]) -> Result<TensorBatch> {
        let t = Tensor::from_slice(values, (values.len(), 1), &Device::Cpu)?;
        Ok(TensorBatch::from_tensor(t))
    }

    #[test]
    fn test_push_wraps_around() -> Result<()> {
        let mut storage = TensorBatch::new(4);
        storage.push(0, items(&[0, 1])?)?;
        storage.push(3, items(&[3, 4])?)?;

        let t = Tensor::try_from(storage.sample(&[0, 1, 3])?)?;
        assert_eq!(t.dims(), &[3, 1]);
        assert_eq!(t.flatten_all()?.to_vec1::<i64>()?, vec![4, 1, 3]);
        Ok(())
    }

    #[test]
    fn test_sample_from_empty_storage_fails() {
        let storage = TensorBatch::new(4);
        assert!(storage.sample(&[0]).is_err());
        assert!(Tensor::try_from(TensorBatch::new(1)).is_err());
    }
}
