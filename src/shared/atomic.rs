use std::sync::atomic::{AtomicU32, Ordering};

/// A fixed-length `f32` buffer readable and writable from many threads at once.
///
/// Each element is an `AtomicU32` holding the float's bit pattern, so individual loads and
/// stores never tear. Read-modify-write sequences built from separate `load` and `store` calls
/// are not atomic; concurrent writers can lose each other's updates.
#[derive(Debug)]
pub struct AtomicBuffer {
    cells: Box<[AtomicU32]>,
}

impl AtomicBuffer {
    pub fn zeros(len: usize) -> Self {
        Self::from_slice(&vec![0.0; len])
    }

    pub fn from_slice(values: &[f32]) -> Self {
        AtomicBuffer {
            cells: values.iter().map(|v| AtomicU32::new(v.to_bits())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn load(&self, index: usize) -> f32 {
        f32::from_bits(self.cells[index].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, index: usize, value: f32) {
        self.cells[index].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Copy of every element
    pub fn to_vec(&self) -> Vec<f32> {
        self.cells
            .iter()
            .map(|cell| f32::from_bits(cell.load(Ordering::Relaxed)))
            .collect()
    }

    /// Copy into `target`, which must have the same length.
    pub fn copy_to(&self, target: &mut [f32]) {
        for (t, cell) in target.iter_mut().zip(self.cells.iter()) {
            *t = f32::from_bits(cell.load(Ordering::Relaxed));
        }
    }

    /// Overwrite every element; `values` must have the same length.
    pub fn copy_from(&self, values: &[f32]) {
        for (cell, v) in self.cells.iter().zip(values) {
            cell.store(v.to_bits(), Ordering::Relaxed);
        }
    }
}

impl Clone for AtomicBuffer {
    fn clone(&self) -> Self {
        Self::from_slice(&self.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_store() {
        let buffer = AtomicBuffer::from_slice(&[1.0, -2.5, 3.25]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.load(1), -2.5);
        buffer.store(1, 0.125);
        assert_eq!(buffer.to_vec(), vec![1.0, 0.125, 3.25]);
    }

    #[test]
    fn test_copy_round_trip() {
        let buffer = AtomicBuffer::zeros(4);
        buffer.copy_from(&[1.0, 2.0, 3.0, 4.0]);
        let mut out = vec![0.0; 4];
        buffer.copy_to(&mut out);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
