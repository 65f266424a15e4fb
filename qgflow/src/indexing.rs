use crate::{Array1, Field3};

pub trait Indexing {
    type Index: Copy + std::fmt::Debug + PartialEq + Eq;

    fn shape(&self) -> [usize; 3];

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn flatten(&self, index: Self::Index) -> usize;
    fn unflatten(&self, flat_index: usize) -> Self::Index;
}

pub fn iter_indices<I: Indexing>(indexing: &I) -> impl Iterator<Item = I::Index> + '_ {
    (0..indexing.len()).map(|flat_index| indexing.unflatten(flat_index))
}

/// A grid cell `[i, j, k]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellIndex {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}
impl CellIndex {
    pub fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }

    pub fn to_array_index(self) -> [usize; 3] {
        [self.i, self.j, self.k]
    }
}

/// Row-major numbering of the cells of an `(Nx, Ny, Nz)` grid, used to lay
/// fields out as vectors of the linear system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellIndexing {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}
impl CellIndexing {
    pub fn new(shape: [usize; 3]) -> Self {
        let [nx, ny, nz] = shape;
        Self { nx, ny, nz }
    }

    pub fn flatten_field(&self, field: &Field3) -> Array1 {
        assert_eq!(field.dim(), (self.nx, self.ny, self.nz));
        // Standard-layout iteration order is exactly the row-major flat order.
        field.iter().copied().collect()
    }

    pub fn unflatten_field(&self, flattened: &Array1) -> Field3 {
        let mut field = Field3::zeros((self.nx, self.ny, self.nz));
        self.unflatten_into(flattened, &mut field);
        field
    }

    pub fn unflatten_into(&self, flattened: &Array1, field: &mut Field3) {
        assert_eq!(field.dim(), (self.nx, self.ny, self.nz));
        assert_eq!(flattened.len(), self.len());
        field
            .iter_mut()
            .zip(flattened.iter())
            .for_each(|(value, &flat_value)| *value = flat_value);
    }

    pub fn flatten_into(&self, field: &Field3, flattened: &mut Array1) {
        assert_eq!(field.dim(), (self.nx, self.ny, self.nz));
        assert_eq!(flattened.len(), self.len());
        flattened
            .iter_mut()
            .zip(field.iter())
            .for_each(|(flat_value, &value)| *flat_value = value);
    }
}
impl Indexing for CellIndexing {
    type Index = CellIndex;

    fn shape(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    fn flatten(&self, index: Self::Index) -> usize {
        (index.i * self.ny + index.j) * self.nz + index.k
    }

    fn unflatten(&self, flat_index: usize) -> Self::Index {
        CellIndex {
            i: flat_index / (self.ny * self.nz),
            j: (flat_index / self.nz) % self.ny,
            k: flat_index % self.nz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_matches_array_layout() {
        let indexing = CellIndexing::new([3, 5, 4]);
        let field = Field3::from_shape_fn((3, 5, 4), |(i, j, k)| (100 * i + 10 * j + k) as f64);
        let flattened = indexing.flatten_field(&field);
        for index in iter_indices(&indexing) {
            assert_eq!(
                flattened[indexing.flatten(index)],
                field[index.to_array_index()]
            );
        }
        assert_eq!(indexing.unflatten_field(&flattened), field);
    }

    #[test]
    fn test_unflatten() {
        let indexing = CellIndexing::new([3, 5, 4]);
        assert_eq!(indexing.unflatten(0), CellIndex::new(0, 0, 0));
        assert_eq!(indexing.unflatten(4 * 5 + 4 + 2), CellIndex::new(1, 1, 2));
        assert_eq!(indexing.unflatten(indexing.len() - 1), CellIndex::new(2, 4, 3));
    }

    #[test]
    #[should_panic]
    fn test_flatten_into_rejects_other_shape() {
        let indexing = CellIndexing::new([4, 5, 2]);
        let mut flattened = Array1::zeros(indexing.len());
        indexing.flatten_into(&Field3::zeros((5, 4, 2)), &mut flattened);
    }
}
