use crate::Float;

use ndarray as nd;

pub struct AllCloseAssertion<'a, 'b, D: nd::Dimension> {
    left: &'a nd::Array<Float, D>,
    right: &'b nd::Array<Float, D>,

    rel_tol: Option<Float>,
    abs_tol: Option<Float>,
}
impl<'a, 'b, D: nd::Dimension> AllCloseAssertion<'a, 'b, D> {
    pub fn with_rel_tol(&mut self, rel_tol: Option<Float>) -> &mut Self {
        self.rel_tol = rel_tol;
        self
    }

    pub fn with_abs_tol(&mut self, abs_tol: Option<Float>) -> &mut Self {
        self.abs_tol = abs_tol;
        self
    }
}

impl<'a, 'b, D: nd::Dimension> Drop for AllCloseAssertion<'a, 'b, D> {
    #[track_caller]
    fn drop(&mut self) {
        if self.rel_tol.is_none() && self.abs_tol.is_none() {
            panic!("At least one tolerance must be specified");
        }
        assert_eq!(self.left.shape(), self.right.shape(), "Shapes differ");
        let mut num_failures = 0;
        self.left
            .indexed_iter()
            .zip(self.right.iter())
            .for_each(|((index, left), right)| {
                let mut checker = approx::Relative::default();
                if let Some(rel_tol) = self.rel_tol {
                    checker = checker.max_relative(rel_tol);
                }
                if let Some(abs_tol) = self.abs_tol {
                    checker = checker.epsilon(abs_tol);
                }

                if !checker.eq(left, right) {
                    if num_failures < 20 {
                        eprintln!("At {index:?}, left = {left}, right = {right}");
                    }
                    num_failures += 1;
                }
            });
        if num_failures > 0 {
            panic!(
                "Didn't match at {num_failures}/{} elements",
                self.left.len()
            )
        }
    }
}

#[track_caller]
pub fn assert_all_close<'a, 'b, D: nd::Dimension>(
    left: &'a nd::Array<Float, D>,
    right: &'b nd::Array<Float, D>,
) -> AllCloseAssertion<'a, 'b, D> {
    AllCloseAssertion {
        left,
        right,
        rel_tol: Some(1e-7),
        abs_tol: Some(0.),
    }
}
