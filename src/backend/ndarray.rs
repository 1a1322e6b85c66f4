use ndarray::{ArrayD, Axis, IxDyn};

use crate::backend::{Backend, Elm};

#[derive(Debug, Clone)]
pub struct NdArray;

impl Backend for NdArray {
    type Tensor = ArrayD<Elm>;

    fn zeros(shape: &[usize]) -> Self::Tensor {
        ArrayD::zeros(shape)
    }
    fn ones_like(tensor: &Self::Tensor) -> Self::Tensor {
        ArrayD::ones(tensor.shape())
    }

    fn from_vec(vec: Vec<Elm>, shape: &[usize]) -> Self::Tensor {
        let len = vec.len();
        ArrayD::from_shape_vec(shape, vec).unwrap_or_else(|_| {
            panic!("from_vec: {} elements do not fit shape {:?}", len, shape)
        })
    }
    fn to_vec(tensor: &Self::Tensor) -> Vec<Elm> {
        tensor.iter().cloned().collect()
    }

    fn shape(tensor: &Self::Tensor) -> Vec<usize> {
        tensor.shape().to_vec()
    }

    // ndarrayの二項演算はブロードキャストに対応している
    fn add(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor {
        a + b
    }
    fn sub(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor {
        a - b
    }
    fn mul(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor {
        a * b
    }
    fn neg(a: &Self::Tensor) -> Self::Tensor {
        -a
    }
    fn powi(a: &Self::Tensor, n: i32) -> Self::Tensor {
        a.mapv(|v| v.powi(n))
    }

    fn sum(a: &Self::Tensor, axis: Option<usize>) -> Self::Tensor {
        match axis {
            Some(ax) => a.sum_axis(Axis(ax)),
            None => ArrayD::from_elem(IxDyn(&[]), a.sum()),
        }
    }

    fn sum_to(a: &Self::Tensor, shape: &[usize]) -> Self::Tensor {
        let mut out = a.clone();
        // 先頭の余分な軸
        while out.ndim() > shape.len() {
            out = out.sum_axis(Axis(0));
        }
        // サイズ1から広げられた軸は次元を保ったまま和をとる
        for (ax, &dim) in shape.iter().enumerate() {
            if dim == 1 && out.shape()[ax] != 1 {
                out = out.sum_axis(Axis(ax)).insert_axis(Axis(ax));
            }
        }
        out
    }

    fn reshape(a: &Self::Tensor, shape: &[usize]) -> Self::Tensor {
        Self::from_vec(Self::to_vec(a), shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_to_reduces_broadcast_axes() {
        let a = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        assert_eq!(NdArray::sum_to(&a, &[1, 3]).shape(), &[1, 3]);
        assert_eq!(NdArray::to_vec(&NdArray::sum_to(&a, &[1, 3])), vec![5.0, 7.0, 9.0]);
        assert_eq!(NdArray::to_vec(&NdArray::sum_to(&a, &[2, 1])), vec![6.0, 15.0]);
        assert_eq!(NdArray::to_vec(&NdArray::sum_to(&a, &[3])), vec![5.0, 7.0, 9.0]);
        assert_eq!(NdArray::to_vec(&NdArray::sum_to(&a, &[])), vec![21.0]);
        assert_eq!(NdArray::sum_to(&a, &[2, 3]), a);
    }

    #[test]
    fn reshape_keeps_row_major_order() {
        let a = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let b = NdArray::reshape(&a, &[3, 1, 2]);
        assert_eq!(b.shape(), &[3, 1, 2]);
        assert_eq!(NdArray::to_vec(&b), NdArray::to_vec(&a));
    }
}
