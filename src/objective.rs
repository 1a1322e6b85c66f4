use crate::backend::Backend;
use crate::engine::tensor::Tensor;

/// 目的関数 `f(x) = (x - target)^2`。`x = target`で最小になる
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadratic {
    pub target: f32,
}

impl Quadratic {
    pub fn new(target: f32) -> Self {
        Self { target }
    }

    /// `sum((x - target)^2)`をグラフに追加し、Rank0の損失を返します。
    pub fn loss<B: Backend + 'static>(&self, x: &Tensor<B>) -> Tensor<B> {
        let target = Tensor::<B>::scalar(self.target);
        (*x - target).powi(2).sum(None)
    }

    pub fn value(&self, x: f32) -> f32 {
        (x - self.target).powi(2)
    }

    /// 解析的な導関数 `2(x - target)`
    pub fn gradient(&self, x: f32) -> f32 {
        2.0 * (x - self.target)
    }
}
