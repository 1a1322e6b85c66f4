use crate::backend::Backend;
use crate::engine::tensor::Tensor;

pub trait Optimizer<B: Backend> {
    /// `param`の更新規則をグラフに追加します。
    ///
    /// ここでは何も計算されず、この後に`build`したグラフの`Executor::run`のたびに更新が反映されます。
    fn update_param(&mut self, param: &Tensor<B>, loss: &Tensor<B>) -> Tensor<B>;
}

#[derive(Debug, Clone, Copy)]
pub struct SGD {
    lr: f32,
}

impl SGD {
    pub fn new(lr: f32) -> Self {
        Self { lr }
    }
}

impl<B: Backend + 'static> Optimizer<B> for SGD {
    fn update_param(&mut self, param: &Tensor<B>, loss: &Tensor<B>) -> Tensor<B> {
        let grad = loss.grad(param);

        // new_param = param - lr * grad
        // lrはRank0の定数なので、パラメータの形状にブロードキャストされる
        let lr_tensor = Tensor::<B>::scalar(self.lr);
        let new_param = *param - lr_tensor * grad;

        Tensor::assign(param, &new_param)
    }
}
