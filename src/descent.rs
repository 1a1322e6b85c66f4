//! [`Quadratic`]に対する1次元の勾配降下法。
//! 勾配は計算グラフのリバースモード自動微分で求めます。

use log::{debug, info};

use crate::backend::{Backend, ndarray::NdArray};
use crate::engine::{
    self,
    optimizer::{Optimizer, SGD},
    tensor::Tensor,
};
use crate::error::{Error, Result};
use crate::objective::Quadratic;

pub const X0: f32 = 0.0;
pub const TARGET: f32 = 2.0;
pub const LEARNING_RATE: f32 = 0.1;
pub const STEPS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescentConfig {
    pub x0: f32,
    pub target: f32,
    pub learning_rate: f32,
    pub steps: usize,
}

impl Default for DescentConfig {
    fn default() -> Self {
        Self {
            x0: X0,
            target: TARGET,
            learning_rate: LEARNING_RATE,
            steps: STEPS,
        }
    }
}

/// 勾配降下の実行結果
#[derive(Debug, Clone, PartialEq)]
pub struct Descent {
    /// 各更新の直前に観測した損失（ステップ順）
    pub history: Vec<f32>,
    /// 最後の更新後のパラメータ値
    pub final_x: f32,
}

impl Descent {
    pub fn final_loss(&self) -> Option<f32> {
        self.history.last().copied()
    }
}

/// `NdArray`バックエンドで`config`の勾配降下を実行します。
pub fn run(config: &DescentConfig) -> Result<Descent> {
    run_on::<NdArray>(config)
}

/// バックエンド`B`で勾配降下を実行します。
///
/// 最初に現在のスレッドの`B`のグラフをリセットするため、
/// 呼び出し前に作成した`Tensor`ハンドルは無効になります。
pub fn run_on<B: Backend + 'static>(config: &DescentConfig) -> Result<Descent> {
    engine::reset::<B>();

    let x = Tensor::<B>::new_parameter(B::from_vec(vec![config.x0], &[]));
    let loss = Quadratic::new(config.target).loss(&x);
    let mut optimizer = SGD::new(config.learning_rate);
    optimizer.update_param(&x, &loss);

    let mut executor = engine::build::<B>(&[loss]);

    let mut history = Vec::with_capacity(config.steps);
    for step in 0..config.steps {
        executor.run(vec![])?;
        let value = executor.scalar(loss.id())?;
        if !value.is_finite() {
            return Err(Error::NonFinite { step, value });
        }
        debug!(step = step, loss = value; "gradient step");
        history.push(value);
    }

    let final_x = executor.scalar(x.id())?;
    info!(
        steps = config.steps,
        final_x = final_x,
        final_loss = history.last().copied().unwrap_or(f32::NAN);
        "descent finished"
    );
    Ok(Descent { history, final_x })
}
