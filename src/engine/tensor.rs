use std::marker::PhantomData;

use crate::{
    backend::Backend,
    engine::{
        node::{Node, NodeId, NodeType, OpType},
        shape::compute_shape,
        with_graph,
    },
};

// Backend::Tensorとは異なり、グラフ構造を普通の演算のように構築できるようにするためのTensor構造体
/// 計算グラフ上のノードへの参照（ハンドル）を表す構造体。
///
/// `Tensor`はバックエンドの実データ(`B::Tensor`)を直接保持するのではなく、
/// 計算グラフ(`GraphBuilder`)内のノードID(`NodeId`)を保持します。
/// これにより、`Tensor`同士の演算を行うだけで、自動的に計算グラフが構築されます。
#[derive(Debug)]
pub struct Tensor<B: Backend + 'static> {
    pub(crate) id: NodeId,
    phantom: PhantomData<B>,
}

impl<B: Backend + 'static> Clone for Tensor<B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: Backend + 'static> Copy for Tensor<B> {}

impl<B: Backend + 'static> Tensor<B> {
    pub(crate) fn from_id(id: NodeId) -> Self {
        Tensor {
            id,
            phantom: PhantomData,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// グラフ構築時に推論されたこのノードの形状を返します。
    pub fn shape(&self) -> Vec<usize> {
        with_graph::<B, _, _>(|graph| {
            graph.nodes[self.id]
                .shape
                .clone()
                .expect("Node has no shape")
        })
    }

    fn push_leaf(node_type: NodeType, data: Option<B::Tensor>, shape: Vec<usize>) -> Tensor<B> {
        let node_id = with_graph::<B, _, _>(|graph| {
            let new_node_id = graph.nodes.len();
            graph.nodes.push(Node {
                id: new_node_id,
                node_type,
                inputs: Vec::new(),
                data,
                shape: Some(shape),
            });
            new_node_id
        });
        Tensor::from_id(node_id)
    }

    /// 入力プレースホルダーを作成します。
    ///
    /// 実行時(`Executor::run`)に外部からデータを与えるためのノードです。
    pub fn new_input(shape: Vec<usize>) -> Tensor<B> {
        Self::push_leaf(NodeType::Input, None, shape)
    }

    /// 最適化対象のパラメータを作成します。
    ///
    /// 内部にデータを保持し、`Assign`によって更新される可能性のあるノードです。
    pub fn new_parameter(data: B::Tensor) -> Tensor<B> {
        let shape = B::shape(&data);
        Self::push_leaf(NodeType::Parameter, Some(data), shape)
    }

    /// 定数ノードを作成します。
    pub fn new_const(data: B::Tensor) -> Tensor<B> {
        let shape = B::shape(&data);
        Self::push_leaf(NodeType::Const, Some(data), shape)
    }

    /// `value`を保持するRank0の定数ノードを作成します。
    pub fn scalar(value: f32) -> Tensor<B> {
        Self::new_const(B::from_vec(vec![value], &[]))
    }

    /// 新しい演算ノードをグラフに追加するための内部ヘルパー関数
    pub fn op(op_type: OpType, inputs: Vec<&Tensor<B>>) -> Tensor<B> {
        let node_id = with_graph::<B, _, _>(|graph| {
            let input_shapes: Vec<Vec<usize>> = inputs
                .iter()
                .map(|t| {
                    graph.nodes[t.id]
                        .shape
                        .clone()
                        .expect("Input node has no shape")
                })
                .collect();
            let input_shape_refs: Vec<&Vec<usize>> = input_shapes.iter().collect();

            // 形状推論
            let output_shape = compute_shape(&op_type, &input_shape_refs)
                .unwrap_or_else(|e| panic!("Shape mismatch in operation: {}", e));

            let new_node_id = graph.nodes.len();
            graph.nodes.push(Node {
                id: new_node_id,
                node_type: NodeType::Operation(op_type),
                inputs: inputs.iter().map(|&tensor| tensor.id).collect(),
                data: None,
                shape: Some(output_shape),
            });
            new_node_id
        });
        Tensor::from_id(node_id)
    }

    /// 代入ノードをグラフに追加します。
    ///
    /// `target`テンソルに`value`テンソルの値を代入する操作を表します。
    /// オプティマイザーの更新ルールのように、実行のたびに変数を更新する場合に使用します。
    pub fn assign(target: &Tensor<B>, value: &Tensor<B>) -> Tensor<B> {
        let node_id = with_graph::<B, _, _>(|graph| {
            let target_shape = graph.nodes[target.id]
                .shape
                .clone()
                .expect("Target node has no shape");
            let value_shape = graph.nodes[value.id]
                .shape
                .as_ref()
                .expect("Value node has no shape");

            if &target_shape != value_shape {
                panic!(
                    "Shape mismatch in assign: target={:?}, value={:?}",
                    target_shape, value_shape
                );
            }

            let new_node_id = graph.nodes.len();
            graph.nodes.push(Node {
                id: new_node_id,
                node_type: NodeType::Assign { target: target.id },
                inputs: vec![value.id],
                data: None,
                shape: Some(target_shape),
            });
            new_node_id
        });
        Tensor::from_id(node_id)
    }

    /// 勾配計算ノード(`Grad`)を作成します。
    ///
    /// `self` (y) を `x` で微分した勾配 (dy/dx) を計算するリクエストをグラフに追加します。
    /// 実際の勾配計算は`build`時の自動微分フェーズ(`autodiff::expand_graph`)で行われます。
    pub fn grad(&self, x: &Tensor<B>) -> Tensor<B> {
        let node_id = with_graph::<B, _, _>(|graph| {
            let x_shape = graph.nodes[x.id]
                .shape
                .clone()
                .expect("x node has no shape");

            let new_node_id = graph.nodes.len();
            graph.nodes.push(Node {
                id: new_node_id,
                node_type: NodeType::Grad {
                    x: x.id,
                    y: self.id,
                },
                inputs: vec![],
                data: None,
                shape: Some(x_shape),
            });
            new_node_id
        });
        Tensor::from_id(node_id)
    }

    /// 指定された軸で和をとります。`None`の場合は全要素の和をとります。
    pub fn sum(self, axis: Option<usize>) -> Self {
        Tensor::op(OpType::Sum { axis }, vec![&self])
    }

    /// 複数のTensorの和を計算するノードを作成します。
    pub fn add_n(tensors: Vec<Self>) -> Self {
        let refs: Vec<&Tensor<B>> = tensors.iter().collect();
        Tensor::op(OpType::AddN, refs)
    }

    /// ブロードキャストされた軸について和をとり、`shape`に縮約します。
    pub fn sum_to(self, shape: Vec<usize>) -> Self {
        Tensor::op(OpType::SumTo { shape }, vec![&self])
    }

    pub fn reshape(self, shape: Vec<usize>) -> Self {
        Tensor::op(OpType::Reshape { shape }, vec![&self])
    }

    pub fn powi(self, n: i32) -> Self {
        Tensor::op(OpType::Powi { n }, vec![&self])
    }

    /// 同じ形状で全ての要素が1のTensorを作成します。
    pub fn ones_like(tensor: &Self) -> Self {
        Tensor::op(OpType::OnesLike, vec![tensor])
    }
}

// 演算のオーバーロード
impl<B: Backend + 'static> std::ops::Add for Tensor<B> {
    type Output = Tensor<B>;

    fn add(self, rhs: Self) -> Self::Output {
        Tensor::op(OpType::Add, vec![&self, &rhs])
    }
}

impl<B: Backend + 'static> std::ops::Sub for Tensor<B> {
    type Output = Tensor<B>;

    fn sub(self, rhs: Self) -> Self::Output {
        Tensor::op(OpType::Sub, vec![&self, &rhs])
    }
}

impl<B: Backend + 'static> std::ops::Mul for Tensor<B> {
    type Output = Tensor<B>;

    fn mul(self, rhs: Self) -> Self::Output {
        Tensor::op(OpType::Mul, vec![&self, &rhs])
    }
}

impl<B: Backend + 'static> std::ops::Neg for Tensor<B> {
    type Output = Tensor<B>;

    fn neg(self) -> Self::Output {
        Tensor::op(OpType::Neg, vec![&self])
    }
}
