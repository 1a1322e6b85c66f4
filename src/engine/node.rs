use crate::backend::Backend;

pub type NodeId = usize;

#[derive(Clone, Debug, PartialEq)]
pub enum NodeType {
    /// 外部からの入力データを受け取るノード
    Input,
    /// 最適化によって更新されるパラメータを表すノード
    Parameter,
    /// 定数値を表すノード
    Const,
    /// 演算を表すノード
    Operation(OpType),
    /// 変数への代入を表すノード
    /// 代入は1回の実行の最後にまとめて反映される
    Assign { target: NodeId },
    /// 自動微分を行うためのノード
    /// yをxで微分した結果 (dy/dx) を表す
    Grad { x: NodeId, y: NodeId },
}

#[derive(Clone, Debug, PartialEq)]
pub enum OpType {
    Add,
    Sub,
    Mul,
    Sum { axis: Option<usize> },
    AddN,
    Neg,
    OnesLike,
    Powi { n: i32 },
    /// ブロードキャストの逆操作。サイズ1の軸と先頭の余分な軸について和をとり、`shape`に縮約する
    SumTo { shape: Vec<usize> },
    /// 要素数を変えずに形状だけを変更する
    Reshape { shape: Vec<usize> },
    /// 逆伝播時の勾配置換用（入力をそのまま出力する）
    Identity,
}

#[derive(Clone, Debug)]
pub struct Node<B: Backend> {
    pub id: NodeId,
    pub node_type: NodeType,
    pub inputs: Vec<NodeId>,
    /// 実行時に計算結果の値が格納される場所
    /// グラフ構築時はNoneで、Executorによる実行時にSome(tensor)になる
    pub data: Option<B::Tensor>,
    pub shape: Option<Vec<usize>>,
}
