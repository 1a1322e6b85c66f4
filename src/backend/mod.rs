use std::fmt::Debug;

pub mod ndarray;

pub type Elm = f32;

pub trait Backend: Clone + Debug {
    type Tensor: Clone + Debug;

    fn zeros(shape: &[usize]) -> Self::Tensor;
    fn ones_like(tensor: &Self::Tensor) -> Self::Tensor;

    // CPU配列からの作成
    fn from_vec(vec: Vec<Elm>, shape: &[usize]) -> Self::Tensor;
    // CPU配列への変換
    fn to_vec(tensor: &Self::Tensor) -> Vec<Elm>;

    fn shape(tensor: &Self::Tensor) -> Vec<usize>;

    // 基本的な演算(全て新しいTensorを返す)
    fn add(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;
    fn sub(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;
    fn mul(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor; // 要素ごとの積
    fn neg(a: &Self::Tensor) -> Self::Tensor;
    fn powi(a: &Self::Tensor, n: i32) -> Self::Tensor;

    fn sum(a: &Self::Tensor, axis: Option<usize>) -> Self::Tensor;
    // ブロードキャストされた軸について和をとり、shapeに戻す
    fn sum_to(a: &Self::Tensor, shape: &[usize]) -> Self::Tensor;
    fn reshape(a: &Self::Tensor, shape: &[usize]) -> Self::Tensor;

    /// 要素が1つだけのTensorをスカラーとして読み出します。
    fn scalar(tensor: &Self::Tensor) -> Option<Elm> {
        let values = Self::to_vec(tensor);
        if values.len() == 1 {
            values.first().copied()
        } else {
            None
        }
    }
}
