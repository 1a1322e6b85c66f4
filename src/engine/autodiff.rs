// 自動微分(Automatic Differentiation)を行うためのモジュール

use std::collections::HashMap;

use crate::backend::Backend;
use crate::engine::{
    node::{Node, NodeId, NodeType, OpType},
    tensor::Tensor,
    with_graph,
};

/// 計算グラフを展開し、逆伝播（バックプロパゲーション）のためのノードを追加します。
///
/// この関数は以下のステップを実行します：
/// 1. 計算すべき勾配ノード(`Grad`)を特定します。
/// 2. グラフのトポロジカルソートを行い、計算順序を決定します。
/// 3. グラフを逆順に辿りながら（逆伝播）、各ノードの勾配を計算する新しいノードを追加します。
/// 4. `Grad`ノードを、計算された勾配ノードの`Identity`に置き換えます。
///
/// 展開済みの`Grad`ノードは`Identity`になっているため、複数回呼んでも安全です。
pub fn expand_graph<B: Backend + 'static>() {
    // 1. 計算すべき勾配の特定
    // yをxで微分したい場合 (`Grad {x, y}`ノードが存在する場合)、
    // yは逆伝播の出発点(root)となり、xは到達点となります。
    let (match_grads, global_roots) = with_graph::<B, _, _>(|graph| {
        let mut grads_to_process: HashMap<NodeId, Vec<(NodeId, NodeId)>> = HashMap::new();
        let mut global_roots = Vec::new();

        for (i, node) in graph.nodes.iter().enumerate() {
            if let NodeType::Grad { x, y } = node.node_type {
                grads_to_process.entry(y).or_default().push((x, i));
                if !global_roots.contains(&y) {
                    global_roots.push(y);
                }
            }
        }
        (grads_to_process, global_roots)
    });

    if match_grads.is_empty() {
        return;
    }

    // 2. 関連するグラフ全体のトポロジカルソートを取得
    // 逆伝播はこの逆順で行います。
    let forward_order = with_graph::<B, _, _>(|graph| graph.topological_sort(&global_roots));
    log::debug!(
        roots = global_roots.len(),
        nodes = forward_order.len();
        "expanding gradients"
    );

    // 3. 各yのグループごとにバックワードパスを実行
    for (y_root, x_targets) in match_grads {
        let mut node_grads: HashMap<NodeId, Vec<Tensor<B>>> = HashMap::new();

        // 初期勾配 dy/dy = 1 を設定
        let y_tensor = Tensor::<B>::from_id(y_root);
        let ones_tensor = Tensor::ones_like(&y_tensor);
        node_grads.entry(y_root).or_default().push(ones_tensor);

        // トポロジカルソートの逆順（出力から入力へ）でイテレーション
        for &node_id in forward_order.iter().rev() {
            // 分岐している場合（複数の出力先がある場合）、勾配は加算されます（連鎖律）。
            let final_grad = match node_grads.remove(&node_id) {
                Some(grads) if grads.len() == 1 => grads[0],
                Some(grads) => Tensor::add_n(grads),
                None => continue,
            };

            // 現在のノードが勾配を求めたい対象(x)である場合、
            // そのGradノードを計算された勾配(final_grad)に接続します。
            with_graph::<B, _, _>(|graph| {
                for &(x, grad_node_id) in &x_targets {
                    if x == node_id {
                        graph.nodes[grad_node_id].node_type = NodeType::Operation(OpType::Identity);
                        graph.nodes[grad_node_id].inputs = vec![final_grad.id];
                    }
                }
            });

            let (node_type, inputs) = with_graph::<B, _, _>(|graph| {
                let node = &graph.nodes[node_id];
                (node.node_type.clone(), node.inputs.clone())
            });

            let input_tensors: Vec<Tensor<B>> =
                inputs.iter().map(|&id| Tensor::from_id(id)).collect();

            // ノードの種類に応じて、入力に対する勾配を計算し、node_gradsに追加します。
            let NodeType::Operation(op_type) = node_type else {
                continue;
            };
            match op_type {
                OpType::Add => {
                    // z = a + b
                    // dL/da = dL/dz, dL/db = dL/dz
                    let a = &input_tensors[0];
                    let b = &input_tensors[1];
                    node_grads
                        .entry(a.id)
                        .or_default()
                        .push(handle_broadcast(&final_grad, a));
                    node_grads
                        .entry(b.id)
                        .or_default()
                        .push(handle_broadcast(&final_grad, b));
                }
                OpType::Sub => {
                    // z = a - b
                    // dL/da = dL/dz, dL/db = -dL/dz
                    let a = &input_tensors[0];
                    let b = &input_tensors[1];
                    node_grads
                        .entry(a.id)
                        .or_default()
                        .push(handle_broadcast(&final_grad, a));
                    node_grads
                        .entry(b.id)
                        .or_default()
                        .push(handle_broadcast(&-final_grad, b));
                }
                OpType::Mul => {
                    // z = a * b (要素ごとの積)
                    // dL/da = dL/dz * b, dL/db = dL/dz * a
                    let a = &input_tensors[0];
                    let b = &input_tensors[1];
                    let dy_b = final_grad * *b;
                    let dy_a = final_grad * *a;
                    node_grads
                        .entry(a.id)
                        .or_default()
                        .push(handle_broadcast(&dy_b, a));
                    node_grads
                        .entry(b.id)
                        .or_default()
                        .push(handle_broadcast(&dy_a, b));
                }
                OpType::Neg => {
                    let a = &input_tensors[0];
                    node_grads.entry(a.id).or_default().push(-final_grad);
                }
                OpType::Sum { axis } => {
                    // 和の逆伝播は、勾配を元の形状にブロードキャスト（コピー）することに対応します。
                    // 軸を指定した場合は、縮約された軸をサイズ1として戻してからブロードキャストします。
                    let a = &input_tensors[0];
                    let expanded = match axis {
                        Some(ax) => {
                            let mut kept = a.shape();
                            kept[ax] = 1;
                            final_grad.reshape(kept)
                        }
                        None => final_grad,
                    };
                    let grad = expanded * Tensor::ones_like(a);
                    node_grads.entry(a.id).or_default().push(grad);
                }
                OpType::SumTo { .. } => {
                    // 縮約後の形状は入力形状へブロードキャストできる
                    let a = &input_tensors[0];
                    let grad = final_grad * Tensor::ones_like(a);
                    node_grads.entry(a.id).or_default().push(grad);
                }
                OpType::Reshape { .. } => {
                    let a = &input_tensors[0];
                    node_grads
                        .entry(a.id)
                        .or_default()
                        .push(final_grad.reshape(a.shape()));
                }
                OpType::Identity | OpType::AddN => {
                    for inp in &input_tensors {
                        node_grads.entry(inp.id).or_default().push(final_grad);
                    }
                }
                OpType::Powi { n } => {
                    // y = x^n
                    // dy/dx = n * x^(n-1)
                    let x = input_tensors[0];
                    let n_const = Tensor::<B>::scalar(n as f32);
                    let grad = final_grad * (x.powi(n - 1) * n_const);
                    node_grads.entry(x.id).or_default().push(grad);
                }
                // 形状のみに依存するので勾配は流れない
                OpType::OnesLike => {}
            }
        }

        // 到達しなかった（勾配が切れている）ターゲットに対してゼロ勾配を設定
        with_graph::<B, _, _>(|graph| {
            for &(x, grad_node_id) in &x_targets {
                if let NodeType::Grad { .. } = graph.nodes[grad_node_id].node_type {
                    let shape = graph.nodes[x].shape.clone().expect("Shape missing");
                    let zeros = B::zeros(&shape);

                    let zeros_id = graph.nodes.len();
                    graph.nodes.push(Node {
                        id: zeros_id,
                        node_type: NodeType::Const,
                        inputs: vec![],
                        data: Some(zeros),
                        shape: Some(shape),
                    });

                    graph.nodes[grad_node_id].node_type = NodeType::Operation(OpType::Identity);
                    graph.nodes[grad_node_id].inputs = vec![zeros_id];
                }
            }
        });
    }
}

/// ブロードキャストに対応するための勾配調整を行います。
/// 先頭に追加された次元と、サイズ1から広げられた次元について和をとり、ターゲットの形状に戻します。
fn handle_broadcast<B: Backend + 'static>(grad: &Tensor<B>, target: &Tensor<B>) -> Tensor<B> {
    let t_shape = target.shape();
    if grad.shape() == t_shape {
        return *grad;
    }
    grad.sum_to(t_shape)
}
