use std::{
    any::{Any, TypeId},
    cell::RefCell,
    collections::{HashMap, HashSet},
};

use crate::{backend::Backend, engine::node::Node};

use self::{
    executor::Executor,
    node::{NodeId, NodeType},
    tensor::Tensor,
};

pub mod autodiff;
pub mod executor;
pub mod node;
pub mod optimizer;
pub mod shape;
pub mod tensor;

#[derive(Debug, Clone)]
pub struct GraphBuilder<B: Backend> {
    pub(crate) nodes: Vec<Node<B>>,
}

thread_local! {
    static GLOBAL_GRAPH_STORE: RefCell<HashMap<TypeId, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

pub fn with_graph<B, F, R>(f: F) -> R
where
    B: Backend + 'static,
    F: FnOnce(&mut GraphBuilder<B>) -> R,
{
    GLOBAL_GRAPH_STORE.with(|store| {
        let mut map = store.borrow_mut();
        let type_id = TypeId::of::<B>();

        // グラフビルダーが存在しない場合は新規作成
        let graph_any = map
            .entry(type_id)
            .or_insert_with(|| Box::new(GraphBuilder::<B> { nodes: Vec::new() }));

        let graph_builder = graph_any
            .downcast_mut::<GraphBuilder<B>>()
            .expect("graph store entry keyed by a foreign backend type");
        f(graph_builder)
    })
}

/// 現在のスレッドでバックエンド`B`に記録された全ノードを破棄します。
///
/// リセット前に作成した`Tensor`ハンドルは無効になるため、以降は使用できません。
pub fn reset<B: Backend + 'static>() {
    with_graph::<B, _, _>(|graph| graph.nodes.clear());
}

/// 未展開の勾配を展開し、現在のグラフを`Executor`にコンパイルします。
///
/// `Assign`ノードと`fetch`に指定したノードの計算に必要なノードだけが実行対象になり、
/// `fetch`の値は各実行後に読み出せます。
pub fn build<B: Backend + 'static>(fetch: &[Tensor<B>]) -> Executor<B> {
    autodiff::expand_graph::<B>();
    // コンパイルは１回しか呼ばれないはずなので、cloneのコストは許容できる
    let fetch: Vec<NodeId> = fetch.iter().map(|t| t.id).collect();
    with_graph::<B, _, _>(|graph| graph.clone().build(&fetch))
}

impl<B: Backend> GraphBuilder<B> {
    fn build(self, fetch: &[NodeId]) -> Executor<B> {
        // Assignノードを全て取得し、それらをグラフの出力（ルート）として扱う
        let mut roots: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|node| matches!(node.node_type, NodeType::Assign { .. }))
            .map(|node| node.id)
            .collect();
        roots.extend(fetch.iter().copied());

        let order = self.topological_sort(&roots);
        log::debug!(
            nodes = self.nodes.len(),
            scheduled = order.len();
            "compiled graph"
        );
        Executor::new(self.nodes, order)
    }

    /// `roots`から到達可能なノードを、入力が先に来る順序で返します。
    ///
    /// 深さ優先探索の帰りがけ順で並べるため、各ノードはその入力より後に現れます。
    pub fn topological_sort(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(NodeId, bool)> = roots.iter().rev().map(|&id| (id, false)).collect();

        while let Some((node_id, expanded)) = stack.pop() {
            if expanded {
                order.push(node_id);
                continue;
            }
            if !visited.insert(node_id) {
                continue;
            }
            stack.push((node_id, true));
            for &input in self.nodes[node_id].inputs.iter().rev() {
                if !visited.contains(&input) {
                    stack.push((input, false));
                }
            }
        }
        order
    }
}
