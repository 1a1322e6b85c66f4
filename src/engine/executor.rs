use crate::{
    backend::Backend,
    error::{Error, Result},
};

use super::node::{Node, NodeId, NodeType, OpType};

#[derive(Debug)]
pub struct Executor<B: Backend> {
    nodes: Vec<Node<B>>,
    execution_order: Vec<NodeId>,
}

impl<B: Backend> Executor<B> {
    pub fn new(nodes: Vec<Node<B>>, execution_order: Vec<NodeId>) -> Self {
        Self {
            nodes,
            execution_order,
        }
    }

    /// グラフを1回実行します。
    ///
    /// `inputs`は、どのNodeIdにどのデータを与えるかを示します。
    /// `Assign`による書き込みは全ての演算を評価した後にまとめて反映されるため、
    /// 実行中に観測される値は実行開始時点のパラメータに基づきます。
    pub fn run(&mut self, inputs: Vec<(NodeId, B::Tensor)>) -> Result<()> {
        for (id, data) in inputs {
            self.nodes[id].data = Some(data);
        }

        let mut pending_assigns: Vec<(NodeId, B::Tensor)> = Vec::new();
        for i in 0..self.execution_order.len() {
            let node_id = self.execution_order[i];
            match self.nodes[node_id].node_type.clone() {
                NodeType::Operation(op_type) => {
                    let output = self.eval(&op_type, node_id)?;
                    self.nodes[node_id].data = Some(output);
                }
                NodeType::Assign { target } => {
                    let value = self.input_data(node_id, 0)?.clone();
                    pending_assigns.push((target, value));
                }
                NodeType::Input => {
                    if self.nodes[node_id].data.is_none() {
                        return Err(Error::MissingInput { node: node_id });
                    }
                }
                NodeType::Parameter | NodeType::Const => {}
                // autodiff::expand_graph が全て置き換えるため、ここには来ない
                NodeType::Grad { .. } => return Err(Error::MissingData { node: node_id }),
            }
        }

        for (target, value) in pending_assigns {
            self.nodes[target].data = Some(value);
        }
        Ok(())
    }

    fn input_data(&self, node_id: NodeId, index: usize) -> Result<&B::Tensor> {
        let input = self.nodes[node_id].inputs[index];
        self.nodes[input]
            .data
            .as_ref()
            .ok_or(Error::MissingData { node: input })
    }

    fn eval(&self, op_type: &OpType, node_id: NodeId) -> Result<B::Tensor> {
        let arity = self.nodes[node_id].inputs.len();
        let inputs = (0..arity)
            .map(|i| self.input_data(node_id, i))
            .collect::<Result<Vec<&B::Tensor>>>()?;

        let output = match op_type {
            OpType::Add => B::add(inputs[0], inputs[1]),
            OpType::Sub => B::sub(inputs[0], inputs[1]),
            OpType::Mul => B::mul(inputs[0], inputs[1]),
            OpType::Sum { axis } => B::sum(inputs[0], *axis),
            OpType::AddN => inputs[1..]
                .iter()
                .fold(inputs[0].clone(), |acc, t| B::add(&acc, t)),
            OpType::Neg => B::neg(inputs[0]),
            OpType::OnesLike => B::ones_like(inputs[0]),
            OpType::Powi { n } => B::powi(inputs[0], *n),
            OpType::Identity => inputs[0].clone(),
            OpType::SumTo { shape } => B::sum_to(inputs[0], shape),
            OpType::Reshape { shape } => B::reshape(inputs[0], shape),
        };
        Ok(output)
    }

    pub fn get_node_data(&self, node_id: NodeId) -> Option<&B::Tensor> {
        self.nodes.get(node_id).and_then(|node| node.data.as_ref())
    }

    /// 要素が1つだけのノードの値をスカラーとして読み出します。
    pub fn scalar(&self, node_id: NodeId) -> Result<f32> {
        self.get_node_data(node_id)
            .and_then(B::scalar)
            .ok_or(Error::MissingData { node: node_id })
    }

    /// 1回の実行で評価されるノードを実行順に返します。
    pub fn scheduled(&self) -> &[NodeId] {
        &self.execution_order
    }
}
