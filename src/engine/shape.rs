use super::node::OpType;

pub fn compute_shape(op_type: &OpType, input_shapes: &[&Vec<usize>]) -> Result<Vec<usize>, String> {
    match op_type {
        OpType::Add | OpType::Sub | OpType::Mul => {
            if input_shapes.len() != 2 {
                return Err(format!(
                    "{:?} requires 2 inputs, got {}",
                    op_type,
                    input_shapes.len()
                ));
            }
            broadcast_shape(input_shapes[0], input_shapes[1])
        }
        OpType::Sum { axis } => {
            if input_shapes.len() != 1 {
                return Err(format!("Sum requires 1 input, got {}", input_shapes.len()));
            }
            compute_sum_shape(input_shapes[0], *axis)
        }
        OpType::AddN => {
            if input_shapes.is_empty() {
                return Err("AddN requires at least 1 input".to_string());
            }
            let first_shape = input_shapes[0];
            for (i, shape) in input_shapes.iter().enumerate().skip(1) {
                if *shape != first_shape {
                    return Err(format!(
                        "AddN shape mismatch at index {}: expected {:?}, got {:?}",
                        i, first_shape, shape
                    ));
                }
            }
            Ok(first_shape.clone())
        }
        OpType::SumTo { shape } => {
            if input_shapes.len() != 1 {
                return Err(format!("SumTo requires 1 input, got {}", input_shapes.len()));
            }
            // shapeから入力形状へブロードキャストできる場合のみ縮約できる
            let input = input_shapes[0];
            match broadcast_shape(shape, input) {
                Ok(broadcast) if &broadcast == input => Ok(shape.clone()),
                _ => Err(format!("SumTo: cannot reduce {:?} to {:?}", input, shape)),
            }
        }
        OpType::Reshape { shape } => {
            if input_shapes.len() != 1 {
                return Err(format!("Reshape requires 1 input, got {}", input_shapes.len()));
            }
            let from: usize = input_shapes[0].iter().product();
            let to: usize = shape.iter().product();
            if from != to {
                return Err(format!(
                    "Reshape: {:?} has {} elements, {:?} has {}",
                    input_shapes[0], from, shape, to
                ));
            }
            Ok(shape.clone())
        }
        OpType::Neg | OpType::OnesLike | OpType::Powi { .. } | OpType::Identity => {
            if input_shapes.len() != 1 {
                return Err(format!(
                    "{:?} requires 1 input, got {}",
                    op_type,
                    input_shapes.len()
                ));
            }
            Ok(input_shapes[0].clone())
        }
    }
}

fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, String> {
    let a_len = a.len();
    let b_len = b.len();
    let max_len = a_len.max(b_len);
    let mut result = Vec::with_capacity(max_len);

    for i in 0..max_len {
        let a_dim = if i < max_len - a_len {
            1
        } else {
            a[i - (max_len - a_len)]
        };
        let b_dim = if i < max_len - b_len {
            1
        } else {
            b[i - (max_len - b_len)]
        };

        if a_dim == b_dim {
            result.push(a_dim);
        } else if a_dim == 1 {
            result.push(b_dim);
        } else if b_dim == 1 {
            result.push(a_dim);
        } else {
            return Err(format!(
                "Broadcast error: dimension mismatch at index {} (from right): {} vs {} (shapes: {:?}, {:?})",
                max_len - i - 1,
                a_dim,
                b_dim,
                a,
                b
            ));
        }
    }
    Ok(result)
}

fn compute_sum_shape(a: &[usize], axis: Option<usize>) -> Result<Vec<usize>, String> {
    match axis {
        Some(ax) => {
            if ax >= a.len() {
                return Err(format!("Sum axis {} out of bounds for shape {:?}", ax, a));
            }
            let mut shape = a.to_vec();
            shape.remove(ax);
            Ok(shape)
        }
        None => Ok(vec![]),
    }
}
