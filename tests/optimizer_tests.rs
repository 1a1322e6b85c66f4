use gd_quadratic::backend::Backend;
use gd_quadratic::backend::ndarray::NdArray;
use gd_quadratic::engine::build;
use gd_quadratic::engine::optimizer::{Optimizer, SGD};
use gd_quadratic::engine::tensor::Tensor;
use gd_quadratic::objective::Quadratic;

#[test]
fn test_sgd_convergence() {
    // Minimize y = x^2, starting at x=2. Min at x=0.
    // dL/dx = 2x, so with lr = 0.1 each step maps x to 0.8x.
    let x = Tensor::<NdArray>::new_parameter(NdArray::from_vec(vec![2.0], &[1]));
    let loss = (x * x).sum(None);

    let mut optimizer = SGD::new(0.1);
    optimizer.update_param(&x, &loss);

    let mut executor = build::<NdArray>(&[loss]);
    for _ in 0..10 {
        executor.run(vec![]).unwrap();
    }

    let val = NdArray::to_vec(executor.get_node_data(x.id()).unwrap())[0];
    let expected = 2.0 * 0.8f32.powi(10);
    assert!(
        (val - expected).abs() < 1e-5,
        "expected {expected}, got {val}"
    );
}

#[test]
fn test_sgd_single_step_on_quadratic() {
    // x0 = 0, grad = 2(0 - 2) = -4, x1 = 0 - 0.1 * -4 = 0.4
    let x = Tensor::<NdArray>::new_parameter(NdArray::from_vec(vec![0.0], &[]));
    let loss = Quadratic::new(2.0).loss(&x);

    let mut optimizer = SGD::new(0.1);
    optimizer.update_param(&x, &loss);

    let mut executor = build::<NdArray>(&[loss]);
    executor.run(vec![]).unwrap();

    assert_eq!(executor.scalar(loss.id()).unwrap(), 4.0);
    assert!((executor.scalar(x.id()).unwrap() - 0.4).abs() < 1e-6);
}

#[test]
fn test_autodiff_matches_closed_form() {
    let objective = Quadratic::new(2.0);
    for x0 in [-3.0f32, 0.0, 0.5, 2.0, 7.25] {
        let x = Tensor::<NdArray>::new_input(vec![]);
        let loss = objective.loss(&x);
        let grad = loss.grad(&x);

        let mut executor = build::<NdArray>(&[loss, grad]);
        executor
            .run(vec![(x.id(), NdArray::from_vec(vec![x0], &[]))])
            .unwrap();

        assert_eq!(executor.scalar(loss.id()).unwrap(), objective.value(x0));
        assert_eq!(executor.scalar(grad.id()).unwrap(), objective.gradient(x0));
    }
}

#[test]
fn test_vector_parameter_gets_elementwise_gradient() {
    // L = sum((x - 2)^2) for x = [0, 1, 3]; dL/dx = 2(x - 2)
    let x = Tensor::<NdArray>::new_input(vec![3]);
    let loss = Quadratic::new(2.0).loss(&x);
    let grad = loss.grad(&x);

    let mut executor = build::<NdArray>(&[loss, grad]);
    executor
        .run(vec![(x.id(), NdArray::from_vec(vec![0.0, 1.0, 3.0], &[3]))])
        .unwrap();

    assert_eq!(executor.scalar(loss.id()).unwrap(), 4.0 + 1.0 + 1.0);
    assert_eq!(
        NdArray::to_vec(executor.get_node_data(grad.id()).unwrap()),
        vec![-4.0, -2.0, 2.0]
    );
}

#[test]
fn test_unreachable_target_gets_zero_gradient() {
    let x = Tensor::<NdArray>::new_parameter(NdArray::from_vec(vec![5.0], &[]));
    let unrelated = Tensor::<NdArray>::new_parameter(NdArray::from_vec(vec![1.0, 1.0], &[2]));
    let loss = x * x;
    let grad = loss.grad(&unrelated);

    let mut executor = build::<NdArray>(&[grad]);
    executor.run(vec![]).unwrap();

    assert_eq!(
        NdArray::to_vec(executor.get_node_data(grad.id()).unwrap()),
        vec![0.0, 0.0]
    );
}

#[test]
fn test_broadcast_parameter_keeps_its_shape() {
    // w: [1], v: [3]. L = sum(w * v) なので dL/dw = sum(v) = 6
    let w = Tensor::<NdArray>::new_parameter(NdArray::from_vec(vec![1.0], &[1]));
    let v = Tensor::<NdArray>::new_const(NdArray::from_vec(vec![1.0, 2.0, 3.0], &[3]));
    let loss = (w * v).sum(None);
    let grad = loss.grad(&w);

    let mut optimizer = SGD::new(0.1);
    optimizer.update_param(&w, &loss);

    let mut executor = build::<NdArray>(&[grad]);
    executor.run(vec![]).unwrap();

    let grad_data = executor.get_node_data(grad.id()).unwrap();
    assert_eq!(NdArray::shape(grad_data), vec![1]);
    assert_eq!(NdArray::to_vec(grad_data), vec![6.0]);

    // w = 1 - 0.1 * 6
    let w_data = executor.get_node_data(w.id()).unwrap();
    assert_eq!(NdArray::shape(w_data), vec![1]);
    assert!((NdArray::to_vec(w_data)[0] - 0.4).abs() < 1e-6);
}

#[test]
fn test_broadcast_grad_over_size_one_axis() {
    // a: [2, 3], b: [1, 3]. L = sum(a * b), dL/db = aの列和
    let a = Tensor::<NdArray>::new_parameter(NdArray::from_vec(
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        &[2, 3],
    ));
    let b = Tensor::<NdArray>::new_parameter(NdArray::from_vec(vec![10.0, 20.0, 30.0], &[1, 3]));
    let loss = (a * b).sum(None);

    let mut optimizer = SGD::new(1.0);
    optimizer.update_param(&b, &loss);

    let mut executor = build::<NdArray>(&[loss]);
    executor.run(vec![]).unwrap();

    let b_data = executor.get_node_data(b.id()).unwrap();
    assert_eq!(NdArray::shape(b_data), vec![1, 3]);
    assert_eq!(NdArray::to_vec(b_data), vec![5.0, 13.0, 21.0]);
}

#[test]
fn test_sum_over_trailing_axis_backward() {
    // s = sum(a, axis=1) (形状 [2]), L = sum(s * c), c = [1, 2]
    // dL/da[i][j] = c[i]
    let a = Tensor::<NdArray>::new_input(vec![2, 3]);
    let c = Tensor::<NdArray>::new_const(NdArray::from_vec(vec![1.0, 2.0], &[2]));
    let loss = (a.sum(Some(1)) * c).sum(None);
    let grad = loss.grad(&a);

    let mut executor = build::<NdArray>(&[loss, grad]);
    executor
        .run(vec![(
            a.id(),
            NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]),
        )])
        .unwrap();

    assert_eq!(executor.scalar(loss.id()).unwrap(), 6.0 + 2.0 * 15.0);
    let grad_data = executor.get_node_data(grad.id()).unwrap();
    assert_eq!(NdArray::shape(grad_data), vec![2, 3]);
    assert_eq!(
        NdArray::to_vec(grad_data),
        vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]
    );
}
