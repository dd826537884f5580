//! Integration tests for workflow graph validation with the real stages

use boostflow::data::DatasetSchemas;
use boostflow::error::FlowError;
use boostflow::stages::{Evaluator, Predictor, Splitter, Trainer};
use boostflow::training::BoosterConfig;
use boostflow::workflow::{
    diabetes_xgboost_workflow, Binding, PortType, Stage, Value, WorkflowBuilder,
};
use std::sync::Arc;

fn stages() -> (Arc<dyn Stage>, Arc<dyn Stage>, Arc<dyn Stage>, Arc<dyn Stage>) {
    let s = DatasetSchemas::pima();
    (
        Arc::new(Splitter::new(s.clone())),
        Arc::new(Trainer::new(s.clone(), BoosterConfig::default())),
        Arc::new(Predictor::new(s.clone())),
        Arc::new(Evaluator::new(s)),
    )
}

fn with_split_inputs(builder: WorkflowBuilder) -> WorkflowBuilder {
    builder
        .input("dataset", PortType::Csv, None, "")
        .input("seed", PortType::Integer, Some(Value::Integer(7)), "")
        .input("test_split_ratio", PortType::Float, Some(Value::Float(0.33)), "")
}

fn split_bindings() -> Vec<(&'static str, Binding)> {
    vec![
        ("dataset", Binding::input("dataset")),
        ("seed", Binding::input("seed")),
        ("test_split_ratio", Binding::input("test_split_ratio")),
    ]
}

#[test]
fn test_diabetes_graph_shape() {
    let graph = diabetes_xgboost_workflow(&DatasetSchemas::pima(), BoosterConfig::default()).unwrap();
    let order: Vec<&str> = graph.topological_order().map(|n| n.id.as_str()).collect();
    assert_eq!(order, ["split", "fit", "predict", "metrics"]);

    let predict = graph.node("predict").unwrap();
    let mut upstream = predict.upstream();
    upstream.sort();
    assert_eq!(upstream, ["fit", "split"]);

    let dot = graph.to_dot();
    assert!(dot.contains("\"fit\" -> \"predict\""));
    assert!(dot.contains("\"metrics\" -> \"out:accuracy\""));
}

#[test]
fn test_labels_bound_to_feature_port_rejected() {
    let (split, fit, _, _) = stages();
    let err = with_split_inputs(WorkflowBuilder::new("bad"))
        .node("split", split, split_bindings())
        .node(
            "fit",
            fit,
            [
                ("x", Binding::output("split", "y_train")),
                ("y", Binding::output("split", "y_train")),
            ],
        )
        .build()
        .unwrap_err();
    assert!(matches!(err, FlowError::GraphError(ref m) if m.contains("type mismatch")));
}

#[test]
fn test_scalar_bound_to_table_port_rejected() {
    let (split, _, _, metrics) = stages();
    let err = with_split_inputs(WorkflowBuilder::new("bad"))
        .node("split", split, split_bindings())
        .node(
            "metrics",
            metrics,
            [
                ("predictions", Binding::input("seed")),
                ("y", Binding::output("split", "y_test")),
            ],
        )
        .build()
        .unwrap_err();
    assert!(matches!(err, FlowError::GraphError(_)));
}

#[test]
fn test_cycle_between_real_stages_rejected() {
    let (split, fit, predict, _) = stages();
    // Well-typed, but fit reads the labels that predict derives from fit's model
    let err = with_split_inputs(WorkflowBuilder::new("cyclic"))
        .node("split", split, split_bindings())
        .node(
            "fit",
            fit,
            [
                ("x", Binding::output("split", "x_train")),
                ("y", Binding::output("predict", "predictions")),
            ],
        )
        .node(
            "predict",
            predict,
            [
                ("x", Binding::output("split", "x_test")),
                ("model_ser", Binding::output("fit", "model")),
            ],
        )
        .build()
        .unwrap_err();
    assert!(matches!(err, FlowError::GraphError(ref m) if m.contains("cycle")));
}

#[test]
fn test_missing_predictor_binding_rejected() {
    let (split, fit, predict, _) = stages();
    let err = with_split_inputs(WorkflowBuilder::new("partial"))
        .node("split", split, split_bindings())
        .node(
            "fit",
            fit,
            [
                ("x", Binding::output("split", "x_train")),
                ("y", Binding::output("split", "y_train")),
            ],
        )
        .node("predict", predict, [("x", Binding::output("split", "x_test"))])
        .build()
        .unwrap_err();
    assert!(matches!(err, FlowError::GraphError(ref m) if m.contains("model_ser")));
}

#[test]
fn test_output_of_unknown_port_rejected() {
    let (split, _, _, _) = stages();
    let err = with_split_inputs(WorkflowBuilder::new("g"))
        .node("split", split, split_bindings())
        .output("model", "split", "model")
        .build()
        .unwrap_err();
    assert!(matches!(err, FlowError::GraphError(_)));
}
