//! End-to-end evaluation of an exported Iris classification tree

use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use sylva_local_model::{
    InputRow, LocalModel, LocalModelError, MalformedTree, Output, PredictionPolicy, StopReason,
};

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/iris_tree.json")
}

fn iris() -> LocalModel {
    let json = fs::read_to_string(fixture_path()).expect("fixture readable");
    LocalModel::from_json_str(&json).expect("fixture loads")
}

fn row(value: Value) -> InputRow {
    serde_json::from_value(value).unwrap()
}

fn by_name() -> PredictionPolicy {
    PredictionPolicy {
        by_name: true,
        ..PredictionPolicy::default()
    }
}

#[test]
fn short_petals_are_setosa() {
    let model = iris();
    let prediction = model
        .predict(&row(json!({"petal length": 1.0})), &by_name())
        .unwrap();

    assert_eq!(prediction.output, Output::from("Iris-setosa"));
    assert_eq!(prediction.confidence, 0.92865);
    assert_eq!(prediction.count, 50);
    assert_eq!(prediction.stop, StopReason::Leaf);
    assert_eq!(prediction.rule(model.fields()), "petal length < 2.45");
}

#[test]
fn long_wide_petals_are_virginica() {
    let model = iris();
    let prediction = model
        .predict(
            &row(json!({"petal length": 5.0, "petal width": 2.0})),
            &by_name(),
        )
        .unwrap();

    assert_eq!(prediction.output, Output::from("Iris-virginica"));
    assert_eq!(prediction.node_id, 4);
    assert_eq!(prediction.depth, 3);
    assert_eq!(
        prediction.rule(model.fields()),
        "petal length >= 2.45\npetal width >= 1.75\npetal length >= 4.85"
    );
}

#[test]
fn threshold_value_takes_the_inclusive_branch() {
    let model = iris();
    let prediction = model
        .predict(&row(json!({"000002": 2.45})), &PredictionPolicy::default())
        .unwrap();

    // 2.45 is not < 2.45, and petal width is missing below
    assert_eq!(prediction.node_id, 2);
    assert_eq!(prediction.output, Output::from("Iris-versicolor"));
    assert_eq!(prediction.stop, StopReason::NoMatchingBranch);
    assert_eq!(prediction.distribution.len(), 2);
}

#[test]
fn empty_row_answers_with_root_statistics() {
    let model = iris();
    let prediction = model.predict(&row(json!({})), &PredictionPolicy::default()).unwrap();
    assert_eq!(prediction.node_id, 0);
    assert_eq!(prediction.count, 150);
    assert!(prediction.path.is_empty());
    assert_eq!(prediction.rule(model.fields()), "");
}

#[test]
fn numeric_strings_and_nulls_are_normalised() {
    let model = iris();
    let prediction = model
        .predict(
            &row(json!({"petal length": "5.2", "petal width": null, "sepal length": 6.1})),
            &by_name(),
        )
        .unwrap();
    assert_eq!(prediction.node_id, 2);
}

#[test]
fn mistyped_values_are_all_reported() {
    let model = iris();
    let err = model
        .predict(
            &row(json!({"petal width": "wide", "petal length": true})),
            &by_name(),
        )
        .unwrap_err();
    match err {
        LocalModelError::TypeMismatch(mismatches) => {
            let fields: Vec<_> = mismatches.iter().map(|m| m.field.as_str()).collect();
            assert_eq!(fields, vec!["000002", "000003"]);
        }
        other => panic!("expected type mismatch, got {other:?}"),
    }
}

#[test]
fn policy_limits_stop_the_walk_early() {
    let model = iris();
    let input = row(json!({"000002": 5.0, "000003": 1.0}));

    let shallow = PredictionPolicy {
        max_depth: Some(1),
        ..PredictionPolicy::default()
    };
    let prediction = model.predict(&input, &shallow).unwrap();
    assert_eq!(prediction.node_id, 2);
    assert_eq!(prediction.stop, StopReason::MaxDepth);

    let populous = PredictionPolicy {
        min_instances: Some(10),
        ..PredictionPolicy::default()
    };
    let prediction = model.predict(&input, &populous).unwrap();
    assert_eq!(prediction.node_id, 6);
    assert_eq!(prediction.stop, StopReason::MinInstances);
}

#[test]
fn rules_cover_every_leaf() {
    let model = iris();
    let rules = model.rules();
    assert_eq!(rules.len(), model.root().leaf_count());
    assert_eq!(rules.len(), 5);

    let virginica = sylva_local_model::list_rules_for(&model, &Output::from("Iris-virginica"));
    let leaves: Vec<u32> = virginica.iter().map(|r| r.leaf_id).collect();
    assert_eq!(leaves, vec![4, 5, 8]);
}

#[test]
fn summary_and_fingerprint_are_stable() {
    let a = iris();
    let b = iris();
    assert_eq!(a.fingerprint(), b.fingerprint());

    let summary = a.summary();
    assert_eq!(summary.nodes, 9);
    assert_eq!(summary.leaves, 5);
    assert_eq!(summary.depth, 3);
    assert_eq!(summary.fields_used, vec!["000002", "000003"]);
}

#[test]
fn malformed_predicates_fail_at_load_time() {
    let json = fs::read_to_string(fixture_path()).unwrap();
    let mut value: Value = serde_json::from_str(&json).unwrap();
    let root = &mut value["object"]["model"]["root"];
    root["children"][1]["children"][0]["predicate"]["operator"] = json!("~=");

    match LocalModel::from_json_value(value) {
        Err(LocalModelError::Malformed(MalformedTree::UnknownOperator { node, operator })) => {
            assert_eq!(node, 3);
            assert_eq!(operator, "~=");
        }
        other => panic!("expected unknown operator, got {other:?}"),
    }
}

#[test]
fn concurrent_callers_get_identical_answers() {
    let model = iris();
    let inputs: Vec<InputRow> = (0..64)
        .map(|i| {
            let length = 1.0 + f64::from(i) * 0.1;
            row(json!({"000002": length, "000003": 1.0 + f64::from(i % 7) * 0.2}))
        })
        .collect();
    let sequential: Vec<_> = inputs
        .iter()
        .map(|input| model.predict(input, &PredictionPolicy::default()).unwrap())
        .collect();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    inputs
                        .iter()
                        .map(|input| model.predict(input, &PredictionPolicy::default()).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), sequential);
        }
    });

    let batch: Vec<_> = model
        .predict_batch(&inputs, &PredictionPolicy::default())
        .into_iter()
        .map(|result| result.unwrap())
        .collect();
    assert_eq!(batch, sequential);
}

#[test]
fn compound_guards_load_and_require_every_conjunct() {
    let value = json!({
        "fields": {
            "000002": {"name": "petal length", "optype": "numeric"},
            "000003": {"name": "petal width", "optype": "numeric"}
        },
        "root": {
            "output": "Iris-versicolor",
            "confidence": 0.33,
            "count": 150,
            "children": [
                {
                    "output": "Iris-versicolor",
                    "confidence": 0.9,
                    "count": 54,
                    "predicate": [
                        {"operator": ">=", "field": "000002", "value": 2.45},
                        {"operator": "<", "field": "000003", "value": 1.75}
                    ]
                },
                {
                    "output": "Iris-virginica",
                    "confidence": 0.9,
                    "count": 46,
                    "predicate": {"operator": ">=", "field": "000002", "value": 2.45}
                },
                {
                    "output": "Iris-setosa",
                    "confidence": 1.0,
                    "count": 50,
                    "predicate": {"operator": "<", "field": "000002", "value": 2.45}
                }
            ]
        }
    });
    let model = LocalModel::from_json_value(value).unwrap();
    assert_eq!(model.depth(), 1);
    assert_eq!(model.root().children()[0].guard().len(), 2);
    let policy = PredictionPolicy::default();

    let both = model
        .predict(&row(json!({"000002": 5.0, "000003": 1.0})), &policy)
        .unwrap();
    assert_eq!(both.node_id, 1);
    assert_eq!(both.output, Output::from("Iris-versicolor"));
    assert_eq!(both.path.len(), 2);
    assert_eq!(both.depth, 1);
    assert_eq!(
        both.rule(model.fields()),
        "petal length >= 2.45\npetal width < 1.75"
    );

    let second_fails = model
        .predict(&row(json!({"000002": 5.0, "000003": 2.0})), &policy)
        .unwrap();
    assert_eq!(second_fails.node_id, 2);
    assert_eq!(second_fails.output, Output::from("Iris-virginica"));

    let second_missing = model
        .predict(&row(json!({"000002": 5.0})), &policy)
        .unwrap();
    assert_eq!(second_missing.node_id, 2);
    assert_eq!(second_missing.stop, StopReason::Leaf);

    let short = model
        .predict(&row(json!({"000002": 1.0, "000003": 1.0})), &policy)
        .unwrap();
    assert_eq!(short.node_id, 3);

    let rules = model.rules();
    assert_eq!(rules[0].conditions.len(), 2);
    assert_eq!(rules[0].text, "petal length >= 2.45\npetal width < 1.75");
}
