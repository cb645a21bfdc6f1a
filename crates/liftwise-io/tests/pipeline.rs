//! End-to-end integration tests: CSV -> clean -> holdout -> fit -> score -> artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use liftwise_io::{
    ClassMetricRow, ClassProbability, Cleaner, ConfusionHeatmap, EvaluationSummary,
    ExperimentName, ImportanceChart, ImportanceRow, IoError, ModelSummary, PredictionRow,
    ReportContext, ReportWriter, ResultWriter, SensorReader, project,
};
use liftwise_rf::{
    CrossValidation, DecisionTreeConfig, HoldoutSplit, ModelSpec, RandomForestConfig, SavedModel,
    score, select_best,
};
use tempfile::TempDir;

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn cleaning_of_training_fixture() {
    let table = SensorReader::new(&fixture_path("pml_training_small.csv"))
        .read()
        .expect("fixture should parse");
    assert_eq!(table.n_rows(), 75);
    assert_eq!(table.sensor_names().len(), 10);

    let ds = Cleaner::new().clean(&table).unwrap();

    // 5 boundary rows and one row with a missing yaw_belt are gone.
    assert_eq!(ds.report.n_boundary_rows_dropped, 5);
    assert_eq!(ds.report.n_incomplete_rows_dropped, 1);
    assert_eq!(ds.n_samples(), 69);
    assert_eq!(ds.class_counts(), vec![14, 14, 13, 14, 14]);
    assert_eq!(ds.class_labels.names(), &["A", "B", "C", "D", "E"]);

    assert_eq!(
        ds.report.sparse_columns_dropped,
        vec!["kurtosis_roll_belt".to_string(), "max_yaw_dumbbell".to_string()]
    );
    assert_eq!(ds.n_features(), 8);
    for housekeeping in ["user_name", "new_window", "num_window", "classe", "cvtd_timestamp"] {
        assert!(!ds.predictor_names.iter().any(|n| n == housekeeping));
    }
    assert_eq!(
        ds.report.predictors_by_location,
        vec![
            ("belt".to_string(), 3),
            ("arm".to_string(), 2),
            ("forearm".to_string(), 2),
            ("dumbbell".to_string(), 1),
        ]
    );
}

#[test]
fn testing_fixture_cannot_be_cleaned() {
    let table = SensorReader::new(&fixture_path("pml_testing_small.csv"))
        .read()
        .unwrap();
    let err = Cleaner::new().clean(&table).unwrap_err();
    assert!(matches!(err, IoError::UnlabeledTable { .. }));
}

#[test]
fn full_report_round_trip() {
    let training = SensorReader::new(&fixture_path("pml_training_small.csv"))
        .read()
        .unwrap();
    let ds = Cleaner::new().clean(&training).unwrap();
    let n_classes = ds.class_labels.len();
    let names = &ds.predictor_names;

    // 1. Stratified holdout
    let partition = HoldoutSplit::new(0.7)
        .unwrap()
        .with_seed(42)
        .partition(&ds.labels)
        .unwrap();
    let (train_x, valid_x) = partition.split_rows(&ds.features);
    let (train_y, valid_y) = partition.split_rows(&ds.labels);
    assert_eq!(train_x.len() + valid_x.len(), 69);

    // 2. Cross-validate and fit both models
    let specs = [
        ModelSpec::Tree(DecisionTreeConfig::rpart_defaults().with_seed(42)),
        ModelSpec::Forest(RandomForestConfig::new(40).unwrap().with_seed(42)),
    ];
    let cv = CrossValidation::new(5).unwrap().with_seed(42);
    let mut scores = Vec::new();
    let mut fitted = Vec::new();
    let mut summaries = Vec::new();
    for spec in &specs {
        let spec = spec.clone().with_n_classes(Some(n_classes));
        let cv_result = cv.evaluate(&spec, &train_x, &train_y, names).unwrap();
        let model = spec.fit(&train_x, &train_y, names).unwrap();
        let holdout = score(&model, &valid_x, &valid_y, n_classes).unwrap();
        summaries.push(ModelSummary {
            kind: model.kind().to_string(),
            cv_fold_accuracies: cv_result.fold_accuracies.clone(),
            cv_mean_accuracy: cv_result.mean_accuracy,
            cv_std_accuracy: cv_result.std_accuracy,
            validation_accuracy: holdout.accuracy,
            out_of_sample_error: holdout.out_of_sample_error,
            validation_kappa: holdout.kappa,
            oob_accuracy: None,
            confusion_matrix: holdout.confusion_matrix.to_rows(),
            class_metrics: holdout
                .class_metrics
                .iter()
                .map(|m| ClassMetricRow {
                    class: ds.class_labels.names()[m.class].clone(),
                    precision: m.precision,
                    recall: m.recall,
                    specificity: m.specificity,
                    f1: m.f1,
                    support: m.support,
                })
                .collect(),
            importances: model
                .ranked_importances(names)
                .into_iter()
                .map(|f| ImportanceRow {
                    name: f.name,
                    importance: f.importance,
                    rank: f.rank,
                })
                .collect(),
        });
        scores.push(holdout);
        fitted.push(model);
    }

    // Signal lives in roll_belt and pitch_forearm; both models see it.
    for s in &scores {
        assert!(s.accuracy > 0.9, "{} accuracy {}", s.kind, s.accuracy);
    }
    let best = select_best(&scores[0], &scores[1]);
    let chosen_index = if best.kind == scores[0].kind { 0 } else { 1 };
    let chosen = &fitted[chosen_index];
    let top = &summaries[chosen_index].importances[0].name;
    assert!(top == "roll_belt" || top == "pitch_forearm", "top predictor {top}");

    // 3. Predict the testing file
    let testing = SensorReader::new(&fixture_path("pml_testing_small.csv"))
        .read()
        .unwrap();
    let scoring = project(&testing, names).unwrap();
    let probabilities = chosen.predict_proba_batch(&scoring.features).unwrap();
    let predictions: Vec<PredictionRow> = scoring
        .keys
        .iter()
        .zip(&probabilities)
        .map(|(key, dist)| PredictionRow {
            key: key.clone(),
            predicted_class: ds.class_labels.names()[dist.predicted_class()].clone(),
            probability: dist.probability(dist.predicted_class()),
            top_k: dist
                .top_k(2)
                .into_iter()
                .map(|(c, p)| ClassProbability {
                    class: ds.class_labels.names()[c].clone(),
                    probability: p,
                })
                .collect(),
        })
        .collect();
    let predicted: Vec<&str> = predictions.iter().map(|p| p.predicted_class.as_str()).collect();
    assert_eq!(predicted, vec!["A", "B", "C", "D", "E"]);

    // 4. Write every artifact
    let dir = TempDir::new().unwrap();
    let experiment = ExperimentName::new("pml_small".into()).unwrap();
    let writer = ResultWriter::new(dir.path(), experiment.clone()).unwrap();

    let summary = EvaluationSummary {
        training_file: "pml_training_small.csv".into(),
        seed: 42,
        cleaning: ds.report.clone(),
        class_names: ds.class_labels.names().to_vec(),
        class_counts: ds.class_counts(),
        n_train: train_x.len(),
        n_validation: valid_x.len(),
        cv_folds: cv.n_folds(),
        models: summaries,
        chosen_model: best.kind.to_string(),
    };
    writer.write_evaluation(&summary).unwrap();
    writer
        .write_predictions(&summary.chosen_model, &predictions)
        .unwrap();

    let chosen_summary = summary.chosen().unwrap();
    ImportanceChart::new()
        .save(&chosen_summary.importances, &writer.importance_plot_path())
        .unwrap();
    ConfusionHeatmap::new()
        .save(&chosen_summary.confusion_matrix, &writer.confusion_plot_path())
        .unwrap();

    let saved = SavedModel::new(
        chosen.clone(),
        names.clone(),
        ds.class_labels.names().to_vec(),
    )
    .unwrap();
    saved.save(writer.model_path()).unwrap();

    let importance_plot = writer.importance_plot_path();
    let confusion_plot = writer.confusion_plot_path();
    let ctx = ReportContext {
        evaluation: &summary,
        testing_file: "pml_testing_small.csv",
        predictions: &predictions,
        importance_plot: Some(importance_plot.as_path()),
        confusion_plot: Some(confusion_plot.as_path()),
        tree_rules: None,
    };
    ReportWriter::new(experiment)
        .write(&ctx, &writer.report_path())
        .unwrap();

    // 5. Read back and verify
    for file in [
        "pml_small_evaluate.json",
        "pml_small_predict.json",
        "pml_small_model.bin",
        "pml_small_importance.png",
        "pml_small_confusion.png",
        "pml_small_report.md",
    ] {
        assert!(dir.path().join(file).exists(), "missing {file}");
    }

    let evaluation: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("pml_small_evaluate.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(evaluation["experiment"], "pml_small");
    assert_eq!(evaluation["models"].as_array().unwrap().len(), 2);
    assert_eq!(evaluation["cleaning"]["n_rows_kept"], 69);

    let reloaded = SavedModel::load(writer.model_path()).unwrap();
    assert_eq!(reloaded.feature_names(), names.as_slice());
    assert_eq!(
        reloaded.model().predict_batch(&scoring.features).unwrap(),
        vec![0, 1, 2, 3, 4]
    );

    let report = fs::read_to_string(writer.report_path()).unwrap();
    assert!(report.contains("![Variable importance](pml_small_importance.png)"));
    assert!(report.contains("![Confusion matrix](pml_small_confusion.png)"));
    assert!(report.contains(&format!("Chosen model: **{}**.", best.kind)));
    assert!(report.contains("| 5 | E |"));
}
