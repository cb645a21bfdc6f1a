use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use liftwise_io::{
    ClassMetricRow, ClassProbability, CleanDataset, Cleaner, ConfusionHeatmap, EvaluationSummary,
    ExperimentName, ImportanceChart, ImportanceRow, ModelSummary, PredictionRow, ReportContext,
    ReportWriter, ResultWriter, SensorReader, project,
};
use liftwise_rf::{
    CrossValidation, CrossValidationResult, DecisionTreeConfig, FittedModel, HoldoutScore,
    HoldoutSplit, ModelSpec, OobMode, RandomForestConfig, SavedModel, SplitCriterion, score,
    select_best,
};

#[derive(Parser)]
#[command(name = "liftwise")]
#[command(about = "Weight-lifting technique classification from on-body sensor data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Shared cleaning and model parameters.
#[derive(Args, Debug, Clone)]
struct TuningArgs {
    /// Number of cross-validation folds
    #[arg(long, default_value_t = 5)]
    cv_folds: usize,

    /// Fraction of each class placed in the training partition
    #[arg(long, default_value_t = 0.7)]
    train_fraction: f64,

    /// Number of trees in the random forest
    #[arg(long, default_value_t = 100)]
    n_trees: usize,

    /// Maximum depth of forest trees (unlimited if not set)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Maximum depth of the single decision tree
    #[arg(long, default_value_t = 30)]
    tree_max_depth: usize,

    /// Complexity parameter of the single decision tree
    #[arg(long, default_value_t = 0.01)]
    tree_cp: f64,

    /// Drop columns whose missing fraction exceeds this value
    #[arg(long, default_value_t = 0.95)]
    missing_threshold: f64,

    /// Also drop near-zero-variance columns
    #[arg(long, default_value_t = false)]
    near_zero_variance: bool,

    /// Split criterion: "gini" or "entropy"
    #[arg(long, default_value = "gini")]
    criterion: String,
}

#[derive(Subcommand)]
enum Command {
    /// Run the whole analysis and write the report
    Report {
        /// Path to the labeled training CSV
        #[arg(long)]
        training: PathBuf,

        /// Path to the unlabeled testing CSV
        #[arg(long)]
        testing: PathBuf,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Number of top-k classes to output per test row
        #[arg(long, default_value_t = 3)]
        top_k: usize,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Evaluate both models and save the better one
    Evaluate {
        /// Path to the labeled training CSV
        #[arg(long)]
        training: PathBuf,

        /// Experiment name for output files
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Apply a saved model to a testing CSV
    Predict {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// Path to the unlabeled testing CSV
        #[arg(long)]
        testing: PathBuf,

        /// Number of top-k classes to output per test row
        #[arg(long, default_value_t = 3)]
        top_k: usize,

        /// Experiment name for output files
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

// JSON written to stdout

#[derive(Serialize)]
struct ModelOutput {
    kind: String,
    cv_mean_accuracy: f64,
    validation_accuracy: f64,
    out_of_sample_error: f64,
    validation_kappa: f64,
}

#[derive(Serialize)]
struct EvaluateOutput {
    experiment: String,
    n_samples: usize,
    n_predictors: usize,
    models: Vec<ModelOutput>,
    chosen_model: String,
    model_path: PathBuf,
}

#[derive(Serialize)]
struct PredictOutput {
    experiment: String,
    model: String,
    n_rows: usize,
    predictions: Vec<(String, String)>,
}

#[derive(Serialize)]
struct ReportOutput {
    #[serde(flatten)]
    evaluation: EvaluateOutput,
    report_path: PathBuf,
    predictions: Vec<(String, String)>,
}

/// Result of the evaluation stages shared by `report` and `evaluate`.
struct Evaluation {
    dataset: CleanDataset,
    summary: EvaluationSummary,
    chosen: FittedModel,
    tree_rules: String,
}

impl Evaluation {
    fn output(&self, experiment: &str, model_path: PathBuf) -> EvaluateOutput {
        EvaluateOutput {
            experiment: experiment.to_string(),
            n_samples: self.dataset.n_samples(),
            n_predictors: self.dataset.n_features(),
            models: self
                .summary
                .models
                .iter()
                .map(|m| ModelOutput {
                    kind: m.kind.clone(),
                    cv_mean_accuracy: m.cv_mean_accuracy,
                    validation_accuracy: m.validation_accuracy,
                    out_of_sample_error: m.out_of_sample_error,
                    validation_kappa: m.validation_kappa,
                })
                .collect(),
            chosen_model: self.summary.chosen_model.clone(),
            model_path,
        }
    }

    fn save_model(&self, path: &Path) -> Result<()> {
        SavedModel::new(
            self.chosen.clone(),
            self.dataset.predictor_names.clone(),
            self.dataset.class_labels.names().to_vec(),
        )?
        .save(path)
        .context("failed to save model")?;
        info!(path = %path.display(), "model saved");
        Ok(())
    }
}

fn parse_criterion(s: &str) -> Result<SplitCriterion> {
    match s {
        "gini" => Ok(SplitCriterion::Gini),
        "entropy" => Ok(SplitCriterion::Entropy),
        other => anyhow::bail!("unknown split criterion: {other} (expected gini or entropy)"),
    }
}

fn class_name(class_names: &[String], class: usize) -> String {
    class_names
        .get(class)
        .cloned()
        .unwrap_or_else(|| class.to_string())
}

fn model_summary(
    cv: &CrossValidationResult,
    holdout: &HoldoutScore,
    model: &FittedModel,
    oob_accuracy: Option<f64>,
    predictor_names: &[String],
    class_names: &[String],
) -> ModelSummary {
    ModelSummary {
        kind: model.kind().to_string(),
        cv_fold_accuracies: cv.fold_accuracies.clone(),
        cv_mean_accuracy: cv.mean_accuracy,
        cv_std_accuracy: cv.std_accuracy,
        validation_accuracy: holdout.accuracy,
        out_of_sample_error: holdout.out_of_sample_error,
        validation_kappa: holdout.kappa,
        oob_accuracy,
        confusion_matrix: holdout.confusion_matrix.to_rows(),
        class_metrics: holdout
            .class_metrics
            .iter()
            .map(|m| ClassMetricRow {
                class: class_name(class_names, m.class),
                precision: m.precision,
                recall: m.recall,
                specificity: m.specificity,
                f1: m.f1,
                support: m.support,
            })
            .collect(),
        importances: model
            .ranked_importances(predictor_names)
            .into_iter()
            .map(|f| ImportanceRow {
                name: f.name,
                importance: f.importance,
                rank: f.rank,
            })
            .collect(),
    }
}

/// Read, clean, split, cross-validate, fit, score and choose.
fn evaluate_training(training: &Path, tuning: &TuningArgs, seed: u64) -> Result<Evaluation> {
    let criterion = parse_criterion(&tuning.criterion)?;

    // 1. Read and clean
    let table = SensorReader::new(training)
        .read()
        .context("failed to read training CSV")?;
    let dataset = Cleaner::new()
        .with_missing_threshold(tuning.missing_threshold)
        .with_near_zero_variance(tuning.near_zero_variance)
        .clean(&table)
        .context("failed to clean training data")?;
    let names = &dataset.predictor_names;
    let class_names = dataset.class_labels.names();
    let n_classes = dataset.class_labels.len();
    info!(
        n_samples = dataset.n_samples(),
        n_predictors = dataset.n_features(),
        n_classes,
        "training data ready"
    );

    // 2. Stratified holdout
    let partition = HoldoutSplit::new(tuning.train_fraction)?
        .with_seed(seed)
        .partition(&dataset.labels)
        .context("holdout split failed")?;
    let (train_x, valid_x) = partition.split_rows(&dataset.features);
    let (train_y, valid_y) = partition.split_rows(&dataset.labels);
    info!(
        n_train = train_x.len(),
        n_validation = valid_x.len(),
        "holdout partition built"
    );

    // 3. Cross-validate both models on the training partition
    let tree_config = DecisionTreeConfig::rpart_defaults()
        .with_criterion(criterion)
        .with_max_depth(Some(tuning.tree_max_depth))
        .with_complexity(tuning.tree_cp)
        .with_n_classes(Some(n_classes))
        .with_seed(seed);
    let forest_config = RandomForestConfig::new(tuning.n_trees)?
        .with_max_depth(tuning.max_depth)
        .with_criterion(criterion)
        .with_n_classes(Some(n_classes))
        .with_seed(seed);

    let cv = CrossValidation::new(tuning.cv_folds)?.with_seed(seed);
    let tree_cv = cv
        .evaluate(&ModelSpec::Tree(tree_config.clone()), &train_x, &train_y, names)
        .context("decision tree cross-validation failed")?;
    let forest_cv = cv
        .evaluate(&ModelSpec::Forest(forest_config.clone()), &train_x, &train_y, names)
        .context("random forest cross-validation failed")?;

    // 4. Refit on the whole training partition
    let tree = tree_config
        .fit(&train_x, &train_y)
        .context("decision tree training failed")?;
    let tree_rules = tree.render_rules(names, class_names, 8);
    let tree_model = FittedModel::Tree(tree);

    let forest_result = forest_config
        .with_oob_mode(OobMode::Enabled)
        .fit(&train_x, &train_y, names)
        .context("random forest training failed")?;
    let oob_accuracy = forest_result.oob_accuracy();
    info!(oob_accuracy = ?oob_accuracy, "random forest trained");
    let forest_model = FittedModel::Forest(forest_result.forest);

    // 5. Score on the validation partition; ties go to the tree
    let tree_score = score(&tree_model, &valid_x, &valid_y, n_classes)
        .context("decision tree scoring failed")?;
    let forest_score = score(&forest_model, &valid_x, &valid_y, n_classes)
        .context("random forest scoring failed")?;
    let best_kind = select_best(&tree_score, &forest_score).kind;
    info!(
        tree_accuracy = tree_score.accuracy,
        forest_accuracy = forest_score.accuracy,
        chosen = %best_kind,
        "model chosen"
    );

    let models = vec![
        model_summary(&tree_cv, &tree_score, &tree_model, None, names, class_names),
        model_summary(
            &forest_cv,
            &forest_score,
            &forest_model,
            oob_accuracy,
            names,
            class_names,
        ),
    ];
    let summary = EvaluationSummary {
        training_file: training.display().to_string(),
        seed,
        cleaning: dataset.report.clone(),
        class_names: class_names.to_vec(),
        class_counts: dataset.class_counts(),
        n_train: train_x.len(),
        n_validation: valid_x.len(),
        cv_folds: cv.n_folds(),
        models,
        chosen_model: best_kind.to_string(),
    };

    let chosen = if best_kind == tree_model.kind() {
        tree_model
    } else {
        forest_model
    };

    Ok(Evaluation {
        dataset,
        summary,
        chosen,
        tree_rules,
    })
}

/// Project a testing CSV onto the model's predictors and predict every row.
fn predict_testing(
    testing: &Path,
    model: &FittedModel,
    predictor_names: &[String],
    class_names: &[String],
    top_k: usize,
) -> Result<Vec<PredictionRow>> {
    let table = SensorReader::new(testing)
        .read()
        .context("failed to read testing CSV")?;
    let scoring = project(&table, predictor_names).context("failed to prepare testing rows")?;
    info!(n_rows = scoring.keys.len(), "testing data ready");

    let distributions = model
        .predict_proba_batch(&scoring.features)
        .context("prediction failed")?;

    Ok(scoring
        .keys
        .into_iter()
        .zip(&distributions)
        .map(|(key, dist)| PredictionRow {
            key,
            predicted_class: class_name(class_names, dist.predicted_class()),
            probability: dist.probability(dist.predicted_class()),
            top_k: dist
                .top_k(top_k)
                .into_iter()
                .map(|(class, probability)| ClassProbability {
                    class: class_name(class_names, class),
                    probability,
                })
                .collect(),
        })
        .collect())
}

fn prediction_pairs(predictions: &[PredictionRow]) -> Vec<(String, String)> {
    predictions
        .iter()
        .map(|p| (p.key.clone(), p.predicted_class.clone()))
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Report {
            training,
            testing,
            experiment,
            output_dir,
            top_k,
            tuning,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let writer = ResultWriter::new(&output_dir, experiment_name.clone())?;

            // 1. Evaluate and persist
            let evaluation = evaluate_training(&training, &tuning, cli.seed)?;
            evaluation.save_model(&writer.model_path())?;
            writer.write_evaluation(&evaluation.summary)?;

            // 2. Predict the testing file
            let predictions = predict_testing(
                &testing,
                &evaluation.chosen,
                &evaluation.dataset.predictor_names,
                evaluation.dataset.class_labels.names(),
                top_k,
            )?;
            writer.write_predictions(&evaluation.summary.chosen_model, &predictions)?;

            // 3. Plots
            let chosen = evaluation
                .summary
                .chosen()
                .context("chosen model missing from summary")?;
            let importance_plot = writer.importance_plot_path();
            let confusion_plot = writer.confusion_plot_path();
            ImportanceChart::new()
                .save(&chosen.importances, &importance_plot)
                .context("failed to draw importance chart")?;
            ConfusionHeatmap::new()
                .save(&chosen.confusion_matrix, &confusion_plot)
                .context("failed to draw confusion heatmap")?;

            // 4. Report
            let testing_file = testing.display().to_string();
            let ctx = ReportContext {
                evaluation: &evaluation.summary,
                testing_file: &testing_file,
                predictions: &predictions,
                importance_plot: Some(importance_plot.as_path()),
                confusion_plot: Some(confusion_plot.as_path()),
                tree_rules: Some(evaluation.tree_rules.as_str()),
            };
            let report_path = writer.report_path();
            ReportWriter::new(experiment_name).write(&ctx, &report_path)?;

            // 5. Print summary
            let output = ReportOutput {
                evaluation: evaluation.output(&experiment, writer.model_path()),
                report_path,
                predictions: prediction_pairs(&predictions),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Evaluate {
            training,
            experiment,
            output_dir,
            tuning,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let writer = ResultWriter::new(&output_dir, experiment_name)?;

            let evaluation = evaluate_training(&training, &tuning, cli.seed)?;
            evaluation.save_model(&writer.model_path())?;
            writer.write_evaluation(&evaluation.summary)?;

            let output = evaluation.output(&experiment, writer.model_path());
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            model,
            testing,
            top_k,
            experiment,
            output_dir,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;

            // 1. Load model
            let saved = SavedModel::load(&model).context("failed to load model")?;
            info!(
                kind = %saved.model().kind(),
                n_features = saved.model().n_features(),
                n_classes = saved.model().n_classes(),
                "model loaded"
            );

            // 2. Predict
            let predictions = predict_testing(
                &testing,
                saved.model(),
                saved.feature_names(),
                saved.class_names(),
                top_k,
            )?;

            // 3. Write predictions JSON
            let kind = saved.model().kind().to_string();
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            writer.write_predictions(&kind, &predictions)?;

            // 4. Print summary
            let output = PredictOutput {
                experiment,
                model: kind,
                n_rows: predictions.len(),
                predictions: prediction_pairs(&predictions),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
