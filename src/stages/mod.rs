//! The four pipeline stages
//!
//! Each module exposes a plain function that does the work and a [`Stage`]
//! wrapper the workflow engine schedules:
//!
//! - [`splitter`] - seeded train/test split of the raw dataset
//! - [`trainer`] - gradient-boosted classifier fit
//! - [`predictor`] - label prediction with a serialized model
//! - [`evaluator`] - accuracy of predictions against held-out labels
//!
//! [`Stage`]: crate::workflow::Stage

pub mod evaluator;
pub mod predictor;
pub mod splitter;
pub mod trainer;

pub use evaluator::{accuracy_score, classification_report, ClassificationReport, Evaluator};
pub use predictor::{predict_labels, Predictor};
pub use splitter::{split_dataset, split_table, test_size, SplitConfig, Splitter, TrainTestSplit};
pub use trainer::{fit_model, Trainer};
