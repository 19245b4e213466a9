//! JSON and CSV result writer for training and prediction outputs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;

/// One predicted row, as written by [`ResultWriter::write_predictions`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    /// Row identifier (an id column value, or the row index).
    pub id: String,
    /// Most probable class label.
    pub predicted: String,
    /// Probability of `predicted`.
    pub probability: f64,
    /// Most probable labels in descending order of probability.
    pub top_k: Vec<LabelProbability>,
}

/// A class label with its predicted probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelProbability {
    /// Class label.
    pub label: String,
    /// Probability in [0, 1].
    pub probability: f64,
}

/// Writes training and prediction results into an output directory.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are prefixed with the experiment name:
/// `{experiment}_evaluate.json`, `{experiment}_test_predictions.csv`,
/// `{experiment}_predict.json` and `{experiment}_model.bin`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Write an evaluation report to `{experiment}_evaluate.json`.
    ///
    /// The report is any serializable value; the writer does not depend on
    /// the pipeline's report type.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::EncodeJson`] | The report cannot be encoded |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all)]
    pub fn write_evaluation<T: Serialize>(&self, report: &T) -> Result<PathBuf, IoError> {
        let path = self.file_path("evaluate.json");
        self.write_json(&path, report)?;
        info!(path = %path.display(), "evaluation report written");
        Ok(path)
    }

    /// Write held-out actual and predicted labels to
    /// `{experiment}_test_predictions.csv` with header `actual,predicted`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::CsvWrite`] if the file cannot be written.
    #[instrument(skip_all, fields(n_rows = actual.len()))]
    pub fn write_test_predictions(
        &self,
        actual: &[String],
        predicted: &[String],
    ) -> Result<PathBuf, IoError> {
        let path = self.file_path("test_predictions.csv");
        let csv_err = |e| IoError::CsvWrite {
            path: path.clone(),
            source: e,
        };

        let mut wtr = csv::Writer::from_path(&path).map_err(csv_err)?;
        wtr.write_record(["actual", "predicted"]).map_err(csv_err)?;
        for (a, p) in actual.iter().zip(predicted) {
            wtr.write_record([a, p]).map_err(csv_err)?;
        }
        wtr.flush().map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), "test predictions written");
        Ok(path)
    }

    /// Write predictions to `{experiment}_predict.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::EncodeJson`] | The predictions cannot be encoded |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all, fields(n_rows = predictions.len()))]
    pub fn write_predictions(&self, predictions: &[PredictionRecord]) -> Result<PathBuf, IoError> {
        let path = self.file_path("predict.json");
        let artifact = PredictArtifact {
            experiment: self.experiment.as_str(),
            n_rows: predictions.len(),
            predictions,
        };
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "predictions written");
        Ok(path)
    }

    /// Return the path where the model artifact should be saved.
    ///
    /// Does not write anything; just computes `{output_dir}/{experiment}_model.bin`.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.file_path("model.bin")
    }

    fn file_path(&self, suffix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{suffix}", self.experiment.as_str()))
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(value).map_err(|e| IoError::EncodeJson {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, json).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[derive(Serialize)]
struct PredictArtifact<'a> {
    experiment: &'a str,
    n_rows: usize,
    predictions: &'a [PredictionRecord],
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn writer(dir: &TempDir) -> ResultWriter {
        ResultWriter::new(dir.path(), ExperimentName::new("k2".into()).unwrap()).unwrap()
    }

    #[test]
    fn creates_nested_output_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        ResultWriter::new(&nested, ExperimentName::new("x".into()).unwrap()).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn evaluation_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut report = BTreeMap::new();
        report.insert("accuracy", 0.75);
        let path = writer(&dir).write_evaluation(&report).unwrap();
        assert!(path.ends_with("k2_evaluate.json"));
        let content: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!((content["accuracy"].as_f64().unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_predictions_csv() {
        let dir = TempDir::new().unwrap();
        let actual = vec!["CONFIRMED".to_string(), "CANDIDATE".to_string()];
        let predicted = vec!["CONFIRMED".to_string(), "FALSE POSITIVE".to_string()];
        let path = writer(&dir)
            .write_test_predictions(&actual, &predicted)
            .unwrap();
        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "actual,predicted");
        assert_eq!(lines[2], "CANDIDATE,FALSE POSITIVE");
    }

    #[test]
    fn predictions_json() {
        let dir = TempDir::new().unwrap();
        let records = vec![PredictionRecord {
            id: "K2-18 b".into(),
            predicted: "CONFIRMED".into(),
            probability: 0.9,
            top_k: vec![LabelProbability {
                label: "CONFIRMED".into(),
                probability: 0.9,
            }],
        }];
        let path = writer(&dir).write_predictions(&records).unwrap();
        let content: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(content["experiment"], "k2");
        assert_eq!(content["n_rows"], 1);
        assert_eq!(content["predictions"][0]["predicted"], "CONFIRMED");
    }

    #[test]
    fn model_path_naming() {
        let dir = TempDir::new().unwrap();
        assert!(writer(&dir).model_path().ends_with("k2_model.bin"));
    }
}
