//! Model files: a fixed header followed by the bincode-encoded model.
//!
//! The header is decoded on its own first, so a file from another format
//! version is reported as such instead of failing midway through the body.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::RfError;
use crate::model::{FittedModel, ModelKind};

const MAGIC: [u8; 4] = *b"LFTW";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    format_version: u32,
}

/// Body as written: borrows from the [`SavedModel`].
#[derive(Serialize)]
struct BodyRef<'a> {
    kind: ModelKind,
    feature_names: &'a [String],
    class_names: &'a [String],
    model: &'a FittedModel,
}

/// Body as read back. Encodes identically to [`BodyRef`].
#[derive(Deserialize)]
struct Body {
    kind: ModelKind,
    feature_names: Vec<String>,
    class_names: Vec<String>,
    model: FittedModel,
}

/// A fitted model plus the names needed to apply it to a new file.
#[derive(Debug, Clone)]
pub struct SavedModel {
    model: FittedModel,
    feature_names: Vec<String>,
    class_names: Vec<String>,
}

impl SavedModel {
    /// # Errors
    ///
    /// [`RfError::PredictionFeatureMismatch`] when `feature_names` does not
    /// match the model's width, [`RfError::ClassNameMismatch`] when
    /// `class_names` does not match its class count.
    pub fn new(
        model: FittedModel,
        feature_names: Vec<String>,
        class_names: Vec<String>,
    ) -> Result<Self, RfError> {
        let (n_features, n_classes) = (model.n_features(), model.n_classes());
        if feature_names.len() != n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: n_features,
                got: feature_names.len(),
            });
        }
        if class_names.len() != n_classes {
            return Err(RfError::ClassNameMismatch {
                n_classes,
                n_names: class_names.len(),
            });
        }
        Ok(Self {
            model,
            feature_names,
            class_names,
        })
    }

    #[must_use]
    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    /// Predictor names in the column order the model expects.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Class names indexed by class label.
    #[must_use]
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// # Errors
    ///
    /// [`RfError::SerializeModel`] or [`RfError::WriteModel`].
    #[instrument(skip(self), fields(path = %path.as_ref().display(), kind = %self.model.kind()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RfError> {
        let path = path.as_ref();
        let header = Header {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
        };
        let body = BodyRef {
            kind: self.model.kind(),
            feature_names: &self.feature_names,
            class_names: &self.class_names,
            model: &self.model,
        };

        let mut bytes = Vec::new();
        bincode::serialize_into(&mut bytes, &header)
            .and_then(|()| bincode::serialize_into(&mut bytes, &body))
            .map_err(|source| RfError::SerializeModel { source })?;
        std::fs::write(path, &bytes).map_err(|source| RfError::WriteModel {
            path: path.to_path_buf(),
            source,
        })?;

        info!(size_bytes = bytes.len(), "model saved");
        Ok(())
    }

    /// # Errors
    ///
    /// [`RfError::ReadModel`] if the file cannot be read,
    /// [`RfError::NotAModelFile`] if it does not start with the model header,
    /// [`RfError::IncompatibleModelVersion`] if it was written in another
    /// format version, and [`RfError::DeserializeModel`] if the body does not
    /// decode.
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RfError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| RfError::ReadModel {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = bytes.as_slice();

        let header: Header = bincode::deserialize_from(&mut reader)
            .map_err(|_| RfError::NotAModelFile {
                path: path.to_path_buf(),
            })?;
        if header.magic != MAGIC {
            return Err(RfError::NotAModelFile {
                path: path.to_path_buf(),
            });
        }
        if header.format_version != FORMAT_VERSION {
            return Err(RfError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: header.format_version,
                path: path.to_path_buf(),
            });
        }

        let body: Body =
            bincode::deserialize_from(&mut reader).map_err(|source| RfError::DeserializeModel {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(
            kind = %body.kind,
            n_features = body.feature_names.len(),
            n_classes = body.class_names.len(),
            "model loaded"
        );
        Self::new(body.model, body.feature_names, body.class_names)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::RandomForestConfig;
    use crate::model::ModelSpec;
    use crate::tree::DecisionTreeConfig;

    fn fit(spec: ModelSpec) -> SavedModel {
        let features: Vec<Vec<f64>> = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0]
            .into_iter()
            .map(|x| vec![x, 0.0])
            .collect();
        let names = vec!["roll_belt".to_string(), "yaw_arm".to_string()];
        let model = spec.fit(&features, &[0, 0, 0, 1, 1, 1], &names).unwrap();
        SavedModel::new(model, names, vec!["A".into(), "B".into()]).unwrap()
    }

    fn header_bytes(magic: [u8; 4], format_version: u32) -> Vec<u8> {
        bincode::serialize(&Header {
            magic,
            format_version,
        })
        .unwrap()
    }

    #[test]
    fn both_families_round_trip() {
        let dir = TempDir::new().unwrap();
        let specs = [
            ModelSpec::Tree(DecisionTreeConfig::new()),
            ModelSpec::Forest(RandomForestConfig::new(5).unwrap()),
        ];
        for (i, spec) in specs.into_iter().enumerate() {
            let path = dir.path().join(format!("model_{i}.bin"));
            let saved = fit(spec);
            saved.save(&path).unwrap();
            let loaded = SavedModel::load(&path).unwrap();

            assert_eq!(loaded.model().kind(), saved.model().kind());
            assert_eq!(loaded.class_names(), saved.class_names());
            assert_eq!(loaded.feature_names(), saved.feature_names());
            for sample in [[1.5, 0.0], [11.0, 0.0], [5.0, 0.0]] {
                assert_eq!(
                    loaded.model().predict_proba(&sample).unwrap(),
                    saved.model().predict_proba(&sample).unwrap()
                );
            }
        }
    }

    #[test]
    fn file_starts_with_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        fit(ModelSpec::Tree(DecisionTreeConfig::new())).save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(&header_bytes(MAGIC, FORMAT_VERSION)));
    }

    #[test]
    fn class_name_count_checked() {
        let saved = fit(ModelSpec::Tree(DecisionTreeConfig::new()));
        let err = SavedModel::new(
            saved.model().clone(),
            saved.feature_names().to_vec(),
            vec!["A".into()],
        )
        .unwrap_err();
        assert!(matches!(err, RfError::ClassNameMismatch { n_classes: 2, n_names: 1 }));
    }

    #[test]
    fn missing_file() {
        let dir = TempDir::new().unwrap();
        let err = SavedModel::load(dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, RfError::ReadModel { .. }));
    }

    #[test]
    fn foreign_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not a model file at all").unwrap();
        assert!(matches!(SavedModel::load(&path), Err(RfError::NotAModelFile { .. })));

        std::fs::write(&path, b"ab").unwrap();
        assert!(matches!(SavedModel::load(&path), Err(RfError::NotAModelFile { .. })));
    }

    #[test]
    fn newer_format_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.bin");
        std::fs::write(&path, header_bytes(MAGIC, FORMAT_VERSION + 1)).unwrap();
        assert!(matches!(
            SavedModel::load(&path),
            Err(RfError::IncompatibleModelVersion { found: 2, expected: 1, .. })
        ));
    }

    #[test]
    fn truncated_body() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("truncated.bin");
        std::fs::write(&path, header_bytes(MAGIC, FORMAT_VERSION)).unwrap();
        assert!(matches!(SavedModel::load(&path), Err(RfError::DeserializeModel { .. })));
    }
}
