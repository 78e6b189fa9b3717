use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::corpus::WorkItem;
use crate::error::StageError;

/// Per-item analysis result.
///
/// Non-finite samples are written as `"NaN"`, `"inf"` and `"-inf"` so an
/// artifact reloads into exactly the values that were stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Scalar(#[serde(with = "sample::scalar")] f64),
    Vector(#[serde(with = "sample::vector")] Vec<f64>),
    Matrix(#[serde(with = "sample::matrix")] Vec<Vec<f64>>),
}

impl Feature {
    /// Reads a bare JSON number, list, or list of lists.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(Feature::Scalar),
            Value::Array(items) if items.iter().all(Value::is_array) && !items.is_empty() => items
                .iter()
                .map(number_row)
                .collect::<Option<Vec<_>>>()
                .map(Feature::Matrix),
            Value::Array(_) => number_row(value).map(Feature::Vector),
            _ => None,
        }
    }

    /// The feature as rows: a scalar or vector is a single row.
    pub fn rows(&self) -> Vec<&[f64]> {
        match self {
            Feature::Scalar(x) => vec![std::slice::from_ref(x)],
            Feature::Vector(v) => vec![v.as_slice()],
            Feature::Matrix(m) => m.iter().map(Vec::as_slice).collect(),
        }
    }

    pub fn flatten(&self) -> Vec<f64> {
        self.rows().into_iter().flatten().copied().collect()
    }
}

fn number_row(value: &Value) -> Option<Vec<f64>> {
    value
        .as_array()?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<_>>>()
}

mod sample {
    use std::fmt;

    use serde::de::{self, Deserializer, Visitor};
    use serde::{Deserialize, Serialize, Serializer};

    const NAN: &str = "NaN";
    const INFINITY: &str = "inf";
    const NEG_INFINITY: &str = "-inf";

    struct Sample(f64);

    impl Serialize for Sample {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self.0 {
                x if x.is_finite() => serializer.serialize_f64(x),
                x if x.is_nan() => serializer.serialize_str(NAN),
                x if x > 0.0 => serializer.serialize_str(INFINITY),
                _ => serializer.serialize_str(NEG_INFINITY),
            }
        }
    }

    struct SampleVisitor;

    impl Visitor<'_> for SampleVisitor {
        type Value = Sample;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number, \"NaN\", \"inf\" or \"-inf\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Sample, E> {
            Ok(Sample(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Sample, E> {
            Ok(Sample(v as f64))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Sample, E> {
            Ok(Sample(v as f64))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Sample, E> {
            match v {
                NAN => Ok(Sample(f64::NAN)),
                INFINITY => Ok(Sample(f64::INFINITY)),
                NEG_INFINITY => Ok(Sample(f64::NEG_INFINITY)),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }

    impl<'de> Deserialize<'de> for Sample {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(SampleVisitor)
        }
    }

    struct Row<'a>(&'a [f64]);

    impl Serialize for Row<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(self.0.iter().map(|x| Sample(*x)))
        }
    }

    fn unwrap_row(row: Vec<Sample>) -> Vec<f64> {
        row.into_iter().map(|s| s.0).collect()
    }

    pub mod scalar {
        use super::*;

        pub fn serialize<S: Serializer>(x: &f64, serializer: S) -> Result<S::Ok, S::Error> {
            Sample(*x).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
            Sample::deserialize(deserializer).map(|s| s.0)
        }
    }

    pub mod vector {
        use super::*;

        pub fn serialize<S: Serializer>(v: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            Row(v).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<f64>, D::Error> {
            Vec::<Sample>::deserialize(deserializer).map(unwrap_row)
        }
    }

    pub mod matrix {
        use super::*;

        pub fn serialize<S: Serializer>(m: &[Vec<f64>], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(m.iter().map(|row| Row(row)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<Vec<f64>>, D::Error> {
            Vec::<Vec<Sample>>::deserialize(deserializer)
                .map(|rows| rows.into_iter().map(unwrap_row).collect())
        }
    }
}

/// The output of a stage, and the input of the next.
///
/// Serialised with an explicit `kind` tag so a cached artifact always
/// reloads into the same shape the stage produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StageData {
    /// Ordered sequence of items, e.g. the corpus or derived audio files.
    Items(Vec<WorkItem>),
    /// Item key to feature.
    Features(BTreeMap<String, Feature>),
    /// Item key to slice boundaries in samples.
    Slices(BTreeMap<String, Vec<u64>>),
    /// Cluster label to member item keys.
    Clusters(BTreeMap<String, Vec<String>>),
    /// A directory of derived files.
    Directory(PathBuf),
}

impl StageData {
    pub fn kind(&self) -> &'static str {
        match self {
            StageData::Items(_) => "items",
            StageData::Features(_) => "features",
            StageData::Slices(_) => "slices",
            StageData::Clusters(_) => "clusters",
            StageData::Directory(_) => "directory",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            StageData::Items(items) => items.len(),
            StageData::Features(map) => map.len(),
            StageData::Slices(map) => map.len(),
            StageData::Clusters(map) => map.len(),
            StageData::Directory(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn mismatch(&self, stage: &str, expected: &'static str) -> StageError {
        StageError::InputMismatch {
            stage: stage.to_string(),
            expected,
            found: self.kind(),
        }
    }

    pub fn expect_items(&self, stage: &str) -> Result<&[WorkItem], StageError> {
        match self {
            StageData::Items(items) => Ok(items),
            other => Err(other.mismatch(stage, "items")),
        }
    }

    pub fn expect_features(&self, stage: &str) -> Result<&BTreeMap<String, Feature>, StageError> {
        match self {
            StageData::Features(map) => Ok(map),
            other => Err(other.mismatch(stage, "features")),
        }
    }

    pub fn expect_slices(&self, stage: &str) -> Result<&BTreeMap<String, Vec<u64>>, StageError> {
        match self {
            StageData::Slices(map) => Ok(map),
            other => Err(other.mismatch(stage, "slices")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_and_flatten() {
        let matrix = Feature::Matrix(vec![vec![1.0, 2.0], vec![3.0]]);
        assert_eq!(matrix.rows().len(), 2);
        assert_eq!(matrix.flatten(), vec![1.0, 2.0, 3.0]);
        assert_eq!(Feature::Scalar(4.0).flatten(), vec![4.0]);
    }

    #[test]
    fn test_from_json_rejects_mixed_rows() {
        assert!(Feature::from_json(&json!([[1.0], 2.0])).is_none());
        assert!(Feature::from_json(&json!({"a": 1})).is_none());
        assert_eq!(Feature::from_json(&json!([])), Some(Feature::Vector(vec![])));
    }

    #[test]
    fn test_empty_shapes_keep_their_variant() {
        let data = StageData::Features(BTreeMap::from([
            ("v".to_string(), Feature::Vector(vec![])),
            ("m".to_string(), Feature::Matrix(vec![])),
        ]));
        let json = serde_json::to_string(&data).unwrap();
        let back: StageData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_non_finite_samples_reload() {
        let feature = Feature::Matrix(vec![
            vec![f64::NAN, 1.0],
            vec![f64::INFINITY, f64::NEG_INFINITY, -0.0],
        ]);
        let json = serde_json::to_value(&feature).unwrap();
        assert_eq!(json, json!({"matrix": [["NaN", 1.0], ["inf", "-inf", -0.0]]}));

        let back: Feature = serde_json::from_value(json).unwrap();
        let bits = |f: &Feature| f.flatten().iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&back), bits(&feature));

        let scalar: Feature = serde_json::from_str(r#"{"scalar": "NaN"}"#).unwrap();
        assert!(matches!(scalar, Feature::Scalar(x) if x.is_nan()));
        assert!(serde_json::from_str::<Feature>(r#"{"scalar": "loud"}"#).is_err());
        assert!(serde_json::from_str::<Feature>(r#"{"vector": [null]}"#).is_err());
    }

    #[test]
    fn test_features_reload_bit_identical() {
        let values: Vec<f64> = (1..5000)
            .map(|i| (i as f64 / 7.0 - 250.0) * 1.3_f64.powi(i % 60 - 30))
            .chain([13.554998649659069, 0.1, 1.0 / 3.0, f64::MIN_POSITIVE, f64::MAX])
            .collect();
        let data = StageData::Features(BTreeMap::from([
            ("v".to_string(), Feature::Vector(values.clone())),
            ("s".to_string(), Feature::Scalar(values[17])),
        ]));

        let json = serde_json::to_vec_pretty(&data).unwrap();
        let back: StageData = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_tagged_representation() {
        let data = StageData::Slices(BTreeMap::from([("a".to_string(), vec![0, 512])]));
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["kind"], "slices");
        assert_eq!(value["data"]["a"], json!([0, 512]));
    }

    #[test]
    fn test_expect_reports_mismatch() {
        let data = StageData::Directory(PathBuf::from("/out"));
        let err = data.expect_features("Stats").unwrap_err();
        assert!(matches!(
            err,
            StageError::InputMismatch {
                expected: "features",
                found: "directory",
                ..
            }
        ));
        assert!(data.expect_items("Stats").is_err());
    }
}
