use crate::config::ParameterSchema;
use crate::corpus::loader::extension_matches;
use crate::corpus::{scan_directory, WorkItem, AUDIO_EXTENSIONS};
use crate::error::{Result, StageError};
use crate::stage::{Analyser, StageContext, StageData};

/// Resolves a directory, or narrows an item list, to the files with an
/// accepted extension.
#[derive(Debug, Default)]
pub struct PathLoader;

impl Analyser for PathLoader {
    fn name(&self) -> &str {
        "PathLoader"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new().text_list("extensions", AUDIO_EXTENSIONS)
    }

    fn run(&mut self, ctx: &StageContext<'_>, input: &StageData) -> Result<StageData> {
        let extensions = ctx.parameters().text_list("extensions")?;

        ctx.whole_batch(|| {
            let items: Vec<WorkItem> = match input {
                StageData::Directory(dir) => scan_directory(dir, &extensions)?,
                StageData::Items(items) => items
                    .iter()
                    .filter(|item| extension_matches(item.path(), &extensions))
                    .cloned()
                    .collect(),
                other => {
                    return Err(StageError::InputMismatch {
                        stage: ctx.name().to_string(),
                        expected: "items or directory",
                        found: other.kind(),
                    }
                    .into())
                }
            };
            Ok(StageData::Items(items))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{validate_parameters, Overrides};
    use crate::error::{DispatchError, FtisError};
    use serde_json::json;
    use tempfile::TempDir;

    fn run(input: StageData, overrides: serde_json::Value) -> Result<StageData> {
        let temp_dir = TempDir::new().unwrap();
        let overrides: Overrides = serde_json::from_value(overrides).unwrap();
        let params = validate_parameters("PathLoader", &PathLoader.schema(), &overrides).unwrap();
        let ctx = StageContext::new("PathLoader", 0, temp_dir.path(), &params, "{}", 1);
        PathLoader.run(&ctx, &input)
    }

    #[test]
    fn test_directory_input_is_scanned() {
        let corpus = TempDir::new().unwrap();
        for name in ["a.wav", "b.aif", "c.mp3"] {
            std::fs::write(corpus.path().join(name), b"x").unwrap();
        }

        let output = run(StageData::Directory(corpus.path().to_path_buf()), json!({})).unwrap();
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn test_items_are_filtered() {
        let items = vec![
            WorkItem::derived("one.wav"),
            WorkItem::derived("two.mp3"),
            WorkItem::derived("three.mp3"),
        ];
        let output = run(StageData::Items(items), json!({"extensions": ["mp3"]})).unwrap();
        let kept = output.expect_items("PathLoader").unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].key(), "two.mp3");
    }

    #[test]
    fn test_features_are_rejected() {
        let err = run(StageData::Features(Default::default()), json!({})).unwrap_err();
        assert!(matches!(
            err,
            FtisError::Dispatch(DispatchError::BatchFailed { .. })
        ));
    }
}
