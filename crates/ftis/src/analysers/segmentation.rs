use std::collections::BTreeSet;

use crate::config::ParameterSchema;
use crate::error::{ConfigError, Result, StageError};
use crate::stage::{Analyser, StageContext, StageData};

/// Assigns a cluster label to each segment of one item.
///
/// `segments` are `(start, end)` sample ranges; the result must hold exactly
/// one label per segment.
pub trait SegmentLabeler {
    fn label(&self, item: &str, segments: &[(u64, u64)], clusters: usize) -> Result<Vec<usize>>;
}

impl<F> SegmentLabeler for F
where
    F: Fn(&str, &[(u64, u64)], usize) -> Result<Vec<usize>>,
{
    fn label(&self, item: &str, segments: &[(u64, u64)], clusters: usize) -> Result<Vec<usize>> {
        self(item, segments, clusters)
    }
}

/// Merges neighbouring slices that cluster together.
///
/// A window of `windowsize` boundaries (so `windowsize - 1` segments) slides
/// over each item's slice list one position at a time. Inside a window, a
/// segment with the same label as the segment before it is merged into it by
/// removing the boundary between them. Removals are decided on the window as
/// it was labelled and applied together, then the window advances over the
/// shortened list.
pub struct ClusteredSegmentation<L> {
    labeler: L,
}

impl<L: SegmentLabeler> ClusteredSegmentation<L> {
    pub fn new(labeler: L) -> Self {
        Self { labeler }
    }

    /// Collapses `slices` for one item.
    pub fn collapse(
        &self,
        stage: &str,
        item: &str,
        slices: &[u64],
        clusters: usize,
        windowsize: usize,
    ) -> Result<Vec<u64>> {
        let mut slices = slices.to_vec();
        if slices.len() < 2 {
            return Ok(slices);
        }

        let mut count = 0;
        while count + windowsize <= slices.len() {
            let window = &slices[count..count + windowsize];
            let segments: Vec<(u64, u64)> = window.windows(2).map(|w| (w[0], w[1])).collect();

            let labels = self.labeler.label(item, &segments, clusters)?;
            if labels.len() != segments.len() {
                return Err(StageError::analysis(
                    stage,
                    format!(
                        "{}: labeler returned {} labels for {} segments",
                        item,
                        labels.len(),
                        segments.len()
                    ),
                )
                .into());
            }

            // Boundary count + j separates segment j - 1 from segment j
            let merged: BTreeSet<usize> = (1..labels.len())
                .filter(|&j| labels[j] == labels[j - 1])
                .map(|j| count + j)
                .collect();

            if !merged.is_empty() {
                slices = slices
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| !merged.contains(i))
                    .map(|(_, boundary)| boundary)
                    .collect();
            }
            count += 1;
        }

        Ok(slices)
    }
}

impl<L: SegmentLabeler> Analyser for ClusteredSegmentation<L> {
    fn name(&self) -> &str {
        "ClusteredSegmentation"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .integer("numclusters", 2)
            .integer("windowsize", 4)
    }

    fn run(&mut self, ctx: &StageContext<'_>, input: &StageData) -> Result<StageData> {
        let clusters = ctx.parameters().count("numclusters")?;
        let windowsize = ctx.parameters().count("windowsize")?;
        if windowsize < 2 {
            return Err(ConfigError::InvalidParameter {
                stage: ctx.name().to_string(),
                name: "windowsize".to_string(),
                reason: "a window needs at least two boundaries".to_string(),
            }
            .into());
        }

        let slices = input.expect_slices(ctx.name())?;
        let entries: Vec<(&String, &Vec<u64>)> = slices.iter().collect();

        let collapsed = ctx.sequential(&entries, |(key, boundaries)| {
            self.collapse(ctx.name(), key, boundaries, clusters, windowsize)
        })?;
        Ok(StageData::Slices(collapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{validate_parameters, Overrides};
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    /// Labels a segment by whether it is longer than 100 samples.
    fn by_length(_: &str, segments: &[(u64, u64)], _: usize) -> Result<Vec<usize>> {
        Ok(segments
            .iter()
            .map(|(start, end)| usize::from(end - start > 100))
            .collect())
    }

    fn all_same(_: &str, segments: &[(u64, u64)], _: usize) -> Result<Vec<usize>> {
        Ok(vec![0; segments.len()])
    }

    #[test]
    fn test_single_slice_passes_through() {
        let seg = ClusteredSegmentation::new(all_same);
        assert_eq!(seg.collapse("S", "a", &[512], 2, 4).unwrap(), vec![512]);
        assert!(seg.collapse("S", "a", &[], 2, 4).unwrap().is_empty());
    }

    #[test]
    fn test_shorter_than_window_is_unchanged() {
        let seg = ClusteredSegmentation::new(all_same);
        assert_eq!(
            seg.collapse("S", "a", &[0, 10, 20], 2, 4).unwrap(),
            vec![0, 10, 20]
        );
    }

    #[test]
    fn test_identical_labels_collapse_window() {
        // Window [0, 10, 20, 30]: three equal labels drop boundaries 10 and 20.
        // The list is then [0, 30, 40] and too short for another window.
        let seg = ClusteredSegmentation::new(all_same);
        assert_eq!(
            seg.collapse("S", "a", &[0, 10, 20, 30, 40], 2, 4).unwrap(),
            vec![0, 30, 40]
        );
    }

    #[test]
    fn test_alternating_labels_keep_boundaries() {
        // Short, long, short, long: no neighbours share a label
        let slices = [0, 50, 300, 350, 600];
        let seg = ClusteredSegmentation::new(by_length);
        assert_eq!(seg.collapse("S", "a", &slices, 2, 4).unwrap(), slices.to_vec());
    }

    #[test]
    fn test_removal_is_applied_on_snapshot() {
        // Window 0 over [0, 10, 20, 300, 310]: segments short, short, long.
        // Only boundary 10 goes. Window 1 over [20, 300, 310] no longer fits.
        let seg = ClusteredSegmentation::new(by_length);
        assert_eq!(
            seg.collapse("S", "a", &[0, 10, 20, 300, 310], 2, 4).unwrap(),
            vec![0, 20, 300, 310]
        );
    }

    #[test]
    fn test_wrong_label_count_is_an_error() {
        let seg = ClusteredSegmentation::new(
            |_: &str, _: &[(u64, u64)], _: usize| -> Result<Vec<usize>> { Ok(vec![0]) },
        );
        let err = seg.collapse("S", "a", &[0, 1, 2, 3], 2, 4).unwrap_err();
        assert!(err.to_string().contains("1 labels for 3 segments"));
    }

    #[test]
    fn test_run_over_slice_map() {
        let temp_dir = TempDir::new().unwrap();
        let mut seg = ClusteredSegmentation::new(all_same);
        let overrides: Overrides = serde_json::from_value(json!({"windowsize": 3})).unwrap();
        let params = validate_parameters(seg.name(), &seg.schema(), &overrides).unwrap();
        let ctx = StageContext::new("ClusteredSegmentation", 2, temp_dir.path(), &params, "{}", 1);

        let input = StageData::Slices(BTreeMap::from([
            ("a.wav".to_string(), vec![0, 10, 20, 30]),
            ("b.wav".to_string(), vec![7]),
        ]));
        let output = seg.run(&ctx, &input).unwrap();
        let StageData::Slices(out) = output else {
            panic!("expected slices");
        };
        // Window [0, 10, 20] drops 10, then the window start moves past 0
        // and [20, 30] is too short to label
        assert_eq!(out["a.wav"], vec![0, 20, 30]);
        assert_eq!(out["b.wav"], vec![7]);
    }

    #[test]
    fn test_tiny_window_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut seg = ClusteredSegmentation::new(all_same);
        let overrides: Overrides = serde_json::from_value(json!({"windowsize": 1})).unwrap();
        let params = validate_parameters(seg.name(), &seg.schema(), &overrides).unwrap();
        let ctx = StageContext::new("ClusteredSegmentation", 0, temp_dir.path(), &params, "{}", 1);

        let input = StageData::Slices(BTreeMap::new());
        assert!(seg.run(&ctx, &input).is_err());
    }
}
