use crate::model::{ComparisonResult, DiffKind, Difference, ResponseData};

/// Byte-for-byte body comparison.
///
/// An absent body and an empty body are the same thing here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatchStrategy;

impl ExactMatchStrategy {
    pub fn compare(&self, recorded: &ResponseData, replayed: &ResponseData) -> ComparisonResult {
        if recorded.body == replayed.body {
            return ComparisonResult::success();
        }
        ComparisonResult::from_differences(vec![Difference::new(
            "body",
            DiffKind::Value,
            recorded.body_text(),
            replayed.body_text(),
        )])
    }
}
