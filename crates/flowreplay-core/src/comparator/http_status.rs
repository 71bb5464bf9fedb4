use crate::model::{ComparisonResult, DiffKind, Difference, ResponseData};

/// Compares status codes only.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpStatusStrategy;

impl HttpStatusStrategy {
    pub fn compare(&self, recorded: &ResponseData, replayed: &ResponseData) -> ComparisonResult {
        if recorded.status_code == replayed.status_code {
            return ComparisonResult::success();
        }
        ComparisonResult::from_differences(vec![Difference::new(
            "statusCode",
            DiffKind::Value,
            recorded.status_code.to_string(),
            replayed.status_code.to_string(),
        )])
    }
}
