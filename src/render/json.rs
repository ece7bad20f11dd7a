use serde::Serialize;

use crate::error::PipelineError;

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, PipelineError> {
    Ok(serde_json::to_string_pretty(value)?)
}
