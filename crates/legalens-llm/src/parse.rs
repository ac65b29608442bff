//! Extraction of structured data from free-text model output.
//!
//! The prompts demand a JSON array embedded in the response. Parsing
//! locates the first `[` and the last `]`; if that slice does not parse,
//! the whole response is tried. A parse failure yields an empty list, not
//! an error — the pipeline degrades instead of aborting.

use serde_json::Value;
use tracing::{debug, warn};

/// Pull the first well-formed JSON array of objects out of model output.
pub fn extract_json_array(raw: &str) -> Vec<Value> {
    let candidate = match (raw.find('['), raw.rfind(']')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => raw,
    };

    match serde_json::from_str::<Vec<Value>>(candidate) {
        Ok(records) => records,
        Err(first_err) => {
            // Fallback: the whole response may itself be the array.
            match serde_json::from_str::<Vec<Value>>(raw) {
                Ok(records) => records,
                Err(_) => {
                    warn!("failed to parse JSON array from model output: {first_err}");
                    debug!("raw model output: {:.500}", raw);
                    Vec::new()
                }
            }
        }
    }
}
