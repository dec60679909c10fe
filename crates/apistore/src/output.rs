//! JSON rendering of store values.

use std::io::{self, Write};

use apistore_core::Value;
use apistore_core::model::to_json;

use crate::error::CliError;

/// Render a value as pretty (or compact) JSON.
pub fn render(value: &Value, compact: bool) -> Result<String, CliError> {
    let json = to_json(value)?;
    let out = if compact {
        serde_json::to_string(&json)?
    } else {
        serde_json::to_string_pretty(&json)?
    };
    Ok(out)
}

/// Print to stdout followed by a newline.
pub fn print_output(output: &str) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{output}")?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn compact_output_is_single_line() {
        let value = Value::from(json!({"a": [1, 2]}));
        assert_eq!(render(&value, true).unwrap(), r#"{"a":[1,2]}"#);
        assert!(render(&value, false).unwrap().contains('\n'));
    }
}
