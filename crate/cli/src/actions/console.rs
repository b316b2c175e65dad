use std::io::Write;

use serde::Serialize;

use crate::error::result::CliResult;

/// Print `value` as pretty JSON on the standard output
pub fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}")?;
    Ok(())
}
