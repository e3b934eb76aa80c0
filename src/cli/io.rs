//! JSON-lines I/O for the CLI
//!
//! - Input: one JSON request per line; blank lines are skipped
//! - Output: one JSON response per line, `{"status":"ok","data":...}` or
//!   `{"status":"error","code":...,"message":...}`
//! - UTF-8 only

use std::io::{BufRead, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Iterates over the non-blank lines of `reader` as raw request strings.
pub fn read_request_lines<R: BufRead>(reader: R) -> impl Iterator<Item = CliResult<String>> {
    reader
        .lines()
        .map(|line| line.map_err(CliError::from))
        .filter(|line| !matches!(line, Ok(text) if text.trim().is_empty()))
}

/// Write a success response
pub fn write_response<W: Write>(writer: &mut W, data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    serde_json::to_writer(&mut *writer, &response)?;
    writeln!(writer)?;
    writer.flush()?;

    Ok(())
}

/// Write an error response
pub fn write_error<W: Write>(writer: &mut W, code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    serde_json::to_writer(&mut *writer, &response)?;
    writeln!(writer)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_blank_lines_skipped() {
        let input = Cursor::new("{\"op\":\"metrics\"}\n\n   \n{\"op\":\"metrics\"}\n");
        let lines: Vec<_> = read_request_lines(input).collect();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_response_shapes() {
        let mut out = Vec::new();
        write_response(&mut out, serde_json::json!({"commit_id": 1})).unwrap();
        write_error(&mut out, "ATOMIX_X", "boom").unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["status"], "ok");
        assert_eq!(lines[0]["data"]["commit_id"], 1);
        assert_eq!(lines[1]["status"], "error");
        assert_eq!(lines[1]["code"], "ATOMIX_X");
    }
}
