use anyhow::Context;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Serialize `value` as JSON and write it to `path`, or to stdout when no
/// path is given
pub fn emit<T: Serialize>(value: &T, compact: bool, path: Option<&Path>) -> anyhow::Result<()> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialize output")?;

    match path {
        Some(path) => std::fs::write(path, format!("{}\n", json))
            .with_context(|| format!("Failed to write output file '{}'", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json).context("Failed to write to stdout")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_emit_compact_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let value = BTreeMap::from([("lead1", vec![1, 2, 3])]);

        emit(&value, true, Some(&path)).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "{\"lead1\":[1,2,3]}\n");
    }

    #[test]
    fn test_emit_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("session.json");

        let err = emit(&vec![1], false, Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to write output file"));
    }
}
