use serde::Serialize;
use std::fs;
use std::path::Path;

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

/// Pretty JSON with a trailing newline. Serializing the same value twice gives
/// identical bytes.
pub fn render_json_artifact<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value).map(|content| normalize_text_artifact(&content))
}

#[cfg(test)]
mod tests {
    use super::{normalize_text_artifact, render_json_artifact, write_text_artifact};
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        let normalized = normalize_text_artifact("alpha\r\nbeta\rgamma");
        assert_eq!(normalized, "alpha\nbeta\ngamma\n");
    }

    #[test]
    fn repeated_text_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("artifact.json");
        let input = "{\r\n  \"l\": 1.0\r\n}";

        write_text_artifact(&path, input).expect("first write should succeed");
        let first = fs::read(&path).expect("artifact should be readable");

        write_text_artifact(&path, input).expect("second write should succeed");
        let second = fs::read(&path).expect("artifact should be readable");

        assert_eq!(first, second);
        assert_eq!(second, b"{\n  \"l\": 1.0\n}\n");
    }

    #[test]
    fn json_rendering_is_pretty_and_newline_terminated() {
        let mut value = BTreeMap::new();
        value.insert("l", 2.0);
        let rendered = render_json_artifact(&value).expect("map should serialize");
        assert_eq!(rendered, "{\n  \"l\": 2.0\n}\n");
    }
}
