//! Pulling usable Semgrep rules out of a model reply

use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;

/// Default file name for downloaded rules
pub const RULES_FILE_NAME: &str = "custom_semgrep_rules.yaml";

static YAML_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```yaml\n(.*?)\n```").expect("valid yaml fence regex")
});

/// YAML blocks in `text` that parse to something non-empty.
pub fn extract_yaml_blocks(text: &str) -> Vec<String> {
    YAML_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            let block = caps.get(1)?.as_str().trim();
            match serde_yaml::from_str::<Value>(block) {
                Ok(value) if is_truthy(&value) => Some(block.to_string()),
                Ok(_) => None,
                Err(err) => {
                    tracing::debug!("skipping invalid yaml block: {}", err);
                    None
                }
            }
        })
        .collect()
}

/// All blocks as one multi-document YAML file.
pub fn combine_rules(blocks: &[String]) -> String {
    blocks.join("\n---\n")
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(tagged) => is_truthy(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"Here are two rules.

```yaml
rules:
  - id: sql-injection-fstring
    pattern: db.execute(f"...")
    message: SQL built from an f-string
    languages: [python]
    severity: ERROR
```

And an invalid one:

```yaml
rules: [unclosed
```

```yaml
rules:
  - id: hardcoded-password
    pattern: password = "..."
    message: Hardcoded password
    languages: [python]
    severity: WARNING
```
"#;

    #[test]
    fn test_extracts_only_valid_blocks() {
        let blocks = extract_yaml_blocks(REPLY);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("sql-injection-fstring"));
        assert!(blocks[1].contains("hardcoded-password"));
    }

    #[test]
    fn test_empty_and_falsy_blocks_are_skipped() {
        let text = "```yaml\n{}\n```\n```yaml\n~\n```\n```yaml\nfalse\n```";
        assert!(extract_yaml_blocks(text).is_empty());
    }

    #[test]
    fn test_other_fences_ignored() {
        let text = "```python\nprint('hi')\n```";
        assert!(extract_yaml_blocks(text).is_empty());
    }

    #[test]
    fn test_combine_rules_separates_documents() {
        let blocks = vec!["a: 1".to_string(), "b: 2".to_string()];
        assert_eq!(combine_rules(&blocks), "a: 1\n---\nb: 2");
    }
}
