//! Loading the code to scan

use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Code gathered for one scan, plus the paths Semgrep should see.
#[derive(Debug)]
pub struct ScanInput {
    pub code: String,
    pub targets: Vec<PathBuf>,
    /// Keeps piped code on disk until the scan is done
    temp: Option<NamedTempFile>,
}

impl ScanInput {
    /// Read one or more files. Several files are concatenated under a
    /// `// File: <path>` header each.
    pub fn from_files(paths: &[PathBuf]) -> anyhow::Result<Self> {
        if paths.is_empty() {
            anyhow::bail!("No files given to scan");
        }

        let mut sections = Vec::with_capacity(paths.len());
        for path in paths {
            if !path.is_file() {
                anyhow::bail!("Not a file: {}", path.display());
            }
            let content = read_text(path)?;
            sections.push((path, content));
        }

        let code = if sections.len() == 1 {
            sections.pop().map(|(_, c)| c).unwrap_or_default()
        } else {
            sections
                .iter()
                .map(|(path, content)| format!("// File: {}\n{}", path.display(), content))
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(Self {
            code,
            targets: paths.to_vec(),
            temp: None,
        })
    }

    /// Write piped code to a temp file with `extension` so Semgrep can tell
    /// the language. The file is removed when the input is dropped.
    pub fn from_code(code: String, extension: &str) -> anyhow::Result<Self> {
        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let mut temp = tempfile::Builder::new()
            .prefix("securecode-")
            .suffix(&suffix)
            .tempfile()
            .context("Failed to create temp file for code input")?;
        temp.write_all(code.as_bytes())?;
        temp.flush()?;

        let targets = vec![temp.path().to_path_buf()];
        Ok(Self {
            code,
            targets,
            temp: Some(temp),
        })
    }

    /// File name shown for the code, if it came from a single file
    pub fn single_file(&self) -> Option<&Path> {
        match (&self.temp, self.targets.as_slice()) {
            (None, [only]) => Some(only.as_path()),
            _ => None,
        }
    }
}

/// Read a text file, replacing invalid UTF-8.
pub fn read_text(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_file_is_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.py");
        fs::write(&path, "print('hi')\n").unwrap();

        let input = ScanInput::from_files(&[path.clone()]).unwrap();
        assert_eq!(input.code, "print('hi')\n");
        assert_eq!(input.targets, vec![path.clone()]);
        assert_eq!(input.single_file(), Some(path.as_path()));
    }

    #[test]
    fn test_multiple_files_get_headers() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.py");
        let b = dir.path().join("b.js");
        fs::write(&a, "x = 1").unwrap();
        fs::write(&b, "let y = 2;").unwrap();

        let input = ScanInput::from_files(&[a.clone(), b.clone()]).unwrap();
        assert!(input.code.starts_with(&format!("// File: {}\nx = 1", a.display())));
        assert!(input.code.contains(&format!("// File: {}\nlet y = 2;", b.display())));
        assert!(input.single_file().is_none());
    }

    #[test]
    fn test_directory_and_missing_paths_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ScanInput::from_files(&[dir.path().to_path_buf()]).is_err());
        assert!(ScanInput::from_files(&[dir.path().join("nope.py")]).is_err());
        assert!(ScanInput::from_files(&[]).is_err());
    }

    #[test]
    fn test_piped_code_lives_until_drop() {
        let input = ScanInput::from_code("eval(input())".to_string(), "py").unwrap();
        let path = input.targets[0].clone();
        assert!(path.extension().is_some_and(|e| e == "py"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "eval(input())");
        assert!(input.single_file().is_none());

        drop(input);
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.py");
        fs::write(&path, [b'a', 0xff, b'b']).unwrap();
        assert_eq!(read_text(&path).unwrap(), "a\u{fffd}b");
    }
}
