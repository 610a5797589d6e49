//! Answer comparison: two files are considered equivalent when they agree
//! after ignoring trailing whitespace on each line and ignoring blank
//! lines entirely. This is the contract of `diff -w -B` as used by the
//! reference implementation's `is_correct_answer` to decide Accepted vs.
//! WrongAnswer, reimplemented natively instead of shelling out.
//!

use std::fs;
use std::path::Path;

use crate::Result;

/// Lines of `path` with trailing whitespace stripped and blank lines
/// dropped, in order.
fn normalized_lines(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(|line| line.trim_end().to_owned())
        .filter(|line| !line.is_empty())
        .collect())
}

/// Compare the output produced by a submission against the expected output
/// for a test case, under the ignore-trailing-whitespace, ignore-blank-line
/// rule.
pub fn files_equivalent(output_path: &Path, expected_path: &Path) -> Result<bool> {
    let output = normalized_lines(output_path)?;
    let expected = normalized_lines(expected_path)?;
    Ok(output == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn identical_files_are_equivalent() {
        let a = file_with("1 2 3\n4 5 6\n");
        let b = file_with("1 2 3\n4 5 6\n");
        assert!(files_equivalent(a.path(), b.path()).unwrap());
    }

    #[test]
    fn trailing_whitespace_is_ignored() {
        let a = file_with("42   \n");
        let b = file_with("42\n");
        assert!(files_equivalent(a.path(), b.path()).unwrap());
    }

    #[test]
    fn blank_lines_are_ignored() {
        let a = file_with("1\n\n2\n\n\n3\n");
        let b = file_with("1\n2\n3\n");
        assert!(files_equivalent(a.path(), b.path()).unwrap());
    }

    #[test]
    fn leading_whitespace_still_matters() {
        let a = file_with("  42\n");
        let b = file_with("42\n");
        assert!(!files_equivalent(a.path(), b.path()).unwrap());
    }

    #[test]
    fn different_content_is_not_equivalent() {
        let a = file_with("41\n");
        let b = file_with("42\n");
        assert!(!files_equivalent(a.path(), b.path()).unwrap());
    }

    #[test]
    fn missing_expected_file_is_an_error() {
        let a = file_with("42\n");
        let missing = Path::new("/nonexistent/path/for/compare/test");
        assert!(files_equivalent(a.path(), missing).is_err());
    }
}
