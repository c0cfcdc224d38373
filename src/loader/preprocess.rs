//! Include expansion.
//!
//! `#include "dotted.path"` lines are replaced by the contents of
//! `dotted/path.masm`, looked up under the configured root, then the
//! current directory, then a `root/` subdirectory. Expansion repeats
//! until no include remains, so included files may include further
//! files; a pass limit catches cycles. Each pass also drops blank and
//! comment lines, so the loader receives clean instruction text.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::MasmError;

/// Upper bound on expansion passes; exceeding it means a cyclic or
/// pathologically nested include graph.
pub const MAX_INCLUDE_PASSES: usize = 10;

/// Expand all includes in `source`, resolving paths relative to
/// `root` first.
pub fn expand_includes(source: &str, root: &Path) -> Result<String, MasmError> {
    let mut result = source.to_string();
    let mut pass = 0;

    while has_includes(&result) {
        if pass >= MAX_INCLUDE_PASSES {
            return Err(MasmError::TooManyIncludePasses);
        }

        let mut next = String::new();
        for line in result.lines() {
            let trimmed = line.trim();
            if trimmed.to_ascii_lowercase().starts_with("#include") {
                let path = include_path(trimmed)?;
                next.push_str(&read_include(&path, root)?);
                next.push('\n');
            } else if trimmed.is_empty() || trimmed.starts_with(';') {
                continue;
            } else {
                let cleaned = strip_inline_comment(trimmed);
                if !cleaned.is_empty() {
                    next.push_str(cleaned);
                    next.push('\n');
                }
            }
        }

        result = next;
        pass += 1;
    }

    Ok(result)
}

fn has_includes(source: &str) -> bool {
    source
        .lines()
        .any(|l| l.trim().to_ascii_lowercase().starts_with("#include"))
}

/// Pull the quoted module path out of an include directive.
fn include_path(line: &str) -> Result<String, MasmError> {
    let start = line.find('"');
    let end = line.rfind('"');
    match (start, end) {
        (Some(s), Some(e)) if s != e => Ok(line[s + 1..e].to_string()),
        _ => Err(MasmError::InvalidOperand(format!(
            "malformed include directive: {}",
            line
        ))),
    }
}

fn read_include(dotted: &str, root: &Path) -> Result<String, MasmError> {
    // stdio.print -> stdio/print.masm
    let relative: PathBuf = PathBuf::from(dotted.replace('.', "/")).with_extension("masm");

    let mut candidates = vec![root.join(&relative)];
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(&relative));
        candidates.push(cwd.join("root").join(&relative));
    }

    for candidate in &candidates {
        if candidate.is_file() {
            return Ok(fs::read_to_string(candidate)?);
        }
    }

    Err(MasmError::IncludeNotFound(relative.display().to_string()))
}

/// Cut a trailing `; comment`, unless the comment marker sits inside
/// a quoted literal (DB string operands may contain semicolons).
fn strip_inline_comment(line: &str) -> &str {
    match line.find(';') {
        Some(pos) => {
            let before = &line[..pos];
            let quotes = before.matches(['"', '\'']).count();
            if quotes % 2 == 1 {
                line
            } else {
                before.trim_end()
            }
        }
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_no_includes_passes_through() {
        let src = "MOV RAX 1\nHLT\n";
        let out = expand_includes(src, Path::new(".")).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_include_inlines_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("stdio")).unwrap();
        fs::write(dir.path().join("stdio/print.masm"), "OUT 1 RAX\nRET\n").unwrap();

        let src = "#include \"stdio.print\"\nlbl main\nHLT\n";
        let out = expand_includes(src, dir.path()).unwrap();
        assert!(out.contains("OUT 1 RAX"));
        assert!(out.contains("lbl main"));
        assert!(!out.contains("#include"));
    }

    #[test]
    fn test_missing_include_fails() {
        let dir = tempfile::tempdir().unwrap();
        let src = "#include \"no.such.module\"\n";
        let err = expand_includes(src, dir.path()).unwrap_err();
        assert!(matches!(err, MasmError::IncludeNotFound(_)));
    }

    #[test]
    fn test_malformed_include_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = expand_includes("#include stdio.print\n", dir.path()).unwrap_err();
        assert!(matches!(err, MasmError::InvalidOperand(_)));
    }

    #[test]
    fn test_cyclic_include_hits_pass_limit() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.masm"), "#include \"a\"\n").unwrap();
        let err = expand_includes("#include \"a\"\n", dir.path()).unwrap_err();
        assert!(matches!(err, MasmError::TooManyIncludePasses));
    }

    #[test]
    fn test_comment_stripping_during_expansion() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("m.masm"), "MOV RAX 1 ; set up\n; whole line\n").unwrap();
        let out = expand_includes("#include \"m\"\nHLT\n", dir.path()).unwrap();
        assert_eq!(out, "MOV RAX 1\nHLT\n");
    }
}
