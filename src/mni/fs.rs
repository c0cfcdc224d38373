//! Built-in `FileOperations` module.
//!
//! These natives never fail the dispatch: host I/O errors are
//! reported to the interpreted program through RFLAGS (1 = success,
//! 0 = failure).

use std::fs;
use std::path::Path;

use super::{MniContext, NativeRegistry};

pub fn register(registry: &mut NativeRegistry) {
    registry.add("FileOperations", "readFile", read_file);
    registry.add("FileOperations", "writeFile", write_file);
    registry.add("FileOperations", "fileExists", file_exists);
}

/// `MNI FileOperations.readFile nameSrc,dest` — read the file named
/// by the string at `nameSrc` into memory at `dest`.
fn read_file(ctx: &mut MniContext) -> Result<(), String> {
    let filename = ctx.read_string(&ctx.arg(0)?)?;
    let destination = ctx.arg(1)?;

    match fs::read_to_string(&filename) {
        Ok(content) => {
            ctx.write_string(&destination, &content)?;
            ctx.set_register("RFLAGS", 1)
        }
        Err(e) => {
            eprintln!("error reading file: {}", e);
            ctx.set_register("RFLAGS", 0)
        }
    }
}

/// `MNI FileOperations.writeFile nameSrc,contentSrc`
fn write_file(ctx: &mut MniContext) -> Result<(), String> {
    let filename = ctx.read_string(&ctx.arg(0)?)?;
    let content = ctx.read_string(&ctx.arg(1)?)?;

    match fs::write(&filename, content) {
        Ok(()) => ctx.set_register("RFLAGS", 1),
        Err(e) => {
            eprintln!("error writing file: {}", e);
            ctx.set_register("RFLAGS", 0)
        }
    }
}

/// `MNI FileOperations.fileExists nameSrc`
fn file_exists(ctx: &mut MniContext) -> Result<(), String> {
    let filename = ctx.read_string(&ctx.arg(0)?)?;
    let exists = Path::new(&filename).exists();
    ctx.set_register("RFLAGS", if exists { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ArrayMemory, Memory};

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");

        let mut mem = ArrayMemory::new(64 * 1024);
        mem.write_string_at(100, path.to_str().unwrap()).unwrap();
        mem.write_string_at(300, "file body").unwrap();

        let tokens = vec!["$100".to_string(), "$300".to_string()];
        let mut ctx = MniContext::new(&mut mem, &tokens);
        write_file(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(mem.read_operand("RFLAGS").unwrap(), 1);

        let tokens = vec!["$100".to_string(), "$500".to_string()];
        let mut ctx = MniContext::new(&mut mem, &tokens);
        read_file(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(mem.read_operand("RFLAGS").unwrap(), 1);
        assert_eq!(mem.read_string_at(500).unwrap(), "file body");
    }

    #[test]
    fn test_read_missing_file_reports_failure() {
        let mut mem = ArrayMemory::new(64 * 1024);
        mem.write_string_at(100, "/definitely/not/here.txt").unwrap();
        mem.write_operand("RFLAGS", 1).unwrap();

        let tokens = vec!["$100".to_string(), "$300".to_string()];
        let mut ctx = MniContext::new(&mut mem, &tokens);
        read_file(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(mem.read_operand("RFLAGS").unwrap(), 0);
    }

    #[test]
    fn test_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("here.txt");
        std::fs::write(&path, "x").unwrap();

        let mut mem = ArrayMemory::new(64 * 1024);
        mem.write_string_at(100, path.to_str().unwrap()).unwrap();

        let tokens = vec!["$100".to_string()];
        let mut ctx = MniContext::new(&mut mem, &tokens);
        file_exists(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(mem.read_operand("RFLAGS").unwrap(), 1);

        let mut mem = ArrayMemory::new(64 * 1024);
        mem.write_string_at(100, "/no/such/file").unwrap();
        let tokens = vec!["$100".to_string()];
        let mut ctx = MniContext::new(&mut mem, &tokens);
        file_exists(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(mem.read_operand("RFLAGS").unwrap(), 0);
    }
}
