//! Built-in `StringOperations` module.

use super::{MniContext, NativeRegistry};

pub fn register(registry: &mut NativeRegistry) {
    registry.add("StringOperations", "cmp", cmp);
    registry.add("StringOperations", "concat", concat);
    registry.add("StringOperations", "length", length);
    registry.add("StringOperations", "split", split);
    registry.add("StringOperations", "replace", replace);
}

/// `MNI StringOperations.cmp a,b` — RFLAGS = 1 when the strings are
/// equal, 0 otherwise.
fn cmp(ctx: &mut MniContext) -> Result<(), String> {
    let a = ctx.read_string(&ctx.arg(0)?)?;
    let b = ctx.read_string(&ctx.arg(1)?)?;
    ctx.set_register("RFLAGS", if a == b { 1 } else { 0 })
}

/// `MNI StringOperations.concat a,b,dest`
fn concat(ctx: &mut MniContext) -> Result<(), String> {
    let a = ctx.read_string(&ctx.arg(0)?)?;
    let b = ctx.read_string(&ctx.arg(1)?)?;
    let dest = ctx.arg(2)?;
    ctx.write_string(&dest, &format!("{}{}", a, b))
}

/// `MNI StringOperations.length src,destReg` — store the character
/// count in a register.
fn length(ctx: &mut MniContext) -> Result<(), String> {
    let s = ctx.read_string(&ctx.arg(0)?)?;
    let dest = ctx.arg(1)?;
    ctx.set_register(&dest, s.chars().count() as i64)
}

/// `MNI StringOperations.split src,delim,destAddr` — write the part
/// count at `destAddr`, then each part as a null-terminated string in
/// consecutive slots (one spare cell between parts).
fn split(ctx: &mut MniContext) -> Result<(), String> {
    let s = ctx.read_string(&ctx.arg(0)?)?;
    let delimiter = ctx.read_string(&ctx.arg(1)?)?;
    let dest = ctx.arg(2)?;

    if delimiter.is_empty() {
        return Err("empty delimiter".to_string());
    }

    let parts: Vec<&str> = s.split(delimiter.as_str()).collect();
    let base = ctx.memory_address(&dest)?;
    ctx.write_integer(&format!("${}", base), parts.len() as i64)?;

    let mut current = base + 1;
    for part in parts {
        ctx.write_string(&format!("${}", current), part)?;
        current += part.chars().count() as i64 + 2;
    }
    Ok(())
}

/// `MNI StringOperations.replace src,old,new,dest`
fn replace(ctx: &mut MniContext) -> Result<(), String> {
    let source = ctx.read_string(&ctx.arg(0)?)?;
    let old = ctx.read_string(&ctx.arg(1)?)?;
    let new = ctx.read_string(&ctx.arg(2)?)?;
    let dest = ctx.arg(3)?;
    ctx.write_string(&dest, &source.replace(&old, &new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ArrayMemory, Memory};

    fn with_strings(pairs: &[(i64, &str)]) -> ArrayMemory {
        let mut mem = ArrayMemory::new(64 * 1024);
        for (addr, s) in pairs {
            mem.write_string_at(*addr, s).unwrap();
        }
        mem
    }

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_cmp_equal_and_unequal() {
        let mut mem = with_strings(&[(100, "abc"), (200, "abc"), (300, "abd")]);

        let args = tokens(&["$100", "$200"]);
        let mut ctx = MniContext::new(&mut mem, &args);
        cmp(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(mem.read_operand("RFLAGS").unwrap(), 1);

        let args = tokens(&["$100", "$300"]);
        let mut ctx = MniContext::new(&mut mem, &args);
        cmp(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(mem.read_operand("RFLAGS").unwrap(), 0);
    }

    #[test]
    fn test_concat() {
        let mut mem = with_strings(&[(100, "foo"), (200, "bar")]);
        let args = tokens(&["$100", "$200", "$300"]);
        let mut ctx = MniContext::new(&mut mem, &args);
        concat(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(mem.read_string_at(300).unwrap(), "foobar");
    }

    #[test]
    fn test_length_into_register() {
        let mut mem = with_strings(&[(100, "hello")]);
        let args = tokens(&["$100", "RCX"]);
        let mut ctx = MniContext::new(&mut mem, &args);
        length(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(mem.read_operand("RCX").unwrap(), 5);
    }

    #[test]
    fn test_split_writes_count_and_parts() {
        let mut mem = with_strings(&[(100, "a,bb,ccc"), (200, ",")]);
        let args = tokens(&["$100", "$200", "$500"]);
        let mut ctx = MniContext::new(&mut mem, &args);
        split(&mut ctx).unwrap();
        drop(ctx);

        assert_eq!(mem.read_cell(500).unwrap(), 3);
        assert_eq!(mem.read_string_at(501).unwrap(), "a");
        assert_eq!(mem.read_string_at(504).unwrap(), "bb");
        assert_eq!(mem.read_string_at(508).unwrap(), "ccc");
    }

    #[test]
    fn test_replace() {
        let mut mem = with_strings(&[(100, "one two two"), (200, "two"), (300, "three")]);
        let args = tokens(&["$100", "$200", "$300", "$400"]);
        let mut ctx = MniContext::new(&mut mem, &args);
        replace(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(mem.read_string_at(400).unwrap(), "one three three");
    }
}
