//! Built-in `IO` module: console write and flush.

use std::io::Write;

use super::{MniContext, NativeRegistry};

pub fn register(registry: &mut NativeRegistry) {
    registry.add("IO", "write", write);
    registry.add("IO", "flush", flush);
}

/// `MNI IO.write port,src` — write the string at `src` to stdout
/// (port 1) or stderr (port 2).
fn write(ctx: &mut MniContext) -> Result<(), String> {
    let port = ctx.read_integer(&ctx.arg(0)?)?;
    let content = ctx.read_string(&ctx.arg(1)?)?;

    match port {
        1 => print!("{}", content),
        2 => eprint!("{}", content),
        other => return Err(format!("invalid target: {}. Must be 1 (stdout) or 2 (stderr)", other)),
    }
    Ok(())
}

/// `MNI IO.flush port`
fn flush(ctx: &mut MniContext) -> Result<(), String> {
    let port = ctx.read_integer(&ctx.arg(0)?)?;

    match port {
        1 => std::io::stdout().flush().map_err(|e| e.to_string()),
        2 => std::io::stderr().flush().map_err(|e| e.to_string()),
        other => Err(format!("invalid target: {}. Must be 1 (stdout) or 2 (stderr)", other)),
    }
}
