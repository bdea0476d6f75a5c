use bstr::{BString, ByteSlice};
use prvm::vm::{Builtins, Context, EdictStore, ErrorKind, Vector};
use tracing::{debug, info};

type Result = std::result::Result<(), ErrorKind>;

/// The engine-independent subset of the Quake builtins, by their usual numbers.
pub fn quake() -> Builtins<EdictStore> {
    let mut builtins = Builtins::new();
    builtins.register(9, normalize);
    builtins.register(10, error);
    builtins.register(12, vlen);
    builtins.register(14, spawn);
    builtins.register(15, remove);
    builtins.register(23, bprint);
    builtins.register(25, dprint);
    builtins.register(26, ftos);
    builtins.register(27, vtos);
    builtins.register(36, rint);
    builtins.register(37, floor);
    builtins.register(38, ceil);
    builtins.register(43, fabs);
    builtins
}

/// Concatenate every string argument.
fn message(cx: &Context<'_, EdictStore>) -> BString {
    let mut message = BString::default();
    for parm in 0..cx.argc() {
        message.extend_from_slice(cx.string(parm));
    }
    message
}

fn length(v: Vector) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn normalize(cx: &mut Context<'_, EdictStore>) -> Result {
    let v = cx.vector(0);
    let length = length(v);
    let normal = if length == 0.0 { [0.0; 3] } else { v.map(|x| x / length) };
    cx.return_vector(normal);
    Ok(())
}

fn error(cx: &mut Context<'_, EdictStore>) -> Result {
    let message = message(cx);
    Err(ErrorKind::Builtin(message.to_string().into()))
}

fn vlen(cx: &mut Context<'_, EdictStore>) -> Result {
    let length = length(cx.vector(0));
    cx.return_float(length);
    Ok(())
}

fn spawn(cx: &mut Context<'_, EdictStore>) -> Result {
    let entity = cx.world.spawn();
    cx.return_entity(entity as i32);
    Ok(())
}

fn remove(cx: &mut Context<'_, EdictStore>) -> Result {
    let entity = cx.entity(0);
    if entity <= 0 || entity as usize >= cx.world.len() {
        return Err(ErrorKind::Builtin(format!("remove: invalid entity {}", entity).into()));
    }
    cx.world.clear(entity as usize);
    Ok(())
}

fn bprint(cx: &mut Context<'_, EdictStore>) -> Result {
    let message = message(cx);
    info!("{}", message.trim_end().as_bstr());
    Ok(())
}

fn dprint(cx: &mut Context<'_, EdictStore>) -> Result {
    let message = message(cx);
    debug!("{}", message.trim_end().as_bstr());
    Ok(())
}

fn ftos(cx: &mut Context<'_, EdictStore>) -> Result {
    let string = format_float(cx.float(0));
    cx.return_string(string);
    Ok(())
}

fn vtos(cx: &mut Context<'_, EdictStore>) -> Result {
    let [x, y, z] = cx.vector(0);
    cx.return_string(format!("'{:5.1} {:5.1} {:5.1}'", x, y, z));
    Ok(())
}

fn rint(cx: &mut Context<'_, EdictStore>) -> Result {
    let value = cx.float(0).round();
    cx.return_float(value);
    Ok(())
}

fn floor(cx: &mut Context<'_, EdictStore>) -> Result {
    let value = cx.float(0).floor();
    cx.return_float(value);
    Ok(())
}

fn ceil(cx: &mut Context<'_, EdictStore>) -> Result {
    let value = cx.float(0).ceil();
    cx.return_float(value);
    Ok(())
}

fn fabs(cx: &mut Context<'_, EdictStore>) -> Result {
    let value = cx.float(0).abs();
    cx.return_float(value);
    Ok(())
}

/// Whole numbers print without a fraction, everything else with one decimal.
fn format_float(value: f32) -> String {
    if value == value.trunc() && value.abs() < i32::MAX as f32 {
        format!("{}", value as i32)
    } else {
        format!("{:5.1}", value)
    }
}
