//! Host implementations of the external functions lowering declares.

use tracing::{debug, trace};

use super::{decode_function, Exception, Machine, Unwind};
use crate::value::Val;
use crate::{printf, ExecError};

/// Alignment for heap blocks handed out by `calloc` and friends.
const MALLOC_ALIGN: u64 = 16;

fn arg(args: &[Val], i: usize, name: &str) -> Result<Val, ExecError> {
    args.get(i)
        .cloned()
        .ok_or_else(|| ExecError::MalformedIr(format!("'{name}' is missing argument {i}")))
}

fn int_arg(args: &[Val], i: usize, name: &str) -> Result<i64, ExecError> {
    let v = arg(args, i, name)?;
    v.as_int()
        .ok_or_else(|| ExecError::MalformedIr(format!("'{name}' argument {i} is not an integer")))
}

fn ptr_arg(args: &[Val], i: usize, name: &str) -> Result<u64, ExecError> {
    let v = arg(args, i, name)?;
    v.as_ptr()
        .ok_or_else(|| ExecError::MalformedIr(format!("'{name}' argument {i} is not a pointer")))
}

fn float_arg(args: &[Val], i: usize, name: &str) -> Result<f64, ExecError> {
    match arg(args, i, name)? {
        Val::Float(f) => Ok(f),
        Val::Int(i) => Ok(i as f64),
        _ => Err(ExecError::MalformedIr(format!(
            "'{name}' argument {i} is not a float"
        ))),
    }
}

pub(super) fn call_extern(m: &mut Machine<'_>, name: &str, args: &[Val]) -> Result<Val, Unwind> {
    trace!(name, argc = args.len(), "extern call");
    match name {
        "calloc" => {
            let n = int_arg(args, 0, name)?.max(0) as u64;
            let size = int_arg(args, 1, name)?.max(0) as u64;
            Ok(Val::Ptr(m.memory.alloc_heap(n.saturating_mul(size), MALLOC_ALIGN)?))
        }
        "malloc" => {
            let size = int_arg(args, 0, name)?.max(0) as u64;
            Ok(Val::Ptr(m.memory.alloc_heap(size, MALLOC_ALIGN)?))
        }
        "free" => {
            m.memory.free(ptr_arg(args, 0, name)?);
            Ok(Val::Void)
        }
        "printf" => {
            let fmt = m.memory.read_c_string(ptr_arg(args, 0, name)?)?;
            let text = printf::format(&fmt, &args[1..], &m.memory)?;
            m.stdout.push_str(&text);
            Ok(Val::Int(text.len() as i64))
        }
        "pow" => Ok(Val::Float(
            float_arg(args, 0, name)?.powf(float_arg(args, 1, name)?),
        )),
        "abort" => Err(ExecError::Aborted.into()),
        "__cxa_allocate_exception" => {
            let size = int_arg(args, 0, name)?.max(0) as u64;
            Ok(Val::Ptr(m.memory.alloc_heap(size, MALLOC_ALIGN)?))
        }
        "__cxa_throw" => {
            let exc = Exception {
                payload: ptr_arg(args, 0, name)?,
                descriptor: ptr_arg(args, 1, name)?,
                destructor: ptr_arg(args, 2, name)?,
            };
            debug!(type_name = %m.descriptor_name(exc.descriptor), "throw");
            m.thrown.insert(exc.payload, exc);
            Err(Unwind::Throw(exc))
        }
        "__cxa_begin_catch" => {
            let payload = ptr_arg(args, 0, name)?;
            let exc = m.thrown.remove(&payload).ok_or_else(|| {
                ExecError::MalformedIr(format!("begin_catch of unknown exception {payload:#x}"))
            })?;
            m.caught.push(exc);
            Ok(Val::Ptr(payload))
        }
        "__cxa_end_catch" => {
            let exc = m.caught.pop().ok_or_else(|| {
                ExecError::MalformedIr("end_catch without a caught exception".to_owned())
            })?;
            if let Some(dtor) = decode_function(exc.destructor) {
                m.call_function(dtor, vec![Val::Ptr(exc.payload)])?;
            }
            m.memory.free(exc.payload);
            Ok(Val::Void)
        }
        _ => Err(ExecError::UnknownExtern(name.to_owned()).into()),
    }
}
