use std::sync::Arc;

use crate::val::Val;
use crate::vm::VmContext;

pub type BuiltinFn = fn(args: &[Val], ctx: &mut VmContext) -> Val;

/// A native function exposed to programs. The compiler resolves builtin
/// names to indices into [`BUILTINS`]; the VM dispatches by the same index,
/// so the order here is part of the bytecode ABI.
#[derive(Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

pub static BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "puts",
        func: builtin_puts,
    },
    Builtin {
        name: "first",
        func: builtin_first,
    },
    Builtin {
        name: "last",
        func: builtin_last,
    },
    Builtin {
        name: "rest",
        func: builtin_rest,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
];

// Contract violations produce Error values, not runtime aborts: they land
// on the stack like any other result.

fn wrong_arity(got: usize, want: usize) -> Val {
    Val::error(format!("wrong number of arguments. got={got}, want={want}"))
}

fn builtin_len(args: &[Val], _ctx: &mut VmContext) -> Val {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Val::Str(value) => Val::Int(value.len() as i64),
        Val::Array(elements) => Val::Int(elements.len() as i64),
        other => Val::error(format!(
            "argument to `len` not supported, got {}",
            other.type_name()
        )),
    }
}

/// Prints each argument's inspect form on its own line.
fn builtin_puts(args: &[Val], ctx: &mut VmContext) -> Val {
    for arg in args {
        ctx.write_line(&arg.to_string());
    }
    Val::Null
}

fn builtin_first(args: &[Val], _ctx: &mut VmContext) -> Val {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Val::Array(elements) => elements.first().cloned().unwrap_or(Val::Null),
        other => Val::error(format!(
            "argument to `first` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}

fn builtin_last(args: &[Val], _ctx: &mut VmContext) -> Val {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Val::Array(elements) => elements.last().cloned().unwrap_or(Val::Null),
        other => Val::error(format!(
            "argument to `last` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}

fn builtin_rest(args: &[Val], _ctx: &mut VmContext) -> Val {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Val::Array(elements) if !elements.is_empty() => {
            Val::Array(Arc::from(elements[1..].to_vec()))
        }
        Val::Array(_) => Val::Null,
        other => Val::error(format!(
            "argument to `rest` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}

fn builtin_push(args: &[Val], _ctx: &mut VmContext) -> Val {
    if args.len() != 2 {
        return wrong_arity(args.len(), 2);
    }
    match &args[0] {
        Val::Array(elements) => {
            let mut out = Vec::with_capacity(elements.len() + 1);
            out.extend_from_slice(elements);
            out.push(args[1].clone());
            Val::Array(Arc::from(out))
        }
        other => Val::error(format!(
            "argument to `push` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}
