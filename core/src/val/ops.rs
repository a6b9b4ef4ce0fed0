use std::ops::{Add, Div, Mul, Sub};
use std::sync::Arc;

use anyhow::{bail, Result};

use super::Val;

fn unsupported(left: &Val, right: &Val) -> Result<Val> {
    bail!(
        "unsupported types for binary operation: {} {}",
        left.type_name(),
        right.type_name()
    )
}

impl Add for &Val {
    type Output = Result<Val>;

    /// Integer addition wraps; `+` on two strings concatenates.
    #[inline]
    fn add(self, other: Self) -> Self::Output {
        match (self, other) {
            (Val::Int(a), Val::Int(b)) => Ok(Val::Int(a.wrapping_add(*b))),
            (Val::Str(a), Val::Str(b)) => {
                let mut out = String::with_capacity(a.len() + b.len());
                out.push_str(a);
                out.push_str(b);
                Ok(Val::Str(Arc::from(out)))
            }
            _ => unsupported(self, other),
        }
    }
}

impl Sub for &Val {
    type Output = Result<Val>;

    #[inline]
    fn sub(self, other: Self) -> Self::Output {
        match (self, other) {
            (Val::Int(a), Val::Int(b)) => Ok(Val::Int(a.wrapping_sub(*b))),
            _ => unsupported(self, other),
        }
    }
}

impl Mul for &Val {
    type Output = Result<Val>;

    #[inline]
    fn mul(self, other: Self) -> Self::Output {
        match (self, other) {
            (Val::Int(a), Val::Int(b)) => Ok(Val::Int(a.wrapping_mul(*b))),
            _ => unsupported(self, other),
        }
    }
}

impl Div for &Val {
    type Output = Result<Val>;

    #[inline]
    fn div(self, other: Self) -> Self::Output {
        match (self, other) {
            (Val::Int(_), Val::Int(0)) => bail!("division by zero"),
            (Val::Int(a), Val::Int(b)) => Ok(Val::Int(a.wrapping_div(*b))),
            _ => unsupported(self, other),
        }
    }
}
