//! `printf`-style formatting over runtime values.
//!
//! Supports the conversions lowering emits (`%d %i %u %ld %lld %lu %x %c
//! %s %f %lf %e %g %p %%`) with flags `-`, `0`, `+` and space, a width and
//! a precision.

use std::fmt::Write as _;

use crate::memory::Memory;
use crate::value::Val;
use crate::ExecError;

#[derive(Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    width: usize,
    precision: Option<usize>,
}

impl Spec {
    fn pad(&self, body: String, numeric: bool) -> String {
        if body.len() >= self.width {
            return body;
        }
        let fill = self.width - body.len();
        if self.left {
            format!("{body}{}", " ".repeat(fill))
        } else if self.zero && numeric {
            let (sign, digits) = match body.strip_prefix(|c: char| c == '-' || c == '+') {
                Some(rest) => (&body[..1], rest),
                None => ("", body.as_str()),
            };
            format!("{sign}{}{digits}", "0".repeat(fill))
        } else {
            format!("{}{body}", " ".repeat(fill))
        }
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }
}

/// Render `fmt` with `args`, reading `%s` strings from `mem`.
pub fn format(fmt: &str, args: &[Val], mem: &Memory) -> Result<String, ExecError> {
    let mut out = String::new();
    let mut args = args.iter();
    let mut chars = fmt.chars().peekable();
    let mut next_arg = |conv: char| {
        args.next()
            .ok_or_else(|| ExecError::BadFormat(format!("missing argument for %{conv}")))
    };

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                _ => break,
            }
            chars.next();
        }
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            spec.width = spec.width * 10 + d as usize;
            chars.next();
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = 0;
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                p = p * 10 + d as usize;
                chars.next();
            }
            spec.precision = Some(p);
        }
        while matches!(chars.peek(), Some('l' | 'h' | 'z')) {
            chars.next();
        }
        let Some(conv) = chars.next() else {
            return Err(ExecError::BadFormat("dangling '%'".to_owned()));
        };
        let piece = match conv {
            '%' => "%".to_owned(),
            'd' | 'i' => {
                let v = int_arg(next_arg(conv)?, conv)?;
                let body = format!("{}{}", spec.sign(v < 0), v.unsigned_abs());
                spec.pad(body, true)
            }
            'u' => {
                let v = int_arg(next_arg(conv)?, conv)?;
                spec.pad((v as u64).to_string(), true)
            }
            'x' | 'X' => {
                let v = int_arg(next_arg(conv)?, conv)?;
                let body = if conv == 'x' {
                    format!("{:x}", v as u64)
                } else {
                    format!("{:X}", v as u64)
                };
                spec.pad(body, true)
            }
            'c' => {
                let v = int_arg(next_arg(conv)?, conv)?;
                spec.pad(char::from(v as u8).to_string(), false)
            }
            's' => {
                let addr = next_arg(conv)?
                    .as_ptr()
                    .ok_or_else(|| ExecError::BadFormat("%s expects a pointer".to_owned()))?;
                let mut s = mem.read_c_string(addr)?;
                if let Some(p) = spec.precision {
                    s.truncate(p);
                }
                spec.pad(s, false)
            }
            'f' | 'F' => {
                let v = float_arg(next_arg(conv)?, conv)?;
                let prec = spec.precision.unwrap_or(6);
                let body = format!("{}{:.*}", spec.sign(v.is_sign_negative() && v != 0.0), prec, v.abs());
                spec.pad(body, true)
            }
            'e' | 'E' => {
                let v = float_arg(next_arg(conv)?, conv)?;
                let prec = spec.precision.unwrap_or(6);
                let body = c_exponent(v, prec, conv == 'E');
                spec.pad(body, true)
            }
            'g' | 'G' => {
                let v = float_arg(next_arg(conv)?, conv)?;
                spec.pad(c_general(v, spec.precision.unwrap_or(6)), true)
            }
            'p' => {
                let v = next_arg(conv)?.as_ptr().unwrap_or(0);
                let mut body = String::new();
                let _ = write!(body, "{v:#x}");
                spec.pad(body, false)
            }
            other => {
                return Err(ExecError::BadFormat(format!("unsupported conversion %{other}")));
            }
        };
        out.push_str(&piece);
    }
    Ok(out)
}

fn int_arg(v: &Val, conv: char) -> Result<i64, ExecError> {
    v.as_int()
        .ok_or_else(|| ExecError::BadFormat(format!("%{conv} expects an integer, got {v:?}")))
}

fn float_arg(v: &Val, conv: char) -> Result<f64, ExecError> {
    match v {
        Val::Float(f) => Ok(*f),
        Val::Int(i) => Ok(*i as f64),
        _ => Err(ExecError::BadFormat(format!(
            "%{conv} expects a double, got {v:?}"
        ))),
    }
}

/// C-style `%e`: mantissa, then a signed exponent of at least two digits.
fn c_exponent(v: f64, prec: usize, upper: bool) -> String {
    let rust = format!("{v:.prec$e}");
    let (mantissa, exp) = rust.split_once('e').unwrap_or((rust.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{sign}{:02}", exp.abs())
}

/// C-style `%g`: shortest of `%e`/`%f` with trailing zeros removed.
fn c_general(v: f64, prec: usize) -> String {
    let prec = prec.max(1);
    if v == 0.0 {
        return "0".to_owned();
    }
    let exp = v.abs().log10().floor() as i32;
    let body = if exp < -4 || exp >= prec as i32 {
        c_exponent(v, prec - 1, false)
    } else {
        let decimals = (prec as i32 - 1 - exp).max(0) as usize;
        format!("{v:.decimals$}")
    };
    if body.contains('e') {
        let (m, e) = body.split_once('e').unwrap_or((body.as_str(), ""));
        let m = strip_zeros(m);
        format!("{m}e{e}")
    } else {
        strip_zeros(&body)
    }
}

fn strip_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        s.to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fmt(f: &str, args: &[Val]) -> String {
        format(f, args, &Memory::new(1024)).unwrap()
    }

    #[test]
    fn integers() {
        assert_eq!(fmt("%d %i", &[Val::Int(-5), Val::Int(7)]), "-5 7");
        assert_eq!(fmt("%ld|%5d|%-3d|", &[Val::Int(1), Val::Int(42), Val::Int(9)]), "1|   42|9  |");
        assert_eq!(fmt("%03d %x", &[Val::Int(-7), Val::Int(255)]), "-07 ff");
    }

    #[test]
    fn floats() {
        assert_eq!(fmt("%f", &[Val::Float(1.5)]), "1.500000");
        assert_eq!(fmt("%.2lf", &[Val::Float(-2.0)]), "-2.00");
        assert_eq!(fmt("%e", &[Val::Float(1234.5)]), "1.234500e+03");
        assert_eq!(fmt("%g", &[Val::Float(0.5)]), "0.5");
    }

    #[test]
    fn chars_strings_and_percent() {
        let mut mem = Memory::new(1024);
        let a = mem.alloc_heap(6, 1).unwrap();
        mem.write_bytes(a, b"hello\0").unwrap();
        let s = format("%c%s %%", &[Val::Int(i64::from(b'>')), Val::Ptr(a)], &mem).unwrap();
        assert_eq!(s, ">hello %");
    }

    #[test]
    fn missing_argument_is_an_error() {
        assert!(matches!(
            format("%d", &[], &Memory::new(16)),
            Err(ExecError::BadFormat(_))
        ));
    }
}
