//! `string` library. Positions are byte offsets, 1-based, negative from
//! the end.

use super::{arg, check_integer, check_string, opt_integer, sync};
use crate::error::{LuaError, LuaResult};
use crate::interp::{Frame, MultiValue, TableRef, Value, format_number, quote_string};

pub(super) fn library() -> TableRef {
    TableRef::from_pairs([
        ("len", sync("len", len)),
        ("upper", sync("upper", upper)),
        ("lower", sync("lower", lower)),
        ("sub", sync("sub", sub)),
        ("rep", sync("rep", rep)),
        ("reverse", sync("reverse", reverse)),
        ("byte", sync("byte", byte)),
        ("char", sync("char", char)),
        ("format", sync("format", format)),
    ])
}

/// Largest string `rep` will build
const MAX_STRING_LEN: usize = 1 << 30;

/// Largest `format` width or precision
const MAX_FORMAT_WIDTH: usize = 99;

/// Normalise a 1-based, possibly negative position against `len`.
fn position(pos: i64, len: usize) -> i64 {
    if pos < 0 { (len as i64 + pos + 1).max(0) } else { pos }
}

/// Byte range `[i, j]` clamped to the string; `None` when empty.
fn byte_range(i: i64, j: i64, len: usize) -> Option<(usize, usize)> {
    let start = position(i, len).max(1);
    let end = position(j, len).min(len as i64);
    (start <= end).then(|| (start as usize - 1, end as usize))
}

fn len(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let s = check_string(&args, 0, "len")?;
    Ok(MultiValue::one(s.len()))
}

fn upper(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    Ok(MultiValue::one(check_string(&args, 0, "upper")?.to_uppercase()))
}

fn lower(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    Ok(MultiValue::one(check_string(&args, 0, "lower")?.to_lowercase()))
}

fn sub(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let s = check_string(&args, 0, "sub")?;
    let i = opt_integer(&args, 1, "sub", 1)?;
    let j = opt_integer(&args, 2, "sub", -1)?;
    let out = match byte_range(i, j, s.len()) {
        Some((start, end)) => String::from_utf8_lossy(&s.as_bytes()[start..end]).into_owned(),
        None => String::new(),
    };
    Ok(MultiValue::one(out))
}

fn rep(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let s = check_string(&args, 0, "rep")?;
    let n = check_integer(&args, 1, "rep")?;
    let sep = match arg(&args, 2) {
        Value::Nil => None,
        _ => Some(check_string(&args, 2, "rep")?),
    };
    let count = usize::try_from(n.max(0)).unwrap_or(usize::MAX);
    let sep_len = sep.as_ref().map_or(0, |sep| sep.len());
    let total = s
        .len()
        .checked_add(sep_len)
        .and_then(|unit| unit.checked_mul(count));
    let total = match total {
        Some(0) => return Ok(MultiValue::one("")),
        Some(total) if total <= MAX_STRING_LEN => total,
        _ => return Err(LuaError::argument("resulting string too large")),
    };
    let out = match sep {
        Some(sep) => {
            let mut out = String::with_capacity(total);
            for i in 0..count {
                if i > 0 {
                    out.push_str(&sep);
                }
                out.push_str(&s);
            }
            out
        }
        None => s.repeat(count),
    };
    Ok(MultiValue::one(out))
}

fn reverse(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let s = check_string(&args, 0, "reverse")?;
    Ok(MultiValue::one(s.chars().rev().collect::<String>()))
}

fn byte(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let s = check_string(&args, 0, "byte")?;
    let i = opt_integer(&args, 1, "byte", 1)?;
    let j = opt_integer(&args, 2, "byte", i)?;
    Ok(match byte_range(i, j, s.len()) {
        Some((start, end)) => s.as_bytes()[start..end].iter().map(|b| Value::from(*b as i64)).collect(),
        None => MultiValue::empty(),
    })
}

fn char(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let bytes = (0..args.len())
        .map(|i| {
            let code = check_integer(&args, i, "char")?;
            u8::try_from(code).map_err(|_| {
                LuaError::argument(format!("bad argument #{} to 'char' (value out of range)", i + 1))
            })
        })
        .collect::<LuaResult<Vec<u8>>>()?;
    Ok(MultiValue::one(String::from_utf8_lossy(&bytes).into_owned()))
}

/// One `%` directive: flags, width, precision and conversion letter
#[derive(Debug, Default)]
struct Directive {
    left: bool,
    zero: bool,
    plus: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

impl Directive {
    fn parse(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> LuaResult<Directive> {
        let mut directive = Directive::default();
        while let Some(&c) = chars.peek() {
            match c {
                '-' => directive.left = true,
                '0' => directive.zero = true,
                '+' => directive.plus = true,
                ' ' | '#' => {}
                _ => break,
            }
            chars.next();
        }
        directive.width = digits(chars)?;
        if chars.peek() == Some(&'.') {
            chars.next();
            directive.precision = Some(digits(chars)?);
        }
        directive.conversion = chars
            .next()
            .ok_or_else(|| LuaError::argument("invalid conversion '%' to 'format'"))?;
        Ok(directive)
    }

    fn pad(&self, body: String) -> String {
        let fill = self.width.saturating_sub(body.chars().count());
        if fill == 0 {
            return body;
        }
        if self.left {
            return format!("{body}{}", " ".repeat(fill));
        }
        let numeric = matches!(self.conversion, 'd' | 'i' | 'f' | 'g' | 'x' | 'X');
        if self.zero && numeric {
            let (sign, digits) = match body.strip_prefix(['-', '+']) {
                Some(rest) => (&body[..1], rest),
                None => ("", body.as_str()),
            };
            return format!("{sign}{}{digits}", "0".repeat(fill));
        }
        format!("{}{body}", " ".repeat(fill))
    }

    fn signed(&self, body: String) -> String {
        if self.plus && !body.starts_with('-') { format!("+{body}") } else { body }
    }
}

/// Width or precision; at most two digits.
fn digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> LuaResult<usize> {
    let mut n = 0;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = n * 10 + d as usize;
        if n > MAX_FORMAT_WIDTH {
            return Err(LuaError::argument("invalid conversion to 'format' (width or precision too long)"));
        }
        chars.next();
    }
    Ok(n)
}

/// `%g`: integral values print without a fraction, others at the
/// requested number of significant digits.
fn general(n: f64, precision: Option<usize>) -> String {
    match precision {
        None => format_number(n),
        Some(p) => {
            let p = p.max(1);
            let magnitude = if n == 0.0 { 0 } else { n.abs().log10().floor() as i32 };
            if magnitude < -4 || magnitude >= p as i32 {
                format!("{:.*e}", p - 1, n)
            } else {
                let decimals = (p as i32 - 1 - magnitude).max(0) as usize;
                let text = format!("{n:.decimals$}");
                if text.contains('.') {
                    text.trim_end_matches('0').trim_end_matches('.').to_string()
                } else {
                    text
                }
            }
        }
    }
}

fn format(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let template = check_string(&args, 0, "format")?;
    let mut out = String::with_capacity(template.len());
    let mut next = 1;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        let directive = Directive::parse(&mut chars)?;
        let index = next;
        next += 1;
        if index >= args.len() {
            return Err(LuaError::bad_argument(index + 1, "format", "value", "no value"));
        }
        let body = match directive.conversion {
            's' => {
                let s = args[index].to_string();
                match directive.precision {
                    Some(p) => s.chars().take(p).collect(),
                    None => s,
                }
            }
            'q' => quote_string(&check_string(&args, index, "format")?),
            'd' | 'i' => directive.signed(check_integer(&args, index, "format")?.to_string()),
            'x' => format!("{:x}", check_integer(&args, index, "format")?),
            'X' => format!("{:X}", check_integer(&args, index, "format")?),
            'f' => {
                let n = super::check_number(&args, index, "format")?;
                directive.signed(format!("{n:.*}", directive.precision.unwrap_or(6)))
            }
            'g' => directive.signed(general(super::check_number(&args, index, "format")?, directive.precision)),
            other => {
                return Err(LuaError::argument(format!("invalid conversion '%{other}' to 'format'")));
            }
        };
        out.push_str(&directive.pad(body));
    }
    Ok(MultiValue::one(out))
}
