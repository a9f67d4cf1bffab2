//! The `FormatValue` instruction: conversions and format specifiers.
//!
//! Supports the format-spec subset needed for f-string style output:
//! `[[fill]align][sign][0][width][.precision][type]` with the `d`, `f`,
//! and `s` presentation types.

use super::Vm;
use crate::{
    bytecode::code::Conversion,
    fault::RunResult,
    tracer::VmTracer,
    value::{Value, float_repr, py_ascii, py_repr, py_str},
};

/// What a format spec is applied to.
enum FormatOperand {
    Str(String),
    Int(i64),
    Float(f64),
}

impl<Tr: VmTracer> Vm<'_, Tr> {
    pub(super) fn format_value(&mut self, conversion: Option<Conversion>, has_spec: bool) -> RunResult<()> {
        let spec = if has_spec {
            let value = self.pop()?;
            match value.as_str(self.heap, self.interns) {
                Some(s) => s.to_owned(),
                None => return Err(self.type_fault("format spec must be a string")),
            }
        } else {
            String::new()
        };
        let value = self.pop()?;

        let converted = match conversion {
            Some(Conversion::Str) => Some(py_str(&value, self.heap, self.interns)),
            Some(Conversion::Repr) => Some(py_repr(&value, self.heap, self.interns)),
            Some(Conversion::Ascii) => Some(py_ascii(&value, self.heap, self.interns)),
            None => None,
        };

        let out = if spec.is_empty() {
            converted.unwrap_or_else(|| py_str(&value, self.heap, self.interns))
        } else {
            let operand = match converted {
                Some(text) => FormatOperand::Str(text),
                None => self.format_operand(&value),
            };
            apply_spec(&operand, &spec).map_err(|msg| self.type_fault(msg))?
        };

        let result = self.heap.allocate_str(out);
        self.push(result);
        Ok(())
    }

    fn format_operand(&self, value: &Value) -> FormatOperand {
        match value {
            Value::Bool(b) => FormatOperand::Int(i64::from(*b)),
            Value::Int(i) => FormatOperand::Int(*i),
            Value::Float(x) => FormatOperand::Float(*x),
            _ => FormatOperand::Str(py_str(value, self.heap, self.interns)),
        }
    }
}

#[derive(Default)]
struct Spec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    kind: Option<char>,
}

fn parse_spec(spec: &str) -> Result<Spec, String> {
    let chars: Vec<char> = spec.chars().collect();
    let mut out = Spec::default();
    let mut i = 0;

    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^') {
        out.fill = Some(chars[0]);
        out.align = Some(chars[1]);
        i = 2;
    } else if !chars.is_empty() && matches!(chars[0], '<' | '>' | '^') {
        out.align = Some(chars[0]);
        i = 1;
    }

    if i < chars.len() && matches!(chars[i], '+' | '-' | ' ') {
        out.sign = Some(chars[i]);
        i += 1;
    }

    if i < chars.len() && chars[i] == '0' {
        out.zero = true;
        i += 1;
    }

    let mut width = String::new();
    while i < chars.len() && chars[i].is_ascii_digit() {
        width.push(chars[i]);
        i += 1;
    }
    if !width.is_empty() {
        out.width = width.parse().map_err(|_| "invalid width in format spec".to_owned())?;
    }

    if i < chars.len() && chars[i] == '.' {
        i += 1;
        let mut precision = String::new();
        while i < chars.len() && chars[i].is_ascii_digit() {
            precision.push(chars[i]);
            i += 1;
        }
        if precision.is_empty() {
            return Err("format spec missing precision after '.'".to_owned());
        }
        out.precision = Some(
            precision
                .parse()
                .map_err(|_| "invalid precision in format spec".to_owned())?,
        );
    }

    if i < chars.len() {
        if i + 1 != chars.len() {
            return Err(format!("invalid format spec '{spec}'"));
        }
        out.kind = Some(chars[i]);
        i += 1;
    }
    debug_assert_eq!(i, chars.len());
    Ok(out)
}

fn apply_spec(operand: &FormatOperand, spec: &str) -> Result<String, String> {
    let spec = parse_spec(spec)?;

    let (body, numeric) = match (operand, spec.kind) {
        (FormatOperand::Int(i), None | Some('d')) => (i.to_string(), true),
        (FormatOperand::Int(i), Some('f')) => {
            (format!("{:.*}", spec.precision.unwrap_or(6), *i as f64), true)
        }
        (FormatOperand::Float(x), None) => match spec.precision {
            Some(precision) => (format!("{x:.precision$}"), true),
            None => (float_repr(*x), true),
        },
        (FormatOperand::Float(x), Some('f')) => (format!("{:.*}", spec.precision.unwrap_or(6), x), true),
        (FormatOperand::Str(s), None | Some('s')) => {
            let text = match spec.precision {
                Some(precision) => s.chars().take(precision).collect(),
                None => s.clone(),
            };
            (text, false)
        }
        (FormatOperand::Str(_), Some(kind)) => {
            return Err(format!("unknown format code '{kind}' for object of type 'str'"));
        }
        (_, Some(kind)) => {
            return Err(format!("unknown format code '{kind}' for numeric object"));
        }
    };

    // Apply the sign option to non-negative numbers.
    let body = if numeric && !body.starts_with('-') {
        match spec.sign {
            Some('+') => format!("+{body}"),
            Some(' ') => format!(" {body}"),
            _ => body,
        }
    } else {
        body
    };

    let current = body.chars().count();
    if current >= spec.width {
        return Ok(body);
    }
    let pad = spec.width - current;

    // Zero padding goes between the sign and the digits.
    if numeric && spec.zero && spec.align.is_none() {
        let (sign, digits) = match body.strip_prefix(['-', '+', ' ']) {
            Some(rest) => (body[..1].to_owned(), rest.to_owned()),
            None => (String::new(), body),
        };
        return Ok(format!("{sign}{}{digits}", "0".repeat(pad)));
    }

    let fill = spec.fill.unwrap_or(' ');
    let align = spec.align.unwrap_or(if numeric { '>' } else { '<' });
    let out = match align {
        '>' => format!("{}{body}", fill.to_string().repeat(pad)),
        '^' => {
            let left = pad / 2;
            let right = pad - left;
            format!(
                "{}{body}{}",
                fill.to_string().repeat(left),
                fill.to_string().repeat(right)
            )
        }
        _ => format!("{body}{}", fill.to_string().repeat(pad)),
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_specs() {
        assert_eq!(apply_spec(&FormatOperand::Int(42), "5d").unwrap(), "   42");
        assert_eq!(apply_spec(&FormatOperand::Int(42), "05d").unwrap(), "00042");
        assert_eq!(apply_spec(&FormatOperand::Int(-42), "05d").unwrap(), "-0042");
        assert_eq!(apply_spec(&FormatOperand::Int(42), "+d").unwrap(), "+42");
        assert_eq!(apply_spec(&FormatOperand::Float(3.14159), ".2f").unwrap(), "3.14");
    }

    #[test]
    fn string_specs() {
        assert_eq!(apply_spec(&FormatOperand::Str("ab".to_owned()), "5").unwrap(), "ab   ");
        assert_eq!(apply_spec(&FormatOperand::Str("ab".to_owned()), ">5").unwrap(), "   ab");
        assert_eq!(apply_spec(&FormatOperand::Str("ab".to_owned()), "*^6").unwrap(), "**ab**");
        assert_eq!(apply_spec(&FormatOperand::Str("abcdef".to_owned()), ".3").unwrap(), "abc");
    }

    #[test]
    fn bad_specs_are_rejected() {
        assert!(apply_spec(&FormatOperand::Str("x".to_owned()), "d").is_err());
        assert!(apply_spec(&FormatOperand::Int(1), "q").is_err());
    }
}
