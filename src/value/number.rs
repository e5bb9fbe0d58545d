use std::{cmp::Ordering, fmt};

use super::{
    blame::Blame,
    callable::{Arguments, Arity, Method},
    Value,
};

const FRACTION_DIGITS: usize = 14;

/// Integer-or-float numeric value.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_whole(self) -> bool {
        match self {
            Number::Int(_) => true,
            Number::Float(f) => f.is_finite() && f.fract() == 0.0,
        }
    }

    /// The integer value of a whole number.
    pub fn to_whole(self) -> Option<i64> {
        match self {
            Number::Int(n) => Some(n),
            Number::Float(f) if self.is_whole() && f.abs() < i64::MAX as f64 => Some(f as i64),
            Number::Float(_) => None,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(n) => n == 0,
            Number::Float(f) => f == 0.0,
        }
    }

    pub fn is_truthy(self) -> bool {
        !self.is_zero()
    }

    fn combine(
        self,
        rhs: Number,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => match int_op(a, b) {
                Some(n) => Number::Int(n),
                None => Number::Float(float_op(a as f64, b as f64)),
            },
            _ => Number::Float(float_op(self.as_f64(), rhs.as_f64())),
        }
    }

    pub fn add(self, rhs: Number) -> Number {
        self.combine(rhs, i64::checked_add, |a, b| a + b)
    }

    pub fn sub(self, rhs: Number) -> Number {
        self.combine(rhs, i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(self, rhs: Number) -> Number {
        self.combine(rhs, i64::checked_mul, |a, b| a * b)
    }

    /// Integer division stays integral only when it is exact.
    pub fn div(self, rhs: Number) -> Result<Number, Blame> {
        if rhs.is_zero() {
            return Err(Blame::message("Division by zero"));
        }
        Ok(self.combine(
            rhs,
            |a, b| {
                if a.checked_rem(b)? == 0 {
                    a.checked_div(b)
                } else {
                    None
                }
            },
            |a, b| a / b,
        ))
    }

    /// Floor-style modulo: never negative on the integer path.
    pub fn rem(self, rhs: Number) -> Result<Number, Blame> {
        if rhs.is_zero() {
            return Err(Blame::message("Division by zero"));
        }
        Ok(self.combine(rhs, i64::checked_rem_euclid, |a, b| a % b))
    }

    /// Modulo whose sign follows the dividend.
    pub fn signed_rem(self, rhs: Number) -> Result<Number, Blame> {
        if rhs.is_zero() {
            return Err(Blame::message("Division by zero"));
        }
        Ok(self.combine(rhs, i64::checked_rem, |a, b| a % b))
    }

    pub fn neg(self) -> Number {
        match self {
            Number::Int(n) => n
                .checked_neg()
                .map_or(Number::Float(-(n as f64)), Number::Int),
            Number::Float(f) => Number::Float(-f),
        }
    }

    pub fn abs(self) -> Number {
        match self {
            Number::Int(n) => n
                .checked_abs()
                .map_or(Number::Float((n as f64).abs()), Number::Int),
            Number::Float(f) => Number::Float(f.abs()),
        }
    }

    pub fn floor(self) -> Number {
        match self {
            Number::Int(_) => self,
            Number::Float(f) => Number::from_float(f.floor()),
        }
    }

    pub fn ceil(self) -> Number {
        match self {
            Number::Int(_) => self,
            Number::Float(f) => Number::from_float(f.ceil()),
        }
    }

    /// An integer when the float is whole and fits, otherwise the float.
    pub fn from_float(f: f64) -> Number {
        let number = Number::Float(f);
        number.to_whole().map_or(number, Number::Int)
    }

    pub fn equals(self, rhs: Number) -> bool {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => a == b,
            _ => self.as_f64() == rhs.as_f64(),
        }
    }

    pub fn compare(self, rhs: Number) -> Option<Ordering> {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            _ => self.as_f64().partial_cmp(&rhs.as_f64()),
        }
    }

    /// Parses an optionally negative decimal such as `-12` or `3.25`.
    pub fn parse(text: &[u8]) -> Option<Number> {
        let digits = text.strip_prefix(b"-").unwrap_or(text);
        let dots = digits.iter().filter(|&&byte| byte == b'.').count();
        let valid = !digits.is_empty()
            && digits != b"."
            && dots <= 1
            && digits.iter().all(|&byte| byte.is_ascii_digit() || byte == b'.');
        if !valid {
            return None;
        }

        let text = std::str::from_utf8(text).ok()?;
        if dots == 0 {
            if let Ok(n) = text.parse::<i64>() {
                return Some(Number::Int(n));
            }
        }
        text.parse::<f64>().ok().map(Number::Float)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(value) if !value.is_finite() => write!(f, "{value}"),
            Number::Float(value) => {
                if let Some(whole) = Number::Float(value).to_whole() {
                    return write!(f, "{whole}");
                }
                let text = format!("{:.*}", FRACTION_DIGITS, value);
                let text = text.trim_end_matches('0').trim_end_matches('.');
                match text {
                    "-0" => write!(f, "0"),
                    _ => write!(f, "{text}"),
                }
            }
        }
    }
}

pub static METHODS: [Method<Number>; 5] = [
    Method::new("signedMod", Arity::exact(1), signed_mod),
    Method::new("isWhole", Arity::exact(0), is_whole),
    Method::new("floor", Arity::exact(0), floor),
    Method::new("ceil", Arity::exact(0), ceil),
    Method::new("abs", Arity::exact(0), abs),
];

fn signed_mod(this: &Number, args: &Arguments) -> Result<Value, Blame> {
    let divisor = args.number(0)?;
    this.signed_rem(divisor)
        .map(Value::number)
        .map_err(|blame| args.locate(0, blame))
}

fn is_whole(this: &Number, _: &Arguments) -> Result<Value, Blame> {
    Ok(Value::bool(this.is_whole()))
}

fn floor(this: &Number, _: &Arguments) -> Result<Value, Blame> {
    Ok(Value::number(this.floor()))
}

fn ceil(this: &Number, _: &Arguments) -> Result<Value, Blame> {
    Ok(Value::number(this.ceil()))
}

fn abs(this: &Number, _: &Arguments) -> Result<Value, Blame> {
    Ok(Value::number(this.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_division_is_exact_or_float() {
        assert!(matches!(
            Number::Int(6).div(Number::Int(3)),
            Ok(Number::Int(2))
        ));
        assert!(matches!(
            Number::Int(7).div(Number::Int(2)),
            Ok(Number::Float(f)) if f == 3.5
        ));
        assert!(Number::Int(1).div(Number::Int(0)).is_err());
    }

    #[test]
    fn modulo_is_floor_style_and_signed_mod_follows_dividend() {
        assert!(matches!(Number::Int(-7).rem(Number::Int(3)), Ok(Number::Int(2))));
        assert!(matches!(
            Number::Int(-7).signed_rem(Number::Int(3)),
            Ok(Number::Int(-1))
        ));
    }

    #[test]
    fn floats_print_trimmed() {
        assert_eq!(Number::Float(2.5).to_string(), "2.5");
        assert_eq!(Number::Float(4.0).to_string(), "4");
        assert_eq!(Number::Float(0.1 + 0.2).to_string(), "0.3");
        assert_eq!(Number::Float(-0.25).to_string(), "-0.25");
    }

    #[test]
    fn parses_numeric_strings() {
        assert!(matches!(Number::parse(b"-12"), Some(Number::Int(-12))));
        assert!(matches!(Number::parse(b"3.25"), Some(Number::Float(f)) if f == 3.25));
        assert!(Number::parse(b"").is_none());
        assert!(Number::parse(b"-").is_none());
        assert!(Number::parse(b"1.2.3").is_none());
        assert!(Number::parse(b"12a").is_none());
    }

    #[test]
    fn overflow_promotes_to_float() {
        assert!(matches!(Number::Int(i64::MAX).add(Number::Int(1)), Number::Float(_)));
    }
}
