//! Exact rational treatment of JSON numbers.
//!
//! Every number that reaches the compiler or the validator is converted from
//! its preserved decimal text into a `BigFraction`. Floating point never
//! enters the picture, so `multipleOf: 0.0001` and huge integer bounds behave
//! exactly as the standard test suite expects.
use fraction::{BigFraction, BigUint};
use serde_json::{Number, Value};

pub(crate) fn zero() -> BigFraction {
    BigFraction::new(0_u8, 1_u8)
}

fn one_big() -> BigUint {
    BigUint::from(1_u8)
}

fn pow10(exponent: u64) -> BigUint {
    let ten = BigUint::from(10_u8);
    let mut result = one_big();
    for _ in 0..exponent {
        result *= &ten;
    }
    result
}

/// Parse the preserved decimal text of `number` into an exact rational.
pub(crate) fn to_fraction(number: &Number) -> BigFraction {
    parse_decimal(&number.to_string())
}

// The literal always matches the JSON number grammar:
// `-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?`
fn parse_decimal(literal: &str) -> BigFraction {
    let (negative, unsigned) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal),
    };
    let (mantissa, exponent) = match unsigned.split_once(&['e', 'E'][..]) {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i64>().unwrap_or(0)),
        None => (unsigned, 0_i64),
    };
    let (integer_digits, fraction_digits) = match mantissa.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (mantissa, ""),
    };

    let ten = BigUint::from(10_u8);
    let mut numer = BigUint::from(0_u8);
    for digit in integer_digits.bytes().chain(fraction_digits.bytes()) {
        numer = numer * &ten + BigUint::from(digit - b'0');
    }

    let scale = exponent - fraction_digits.len() as i64;
    let (numer, denom) = if scale >= 0 {
        (numer * pow10(scale as u64), one_big())
    } else {
        (numer, pow10(scale.unsigned_abs()))
    };

    let fraction = BigFraction::new(numer, denom);
    if negative {
        -fraction
    } else {
        fraction
    }
}

/// A JSON number is an integer iff its exact rational form has denominator 1.
/// This treats `1.0` and `1e2` as integers, which is what drafts 6/7 require.
pub(crate) fn is_integer(number: &Number) -> bool {
    number.is_u64() || number.is_i64() || is_integer_fraction(&to_fraction(number))
}

pub(crate) fn is_integer_fraction(fraction: &BigFraction) -> bool {
    fraction.denom() == Some(&one_big())
}

/// Interpret `number` as a non-negative integer count (for `minLength`,
/// `maxItems` and friends). `2.0` qualifies, `2.5` and `-2` do not.
pub(crate) fn as_nonneg_integer(number: &Number) -> Option<u64> {
    if let Some(value) = number.as_u64() {
        return Some(value);
    }
    let fraction = to_fraction(number);
    if !is_integer_fraction(&fraction) || fraction < zero() {
        return None;
    }
    fraction.numer().and_then(|numer| u64::try_from(numer).ok())
}

/// Decimal rendering when the fraction terminates, the reduced `n/d` form
/// otherwise. Used in error descriptions.
pub(crate) fn decimal_string(fraction: &BigFraction) -> String {
    let (numer, denom) = match (fraction.numer(), fraction.denom()) {
        (Some(numer), Some(denom)) => (numer, denom),
        _ => return fraction.to_string(),
    };
    let two = BigUint::from(2_u8);
    let five = BigUint::from(5_u8);
    let none = BigUint::from(0_u8);
    let one = one_big();

    let mut twos = 0_u64;
    let mut fives = 0_u64;
    let mut rest = denom.clone();
    while &rest % &two == none {
        rest = &rest / &two;
        twos += 1;
    }
    while &rest % &five == none {
        rest = &rest / &five;
        fives += 1;
    }
    if rest != one {
        return fraction.to_string();
    }

    let scale = twos.max(fives);
    let mut scaled = numer.clone();
    for _ in 0..(scale - twos) {
        scaled *= &two;
    }
    for _ in 0..(scale - fives) {
        scaled *= &five;
    }

    let sign = if *fraction < zero() { "-" } else { "" };
    let digits = scaled.to_string();
    if scale == 0 {
        return format!("{}{}", sign, digits);
    }
    let scale = scale as usize;
    if digits.len() <= scale {
        format!("{}0.{}{}", sign, "0".repeat(scale - digits.len()), digits)
    } else {
        let (integer, fraction) = digits.split_at(digits.len() - scale);
        format!("{}{}.{}", sign, integer, fraction)
    }
}

/// Stringification used for `enum`/`const`/`uniqueItems` equality. Numbers
/// collapse to their reduced rational form, so `1`, `1.0` and `1e0` agree;
/// object keys are already sorted by the underlying map.
pub(crate) fn canonical_string(value: &Value) -> String {
    let mut rendered = String::new();
    write_canonical(value, &mut rendered);
    rendered
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(number) => out.push_str(&to_fraction(number).to_string()),
        Value::String(item) => {
            out.push_str(&serde_json::to_string(item).expect("strings are always serialisable"));
        }
        Value::Array(items) => {
            out.push('[');
            for (position, item) in items.iter().enumerate() {
                if position > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(object) => {
            out.push('{');
            for (position, (key, item)) in object.iter().enumerate() {
                if position > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).expect("strings are always serialisable"));
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn number(literal: &str) -> Number {
        match serde_json::from_str(literal).expect("valid JSON number") {
            Value::Number(number) => number,
            _ => panic!("not a number"),
        }
    }

    #[test_case("1", "1.0" ; "integer and trailing zero")]
    #[test_case("0.5", "5e-1" ; "decimal and exponent")]
    #[test_case("100", "1e2" ; "integer exponent")]
    #[test_case("-2.5", "-25e-1" ; "negative")]
    fn equivalent_literals(left: &str, right: &str) {
        assert_eq!(
            to_fraction(&number(left)),
            to_fraction(&number(right)),
            "{} should equal {}",
            left,
            right
        );
    }

    #[test_case("1.0", true)]
    #[test_case("1e2", true)]
    #[test_case("2.5", false)]
    #[test_case("-3", true)]
    fn integer_detection(literal: &str, expected: bool) {
        assert_eq!(is_integer(&number(literal)), expected);
    }

    #[test_case("2.0", Some(2))]
    #[test_case("0", Some(0))]
    #[test_case("-1", None)]
    #[test_case("2.5", None)]
    fn nonneg_integer(literal: &str, expected: Option<u64>) {
        assert_eq!(as_nonneg_integer(&number(literal)), expected);
    }

    #[test_case("2.5", "2.5")]
    #[test_case("0.0001", "0.0001")]
    #[test_case("-12", "-12")]
    #[test_case("1e3", "1000")]
    fn decimal_rendering(literal: &str, expected: &str) {
        assert_eq!(decimal_string(&to_fraction(&number(literal))), expected);
    }

    #[test]
    fn canonical_collapses_number_forms() {
        assert_eq!(canonical_string(&json!(1)), canonical_string(&json!(1.0)));
        assert_eq!(
            canonical_string(&json!({"a": [1.0]})),
            canonical_string(&json!({"a": [1]}))
        );
        assert_ne!(canonical_string(&json!(1)), canonical_string(&json!("1")));
    }
}
