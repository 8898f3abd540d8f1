//! Exact decimal multiplication.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use jobnode_core::{Adapter, AdapterError, AdapterInput};
use serde_json::{Map, Value};

/// Multiplies a numeric input by `times` and returns a decimal string.
///
/// Both operands may be JSON numbers or numeric strings. Arithmetic is exact
/// so that `"10583.75" * 100` yields `"1058375"`.
pub struct Multiply;

/// Largest fractional digit count a parsed operand may carry; `i128`
/// cannot hold more significant digits than this anyway.
const MAX_SCALE: i64 = 38;

/// `mantissa * 10^-scale`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Decimal {
    mantissa: i128,
    scale: u32,
}

impl FromStr for Decimal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("'{}' is not a number", s);
        let s = s.trim();
        let (number, exponent) = match s.find(['e', 'E']) {
            Some(pos) => (&s[..pos], s[pos + 1..].parse::<i32>().map_err(|_| invalid())?),
            None => (s, 0),
        };
        let (negative, digits) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number.strip_prefix('+').unwrap_or(number)),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let mut mantissa: i128 = 0;
        for c in int_part.chars().chain(frac_part.chars()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(c as u8 - b'0')))
                .ok_or_else(|| format!("'{}' is out of range", s))?;
        }

        let out_of_range = || format!("'{}' is out of range", s);
        if mantissa == 0 {
            return Ok(Self { mantissa: 0, scale: 0 });
        }

        let mut scale = frac_part.len() as i64 - i64::from(exponent);
        if scale > MAX_SCALE {
            return Err(out_of_range());
        }
        // Each step multiplies a non-zero mantissa by ten, so this overflows
        // within 39 iterations.
        while scale < 0 {
            mantissa = mantissa.checked_mul(10).ok_or_else(out_of_range)?;
            scale += 1;
        }
        let scale = u32::try_from(scale).map_err(|_| out_of_range())?;

        Ok(Self {
            mantissa: if negative { -mantissa } else { mantissa },
            scale,
        })
    }
}

impl Decimal {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Number(n) => n.to_string().parse(),
            Value::String(s) => s.parse(),
            other => Err(format!("{} is not a number", other)),
        }
    }

    fn checked_mul(self, other: Self) -> Option<Self> {
        Some(Self {
            mantissa: self.mantissa.checked_mul(other.mantissa)?,
            scale: self.scale.checked_add(other.scale)?,
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut mantissa = self.mantissa;
        let mut scale = self.scale;
        while scale > 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            scale -= 1;
        }

        let sign = if mantissa < 0 { "-" } else { "" };
        let digits = mantissa.unsigned_abs().to_string();
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        let scale = scale as usize;
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}

fn times(params: &Map<String, Value>) -> Result<Decimal, AdapterError> {
    let value = params
        .get("times")
        .ok_or_else(|| AdapterError::missing_param("times"))?;
    Decimal::from_value(value).map_err(|e| AdapterError::new(format!("times: {}", e)))
}

#[async_trait]
impl Adapter for Multiply {
    fn adapter_type(&self) -> &str {
        "Multiply"
    }

    fn validate(&self, params: &Map<String, Value>) -> Result<(), AdapterError> {
        times(params).map(|_| ())
    }

    async fn perform(&self, input: &AdapterInput) -> Result<Value, AdapterError> {
        let times = times(&input.params)?;
        let value = Decimal::from_value(&input.data).map_err(AdapterError::new)?;
        let product = value
            .checked_mul(times)
            .ok_or_else(|| AdapterError::new("Multiplication overflowed"))?;
        Ok(Value::String(product.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn multiply(data: Value, times: Value) -> Result<Value, AdapterError> {
        let mut params = Map::new();
        params.insert("times".to_string(), times);
        Multiply.perform(&AdapterInput::new(data, params)).await
    }

    #[tokio::test]
    async fn test_multiply_decimal_string() {
        assert_eq!(multiply(json!("10583.75"), json!(100)).await.unwrap(), json!("1058375"));
    }

    #[tokio::test]
    async fn test_multiply_keeps_fraction() {
        assert_eq!(multiply(json!("0.1"), json!(3)).await.unwrap(), json!("0.3"));
        assert_eq!(multiply(json!(-1.25), json!("0.5")).await.unwrap(), json!("-0.625"));
        assert_eq!(multiply(json!("0.05"), json!("0.1")).await.unwrap(), json!("0.005"));
    }

    #[tokio::test]
    async fn test_multiply_exponent_forms() {
        assert_eq!(multiply(json!("1e3"), json!(2)).await.unwrap(), json!("2000"));
        assert_eq!(multiply(json!("15E-1"), json!(2)).await.unwrap(), json!("3"));
    }

    #[tokio::test]
    async fn test_multiply_extreme_exponents() {
        assert_eq!(multiply(json!("0e2000000000"), json!(5)).await.unwrap(), json!("0"));
        assert_eq!(multiply(json!("-0.00e-99"), json!(5)).await.unwrap(), json!("0"));

        let err = multiply(json!("1e-2000000000"), json!(5)).await.unwrap_err();
        assert_eq!(err.to_string(), "'1e-2000000000' is out of range");
        assert!(multiply(json!("1e2000000000"), json!(5)).await.is_err());
        assert!(multiply(json!("1e-39"), json!(5)).await.is_err());
        assert_eq!(
            multiply(json!("1e-38"), json!(5)).await.unwrap(),
            json!("0.00000000000000000000000000000000000005")
        );
    }

    #[tokio::test]
    async fn test_multiply_rejects_non_numbers() {
        let err = multiply(json!("abc"), json!(2)).await.unwrap_err();
        assert_eq!(err.to_string(), "'abc' is not a number");
        assert!(multiply(json!(null), json!(2)).await.is_err());
    }

    #[test]
    fn test_validate_times() {
        let mut params = Map::new();
        assert_eq!(
            Multiply.validate(&params).unwrap_err().to_string(),
            "missing required param 'times'"
        );
        params.insert("times".to_string(), json!("x"));
        assert!(Multiply.validate(&params).is_err());
        params.insert("times".to_string(), json!(100));
        assert!(Multiply.validate(&params).is_ok());
    }
}
