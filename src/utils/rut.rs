use std::fmt;
use std::str::FromStr;

use derive_more::Display;

/// Chilean RUT: numeric body plus modulo-11 check digit (`0`-`9` or `K`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rut {
    body: u32,
    dv: char,
}

#[derive(Debug, Display, PartialEq)]
pub enum RutError {
    #[display(fmt = "RUT is empty")]
    Empty,

    #[display(fmt = "RUT '{}' is malformed", _0)]
    Malformed(String),

    #[display(fmt = "RUT '{}' has a wrong check digit", _0)]
    CheckDigit(String),
}

impl std::error::Error for RutError {}

impl Rut {
    pub fn body(&self) -> u32 {
        self.body
    }

    /// `12.345.678-5` style, as printed on documents.
    pub fn dotted(&self) -> String {
        let digits = self.body.to_string();
        let mut out = String::with_capacity(digits.len() + 4);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push('.');
            }
            out.push(c);
        }
        format!("{}-{}", out, self.dv)
    }
}

pub fn check_digit(body: u32) -> char {
    let mut sum = 0u32;
    let mut factor = 2u32;
    let mut n = body;
    while n > 0 {
        sum += (n % 10) * factor;
        n /= 10;
        factor = if factor == 7 { 2 } else { factor + 1 };
    }
    match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        d => char::from_digit(d, 10).unwrap_or('0'),
    }
}

impl FromStr for Rut {
    type Err = RutError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let cleaned: String = raw
            .chars()
            .filter(|c| !matches!(c, '.' | ' ' | '-'))
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if cleaned.is_empty() {
            return Err(RutError::Empty);
        }
        if cleaned.len() < 2 || !cleaned.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RutError::Malformed(raw.to_string()));
        }

        let (body, dv) = cleaned.split_at(cleaned.len() - 1);
        let body: u32 = body
            .parse()
            .map_err(|_| RutError::Malformed(raw.to_string()))?;
        let dv = dv.chars().next().ok_or_else(|| RutError::Malformed(raw.to_string()))?;

        if check_digit(body) != dv {
            return Err(RutError::CheckDigit(raw.to_string()));
        }

        Ok(Rut { body, dv })
    }
}

/// Normalized storage form `body-dv`, no dots.
impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.body, self.dv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_spellings() {
        let a: Rut = "12.345.678-5".parse().unwrap();
        let b: Rut = "123456785".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "12345678-5");
        assert_eq!(a.dotted(), "12.345.678-5");
    }

    #[test]
    fn k_and_zero_check_digits() {
        assert_eq!(check_digit(6), 'K');
        assert!("6-k".parse::<Rut>().is_ok());
        assert_eq!(check_digit(11_111_111), '1');
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!("".parse::<Rut>(), Err(RutError::Empty));
        assert!(matches!("12.345.678-4".parse::<Rut>(), Err(RutError::CheckDigit(_))));
        assert!(matches!("ab-c".parse::<Rut>(), Err(RutError::Malformed(_))));
    }

    #[test]
    fn non_ascii_input_is_malformed() {
        assert!(matches!("12345678Ñ".parse::<Rut>(), Err(RutError::Malformed(_))));
        assert!(matches!("12.345.678-é".parse::<Rut>(), Err(RutError::Malformed(_))));
        assert!(matches!("Ñ".parse::<Rut>(), Err(RutError::Malformed(_))));
    }
}
