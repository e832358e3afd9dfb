//! `std::bigint`/`std::decimal` wire representation: base-10000 digit
//! groups with a sign and a weight, matching the server's numeric codec.

/// An arbitrary precision integer, decoded into base-10000 digit groups.
#[derive(Clone, Debug, PartialEq)]
pub struct BigInt {
    pub(crate) negative: bool,
    pub(crate) weight: i16,
    pub(crate) digits: Vec<u16>,
}

/// An arbitrary precision decimal, decoded into base-10000 digit groups
/// plus a count of digits after the decimal point.
#[derive(Clone, Debug, PartialEq)]
pub struct Decimal {
    pub(crate) negative: bool,
    pub(crate) weight: i16,
    pub(crate) decimal_digits: u16,
    pub(crate) digits: Vec<u16>,
}

impl BigInt {
    fn normalize(mut self) -> BigInt {
        while let Some(0) = self.digits.last() {
            self.digits.pop();
        }
        while let Some(0) = self.digits.first() {
            self.digits.remove(0);
            self.weight -= 1;
        }
        self
    }

    fn trailing_zero_groups(&self) -> i16 {
        self.weight - self.digits.len() as i16 + 1
    }
}

impl std::fmt::Display for BigInt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        if let Some(digit) = self.digits.first() {
            write!(f, "{}", digit)?;
            for digit in self.digits.iter().skip(1) {
                write!(f, "{:04}", digit)?;
            }
            let trailing_zero_groups = self.trailing_zero_groups();
            debug_assert!(trailing_zero_groups >= 0);
            for _ in 0..trailing_zero_groups {
                write!(f, "0000")?;
            }
        } else {
            write!(f, "0")?;
        }
        Ok(())
    }
}

macro_rules! from_unsigned {
    ($ty:ty, $weight:expr, $groups:expr) => {
        impl From<$ty> for BigInt {
            fn from(v: $ty) -> BigInt {
                let mut digits = Vec::with_capacity($groups);
                let mut rest = v as u64;
                for _ in 0..$groups {
                    digits.push((rest % 10000) as u16);
                    rest /= 10000;
                }
                digits.reverse();
                BigInt {
                    negative: false,
                    weight: $weight,
                    digits,
                }
                .normalize()
            }
        }
    };
}

macro_rules! from_signed {
    ($ty:ty, $unsigned:ty, $weight:expr, $groups:expr) => {
        impl From<$ty> for BigInt {
            fn from(v: $ty) -> BigInt {
                let (abs, negative) = if v < 0 {
                    (<$unsigned>::MAX - v as $unsigned + 1, true)
                } else {
                    (v as $unsigned, false)
                };
                let mut digits = Vec::with_capacity($groups);
                let mut rest = abs as u64;
                for _ in 0..$groups {
                    digits.push((rest % 10000) as u16);
                    rest /= 10000;
                }
                digits.reverse();
                BigInt {
                    negative,
                    weight: $weight,
                    digits,
                }
                .normalize()
            }
        }
    };
}

from_unsigned!(u32, 2, 3);
from_unsigned!(u64, 4, 5);
from_signed!(i32, u32, 2, 3);
from_signed!(i64, u64, 4, 5);

impl Decimal {
    #[allow(dead_code)]
    fn normalize(mut self) -> Decimal {
        while let Some(0) = self.digits.last() {
            self.digits.pop();
        }
        while let Some(0) = self.digits.first() {
            self.digits.remove(0);
            self.weight -= 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::BigInt;

    #[test]
    fn small_values_normalize_weight_to_zero() {
        assert_eq!(BigInt::from(125u32).weight, 0);
        assert_eq!(&BigInt::from(125u32).digits, &[125]);
    }

    #[test]
    fn display_round_trips_signed_integers() {
        for i in [0i64, 1, -1, 10_000, -10_000, 123_456_789, i64::MAX, i64::MIN] {
            assert_eq!(BigInt::from(i).to_string(), i.to_string());
        }
    }

    #[test]
    fn negative_values_keep_sign_separate_from_magnitude() {
        let n = BigInt::from(-30001i32);
        assert!(n.negative);
        assert_eq!(&n.digits, &[3, 1]);
    }
}
