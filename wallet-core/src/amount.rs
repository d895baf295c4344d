use std::cmp::Ordering;
use std::fmt;

use crate::currency::Currency;
use crate::errors::{WalletError, WalletResult};
use crate::handle::{Handle, NativeResource};
use crate::unit::Unit;

/// A signed quantity of a currency.
///
/// The value is held exactly as a sign and a magnitude in the currency's base
/// unit; the denominating unit only affects construction and display.
#[derive(Debug)]
pub struct Amount {
    unit: Handle<Unit>,
    negative: bool,
    magnitude: u128,
}

impl NativeResource for Amount {
    const KIND: &'static str = "amount";
}

impl Amount {
    /// Exact base-unit constructor used by the engine boundary.
    pub fn from_base_units(
        magnitude: u128,
        negative: bool,
        unit: &Handle<Unit>,
    ) -> Handle<Amount> {
        Handle::new(Amount {
            unit: unit.take(),
            negative: negative && magnitude != 0,
            magnitude,
        })
    }

    /// `value` whole units of `unit`, e.g. `create_integer(2, &btc)` is 200,000,000 sat.
    pub fn create_integer(value: i64, unit: &Handle<Unit>) -> WalletResult<Handle<Amount>> {
        let magnitude = (value.unsigned_abs() as u128)
            .checked_mul(unit.scale_factor())
            .ok_or_else(|| overflow(&value.to_string(), unit))?;
        Ok(Self::from_base_units(magnitude, value < 0, unit))
    }

    /// Rounds to the nearest base unit.
    pub fn create_double(value: f64, unit: &Handle<Unit>) -> WalletResult<Handle<Amount>> {
        if !value.is_finite() {
            return Err(WalletError::InvalidAmount(format!(
                "{} is not a finite number",
                value
            )));
        }

        let scaled = (value.abs() * unit.scale_factor() as f64).round();
        if scaled >= u128::MAX as f64 {
            return Err(overflow(&value.to_string(), unit));
        }
        Ok(Self::from_base_units(scaled as u128, value < 0.0, unit))
    }

    /// Parse a decimal string such as `"-0.0015"` expressed in `unit`.
    ///
    /// The string may not carry more fractional digits than the unit's decimals.
    pub fn create_string(value: &str, unit: &Handle<Unit>) -> WalletResult<Handle<Amount>> {
        let trimmed = value.trim();
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(WalletError::InvalidAmount(format!(
                "'{}' has no digits",
                value
            )));
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(WalletError::InvalidAmount(format!(
                "'{}' is not a decimal number",
                value
            )));
        }

        let decimals = unit.decimals() as usize;
        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > decimals {
            return Err(WalletError::InvalidAmount(format!(
                "'{}' is more precise than {} allows",
                value,
                unit.name()
            )));
        }

        // Whole digits followed by the fraction right-padded to the unit's decimals
        let mut base_digits = String::with_capacity(whole.len() + decimals);
        base_digits.push_str(whole);
        base_digits.push_str(fraction);
        base_digits.extend(std::iter::repeat('0').take(decimals - fraction.len()));

        let trimmed_digits = base_digits.trim_start_matches('0');
        let magnitude = if trimmed_digits.is_empty() {
            0
        } else {
            trimmed_digits
                .parse::<u128>()
                .map_err(|_| overflow(value, unit))?
        };

        Ok(Self::from_base_units(magnitude, negative, unit))
    }

    pub fn unit(&self) -> &Handle<Unit> {
        &self.unit
    }

    pub fn currency(&self) -> &Handle<Currency> {
        self.unit.currency()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude == 0
    }

    /// Absolute value in the currency's base unit.
    pub fn base_units(&self) -> u128 {
        self.magnitude
    }

    pub fn is_compatible(&self, other: &Amount) -> bool {
        self.unit.is_compatible(&other.unit)
    }

    /// Order two amounts of the same currency.
    pub fn compare(&self, other: &Amount) -> WalletResult<Ordering> {
        self.ensure_compatible(&other.unit)?;
        Ok(signed_cmp(
            (self.negative, self.magnitude),
            (other.negative, other.magnitude),
        ))
    }

    /// Sum, denominated in this amount's unit.
    pub fn add(&self, other: &Amount) -> WalletResult<Handle<Amount>> {
        self.ensure_compatible(&other.unit)?;
        let (negative, magnitude) = signed_add(
            (self.negative, self.magnitude),
            (other.negative, other.magnitude),
        )
        .ok_or_else(|| WalletError::InvalidAmount("addition overflow".to_string()))?;
        Ok(Self::from_base_units(magnitude, negative, &self.unit))
    }

    /// Difference, denominated in this amount's unit.
    pub fn sub(&self, other: &Amount) -> WalletResult<Handle<Amount>> {
        self.ensure_compatible(&other.unit)?;
        let (negative, magnitude) = signed_add(
            (self.negative, self.magnitude),
            (!other.negative, other.magnitude),
        )
        .ok_or_else(|| WalletError::InvalidAmount("subtraction overflow".to_string()))?;
        Ok(Self::from_base_units(magnitude, negative, &self.unit))
    }

    pub fn negate(&self) -> Handle<Amount> {
        Self::from_base_units(self.magnitude, !self.negative, &self.unit)
    }

    /// Same value, denominated in `unit`.
    pub fn convert(&self, unit: &Handle<Unit>) -> WalletResult<Handle<Amount>> {
        self.ensure_compatible(unit)?;
        Ok(Self::from_base_units(self.magnitude, self.negative, unit))
    }

    /// Approximate value in `unit`; use [`Amount::string_in_unit`] when exactness matters.
    pub fn double_in_unit(&self, unit: &Unit) -> WalletResult<f64> {
        self.ensure_compatible(unit)?;
        let value = self.magnitude as f64 / unit.scale_factor() as f64;
        Ok(if self.negative { -value } else { value })
    }

    /// Exact decimal rendering in `unit` without trailing fractional zeros.
    pub fn string_in_unit(&self, unit: &Unit) -> WalletResult<String> {
        self.ensure_compatible(unit)?;
        let scale = unit.scale_factor();
        let whole = self.magnitude / scale;
        let remainder = self.magnitude % scale;

        let mut rendered = String::new();
        if self.negative {
            rendered.push('-');
        }
        rendered.push_str(&whole.to_string());
        if remainder != 0 {
            let fraction = format!("{:0width$}", remainder, width = unit.decimals() as usize);
            rendered.push('.');
            rendered.push_str(fraction.trim_end_matches('0'));
        }
        Ok(rendered)
    }

    fn ensure_compatible(&self, unit: &Unit) -> WalletResult<()> {
        if self.unit.is_compatible(unit) {
            Ok(())
        } else {
            Err(WalletError::CurrencyMismatch(format!(
                "amount in {} used with unit of {}",
                self.unit.currency().code(),
                unit.currency().code()
            )))
        }
    }
}

impl PartialEq for Amount {
    /// Equal when both denominate the same currency and hold the same base-unit value.
    fn eq(&self, other: &Self) -> bool {
        self.is_compatible(other)
            && self.negative == other.negative
            && self.magnitude == other.magnitude
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.string_in_unit(&self.unit) {
            Ok(value) => write!(f, "{} {}", value, self.unit.symbol()),
            Err(_) => write!(f, "{} base units", self.magnitude),
        }
    }
}

fn overflow(value: &str, unit: &Unit) -> WalletError {
    WalletError::InvalidAmount(format!(
        "{} {} does not fit in base units",
        value,
        unit.symbol()
    ))
}

fn signed_cmp(a: (bool, u128), b: (bool, u128)) -> Ordering {
    match (a.0, b.0) {
        (false, false) => a.1.cmp(&b.1),
        (true, true) => b.1.cmp(&a.1),
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
    }
}

fn signed_add(a: (bool, u128), b: (bool, u128)) -> Option<(bool, u128)> {
    if a.0 == b.0 {
        return a.1.checked_add(b.1).map(|sum| (a.0, sum));
    }
    if a.1 >= b.1 {
        Some((a.0, a.1 - b.1))
    } else {
        Some((b.0, b.1 - a.1))
    }
}
