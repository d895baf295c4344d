use std::fmt;

use crate::currency::Currency;
use crate::errors::{WalletError, WalletResult};
use crate::handle::{Handle, NativeResource};

/// Largest exponent whose power of ten still fits a `u128` base-unit value.
pub const MAX_DECIMALS: u8 = 38;

/// A denomination of a currency.
///
/// Every currency has exactly one base unit (its indivisible smallest
/// denomination); every other unit is `10^decimals` base units.
#[derive(Debug)]
pub struct Unit {
    currency: Handle<Currency>,
    uids: String,
    name: String,
    symbol: String,
    /// `None` for the base unit itself.
    base: Option<Handle<Unit>>,
    decimals: u8,
}

impl NativeResource for Unit {
    const KIND: &'static str = "unit";
}

impl Unit {
    /// Create the base unit of `currency`. The currency handle is borrowed;
    /// the unit keeps its own reference.
    pub fn create_as_base(
        currency: &Handle<Currency>,
        uids: &str,
        name: &str,
        symbol: &str,
    ) -> WalletResult<Handle<Unit>> {
        Ok(Handle::new(Unit {
            currency: currency.take(),
            uids: uids.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            base: None,
            decimals: 0,
        }))
    }

    /// Create a unit worth `10^decimals` of `base`.
    ///
    /// When `base` is itself derived, the new unit is expressed directly over
    /// the currency's base unit so every scale chain has length one.
    pub fn create(
        currency: &Handle<Currency>,
        uids: &str,
        name: &str,
        symbol: &str,
        base: &Handle<Unit>,
        decimals: u8,
    ) -> WalletResult<Handle<Unit>> {
        if !base.currency.is_identical(currency) {
            return Err(WalletError::CurrencyMismatch(format!(
                "unit '{}' for {} cannot be based on '{}' of {}",
                name,
                currency.code(),
                base.name,
                base.currency.code()
            )));
        }

        let (root, total_decimals) = match &base.base {
            None => (base.take(), decimals),
            Some(root) => (
                root.take(),
                base.decimals.checked_add(decimals).ok_or_else(|| {
                    WalletError::InvalidUnit(format!("decimals overflow for unit '{}'", name))
                })?,
            ),
        };

        if total_decimals > MAX_DECIMALS {
            return Err(WalletError::InvalidUnit(format!(
                "unit '{}' has {} decimals, maximum is {}",
                name, total_decimals, MAX_DECIMALS
            )));
        }

        Ok(Handle::new(Unit {
            currency: currency.take(),
            uids: uids.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            base: Some(root),
            decimals: total_decimals,
        }))
    }

    pub fn uids(&self) -> &str {
        &self.uids
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn currency(&self) -> &Handle<Currency> {
        &self.currency
    }

    pub fn is_base(&self) -> bool {
        self.base.is_none()
    }

    /// Power-of-ten exponent relative to the base unit.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Number of base units in one of this unit.
    pub fn scale_factor(&self) -> u128 {
        10u128.pow(self.decimals as u32)
    }

    /// Units are compatible when they denominate the same currency.
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.currency.is_identical(&other.currency)
    }

    /// Same currency, same scale and same uids.
    pub fn is_identical(&self, other: &Unit) -> bool {
        self.is_compatible(other) && self.decimals == other.decimals && self.uids == other.uids
    }
}

impl Handle<Unit> {
    /// The currency's base unit; for a base unit this is another reference to itself.
    pub fn base_unit(&self) -> Handle<Unit> {
        match &self.base {
            Some(root) => root.take(),
            None => self.take(),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> Handle<Currency> {
        Currency::create("bitcoin", "bitcoin", "btc", "native", None).unwrap()
    }

    #[test]
    fn base_and_derived_units() {
        let btc = btc();
        let sat = Unit::create_as_base(&btc, "sat", "satoshi", "SAT").unwrap();
        let bitcoin = Unit::create(&btc, "btc", "bitcoin", "B", &sat, 8).unwrap();

        assert!(sat.is_base());
        assert!(!bitcoin.is_base());
        assert_eq!(bitcoin.decimals(), 8);
        assert_eq!(bitcoin.scale_factor(), 100_000_000);
        assert!(bitcoin.base_unit().same_object(&sat));
        assert!(sat.base_unit().same_object(&sat));
        assert!(sat.is_compatible(&bitcoin));
    }

    #[test]
    fn derived_chain_is_flattened_onto_base() {
        let eth = Currency::create("ethereum", "ethereum", "eth", "native", None).unwrap();
        let wei = Unit::create_as_base(&eth, "wei", "wei", "wei").unwrap();
        let gwei = Unit::create(&eth, "gwei", "gwei", "gwei", &wei, 9).unwrap();
        let ether = Unit::create(&eth, "ether", "ether", "E", &gwei, 9).unwrap();

        assert_eq!(ether.decimals(), 18);
        assert!(ether.base_unit().same_object(&wei));
    }

    #[test]
    fn unit_keeps_currency_alive_after_caller_gives_it() {
        let btc = btc();
        let sat = Unit::create_as_base(&btc, "sat", "satoshi", "SAT").unwrap();
        assert_eq!(btc.ref_count(), 2);
        btc.give();
        assert_eq!(sat.currency().code(), "btc");
    }

    #[test]
    fn base_of_other_currency_is_rejected() {
        let btc = btc();
        let eth = Currency::create("ethereum", "ethereum", "eth", "native", None).unwrap();
        let wei = Unit::create_as_base(&eth, "wei", "wei", "wei").unwrap();
        let err = Unit::create(&btc, "btc", "bitcoin", "B", &wei, 8).unwrap_err();
        assert!(matches!(err, WalletError::CurrencyMismatch(_)));
    }

    #[test]
    fn decimals_are_bounded() {
        let btc = btc();
        let sat = Unit::create_as_base(&btc, "sat", "satoshi", "SAT").unwrap();
        let err = Unit::create(&btc, "huge", "huge", "H", &sat, MAX_DECIMALS + 1).unwrap_err();
        assert!(matches!(err, WalletError::InvalidUnit(_)));
    }
}
