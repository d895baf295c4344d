use std::time::Duration;

use crate::amount::Amount;
use crate::errors::{WalletError, WalletResult};
use crate::handle::{Handle, NativeResource};
use crate::unit::Unit;

/// A fee tier: the price per cost unit expected to confirm within a target time.
#[derive(Debug)]
pub struct NetworkFee {
    confirmation_time: Duration,
    price_per_cost_factor: Handle<Amount>,
    pricing_unit: Handle<Unit>,
}

impl NativeResource for NetworkFee {
    const KIND: &'static str = "network-fee";
}

impl NetworkFee {
    /// The price amount is converted into `pricing_unit`; both must denominate
    /// the same currency.
    pub fn create(
        confirmation_time: Duration,
        price_per_cost_factor: &Handle<Amount>,
        pricing_unit: &Handle<Unit>,
    ) -> WalletResult<Handle<NetworkFee>> {
        if !price_per_cost_factor.unit().is_compatible(pricing_unit) {
            return Err(WalletError::CurrencyMismatch(format!(
                "fee priced in {} cannot use a {} unit",
                price_per_cost_factor.currency().code(),
                pricing_unit.currency().code()
            )));
        }
        if price_per_cost_factor.is_negative() {
            return Err(WalletError::InvalidAmount(
                "fee price cannot be negative".to_string(),
            ));
        }

        Ok(Handle::new(NetworkFee {
            confirmation_time,
            price_per_cost_factor: price_per_cost_factor.convert(pricing_unit)?,
            pricing_unit: pricing_unit.take(),
        }))
    }

    pub fn confirmation_time(&self) -> Duration {
        self.confirmation_time
    }

    pub fn confirmation_time_in_milliseconds(&self) -> u64 {
        self.confirmation_time.as_millis() as u64
    }

    pub fn price_per_cost_factor(&self) -> &Handle<Amount> {
        &self.price_per_cost_factor
    }

    pub fn pricing_unit(&self) -> &Handle<Unit> {
        &self.pricing_unit
    }

    /// Total fee for a transfer that consumes `cost_factor` cost units
    /// (bytes, gas and so on).
    pub fn fee_for(&self, cost_factor: u64) -> WalletResult<Handle<Amount>> {
        let total = self
            .price_per_cost_factor
            .base_units()
            .checked_mul(cost_factor as u128)
            .ok_or_else(|| WalletError::InvalidAmount("fee overflow".to_string()))?;
        Ok(Amount::from_base_units(total, false, &self.pricing_unit))
    }
}

impl PartialEq for NetworkFee {
    fn eq(&self, other: &Self) -> bool {
        self.confirmation_time == other.confirmation_time
            && *self.price_per_cost_factor == *other.price_per_cost_factor
            && self.pricing_unit.is_identical(&other.pricing_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;

    fn eth_units() -> (Handle<Unit>, Handle<Unit>) {
        let eth = Currency::create("ethereum", "ethereum", "eth", "native", None).unwrap();
        let wei = Unit::create_as_base(&eth, "wei", "wei", "wei").unwrap();
        let gwei = Unit::create(&eth, "gwei", "gwei", "gwei", &wei, 9).unwrap();
        (wei, gwei)
    }

    #[test]
    fn fee_is_priced_in_its_unit() {
        let (_wei, gwei) = eth_units();
        let price = Amount::create_double(2.0, &gwei).unwrap();
        let fee = NetworkFee::create(Duration::from_millis(1000), &price, &gwei).unwrap();

        assert_eq!(fee.confirmation_time_in_milliseconds(), 1000);
        assert_eq!(fee.price_per_cost_factor().base_units(), 2_000_000_000);
        assert_eq!(
            fee.fee_for(21_000).unwrap().string_in_unit(&gwei).unwrap(),
            "42000"
        );
        assert_eq!(price.ref_count(), 1);
    }

    #[test]
    fn price_is_converted_into_pricing_unit() {
        let (wei, gwei) = eth_units();
        let price = Amount::create_integer(5_000_000_000, &wei).unwrap();
        let fee = NetworkFee::create(Duration::from_secs(30), &price, &gwei).unwrap();
        assert!(fee.price_per_cost_factor().unit().same_object(&gwei));
        assert_eq!(fee.price_per_cost_factor().to_string(), "5 gwei");
    }

    #[test]
    fn rejects_foreign_or_negative_price() {
        let (_wei, gwei) = eth_units();
        let btc = Currency::create("bitcoin", "bitcoin", "btc", "native", None).unwrap();
        let sat = Unit::create_as_base(&btc, "sat", "satoshi", "SAT").unwrap();
        let sats = Amount::create_integer(1000, &sat).unwrap();
        assert!(matches!(
            NetworkFee::create(Duration::from_secs(30), &sats, &gwei),
            Err(WalletError::CurrencyMismatch(_))
        ));

        let negative = Amount::create_integer(-1, &gwei).unwrap();
        assert!(NetworkFee::create(Duration::from_secs(30), &negative, &gwei).is_err());
    }
}
