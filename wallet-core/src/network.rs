//! Blockchain networks.
//!
//! A [`Network`] is assembled with a [`NetworkBuilder`] and frozen by
//! [`NetworkBuilder::build`]. After that only its block height changes, and
//! only forward.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::blockchain_client::{BlockchainModel, CurrencyModel};
use crate::currency::Currency;
use crate::errors::{WalletError, WalletResult};
use crate::handle::{Handle, NativeResource};
use crate::network_fee::NetworkFee;
use crate::unit::Unit;
use crate::validation::validator;

/// Chain family a network belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    Btc,
    Bch,
    Eth,
    Generic,
}

impl NetworkType {
    /// Family of a blockchain identifier such as `bitcoin-cash-mainnet`.
    pub fn from_blockchain_id(id: &str) -> Self {
        if id.starts_with("bitcoin-cash") {
            NetworkType::Bch
        } else if id.starts_with("bitcoin") {
            NetworkType::Btc
        } else if id.starts_with("ethereum") {
            NetworkType::Eth
        } else {
            NetworkType::Generic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Btc => "btc",
            NetworkType::Bch => "bch",
            NetworkType::Eth => "eth",
            NetworkType::Generic => "generic",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct CurrencyEntry {
    currency: Handle<Currency>,
    base_unit: Handle<Unit>,
    default_unit: Handle<Unit>,
    units: Vec<Handle<Unit>>,
}

impl CurrencyEntry {
    fn add_unit(&mut self, unit: &Handle<Unit>) {
        if !self.units.iter().any(|known| known.is_identical(unit)) {
            self.units.push(unit.take());
        }
    }
}

/// Under-construction network. Handle arguments are borrowed; the builder
/// takes its own references.
#[derive(Debug)]
pub struct NetworkBuilder {
    network_type: NetworkType,
    uids: String,
    name: String,
    is_mainnet: bool,
    height: u64,
    currency: Option<Handle<Currency>>,
    entries: Vec<CurrencyEntry>,
    fees: Vec<Handle<NetworkFee>>,
}

impl NetworkBuilder {
    pub fn set_height(&mut self, height: u64) -> &mut Self {
        self.height = height;
        self
    }

    /// Name the network's default currency. It must also be registered with
    /// [`NetworkBuilder::add_currency`] before the network is built.
    pub fn set_currency(&mut self, currency: &Handle<Currency>) -> &mut Self {
        self.currency = Some(currency.take());
        self
    }

    /// Register `currency` with its base unit and default display unit.
    pub fn add_currency(
        &mut self,
        currency: &Handle<Currency>,
        base_unit: &Handle<Unit>,
        default_unit: &Handle<Unit>,
    ) -> WalletResult<&mut Self> {
        if self.entry(currency).is_some() {
            return Err(WalletError::AlreadyExists(format!(
                "currency {} on network {}",
                currency.code(),
                self.uids
            )));
        }
        if !base_unit.is_base() {
            return Err(WalletError::InvalidUnit(format!(
                "'{}' is not a base unit",
                base_unit.name()
            )));
        }
        for unit in [base_unit, default_unit] {
            ensure_unit_of(currency, unit)?;
        }
        ensure_scaled_from(base_unit, default_unit)?;

        let mut entry = CurrencyEntry {
            currency: currency.take(),
            base_unit: base_unit.take(),
            default_unit: default_unit.take(),
            units: Vec::new(),
        };
        entry.add_unit(base_unit);
        entry.add_unit(default_unit);
        self.entries.push(entry);
        Ok(self)
    }

    /// Register an additional unit for an already-added currency. The unit
    /// must scale from the currency's registered base unit. Re-adding a known
    /// unit is a no-op.
    pub fn add_currency_unit(
        &mut self,
        currency: &Handle<Currency>,
        unit: &Handle<Unit>,
    ) -> WalletResult<&mut Self> {
        ensure_unit_of(currency, unit)?;
        let uids = self.uids.clone();
        let entry = self.entry_mut(currency).ok_or_else(|| {
            WalletError::MissingPrerequisite(format!(
                "add currency {} to network {} before adding unit '{}'",
                currency.code(),
                uids,
                unit.name()
            ))
        })?;
        ensure_scaled_from(&entry.base_unit, unit)?;
        entry.add_unit(unit);
        Ok(self)
    }

    pub fn add_fee(&mut self, fee: &Handle<NetworkFee>) -> WalletResult<&mut Self> {
        let currency = fee.pricing_unit().currency();
        if self.entry(currency).is_none() {
            return Err(WalletError::MissingPrerequisite(format!(
                "add currency {} to network {} before adding a fee priced in it",
                currency.code(),
                self.uids
            )));
        }
        self.fees.push(fee.take());
        Ok(self)
    }

    /// Freeze the network. Fails unless a default currency was set and registered.
    pub fn build(self) -> WalletResult<Handle<Network>> {
        let currency = self.currency.ok_or_else(|| {
            WalletError::MissingPrerequisite(format!(
                "network {} has no default currency",
                self.uids
            ))
        })?;
        if !self
            .entries
            .iter()
            .any(|entry| entry.currency.is_identical(&currency))
        {
            return Err(WalletError::MissingPrerequisite(format!(
                "default currency {} was never added to network {}",
                currency.code(),
                self.uids
            )));
        }

        log::debug!(
            "Built network {} ({} currencies, {} fees)",
            self.uids,
            self.entries.len(),
            self.fees.len()
        );

        Ok(Handle::new(Network {
            network_type: self.network_type,
            uids: self.uids,
            name: self.name,
            is_mainnet: self.is_mainnet,
            height: AtomicU64::new(self.height),
            currency,
            entries: self.entries,
            fees: self.fees,
        }))
    }

    fn entry(&self, currency: &Currency) -> Option<&CurrencyEntry> {
        self.entries
            .iter()
            .find(|entry| entry.currency.is_identical(currency))
    }

    fn entry_mut(&mut self, currency: &Currency) -> Option<&mut CurrencyEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.currency.is_identical(currency))
    }
}

fn ensure_unit_of(currency: &Currency, unit: &Unit) -> WalletResult<()> {
    if unit.currency().is_identical(currency) {
        Ok(())
    } else {
        Err(WalletError::CurrencyMismatch(format!(
            "unit '{}' belongs to {}, not {}",
            unit.name(),
            unit.currency().code(),
            currency.code()
        )))
    }
}

/// A frozen blockchain network.
#[derive(Debug)]
pub struct Network {
    network_type: NetworkType,
    uids: String,
    name: String,
    is_mainnet: bool,
    height: AtomicU64,
    currency: Handle<Currency>,
    entries: Vec<CurrencyEntry>,
    fees: Vec<Handle<NetworkFee>>,
}

impl NativeResource for Network {
    const KIND: &'static str = "network";
}

impl Network {
    /// Start building a network of the given family.
    pub fn create_as(
        network_type: NetworkType,
        uids: &str,
        name: &str,
        is_mainnet: bool,
    ) -> WalletResult<NetworkBuilder> {
        validator().validate_network_uids(uids)?;
        Ok(NetworkBuilder {
            network_type,
            uids: uids.to_string(),
            name: name.to_string(),
            is_mainnet,
            height: 0,
            currency: None,
            entries: Vec::new(),
            fees: Vec::new(),
        })
    }

    /// Build a frozen network from a metadata-service record.
    pub fn from_blockchain_model(model: &BlockchainModel) -> WalletResult<Handle<Network>> {
        let mut builder = Network::create_as(
            NetworkType::from_blockchain_id(&model.id),
            &model.id,
            &model.name,
            model.is_mainnet,
        )?;
        builder.set_height(model.block_height);

        let mut native_base = None;
        for currency_model in &model.currencies {
            let (currency, base, units) = currency_from_model(currency_model)?;
            let default = default_unit_for(&currency, &units).unwrap_or_else(|| base.take());

            builder.add_currency(&currency, &base, &default)?;
            for unit in &units {
                builder.add_currency_unit(&currency, unit)?;
            }
            if currency_model.id == model.native_currency_id {
                builder.set_currency(&currency);
                native_base = Some(base);
            }
        }

        let native_base = native_base.ok_or_else(|| {
            WalletError::InvalidResponse(format!(
                "blockchain {} does not list its native currency {}",
                model.id, model.native_currency_id
            ))
        })?;

        for estimate in &model.fee_estimates {
            let price = Amount::create_string(&estimate.amount, &native_base)?;
            let fee = NetworkFee::create(
                Duration::from_millis(estimate.confirmation_time_ms),
                &price,
                &native_base,
            )?;
            builder.add_fee(&fee)?;
        }

        builder.build()
    }

    pub fn uids(&self) -> &str {
        &self.uids
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }

    pub fn is_mainnet(&self) -> bool {
        self.is_mainnet
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }

    /// Move the height forward; lower heights are ignored. Returns true when
    /// the height changed. Only called from the serial executor.
    pub(crate) fn advance_height(&self, height: u64) -> bool {
        self.height.fetch_max(height, Ordering::AcqRel) < height
    }

    /// The network's default (native) currency.
    pub fn currency(&self) -> &Handle<Currency> {
        &self.currency
    }

    pub fn currencies(&self) -> Vec<Handle<Currency>> {
        self.entries.iter().map(|entry| entry.currency.take()).collect()
    }

    pub fn has_currency(&self, currency: &Currency) -> bool {
        self.entry(currency).is_some()
    }

    pub fn currency_by_code(&self, code: &str) -> Option<Handle<Currency>> {
        let code = code.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.currency.code() == code)
            .map(|entry| entry.currency.take())
    }

    pub fn base_unit(&self, currency: &Currency) -> Option<Handle<Unit>> {
        self.entry(currency).map(|entry| entry.base_unit.take())
    }

    pub fn default_unit(&self, currency: &Currency) -> Option<Handle<Unit>> {
        self.entry(currency).map(|entry| entry.default_unit.take())
    }

    /// Every registered unit of `currency`, base unit first.
    pub fn units(&self, currency: &Currency) -> Vec<Handle<Unit>> {
        self.entry(currency)
            .map(|entry| entry.units.iter().map(|unit| unit.take()).collect())
            .unwrap_or_default()
    }

    pub fn has_unit(&self, currency: &Currency, unit: &Unit) -> bool {
        self.entry(currency)
            .map(|entry| entry.units.iter().any(|known| known.is_identical(unit)))
            .unwrap_or(false)
    }

    pub fn fees(&self) -> &[Handle<NetworkFee>] {
        &self.fees
    }

    /// The cheapest tier, i.e. the one with the longest confirmation time.
    pub fn minimum_fee(&self) -> Option<Handle<NetworkFee>> {
        self.fees
            .iter()
            .max_by_key(|fee| fee.confirmation_time())
            .map(|fee| fee.take())
    }

    fn entry(&self, currency: &Currency) -> Option<&CurrencyEntry> {
        self.entries
            .iter()
            .find(|entry| entry.currency.is_identical(currency))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.uids)
    }
}

/// Currency, its base unit, and every denomination as a unit.
fn currency_from_model(
    model: &CurrencyModel,
) -> WalletResult<(Handle<Currency>, Handle<Unit>, Vec<Handle<Unit>>)> {
    let currency = Currency::create(
        &model.id,
        &model.name,
        &model.code,
        &model.currency_type,
        model.address.as_deref(),
    )?;

    let base_model = model
        .denominations
        .iter()
        .find(|denomination| denomination.decimals == 0)
        .ok_or_else(|| {
            WalletError::InvalidResponse(format!("currency {} has no base denomination", model.id))
        })?;
    let base = Unit::create_as_base(
        &currency,
        &format!("{}:{}", model.id, base_model.code),
        &base_model.name,
        &base_model.symbol,
    )?;

    let mut units = vec![base.take()];
    for denomination in model.denominations.iter().filter(|d| d.decimals != 0) {
        units.push(Unit::create(
            &currency,
            &format!("{}:{}", model.id, denomination.code),
            &denomination.name,
            &denomination.symbol,
            &base,
            denomination.decimals,
        )?);
    }

    Ok((currency, base, units))
}

/// A currency has one base unit; every other unit must scale from it.
fn ensure_scaled_from(base_unit: &Handle<Unit>, unit: &Handle<Unit>) -> WalletResult<()> {
    if unit.base_unit().is_identical(base_unit) {
        return Ok(());
    }
    Err(WalletError::InvalidUnit(if unit.is_base() {
        format!(
            "'{}' would be a second base unit for {}",
            unit.name(),
            unit.currency().code()
        )
    } else {
        format!(
            "'{}' does not scale from base unit '{}'",
            unit.name(),
            base_unit.name()
        )
    }))
}

/// The denomination named like the currency, else the largest one.
fn default_unit_for(currency: &Currency, units: &[Handle<Unit>]) -> Option<Handle<Unit>> {
    units
        .iter()
        .find(|unit| unit.uids().rsplit(':').next() == Some(currency.code()))
        .or_else(|| units.iter().max_by_key(|unit| unit.decimals()))
        .map(|unit| unit.take())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain_client::StaticBlockchainClient;

    struct Bitcoin {
        btc: Handle<Currency>,
        sat: Handle<Unit>,
        bitcoin: Handle<Unit>,
        fee: Handle<NetworkFee>,
    }

    fn bitcoin_parts() -> Bitcoin {
        let btc = Currency::create("bitcoin", "bitcoin", "btc", "native", None).unwrap();
        let sat = Unit::create_as_base(&btc, "sat", "satoshi", "SAT").unwrap();
        let bitcoin = Unit::create(&btc, "btc", "bitcoin", "B", &sat, 8).unwrap();
        let factor = Amount::create_integer(1000, &sat).unwrap();
        let fee = NetworkFee::create(Duration::from_millis(30 * 1000), &factor, &sat).unwrap();
        Bitcoin {
            btc,
            sat,
            bitcoin,
            fee,
        }
    }

    #[test]
    fn built_network_reports_registered_currency_and_units() {
        let parts = bitcoin_parts();
        let mut builder =
            Network::create_as(NetworkType::Btc, "bitcoin-mainnet", "bitcoin", true).unwrap();
        builder.set_height(600_000).set_currency(&parts.btc);
        builder
            .add_currency(&parts.btc, &parts.sat, &parts.bitcoin)
            .unwrap()
            .add_currency_unit(&parts.btc, &parts.sat)
            .unwrap()
            .add_currency_unit(&parts.btc, &parts.bitcoin)
            .unwrap()
            .add_fee(&parts.fee)
            .unwrap();
        let network = builder.build().unwrap();

        assert!(network.has_currency(&parts.btc));
        assert!(network.currency().same_object(&parts.btc));
        assert!(network.has_unit(&parts.btc, &parts.sat));
        assert!(network.has_unit(&parts.btc, &parts.bitcoin));
        assert_eq!(network.units(&parts.btc).len(), 2);
        assert!(network.base_unit(&parts.btc).unwrap().same_object(&parts.sat));
        assert!(network
            .default_unit(&parts.btc)
            .unwrap()
            .same_object(&parts.bitcoin));
        assert_eq!(network.height(), 600_000);
        assert_eq!(network.fees().len(), 1);
        assert!(network.currency_by_code("BTC").is_some());
    }

    #[test]
    fn builder_keeps_its_own_references() {
        let parts = bitcoin_parts();
        let mut builder =
            Network::create_as(NetworkType::Btc, "bitcoin-testnet", "bitcoin", false).unwrap();
        builder.set_currency(&parts.btc);
        builder.add_currency(&parts.btc, &parts.sat, &parts.bitcoin).unwrap();
        let network = builder.build().unwrap();

        let Bitcoin { btc, sat, bitcoin, fee } = parts;
        btc.give();
        sat.give();
        bitcoin.give();
        fee.give();
        assert_eq!(network.currency().code(), "btc");
        assert_eq!(network.units(network.currency()).len(), 2);
    }

    #[test]
    fn unit_before_currency_is_a_missing_prerequisite() {
        let parts = bitcoin_parts();
        let mut builder =
            Network::create_as(NetworkType::Btc, "bitcoin-mainnet", "bitcoin", true).unwrap();
        assert!(matches!(
            builder.add_currency_unit(&parts.btc, &parts.bitcoin),
            Err(WalletError::MissingPrerequisite(_))
        ));
        assert!(matches!(
            builder.add_fee(&parts.fee),
            Err(WalletError::MissingPrerequisite(_))
        ));
    }

    #[test]
    fn build_requires_registered_default_currency() {
        let parts = bitcoin_parts();
        let builder =
            Network::create_as(NetworkType::Btc, "bitcoin-mainnet", "bitcoin", true).unwrap();
        assert!(matches!(
            builder.build(),
            Err(WalletError::MissingPrerequisite(_))
        ));

        let mut builder =
            Network::create_as(NetworkType::Btc, "bitcoin-mainnet", "bitcoin", true).unwrap();
        builder.set_currency(&parts.btc);
        assert!(matches!(
            builder.build(),
            Err(WalletError::MissingPrerequisite(_))
        ));
    }

    #[test]
    fn foreign_unit_is_rejected() {
        let parts = bitcoin_parts();
        let eth = Currency::create("ethereum", "ethereum", "eth", "native", None).unwrap();
        let wei = Unit::create_as_base(&eth, "wei", "wei", "wei").unwrap();
        let mut builder =
            Network::create_as(NetworkType::Btc, "bitcoin-mainnet", "bitcoin", true).unwrap();
        builder.add_currency(&parts.btc, &parts.sat, &parts.bitcoin).unwrap();
        assert!(matches!(
            builder.add_currency_unit(&parts.btc, &wei),
            Err(WalletError::CurrencyMismatch(_))
        ));
    }

    #[test]
    fn second_base_unit_is_rejected() {
        let parts = bitcoin_parts();
        let other_base = Unit::create_as_base(&parts.btc, "sat2", "satoshi", "SAT").unwrap();
        let chained = Unit::create(&parts.btc, "btc2", "bitcoin", "B", &other_base, 8).unwrap();

        let mut builder =
            Network::create_as(NetworkType::Btc, "bitcoin-mainnet", "bitcoin", true).unwrap();
        builder.set_currency(&parts.btc);
        builder.add_currency(&parts.btc, &parts.sat, &parts.bitcoin).unwrap();
        assert!(matches!(
            builder.add_currency_unit(&parts.btc, &other_base),
            Err(WalletError::InvalidUnit(_))
        ));
        assert!(matches!(
            builder.add_currency_unit(&parts.btc, &chained),
            Err(WalletError::InvalidUnit(_))
        ));

        let network = builder.build().unwrap();
        let units = network.units(&parts.btc);
        assert_eq!(units.iter().filter(|unit| unit.is_base()).count(), 1);
        assert!(units
            .iter()
            .all(|unit| unit.base_unit().same_object(&parts.sat)));
    }

    #[test]
    fn default_unit_must_scale_from_base() {
        let parts = bitcoin_parts();
        let other_base = Unit::create_as_base(&parts.btc, "sat2", "satoshi", "SAT").unwrap();
        let chained = Unit::create(&parts.btc, "btc2", "bitcoin", "B", &other_base, 8).unwrap();
        let mut builder =
            Network::create_as(NetworkType::Btc, "bitcoin-mainnet", "bitcoin", true).unwrap();
        assert!(matches!(
            builder.add_currency(&parts.btc, &parts.sat, &chained),
            Err(WalletError::InvalidUnit(_))
        ));
    }

    #[test]
    fn height_only_moves_forward() {
        let parts = bitcoin_parts();
        let mut builder =
            Network::create_as(NetworkType::Btc, "bitcoin-mainnet", "bitcoin", true).unwrap();
        builder.set_height(100).set_currency(&parts.btc);
        builder.add_currency(&parts.btc, &parts.sat, &parts.bitcoin).unwrap();
        let network = builder.build().unwrap();

        assert!(network.advance_height(150));
        assert!(!network.advance_height(120));
        assert!(!network.advance_height(150));
        assert_eq!(network.height(), 150);
    }

    #[test]
    fn from_model_builds_ethereum_with_fees() {
        let client = StaticBlockchainClient::builtin(true);
        let model = client
            .blockchains()
            .iter()
            .find(|m| m.id == "ethereum-mainnet")
            .unwrap();
        let network = Network::from_blockchain_model(model).unwrap();

        assert_eq!(network.network_type(), NetworkType::Eth);
        assert_eq!(network.currency().code(), "eth");
        let default = network.default_unit(network.currency()).unwrap();
        assert_eq!(default.decimals(), 18);
        assert_eq!(network.units(network.currency()).len(), 3);

        let fee = network.minimum_fee().unwrap();
        assert_eq!(fee.confirmation_time_in_milliseconds(), 1000);
        assert_eq!(fee.price_per_cost_factor().base_units(), 2_000_000_000);
    }

    #[test]
    fn network_type_from_id() {
        assert_eq!(
            NetworkType::from_blockchain_id("bitcoin-cash-testnet"),
            NetworkType::Bch
        );
        assert_eq!(
            NetworkType::from_blockchain_id("bitcoin-testnet"),
            NetworkType::Btc
        );
        assert_eq!(
            NetworkType::from_blockchain_id("tezos-mainnet"),
            NetworkType::Generic
        );
    }
}
