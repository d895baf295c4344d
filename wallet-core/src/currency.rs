use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::WalletResult;
use crate::handle::{Handle, NativeResource};
use crate::validation::validator;

/// Kind of asset a currency represents on its blockchain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyType {
    /// The chain's own asset (BTC on bitcoin, ETH on ethereum)
    Native,
    /// ERC-20 token issued by a contract
    Erc20,
    /// Any other token standard reported by the metadata service
    Other(String),
}

impl CurrencyType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "native" => CurrencyType::Native,
            "erc20" | "erc-20" => CurrencyType::Erc20,
            other => CurrencyType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CurrencyType::Native => "native",
            CurrencyType::Erc20 => "erc20",
            CurrencyType::Other(name) => name,
        }
    }
}

impl fmt::Display for CurrencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asset that can be held and transferred on a network.
///
/// Identity within a network is the currency code.
#[derive(Debug)]
pub struct Currency {
    uids: String,
    name: String,
    code: String,
    currency_type: CurrencyType,
    issuer: Option<String>,
}

impl NativeResource for Currency {
    const KIND: &'static str = "currency";
}

impl Currency {
    /// Create a currency, e.g. `Currency::create("bitcoin", "bitcoin", "btc", "native", None)`.
    pub fn create(
        uids: &str,
        name: &str,
        code: &str,
        currency_type: &str,
        issuer: Option<&str>,
    ) -> WalletResult<Handle<Currency>> {
        let code = code.to_ascii_lowercase();
        validator().validate_currency_code(&code)?;

        Ok(Handle::new(Currency {
            uids: uids.to_string(),
            name: name.to_string(),
            code,
            currency_type: CurrencyType::parse(currency_type),
            issuer: issuer.map(|address| address.to_string()),
        }))
    }

    pub fn uids(&self) -> &str {
        &self.uids
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn currency_type(&self) -> &CurrencyType {
        &self.currency_type
    }

    /// Contract address for token currencies.
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn is_native(&self) -> bool {
        self.currency_type == CurrencyType::Native
    }

    /// Two currencies are the same asset when uids and code agree.
    pub fn is_identical(&self, other: &Currency) -> bool {
        self.uids == other.uids && self.code == other.code
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_normalizes_code_and_type() {
        let btc = Currency::create("bitcoin", "bitcoin", "BTC", "Native", None).unwrap();
        assert_eq!(btc.code(), "btc");
        assert!(btc.is_native());
        assert_eq!(btc.issuer(), None);
        assert_eq!(btc.to_string(), "bitcoin (btc)");
    }

    #[test]
    fn token_currency_keeps_issuer() {
        let usdc = Currency::create(
            "ethereum-mainnet:0xa0b8",
            "usd coin",
            "usdc",
            "erc20",
            Some("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
        )
        .unwrap();
        assert_eq!(usdc.currency_type(), &CurrencyType::Erc20);
        assert!(usdc.issuer().unwrap().starts_with("0xa0b8"));
        assert!(!usdc.is_native());
    }

    #[test]
    fn identical_by_uids_and_code() {
        let a = Currency::create("bitcoin", "bitcoin", "btc", "native", None).unwrap();
        let b = Currency::create("bitcoin", "Bitcoin", "btc", "native", None).unwrap();
        let c = Currency::create("bitcoin-cash", "bitcoin cash", "bch", "native", None).unwrap();
        assert!(a.is_identical(&b));
        assert!(!a.is_identical(&c));
        assert!(!a.same_object(&b));
    }

    #[test]
    fn rejects_bad_codes() {
        assert!(Currency::create("x", "x", "", "native", None).is_err());
        assert!(Currency::create("x", "x", "b t c", "native", None).is_err());
    }
}
