use crate::errors::{WalletError, WalletResult};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_INPUT_LENGTH: usize = 1000;
const MIN_PHRASE_WORDS: usize = 12;
const MAX_PHRASE_WORDS: usize = 24;

static SHARED_VALIDATOR: Lazy<InputValidator> = Lazy::new(InputValidator::default);

/// Validator shared by constructors that run on hot paths.
pub fn validator() -> &'static InputValidator {
    &SHARED_VALIDATOR
}

/// Input validation for identifiers that cross the native engine boundary
pub struct InputValidator {
    // Compiled regex patterns for performance
    currency_code_pattern: Regex,
    network_uids_pattern: Regex,
    storage_name_pattern: Regex,
    phrase_word_pattern: Regex,
}

impl InputValidator {
    pub fn new() -> WalletResult<Self> {
        let currency_code_pattern = Regex::new(r"^[a-z0-9][a-z0-9_\-.]{0,31}$").map_err(|e| {
            WalletError::ValidationError(format!("Invalid currency code regex: {}", e))
        })?;

        let network_uids_pattern = Regex::new(r"^[a-z0-9][a-z0-9\-_:]{0,127}$").map_err(|e| {
            WalletError::ValidationError(format!("Invalid network uids regex: {}", e))
        })?;

        let storage_name_pattern = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-_.]{0,127}$")
            .map_err(|e| {
                WalletError::ValidationError(format!("Invalid storage name regex: {}", e))
            })?;

        let phrase_word_pattern = Regex::new(r"^\p{L}+$")
            .map_err(|e| WalletError::ValidationError(format!("Invalid phrase regex: {}", e)))?;

        Ok(InputValidator {
            currency_code_pattern,
            network_uids_pattern,
            storage_name_pattern,
            phrase_word_pattern,
        })
    }

    /// Validate a currency code such as `btc` or `eth`
    pub fn validate_currency_code(&self, code: &str) -> WalletResult<()> {
        self.check_length(code)?;

        if code.is_empty() {
            return Err(WalletError::ValidationError(
                "Currency code cannot be empty".to_string(),
            ));
        }

        if !self.currency_code_pattern.is_match(code) {
            return Err(WalletError::ValidationError(format!(
                "Currency code '{}' must be lowercase alphanumeric",
                code
            )));
        }

        Ok(())
    }

    /// Validate a network identifier such as `bitcoin-mainnet`
    pub fn validate_network_uids(&self, uids: &str) -> WalletResult<()> {
        self.check_length(uids)?;

        if uids.is_empty() {
            return Err(WalletError::ValidationError(
                "Network identifier cannot be empty".to_string(),
            ));
        }

        if !self.network_uids_pattern.is_match(uids) {
            return Err(WalletError::ValidationError(format!(
                "Network identifier '{}' contains invalid characters",
                uids
            )));
        }

        Ok(())
    }

    /// Validate a name used as a directory below the storage root
    pub fn validate_storage_name(&self, name: &str) -> WalletResult<()> {
        self.check_length(name)?;

        if name == "." || name == ".." || !self.storage_name_pattern.is_match(name) {
            return Err(WalletError::StorageError(format!(
                "'{}' is not a valid storage directory name",
                name
            )));
        }

        Ok(())
    }

    /// Validate the shape of a mnemonic phrase (word count and characters).
    ///
    /// Checksum validation happens when the account derives its seed.
    pub fn validate_phrase_shape(&self, phrase: &str) -> WalletResult<()> {
        self.check_length(phrase)?;

        let words: Vec<&str> = phrase.split_whitespace().collect();
        if words.len() < MIN_PHRASE_WORDS || words.len() > MAX_PHRASE_WORDS {
            return Err(WalletError::InvalidKey(format!(
                "Phrase must contain between {} and {} words, got {}",
                MIN_PHRASE_WORDS,
                MAX_PHRASE_WORDS,
                words.len()
            )));
        }

        if words.iter().any(|word| !self.phrase_word_pattern.is_match(word)) {
            return Err(WalletError::InvalidKey(
                "Phrase contains non-alphabetic words".to_string(),
            ));
        }

        Ok(())
    }

    fn check_length(&self, input: &str) -> WalletResult<()> {
        if input.len() > MAX_INPUT_LENGTH {
            return Err(WalletError::ValidationError("Input too long".to_string()));
        }
        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new().expect("Failed to create InputValidator")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_codes() {
        let v = validator();
        assert!(v.validate_currency_code("btc").is_ok());
        assert!(v.validate_currency_code("usdc-erc20").is_ok());
        assert!(v.validate_currency_code("").is_err());
        assert!(v.validate_currency_code("BTC").is_err());
        assert!(v.validate_currency_code("b tc").is_err());
    }

    #[test]
    fn network_uids() {
        let v = validator();
        assert!(v.validate_network_uids("bitcoin-mainnet").is_ok());
        assert!(v.validate_network_uids("ethereum-testnet").is_ok());
        assert!(v.validate_network_uids("../etc").is_err());
    }

    #[test]
    fn storage_names_reject_traversal() {
        let v = validator();
        assert!(v.validate_storage_name("bitcoin-mainnet").is_ok());
        assert!(v.validate_storage_name("..").is_err());
        assert!(v.validate_storage_name("a/b").is_err());
    }

    #[test]
    fn phrase_shape() {
        let v = validator();
        let phrase = "ginger settle marine tissue robot crane night number ramp coast roast critic";
        assert!(v.validate_phrase_shape(phrase).is_ok());
        assert!(matches!(
            v.validate_phrase_shape("too short"),
            Err(WalletError::InvalidKey(_))
        ));
        let with_digits = "ginger settle marine tissue robot crane night number ramp coast roast 42";
        assert!(v.validate_phrase_shape(with_digits).is_err());
    }
}
