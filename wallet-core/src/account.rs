use std::fmt;

use bip39::{Language, Mnemonic};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::errors::{WalletError, WalletResult};
use crate::handle::{Handle, NativeResource};
use crate::validation::validator;

/// Master key material shared by every wallet manager of a system.
///
/// The seed is derived once from the BIP-39 phrase and wiped when the account
/// is released. The phrase itself is never stored.
pub struct Account {
    uids: String,
    timestamp: DateTime<Utc>,
    seed: Zeroizing<[u8; 64]>,
    fingerprint: String,
}

impl NativeResource for Account {
    const KIND: &'static str = "account";
}

impl Account {
    /// Create an account from a mnemonic phrase.
    ///
    /// `timestamp` is the account's creation time; chain history before it
    /// need not be scanned. `uids` names the account's storage namespace and is
    /// normally [`Account::derive_uids`] of the phrase.
    pub fn create_from_phrase(
        phrase: &str,
        timestamp: DateTime<Utc>,
        uids: &str,
    ) -> WalletResult<Handle<Account>> {
        validator().validate_storage_name(uids)?;
        let mnemonic = parse_phrase(phrase)?;
        let seed = Zeroizing::new(mnemonic.to_seed(""));
        let fingerprint = hex::encode(&Sha256::digest(seed.as_slice())[..8]);

        log::debug!("Created account {} ({})", uids, fingerprint);
        Ok(Handle::new(Account {
            uids: uids.to_string(),
            timestamp,
            seed,
            fingerprint,
        }))
    }

    /// Stable identifier derived from the phrase bytes.
    pub fn derive_uids(phrase: &str) -> String {
        let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        Uuid::new_v5(&Uuid::NAMESPACE_OID, normalized.as_bytes()).to_string()
    }

    /// Check word count, vocabulary and checksum.
    pub fn validate_phrase(phrase: &str) -> WalletResult<()> {
        parse_phrase(phrase).map(|_| ())
    }

    pub fn uids(&self) -> &str {
        &self.uids
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Short hex digest of the seed, safe to log.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// True when `phrase` derives this account's seed.
    pub fn matches_phrase(&self, phrase: &str) -> bool {
        parse_phrase(phrase)
            .map(|mnemonic| *Zeroizing::new(mnemonic.to_seed("")) == *self.seed)
            .unwrap_or(false)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("uids", &self.uids)
            .field("timestamp", &self.timestamp)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

fn parse_phrase(phrase: &str) -> WalletResult<Mnemonic> {
    validator().validate_phrase_shape(phrase)?;
    Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| WalletError::InvalidKey(format!("Invalid mnemonic: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn uids_are_deterministic_and_whitespace_insensitive() {
        let a = Account::derive_uids(PHRASE);
        let b = Account::derive_uids(&format!("  {}  ", PHRASE.replace(' ', "   ")));
        assert_eq!(a, b);
        assert_ne!(a, Account::derive_uids("zoo zoo zoo"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn creates_account_from_valid_phrase() {
        let timestamp = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let uids = Account::derive_uids(PHRASE);
        let account = Account::create_from_phrase(PHRASE, timestamp, &uids).unwrap();

        assert_eq!(account.uids(), uids);
        assert_eq!(account.timestamp(), timestamp);
        assert_eq!(account.fingerprint().len(), 16);
        assert!(account.matches_phrase(PHRASE));
        assert!(!format!("{:?}", *account).contains("seed"));
    }

    #[test]
    fn rejects_bad_checksum_and_shape() {
        let bad_checksum = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
        assert!(matches!(
            Account::validate_phrase(bad_checksum),
            Err(WalletError::InvalidKey(_))
        ));
        assert!(Account::validate_phrase("abandon about").is_err());
        assert!(Account::validate_phrase(PHRASE).is_ok());
    }

    #[test]
    fn rejects_unsafe_storage_uids() {
        let err = Account::create_from_phrase(PHRASE, Utc::now(), "../escape").unwrap_err();
        assert!(matches!(err, WalletError::StorageError(_)));
    }
}
