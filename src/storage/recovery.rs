//! State of an in-progress multi-share (SLIP-39 style) recovery.
//!
//! A session is `idle` until `set_in_progress(true)`.  While collecting,
//! the metadata fields and share mnemonics may be written in any order.
//! `delete_progress` tears everything down and clears the in-progress
//! flag last, so an interrupted teardown is retried rather than leaving
//! orphaned shares behind an idle session.

use crate::errors::{Result, StorageError};
use crate::vault::Vault;

use super::codec::{Field, U8};
use super::schema::{self, MAX_SHARE_COUNT};

/// Accessors for the recovery and share namespaces.
pub struct RecoverySession<'a, V: Vault + ?Sized> {
    vault: &'a mut V,
}

impl<'a, V: Vault + ?Sized> RecoverySession<'a, V> {
    pub fn new(vault: &'a mut V) -> Self {
        Self { vault }
    }

    pub fn is_in_progress(&self) -> Result<bool> {
        schema::RECOVERY_IN_PROGRESS.get_bool(self.vault)
    }

    /// Start a session, or abandon it with `false`.
    pub fn set_in_progress(&mut self, in_progress: bool) -> Result<()> {
        if in_progress {
            schema::RECOVERY_IN_PROGRESS.set_bool(self.vault, true)?;
            tracing::debug!("recovery session started");
            Ok(())
        } else {
            self.delete_progress()
        }
    }

    fn require_in_progress(&self) -> Result<()> {
        if self.is_in_progress()? {
            Ok(())
        } else {
            Err(StorageError::RecoveryNotInProgress)
        }
    }

    fn set_u8(&mut self, field: Field<U8>, value: u8) -> Result<()> {
        self.require_in_progress()?;
        field.set(self.vault, &value)
    }

    // ------------------------------------------------------------------
    // Session metadata
    // ------------------------------------------------------------------

    pub fn identifier(&self) -> Result<Option<u16>> {
        schema::RECOVERY_IDENTIFIER.get(self.vault)
    }

    pub fn set_identifier(&mut self, identifier: u16) -> Result<()> {
        self.require_in_progress()?;
        schema::RECOVERY_IDENTIFIER.set(self.vault, &identifier)
    }

    pub fn threshold(&self) -> Result<Option<u8>> {
        schema::RECOVERY_THRESHOLD.get(self.vault)
    }

    pub fn set_threshold(&mut self, threshold: u8) -> Result<()> {
        self.set_u8(schema::RECOVERY_THRESHOLD, threshold)
    }

    pub fn remaining(&self) -> Result<Option<u8>> {
        schema::RECOVERY_REMAINING.get(self.vault)
    }

    pub fn set_remaining(&mut self, remaining: u8) -> Result<()> {
        self.set_u8(schema::RECOVERY_REMAINING, remaining)
    }

    pub fn words_count(&self) -> Result<Option<u8>> {
        schema::RECOVERY_WORDS_COUNT.get(self.vault)
    }

    pub fn set_words_count(&mut self, count: u8) -> Result<()> {
        self.set_u8(schema::RECOVERY_WORDS_COUNT, count)
    }

    pub fn iteration_exponent(&self) -> Result<Option<u8>> {
        schema::RECOVERY_ITERATION_EXPONENT.get(self.vault)
    }

    pub fn set_iteration_exponent(&mut self, exponent: u8) -> Result<()> {
        self.set_u8(schema::RECOVERY_ITERATION_EXPONENT, exponent)
    }

    // ------------------------------------------------------------------
    // Shares
    // ------------------------------------------------------------------

    /// Store a collected share mnemonic under `index`.
    pub fn set_share(&mut self, index: u8, mnemonic: &str) -> Result<()> {
        check_index(index)?;
        self.require_in_progress()?;
        schema::share(index).set(self.vault, &mnemonic.to_string())?;
        tracing::debug!(index, "recovery share stored");
        Ok(())
    }

    /// Share stored under `index`; empty records read as absent.
    pub fn share(&self, index: u8) -> Result<Option<String>> {
        check_index(index)?;
        Ok(schema::share(index)
            .get(self.vault)?
            .filter(|mnemonic| !mnemonic.is_empty()))
    }

    /// Stored shares in ascending index order.
    ///
    /// Shares are read lazily as the iterator advances.  An idle session
    /// always yields nothing.
    pub fn fetch(&self) -> Result<Shares<'_, V>> {
        let start = if self.is_in_progress()? {
            0
        } else {
            MAX_SHARE_COUNT
        };
        Ok(Shares {
            vault: &*self.vault,
            index: start,
        })
    }

    /// End the session, removing all its records.
    pub fn delete_progress(&mut self) -> Result<()> {
        for index in 0..MAX_SHARE_COUNT {
            schema::share(index).delete(self.vault)?;
        }
        schema::RECOVERY_REMAINING.delete(self.vault)?;
        schema::RECOVERY_THRESHOLD.delete(self.vault)?;
        schema::RECOVERY_WORDS_COUNT.delete(self.vault)?;
        schema::RECOVERY_IDENTIFIER.delete(self.vault)?;
        schema::RECOVERY_ITERATION_EXPONENT.delete(self.vault)?;
        schema::RECOVERY_IN_PROGRESS.delete(self.vault)?;

        tracing::debug!("recovery session cleared");
        Ok(())
    }
}

fn check_index(index: u8) -> Result<()> {
    if index >= MAX_SHARE_COUNT {
        return Err(StorageError::InvalidArgument(format!(
            "share index {index} out of range (max {})",
            MAX_SHARE_COUNT - 1
        )));
    }
    Ok(())
}

/// Iterator over stored share mnemonics, see `RecoverySession::fetch`.
pub struct Shares<'s, V: Vault + ?Sized> {
    vault: &'s V,
    index: u8,
}

impl<V: Vault + ?Sized> Iterator for Shares<'_, V> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < MAX_SHARE_COUNT {
            let field = schema::share(self.index);
            self.index += 1;
            match field.get(self.vault) {
                Ok(Some(mnemonic)) if !mnemonic.is_empty() => return Some(Ok(mnemonic)),
                Ok(_) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

impl<V: Vault + ?Sized> std::iter::FusedIterator for Shares<'_, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryVault;

    const SHARE_A: &str = "academic acid acrobat romp chubby";
    const SHARE_B: &str = "academic acid beard romp believe";
    const SHARE_C: &str = "academic acid ceramic romp blue";

    fn collect(session: &RecoverySession<'_, MemoryVault>) -> Vec<String> {
        session
            .fetch()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn idle_session_rejects_writes() {
        let mut vault = MemoryVault::new();
        let mut session = RecoverySession::new(&mut vault);
        assert!(matches!(
            session.set_threshold(2),
            Err(StorageError::RecoveryNotInProgress)
        ));
        assert!(matches!(
            session.set_share(0, SHARE_A),
            Err(StorageError::RecoveryNotInProgress)
        ));
        assert!(vault.is_empty());
    }

    #[test]
    fn fetch_orders_by_index() {
        let mut vault = MemoryVault::new();
        let mut session = RecoverySession::new(&mut vault);
        session.set_in_progress(true).unwrap();
        session.set_share(5, SHARE_C).unwrap();
        session.set_share(0, SHARE_A).unwrap();
        session.set_share(2, SHARE_B).unwrap();

        assert_eq!(collect(&session), vec![SHARE_A, SHARE_B, SHARE_C]);
    }

    #[test]
    fn fetch_is_lazy_and_not_restartable() {
        let mut vault = MemoryVault::new();
        let mut session = RecoverySession::new(&mut vault);
        session.set_in_progress(true).unwrap();
        session.set_share(1, SHARE_A).unwrap();

        let mut shares = session.fetch().unwrap();
        assert_eq!(shares.next().unwrap().unwrap(), SHARE_A);
        assert!(shares.next().is_none());
        assert!(shares.next().is_none());
    }

    #[test]
    fn metadata_fields_are_independent() {
        let mut vault = MemoryVault::new();
        let mut session = RecoverySession::new(&mut vault);
        session.set_in_progress(true).unwrap();
        session.set_words_count(20).unwrap();
        session.set_identifier(0x7FFF).unwrap();

        assert_eq!(session.threshold().unwrap(), None);
        assert_eq!(session.words_count().unwrap(), Some(20));
        assert_eq!(session.identifier().unwrap(), Some(0x7FFF));

        session.set_threshold(3).unwrap();
        session.set_remaining(2).unwrap();
        session.set_iteration_exponent(1).unwrap();
        assert_eq!(session.threshold().unwrap(), Some(3));
        assert_eq!(session.remaining().unwrap(), Some(2));
        assert_eq!(session.iteration_exponent().unwrap(), Some(1));
    }

    #[test]
    fn delete_progress_leaves_no_records() {
        let mut vault = MemoryVault::new();
        let mut session = RecoverySession::new(&mut vault);
        session.set_in_progress(true).unwrap();
        session.set_identifier(42).unwrap();
        session.set_threshold(2).unwrap();
        session.set_remaining(1).unwrap();
        session.set_words_count(20).unwrap();
        session.set_iteration_exponent(0).unwrap();
        session.set_share(0, SHARE_A).unwrap();
        session.set_share(2, SHARE_B).unwrap();
        session.set_share(15, SHARE_C).unwrap();

        session.delete_progress().unwrap();
        assert!(!session.is_in_progress().unwrap());
        assert!(collect(&session).is_empty());
        assert!(vault.is_empty());
    }

    #[test]
    fn set_in_progress_false_abandons_session() {
        let mut vault = MemoryVault::new();
        let mut session = RecoverySession::new(&mut vault);
        session.set_in_progress(true).unwrap();
        session.set_share(3, SHARE_A).unwrap();

        session.set_in_progress(false).unwrap();
        assert!(vault.is_empty());
    }

    #[test]
    fn share_index_is_bounded() {
        let mut vault = MemoryVault::new();
        let mut session = RecoverySession::new(&mut vault);
        session.set_in_progress(true).unwrap();
        assert!(matches!(
            session.set_share(MAX_SHARE_COUNT, SHARE_A),
            Err(StorageError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.share(MAX_SHARE_COUNT),
            Err(StorageError::InvalidArgument(_))
        ));
    }

    #[test]
    fn orphaned_shares_stay_hidden_while_idle() {
        let mut vault = MemoryVault::new();
        schema::share(4).set(&mut vault, &SHARE_A.to_string()).unwrap();

        let session = RecoverySession::new(&mut vault);
        assert!(collect(&session).is_empty());
    }
}
