//! Integration tests for the typed storage layer over an in-memory vault.

use std::cell::RefCell;
use std::rc::Rc;

use wallet_storage::storage::migration::{STORAGE_VERSION_01, STORAGE_VERSION_CURRENT};
use wallet_storage::storage::schema;
use wallet_storage::storage::{MigrationStep, MnemonicType, SettingsUpdate};
use wallet_storage::vault::{MemoryVault, Vault};
use wallet_storage::{Storage, StorageError};

fn storage() -> Storage<MemoryVault> {
    Storage::new(MemoryVault::new())
}

// ---------------------------------------------------------------------------
// U2F counter
// ---------------------------------------------------------------------------

#[test]
fn counter_follows_reset_sequence() {
    let mut storage = storage();

    storage.device().set_u2f_counter(Some(350)).unwrap();
    for expected in 351..500 {
        assert_eq!(storage.device().next_u2f_counter().unwrap(), expected);
    }

    storage.device().set_u2f_counter(Some(0)).unwrap();
    assert_eq!(storage.device().next_u2f_counter().unwrap(), 1);

    storage.device().set_u2f_counter(None).unwrap();
    assert_eq!(storage.device().next_u2f_counter().unwrap(), 0);
}

#[test]
fn counter_never_repeats_across_restarts() {
    let mut storage = storage();
    let mut last: Option<u32> = None;

    // Restart after varying numbers of allocations, including mid-batch.
    for burst in [1, 3, 63, 64, 65, 7, 128, 2] {
        for _ in 0..burst {
            let value = storage.device().next_u2f_counter().unwrap();
            if let Some(previous) = last {
                assert!(value > previous, "{value} after {previous}");
            }
            last = Some(value);
        }
        storage.vault_mut().restart();
    }
}

#[test]
fn counter_works_while_locked() {
    let mut storage = storage();
    storage.vault_mut().lock();
    assert_eq!(storage.device().next_u2f_counter().unwrap(), 0);
    storage.device().set_u2f_counter(Some(9)).unwrap();
    assert_eq!(storage.device().next_u2f_counter().unwrap(), 10);
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[test]
fn flag_merge_skips_redundant_write() {
    let mut storage = storage();
    storage.device().set_flags(0b0010).unwrap();
    storage.device().set_flags(0b0100).unwrap();
    assert_eq!(storage.device().flags().unwrap(), 0b0110);

    let writes = storage.vault().write_count();
    storage.device().set_flags(0b0100).unwrap();
    assert_eq!(storage.vault().write_count(), writes);
}

#[test]
fn autolock_below_minimum_is_stored_as_minimum() {
    let mut storage = storage();
    storage.device().set_autolock_delay_ms(100).unwrap();

    let raw = schema::AUTOLOCK_DELAY_MS.get(storage.vault()).unwrap();
    assert_eq!(raw, Some(60_000));
}

#[test]
fn bad_rotation_keeps_previous_rotation() {
    let mut storage = storage();
    storage
        .device()
        .load_settings(SettingsUpdate {
            display_rotation: Some(180),
            ..SettingsUpdate::default()
        })
        .unwrap();

    let result = storage.device().load_settings(SettingsUpdate {
        display_rotation: Some(45),
        ..SettingsUpdate::default()
    });
    assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
    assert_eq!(storage.device().rotation().unwrap(), 180);
}

#[test]
fn public_settings_readable_while_locked_private_are_not() {
    let mut storage = storage();
    storage
        .device()
        .load_settings(SettingsUpdate {
            label: Some("Satoshi's wallet".into()),
            use_passphrase: Some(true),
            ..SettingsUpdate::default()
        })
        .unwrap();

    storage.vault_mut().lock();
    assert_eq!(
        storage.device().label().unwrap().as_deref(),
        Some("Satoshi's wallet")
    );
    assert!(matches!(
        storage.device().has_passphrase(),
        Err(StorageError::Locked)
    ));
}

// ---------------------------------------------------------------------------
// Recovery session
// ---------------------------------------------------------------------------

#[test]
fn abandoned_recovery_leaves_nothing_behind() {
    let mut storage = storage();
    {
        let mut recovery = storage.recovery();
        recovery.set_in_progress(true).unwrap();
        recovery.set_threshold(3).unwrap();
        recovery.set_remaining(3).unwrap();
        recovery.set_words_count(20).unwrap();
        recovery.set_share(0, "share zero words").unwrap();
        recovery.set_share(2, "share two words").unwrap();
        recovery.set_share(5, "share five words").unwrap();
        recovery.delete_progress().unwrap();
    }

    let recovery = storage.recovery();
    assert!(!recovery.is_in_progress().unwrap());
    assert_eq!(recovery.fetch().unwrap().count(), 0);
    assert_eq!(recovery.threshold().unwrap(), None);
    assert!(storage.vault().is_empty());
}

#[test]
fn completed_recovery_initializes_device() {
    let mut storage = storage();
    storage.recovery().set_in_progress(true).unwrap();
    storage.recovery().set_share(0, "first").unwrap();
    storage.recovery().set_share(1, "second").unwrap();

    let shares: Vec<String> = storage
        .recovery()
        .fetch()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(shares, ["first", "second"]);

    storage
        .device()
        .store_mnemonic_secret(b"master secret", MnemonicType::Slip39, false, false)
        .unwrap();
    assert!(!storage.is_initialized().unwrap());

    storage.recovery().delete_progress().unwrap();
    assert!(storage.is_initialized().unwrap());
}

// ---------------------------------------------------------------------------
// Wipe
// ---------------------------------------------------------------------------

#[test]
fn wipe_resets_every_field_and_cache() {
    let mut storage = storage();
    let cache: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

    let label = {
        let mut device = storage.device();
        device
            .load_settings(SettingsUpdate {
                label: Some("before wipe".into()),
                use_passphrase: Some(true),
                passphrase_source: Some(1),
                display_rotation: Some(270),
                ..SettingsUpdate::default()
            })
            .unwrap();
        device.set_flags(0xFF).unwrap();
        device.set_autolock_delay_ms(300_000).unwrap();
        device
            .store_mnemonic_secret(b"seed", MnemonicType::Bip39, true, false)
            .unwrap();
        device.set_unfinished_backup(true).unwrap();
        device.set_u2f_counter(Some(1000)).unwrap();
        device.label().unwrap()
    };
    storage.recovery().set_in_progress(true).unwrap();
    storage.recovery().set_share(1, "share").unwrap();

    *cache.borrow_mut() = label;
    let hook_cache = Rc::clone(&cache);
    storage.on_wipe(move || {
        hook_cache.borrow_mut().take();
    });

    storage.wipe().unwrap();

    assert!(cache.borrow().is_none());
    assert!(!storage.is_initialized().unwrap());
    assert_eq!(storage.version().unwrap(), None);

    let mut device = storage.device();
    assert_eq!(device.label().unwrap(), None);
    assert!(!device.has_passphrase().unwrap());
    assert_eq!(device.passphrase_source().unwrap() as u8, 0);
    assert_eq!(device.rotation().unwrap(), 0);
    assert_eq!(device.flags().unwrap(), 0);
    assert_eq!(device.autolock_delay_ms().unwrap(), 600_000);
    assert!(device.mnemonic_secret().unwrap().is_none());
    assert_eq!(device.mnemonic_type().unwrap(), None);
    assert!(!device.needs_backup().unwrap());
    assert!(!device.unfinished_backup().unwrap());
    assert_eq!(device.homescreen().unwrap(), None);
    assert_eq!(device.next_u2f_counter().unwrap(), 0);

    let recovery = storage.recovery();
    assert!(!recovery.is_in_progress().unwrap());
    assert_eq!(recovery.fetch().unwrap().count(), 0);
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

#[test]
fn legacy_device_migrates_counter_on_unlock() {
    let mut vault = MemoryVault::new();
    schema::VERSION.set(&mut vault, &STORAGE_VERSION_01).unwrap();
    schema::LEGACY_U2F_COUNTER.set(&mut vault, &42).unwrap();
    vault.restart();

    let mut storage = Storage::new(vault);
    assert!(matches!(
        storage.run_pending_migration(),
        Err(StorageError::Locked)
    ));

    storage.vault_mut().unlock();
    let steps = storage.run_pending_migration().unwrap();
    assert_eq!(steps, vec![MigrationStep::PublicU2fCounter]);
    assert_eq!(storage.version().unwrap(), Some(STORAGE_VERSION_CURRENT));
    assert_eq!(
        schema::LEGACY_U2F_COUNTER.get_raw(storage.vault()).unwrap(),
        None
    );
    assert_eq!(
        storage.vault().peek_counter(schema::U2F_COUNTER).unwrap(),
        Some(43)
    );

    storage.vault_mut().lock();
    assert_eq!(storage.device().next_u2f_counter().unwrap(), 43);
}

#[test]
fn fresh_device_is_tagged_when_secret_is_stored() {
    let mut storage = storage();
    assert!(storage.run_pending_migration().unwrap().is_empty());
    assert_eq!(storage.version().unwrap(), None);

    storage
        .device()
        .store_mnemonic_secret(b"seed", MnemonicType::Bip39, false, true)
        .unwrap();
    assert_eq!(storage.version().unwrap(), Some(STORAGE_VERSION_CURRENT));
    assert!(storage.run_pending_migration().unwrap().is_empty());
}
