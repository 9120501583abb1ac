use std::sync::Mutex;

use crate::models::AppSettings;
use crate::storage::{Storage, StorageError, SETTINGS_KEY};

pub struct SettingsStore {
    storage: Storage,
    settings: Mutex<AppSettings>,
}

impl SettingsStore {
    /// Loads stored settings; fields missing from disk keep their defaults.
    pub fn load(storage: Storage) -> Self {
        let settings = storage.get_item(SETTINGS_KEY, AppSettings::default());
        Self {
            storage,
            settings: Mutex::new(settings),
        }
    }

    pub fn settings(&self) -> AppSettings {
        self.settings.lock().expect("settings poisoned").clone()
    }

    pub fn toggle_dark_mode(&self) -> Result<AppSettings, StorageError> {
        self.update(|settings| settings.dark_mode = !settings.dark_mode)
    }

    pub fn set_dark_mode(&self, value: bool) -> Result<AppSettings, StorageError> {
        self.update(|settings| settings.dark_mode = value)
    }

    fn update(&self, apply: impl FnOnce(&mut AppSettings)) -> Result<AppSettings, StorageError> {
        let mut guard = self.settings.lock().expect("settings poisoned");
        let mut next = guard.clone();
        apply(&mut next);
        // Only commit in memory once the file reflects the change.
        self.storage.set_item(SETTINGS_KEY, &next)?;
        *guard = next.clone();
        log::info!("settings updated dark_mode={}", next.dark_mode);
        Ok(next)
    }
}
