//! Persisted settings stored as JSON under a key.

use rusqlite::{params, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use super::{Database, DbResult};
use crate::settings::Customization;

const CUSTOMIZATION_KEY: &str = "customization";

impl Database {
    /// Store a JSON-serializable setting, replacing any previous value.
    pub fn put_setting<T: Serialize>(&self, key: &str, value: &T) -> DbResult<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, json],
        )?;
        Ok(())
    }

    /// Load a setting, or `None` if it was never stored.
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        let json: Option<String> = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(Into::into))
            .transpose()
    }

    pub fn save_customization(&self, customization: &Customization) -> DbResult<()> {
        self.put_setting(CUSTOMIZATION_KEY, customization)
    }

    /// Stored customization, falling back to defaults.
    pub fn load_customization(&self) -> DbResult<Customization> {
        Ok(self.get_setting(CUSTOMIZATION_KEY)?.unwrap_or_default())
    }
}
