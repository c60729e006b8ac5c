use crate::game::{self, GameFamily};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_SORT_PASS_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    LoadOrder,
    Title,
    Version,
    UpdatedAt,
}

impl Default for SortBy {
    fn default() -> Self {
        SortBy::LoadOrder
    }
}

/// Where auto-sort puts separators once the mods are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparatorPlacement {
    /// After the resolved mod block, in their previous relative order.
    Append,
    /// In front of the mod that followed them before sorting.
    Anchor,
}

impl Default for SeparatorPlacement {
    fn default() -> Self {
        SeparatorPlacement::Append
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub active_game: GameFamily,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_in(&base_data_dir()?)
    }

    pub fn load_or_create_in(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let mut config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            if !game::supported_games().contains(&config.active_game) {
                config.active_game = GameFamily::default();
                config.save_in(base_dir)?;
            }
            return Ok(config);
        }

        let config = AppConfig {
            active_game: GameFamily::default(),
        };
        config.save_in(base_dir)?;
        Ok(config)
    }

    pub fn save_in(&self, base_dir: &Path) -> Result<()> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub game: GameFamily,
    pub game_name: String,
    pub data_dir: PathBuf,
    pub active_profile: u64,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default = "default_sync_debounce_ms")]
    pub sync_debounce_ms: u64,
    #[serde(default = "default_sort_pass_limit")]
    pub sort_pass_limit: usize,
    #[serde(default)]
    pub separator_placement: SeparatorPlacement,
}

impl GameConfig {
    pub fn load_or_create(game: GameFamily) -> Result<Self> {
        Self::load_or_create_in(game, &data_dir_for_game(game)?)
    }

    pub fn load_or_create_in(game: GameFamily, data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("create data dir")?;

        let config_path = data_dir.join("config.json");
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path).context("read config")?;
            let mut config: GameConfig = serde_json::from_str(&raw).context("parse config")?;
            config.game = game;
            config.game_name = game.display_name().to_string();
            config.data_dir = data_dir.to_path_buf();
            if config.sort_pass_limit == 0 {
                config.sort_pass_limit = DEFAULT_SORT_PASS_LIMIT;
            }
            config.save()?;
            return Ok(config);
        }

        let config = GameConfig {
            game,
            game_name: game.display_name().to_string(),
            data_dir: data_dir.to_path_buf(),
            active_profile: 1,
            sort_by: SortBy::default(),
            sync_debounce_ms: DEFAULT_SYNC_DEBOUNCE_MS,
            sort_pass_limit: DEFAULT_SORT_PASS_LIMIT,
            separator_placement: SeparatorPlacement::default(),
        };

        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = self.data_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(config_path, raw).context("write config")?;
        Ok(())
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.json")
    }

    pub fn conflicts_path(&self) -> PathBuf {
        self.data_dir.join("conflicts.json")
    }

    pub fn records_dir(&self) -> PathBuf {
        self.data_dir.join("records")
    }
}

pub fn data_dir_for_game(game: GameFamily) -> Result<PathBuf> {
    let base = base_data_dir()?;
    Ok(base.join(game.data_dir_name()))
}

fn default_sync_debounce_ms() -> u64 {
    DEFAULT_SYNC_DEBOUNCE_MS
}

fn default_sort_pass_limit() -> usize {
    DEFAULT_SORT_PASS_LIMIT
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("loadsmith"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_config_round_trips_and_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let created = GameConfig::load_or_create_in(GameFamily::Bannerlord, dir.path()).unwrap();
        assert_eq!(created.sort_pass_limit, DEFAULT_SORT_PASS_LIMIT);
        assert_eq!(created.sync_debounce_ms, DEFAULT_SYNC_DEBOUNCE_MS);

        fs::write(
            dir.path().join("config.json"),
            r#"{"game_name":"x","data_dir":"/elsewhere","active_profile":3}"#,
        )
        .unwrap();
        let loaded = GameConfig::load_or_create_in(GameFamily::Bannerlord, dir.path()).unwrap();
        assert_eq!(loaded.active_profile, 3);
        assert_eq!(loaded.data_dir, dir.path());
        assert_eq!(loaded.sort_by, SortBy::LoadOrder);
        assert_eq!(loaded.separator_placement, SeparatorPlacement::Append);
    }

    #[test]
    fn app_config_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::load_or_create_in(dir.path()).unwrap();
        config.active_game = GameFamily::Bannerlord;
        config.save_in(dir.path()).unwrap();
        let again = AppConfig::load_or_create_in(dir.path()).unwrap();
        assert_eq!(again.active_game, GameFamily::Bannerlord);
    }
}
