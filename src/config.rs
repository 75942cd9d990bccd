//! Application-level configuration loading, including the party-game content decks.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    dao::connectivity::DEFAULT_PROBE_URL,
    games::{categories::Category, trap::TrapSkin},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LOOPY_BACK_CONFIG_PATH";
/// Environment variable that overrides the connectivity probe target.
const PROBE_URL_ENV: &str = "CONNECTIVITY_PROBE_URL";
/// CouchDB server root; setting it turns the CouchDB store on.
const COUCH_BASE_URL_ENV: &str = "COUCH_BASE_URL";
const COUCH_DB_ENV: &str = "COUCH_DB";
const COUCH_USERNAME_ENV: &str = "COUCH_USERNAME";
const COUCH_PASSWORD_ENV: &str = "COUCH_PASSWORD";
const DEFAULT_COUCH_DB: &str = "loopy";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Connection settings of the CouchDB document store.
pub struct CouchSettings {
    /// Server root, e.g. `http://localhost:5984`.
    pub base_url: String,
    /// Database holding every collection.
    #[serde(default = "default_couch_database")]
    pub database: String,
    /// Basic-auth user.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_couch_database() -> String {
    DEFAULT_COUCH_DB.to_string()
}

impl CouchSettings {
    /// Settings for `database` on the server at `base_url`, without credentials.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            username: None,
            password: None,
        }
    }

    /// Basic-auth credentials, when both halves are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.username.as_deref().zip(self.password.as_deref())
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    prompts: Vec<String>,
    categories: Vec<Category>,
    probe_url: String,
    trap_skin: TrapSkin,
    couch: Option<CouchSettings>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in decks.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        prompts = app_config.prompts.len(),
                        categories = app_config.categories.len(),
                        "loaded game content from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };
        config.with_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides looked up by environment variable name. Blank values
    /// are ignored.
    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = var(PROBE_URL_ENV) {
            self.probe_url = url;
        }
        if let Some(base_url) = var(COUCH_BASE_URL_ENV) {
            let couch = self
                .couch
                .get_or_insert_with(|| CouchSettings::new("", DEFAULT_COUCH_DB));
            couch.base_url = base_url;
        }
        if let Some(couch) = self.couch.as_mut() {
            if let Some(database) = var(COUCH_DB_ENV) {
                couch.database = database;
            }
            if let Some(username) = var(COUCH_USERNAME_ENV) {
                couch.username = Some(username);
            }
            if let Some(password) = var(COUCH_PASSWORD_ENV) {
                couch.password = Some(password);
            }
        }
        self
    }

    /// Prompts drawn after a bottle spin.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Category deck of the letter game.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// URL probed to decide whether the network is reachable.
    pub fn probe_url(&self) -> &str {
        &self.probe_url
    }

    /// Trap skin used when a table does not ask for one.
    pub fn trap_skin(&self) -> TrapSkin {
        self.trap_skin
    }

    /// CouchDB settings; `None` keeps documents in memory.
    pub fn couch(&self) -> Option<&CouchSettings> {
        self.couch.as_ref()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prompts: default_prompts(),
            categories: default_categories(),
            probe_url: DEFAULT_PROBE_URL.to_string(),
            trap_skin: TrapSkin::default(),
            couch: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every section is optional; missing or empty sections keep the built-in deck.
struct RawConfig {
    #[serde(default)]
    prompts: Vec<String>,
    #[serde(default)]
    categories: Vec<RawCategory>,
    #[serde(default)]
    connectivity_probe_url: Option<String>,
    #[serde(default)]
    trap_skin: Option<TrapSkin>,
    #[serde(default)]
    couch: Option<CouchSettings>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let prompts: Vec<String> = value
            .prompts
            .into_iter()
            .map(|prompt| prompt.trim().to_string())
            .filter(|prompt| !prompt.is_empty())
            .collect();
        let categories: Vec<Category> = value.categories.into_iter().map(Into::into).collect();

        Self {
            prompts: if prompts.is_empty() {
                defaults.prompts
            } else {
                prompts
            },
            categories: if categories.is_empty() {
                defaults.categories
            } else {
                categories
            },
            probe_url: value.connectivity_probe_url.unwrap_or(defaults.probe_url),
            trap_skin: value.trap_skin.unwrap_or(defaults.trap_skin),
            couch: value.couch.filter(|couch| !couch.base_url.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single category card inside the configuration file.
struct RawCategory {
    title: String,
    #[serde(default)]
    emoji: String,
}

impl From<RawCategory> for Category {
    fn from(value: RawCategory) -> Self {
        Category::new(value.title.trim(), value.emoji)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in spin prompts shipped with the binary.
fn default_prompts() -> Vec<String> {
    [
        "Sip if you have a group chat muted.",
        "Truth: most embarrassing screenshot on your phone?",
        "Wildcard: everybody drinks!",
        "Dare: swap seats with the loudest player.",
        "Truth: who was your last text to?",
        "Dare: speak in song lyrics until your next turn.",
        "Sip if you have more than 50 unread emails.",
        "Wildcard: choose someone to finish your drink.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Built-in category deck shipped with the binary.
fn default_categories() -> Vec<Category> {
    [
        ("Animals", "🐾"),
        ("TV Shows / Movies", "🎬"),
        ("Ugly Names", "😬"),
        ("Pickup Lines", "😉"),
        ("Excuses for being late", "⏰"),
        ("Things you’d never say to your boss", "🤐"),
        ("Biggest red flags", "🚩"),
        ("Random noises", "🤪"),
        ("Things you shouldn’t do at a wedding", "💒"),
        ("Stuff you’d never want in your Tinder bio", "📱"),
        ("Things you shouldn’t whisper in church", "🙏"),
        ("Worst things to find in your fridge", "🥒"),
        ("Things you’d say to a dog but not a human", "🐶"),
        ("Things you yell in public", "📢"),
        ("Awkward things to say on a first date", "🍝"),
        ("What you’ll name your cult", "🕯️"),
        ("Reasons you’ll get canceled", "📱"),
        ("Things you shouldn’t say at a funeral", "⚰️"),
        ("Jobs you’d be terrible at", "👷"),
        ("Lame excuses for breaking up", "💔"),
        ("Excuses for why you’re still single", "🥂"),
        ("Things you’d say right before jail", "🚔"),
        ("Worst possible text to your parents", "📲"),
        ("Terrible stripper names", "💃"),
    ]
    .into_iter()
    .map(|(title, emoji)| Category::new(title, emoji))
    .collect()
}
