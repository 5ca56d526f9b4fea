//! Plugin configuration entries and merged options.
//!
//! The plugin list is ordered; order decides tie-breaks between plugins of
//! equal priority.
//!
//! ```toml
//! [[plugins]]
//! name = "maintenance"
//! priority = 10
//!
//! [[plugins]]
//! name = "twitch"
//! whitelist = ["#alice/$bob;0123456789abcdef"]
//! channels = ["speedrun", "gamesdonequick"]   # plugin-specific
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options every plugin has, merged over the defaults.
///
/// | Key | Default | Meaning |
/// |-----|---------|---------|
/// | `priority` | `0` | higher runs first |
/// | `whitelist` | none | conversations that trigger chat-message handlers |
/// | anything else | – | passed through to the plugin in [`extra`](Self::extra) |
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginOptions {
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PluginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_whitelist<I, S>(mut self, chats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist = Some(chats.into_iter().map(Into::into).collect());
        self
    }

    /// Sets a plugin-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The whitelist when it restricts anything. An empty list counts as none.
    pub fn active_whitelist(&self) -> Option<&[String]> {
        self.whitelist.as_deref().filter(|list| !list.is_empty())
    }

    /// Plugin-specific option `key` decoded as `T`. `Ok(None)` when absent.
    pub fn option<T: DeserializeOwned>(&self, key: &str) -> serde_json::Result<Option<T>> {
        self.extra
            .get(key)
            .map(|value| T::deserialize(value))
            .transpose()
    }

    /// All plugin-specific options decoded as one struct.
    ///
    /// Use `#[serde(default)]` on `T` to make every field optional.
    pub fn options_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&Value::Object(self.extra.clone()))
    }
}

/// One entry of the configured plugin list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    pub name: String,
    #[serde(flatten)]
    pub options: PluginOptions,
}

impl PluginEntry {
    /// An entry with default options.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: PluginOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PluginOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults() {
        let entry: PluginEntry = serde_json::from_value(json!({ "name": "plain" })).unwrap();
        assert_eq!(entry.options.priority, 0);
        assert_eq!(entry.options.whitelist, None);
        assert!(entry.options.extra.is_empty());
    }

    #[test]
    fn test_extra_options_pass_through() {
        let entry: PluginEntry = serde_json::from_value(json!({
            "name": "test",
            "priority": 1,
            "whitelist": ["some_chat"],
            "test": 123,
            "herp": "derp",
        }))
        .unwrap();

        let options = &entry.options;
        assert_eq!(options.priority, 1);
        assert_eq!(options.active_whitelist(), Some(&["some_chat".to_string()][..]));
        assert_eq!(options.extra.len(), 2);
        assert_eq!(options.option::<i64>("test").unwrap(), Some(123));
        assert_eq!(options.option::<String>("herp").unwrap().as_deref(), Some("derp"));
        assert_eq!(options.option::<String>("missing").unwrap(), None);
        assert!(options.option::<String>("test").is_err());
    }

    #[test]
    fn test_options_as() {
        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct Twitch {
            channels: Vec<String>,
            interval: u64,
        }

        let options = PluginOptions::new()
            .with_option("channels", json!(["speedrun"]))
            .with_option("interval", 30);
        let twitch: Twitch = options.options_as().unwrap();
        assert_eq!(twitch.channels, vec!["speedrun"]);
        assert_eq!(twitch.interval, 30);

        let empty: Twitch = PluginOptions::new().options_as().unwrap();
        assert!(empty.channels.is_empty());
    }

    #[test]
    fn test_empty_whitelist_is_inactive() {
        let options = PluginOptions::new().with_whitelist(Vec::<String>::new());
        assert_eq!(options.active_whitelist(), None);
    }
}
