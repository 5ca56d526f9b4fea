//! Bot maintenance commands.
//!
//! | Command | Reply |
//! |---------|-------|
//! | `!plugins` | names of the loaded plugins |
//! | `!help <plugin>`, `!usage <plugin>` | that plugin's usage text |
//! | `!commands` | the commands below |
//! | `!version` | the runtime version |
//!
//! Plugin names and usage come from the [`REQUEST_PLUGINS`] and
//! [`REQUEST_USAGE`] signals, so this plugin never touches the manager.

use std::sync::Arc;

use linkme::distributed_slice;
use murmur_core::signal::{REQUEST_PLUGINS, REQUEST_USAGE};
use murmur_core::{ChatMessage, EventKind, Payload};
use serde_json::Value;
use tracing::warn;

use crate::command::CommandSet;
use crate::error::PluginResult;
use crate::plugin::{PLUGIN_REGISTRY, Plugin, PluginContext, PluginDescriptor};

#[distributed_slice(PLUGIN_REGISTRY)]
pub static MAINTENANCE: PluginDescriptor = PluginDescriptor::new("maintenance", create);

const COMMANDS: &[(&str, &str)] = &[
    ("!plugins", "Lists the loaded plugins."),
    ("!help", "Shows a plugin's usage: !help <plugin>"),
    ("!usage", "Same as !help."),
    ("!commands", "Lists the maintenance commands."),
    ("!version", "Shows the runtime version."),
];

const HELP_HINT: &str = "Type '!commands' to display a list of supported commands";

fn create(ctx: Arc<PluginContext>) -> PluginResult<Plugin> {
    let commands = CommandSet::new()
        .command(COMMANDS[0].0, COMMANDS[0].1, list_plugins)
        .command(COMMANDS[1].0, COMMANDS[1].1, show_usage)
        .command(COMMANDS[2].0, COMMANDS[2].1, show_usage)
        .command(COMMANDS[3].0, COMMANDS[3].1, list_commands)
        .command(COMMANDS[4].0, COMMANDS[4].1, show_version);

    Ok(Plugin::builder(ctx.name())
        .usage("Maintenance commands: !plugins, !help <plugin>, !commands, !version")
        .on(EventKind::MessageStatus, commands.into_handler())
        .build())
}

/// Sends `signal` and returns the non-null answers.
fn ask(ctx: &PluginContext, signal: &str, payload: &Payload) -> Vec<Value> {
    match ctx.signals().send(signal, payload) {
        Ok(answers) => answers.into_iter().filter(|v| !v.is_null()).collect(),
        Err(e) => {
            warn!(plugin = %ctx.name(), signal, error = %e, "Signal failed");
            Vec::new()
        }
    }
}

fn list_plugins(ctx: &PluginContext, msg: &ChatMessage, _: &str) {
    let names: Vec<String> = ask(ctx, REQUEST_PLUGINS, &Payload::new())
        .iter()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    ctx.send_message(&msg.chat, format!("Active plugins: {}", names.join(", ")));
}

fn show_usage(ctx: &PluginContext, msg: &ChatMessage, rest: &str) {
    let Some(name) = rest.split_whitespace().next() else {
        ctx.send_message(&msg.chat, HELP_HINT);
        return;
    };

    let answers = ask(ctx, REQUEST_USAGE, &Payload::new().kwarg("name", name));
    let reply = match answers.iter().find_map(Value::as_str) {
        Some(text) => format!("{name}: {text}"),
        None => format!("No such plugin: {name}"),
    };
    ctx.send_message(&msg.chat, reply);
}

fn list_commands(ctx: &PluginContext, msg: &ChatMessage, _: &str) {
    let mut lines = vec!["Supported commands:".to_string()];
    lines.extend(COMMANDS.iter().map(|(word, help)| format!("{word}: {help}")));
    ctx.send_message(&msg.chat, lines.join("\n"));
}

fn show_version(ctx: &PluginContext, msg: &ChatMessage, _: &str) {
    ctx.send_message(
        &msg.chat,
        format!("murmur version: '{}'", env!("CARGO_PKG_VERSION")),
    );
}

#[cfg(test)]
mod tests {
    use murmur_core::{Args, ChatMessage, MessageStatus, args};

    use super::*;
    use crate::manager::{PluginManager, PluginServices};
    use crate::plugin::{PluginEntry, PluginRegistry};
    use crate::router::EventRouter;

    fn twitch(ctx: Arc<PluginContext>) -> PluginResult<Plugin> {
        Ok(Plugin::builder(ctx.name()).usage("Announces live streams").build())
    }

    fn router() -> Arc<EventRouter> {
        let mut registry = PluginRegistry::new();
        registry
            .register(MAINTENANCE)
            .register(PluginDescriptor::new("twitch", twitch));
        let entries = [PluginEntry::new("maintenance"), PluginEntry::new("twitch")];
        let manager = PluginManager::load(&entries, &registry, PluginServices::default()).unwrap();
        Arc::new(EventRouter::new(Arc::new(manager)))
    }

    fn say(router: &EventRouter, body: &str) -> Vec<String> {
        let args: Args = args![ChatMessage::new("chat", "alice", body), MessageStatus::Received];
        router.dispatch("MessageStatus", args);
        router
            .plugins()
            .drain_outboxes()
            .into_iter()
            .map(|m| {
                assert_eq!(m.chat, "chat");
                m.text
            })
            .collect()
    }

    #[test]
    fn test_plugins_command() {
        let router = router();
        assert_eq!(say(&router, "!plugins"), vec!["Active plugins: maintenance, twitch"]);
    }

    #[test]
    fn test_help_command() {
        let router = router();
        assert_eq!(say(&router, "!help twitch"), vec!["twitch: Announces live streams"]);
        assert_eq!(say(&router, "!USAGE twitch"), vec!["twitch: Announces live streams"]);
        assert_eq!(say(&router, "!help nope"), vec!["No such plugin: nope"]);
        assert_eq!(say(&router, "!help"), vec![HELP_HINT]);
    }

    #[test]
    fn test_commands_and_version() {
        let router = router();
        let listing = say(&router, "!commands");
        assert_eq!(listing.len(), 1);
        assert!(listing[0].starts_with("Supported commands:\n!plugins:"));
        assert_eq!(listing[0].lines().count(), COMMANDS.len() + 1);

        let version = say(&router, "!version");
        assert_eq!(version, vec![format!("murmur version: '{}'", env!("CARGO_PKG_VERSION"))]);
    }

    #[test]
    fn test_ignores_other_messages() {
        let router = router();
        assert!(say(&router, "hello everyone").is_empty());
    }
}
