//! Per-plugin conversation allow-lists.
//!
//! Hosts name group conversations `display;id`, and either part may change
//! on its own (display names are edited, ids are regenerated). A whitelist
//! entry therefore matches a conversation by any of:
//!
//! | Entry | Matches |
//! |-------|---------|
//! | `#alice/$bob;0123456789abcdef` | that exact conversation |
//! | `#alice/$bob` | any conversation with that display part |
//! | `0123456789abcdef` | any conversation with that id part |

use murmur_core::ChatName;

/// Returns `true` if `chat` is allowed by `whitelist`.
///
/// An empty whitelist allows nothing; callers treat "no whitelist" as
/// unrestricted before calling this.
pub fn is_whitelisted(chat: &str, whitelist: &[String]) -> bool {
    let name = ChatName::parse(chat);
    whitelist.iter().any(|entry| {
        entry == name.full() || name.display() == Some(entry.as_str()) || name.id() == Some(entry.as_str())
    })
}
