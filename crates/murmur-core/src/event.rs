//! Host event vocabulary.
//!
//! The host chat client names its events in CamelCase (`MessageStatus`,
//! `UserStatus`, …). [`EventKind`] is the closed set of names the router
//! accepts; anything else is rejected as an [`UnknownEvent`].
//!
//! Each event has a conventional handler name derived with
//! [`camel_to_snake`]:
//!
//! | Event | Handler name |
//! |-------|--------------|
//! | `MessageStatus` | `on_message_status` |
//! | `CallDtmfReceived` | `on_call_dtmf_received` |
//! | `UserAuthorizationRequestReceived` | `on_user_authorization_request_received` |

use std::fmt;
use std::str::FromStr;

use crate::error::UnknownEvent;

macro_rules! event_kinds {
    ($( $(#[$meta:meta])* $variant:ident ),* $(,)?) => {
        /// A named event fired by the host chat client.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventKind {
            $( $(#[$meta])* $variant, )*
        }

        impl EventKind {
            /// Every known event, in declaration order.
            pub const ALL: &'static [EventKind] = &[ $( EventKind::$variant, )* ];

            /// The host's CamelCase name for this event.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( EventKind::$variant => stringify!($variant), )*
                }
            }
        }

        impl FromStr for EventKind {
            type Err = UnknownEvent;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( stringify!($variant) => Ok(EventKind::$variant), )*
                    other => Err(UnknownEvent(other.to_string())),
                }
            }
        }
    };
}

event_kinds! {
    ApplicationConnecting,
    ApplicationDatagram,
    ApplicationReceiving,
    ApplicationSending,
    ApplicationStreams,
    AsyncSearchUsersFinished,
    AttachmentStatus,
    AutoAway,
    CallDtmfReceived,
    CallHistory,
    CallInputStatusChanged,
    CallSeenStatusChanged,
    CallStatus,
    CallTransferStatusChanged,
    CallVideoReceiveStatusChanged,
    CallVideoSendStatusChanged,
    CallVideoStatusChanged,
    ChatMemberRoleChanged,
    ChatMembersChanged,
    ChatWindowState,
    ClientWindowState,
    Command,
    ConnectionStatus,
    ContactsFocused,
    Error,
    FileTransferStatusChanged,
    GroupDeleted,
    GroupExpanded,
    GroupUsers,
    GroupVisible,
    /// A chat message changed status. The only event subject to whitelisting.
    MessageStatus,
    MessageHistory,
    Mute,
    Notify,
    OnlineStatus,
    PluginEventClicked,
    PluginMenuItemClicked,
    Reply,
    SilentModeStatusChanged,
    SmsMessageStatusChanged,
    SmsTargetStatusChanged,
    UserAuthorizationRequestReceived,
    UserMood,
    UserStatus,
    VoicemailStatus,
    WallpaperChanged,
}

impl EventKind {
    /// Conventional handler name for this event, e.g. `on_message_status`.
    pub fn handler_name(self) -> String {
        format!("on_{}", camel_to_snake(self.as_str()))
    }

    /// Whether handler whitelists apply to this event.
    pub const fn is_chat_message(self) -> bool {
        matches!(self, EventKind::MessageStatus)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a CamelCase name to snake_case.
///
/// An underscore is inserted before every maximal run of ASCII uppercase
/// letters that does not start the string, then everything is lowercased. A
/// leading run only keeps its first letter, so `ABc` becomes `a_bc`.
///
/// ```
/// use murmur_core::event::camel_to_snake;
///
/// assert_eq!(camel_to_snake("MessageStatus"), "message_status");
/// assert_eq!(
///     camel_to_snake("1MessageStatusHERPDerpDurr_123"),
///     "1_message_status_herpderp_durr_123"
/// );
/// ```
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 8);
    let mut prev_upper = false;
    for (i, ch) in name.chars().enumerate() {
        let upper = ch.is_ascii_uppercase();
        if upper && i > 0 && (i == 1 || !prev_upper) {
            out.push('_');
        }
        out.push(ch.to_ascii_lowercase());
        prev_upper = upper;
    }
    out
}
