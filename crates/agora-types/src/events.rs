use serde::{Deserialize, Serialize};

use crate::api::{DirectMessageView, GroupMessageView, ReactionGroup, ReadReceipt};

/// Conversation topology. Doubles as the `room_kind` discriminator in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Group,
    Direct,
}

impl RoomKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::Group => "group",
            RoomKind::Direct => "direct",
        }
    }
}

/// Addresses one room in either topology. Group rooms carry their parent
/// group id because authorization and the topic shape both need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoomAddress {
    Group { group_id: i64, room_id: i64 },
    Direct { room_id: i64 },
}

impl RoomAddress {
    pub fn group(group_id: i64, room_id: i64) -> Self {
        RoomAddress::Group { group_id, room_id }
    }

    pub fn direct(room_id: i64) -> Self {
        RoomAddress::Direct { room_id }
    }

    pub fn room_kind(&self) -> RoomKind {
        match self {
            RoomAddress::Group { .. } => RoomKind::Group,
            RoomAddress::Direct { .. } => RoomKind::Direct,
        }
    }

    pub fn room_id(&self) -> i64 {
        match self {
            RoomAddress::Group { room_id, .. } => *room_id,
            RoomAddress::Direct { room_id } => *room_id,
        }
    }

    /// Base topic for this room: `chat/{group_id}/{room_id}` or
    /// `direct/{room_id}`.
    pub fn topic(&self) -> String {
        match self {
            RoomAddress::Group { group_id, room_id } => {
                format!("chat/{}/{}", group_id, room_id)
            }
            RoomAddress::Direct { room_id } => format!("direct/{}", room_id),
        }
    }
}

/// Events published to room topics and relayed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatEvent {
    /// Server confirms successful authentication
    Ready { user_id: i64, username: String },

    /// A new group-room message was posted
    GroupMessage(GroupMessageView),

    /// A new direct-room message was posted
    DirectMessage(DirectMessageView),

    /// A participant started or stopped typing
    Typing {
        user_id: i64,
        username: String,
        is_typing: bool,
    },

    /// A participant acknowledged a message as read
    Read(ReadReceipt),

    /// A message was soft-deleted
    MessageDeleted { message_id: i64 },

    /// A reaction was toggled; carries the fresh aggregate, not a delta
    Reaction {
        message_id: i64,
        reactions: Vec<ReactionGroup>,
    },

    /// Pushed to the sender's private channel when an action failed
    Error { code: String, message: String },
}

impl ChatEvent {
    /// Sub-topic under the room topic this event is delivered on, if any.
    pub fn subtopic(&self) -> Option<&'static str> {
        match self {
            ChatEvent::Typing { .. } => Some("typing"),
            ChatEvent::Read(_) => Some("read"),
            _ => None,
        }
    }
}

/// Outbound wire frame: the rendered topic plus the event payload.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub topic: String,
    #[serde(flatten)]
    pub event: ChatEvent,
}

impl Frame {
    pub fn new(room: RoomAddress, event: ChatEvent) -> Self {
        let topic = match event.subtopic() {
            Some(sub) => format!("{}/{}", room.topic(), sub),
            None => room.topic(),
        };
        Self { topic, event }
    }
}

/// Commands sent FROM client TO server on the group gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatCommand {
    /// Authenticate the WebSocket connection. Must be the first frame.
    Identify { token: String },

    /// Subscribe to events for specific rooms. Each room is
    /// authorization-checked; rooms the caller may not access are skipped.
    Subscribe { rooms: Vec<GroupRoomRef> },

    /// Post a text message to a room
    Send {
        group_id: i64,
        room_id: i64,
        message: String,
        #[serde(default)]
        reply_to_message_id: Option<i64>,
    },

    /// Indicate typing in a room
    TypingStart { group_id: i64, room_id: i64 },
    TypingStop { group_id: i64, room_id: i64 },

    /// Acknowledge a message as read
    Read {
        group_id: i64,
        room_id: i64,
        message_id: i64,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GroupRoomRef {
    pub group_id: i64,
    pub room_id: i64,
}

/// Commands on the per-room direct socket. The room is fixed at connect
/// time, so commands carry no addressing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DirectCommand {
    Send {
        message: String,
        #[serde(default)]
        reply_to_message_id: Option<i64>,
    },
    TypingStart,
    TypingStop,
    Read { message_id: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_follow_the_transport_contract() {
        let group = RoomAddress::group(7, 42);
        let direct = RoomAddress::direct(9);
        assert_eq!(group.topic(), "chat/7/42");
        assert_eq!(direct.topic(), "direct/9");

        let typing = Frame::new(
            group,
            ChatEvent::Typing {
                user_id: 1,
                username: "ana".into(),
                is_typing: true,
            },
        );
        assert_eq!(typing.topic, "chat/7/42/typing");

        let read = Frame::new(
            direct,
            ChatEvent::Read(crate::api::ReadReceipt {
                message_id: 3,
                user_id: 1,
                username: "ana".into(),
                read_count: 1,
            }),
        );
        assert_eq!(read.topic, "direct/9/read");
    }

    #[test]
    fn commands_deserialize_from_tagged_json() {
        let cmd: ChatCommand = serde_json::from_str(
            r#"{"type":"Send","data":{"group_id":1,"room_id":2,"message":"hi"}}"#,
        )
        .unwrap();
        match cmd {
            ChatCommand::Send {
                group_id,
                room_id,
                message,
                reply_to_message_id,
            } => {
                assert_eq!((group_id, room_id), (1, 2));
                assert_eq!(message, "hi");
                assert_eq!(reply_to_message_id, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cmd: DirectCommand =
            serde_json::from_str(r#"{"type":"Read","data":{"message_id":5}}"#).unwrap();
        assert!(matches!(cmd, DirectCommand::Read { message_id: 5 }));
    }
}
