use std::sync::Arc;

use agora_chat::{ChatError, ChatService};
use agora_db::Database;
use agora_types::api::{Identity, MessageKind, SendMessageRequest};
use agora_types::events::{RoomAddress, RoomKind};

struct Fixture {
    chat: ChatService,
    ana: Identity,  // group owner, deliberately without a membership row
    ben: Identity,  // plain member
    cara: Identity, // flagged admin member
    dave: Identity, // not a member
    group_id: i64,
    admin_room: i64,
    general_room: i64,
}

fn fixture() -> Fixture {
    let db = Arc::new(Database::open_in_memory().unwrap());

    let ana = seed_user(&db, "ana");
    let ben = seed_user(&db, "ben");
    let cara = seed_user(&db, "cara");
    let dave = seed_user(&db, "dave");

    let group_id = db.insert_group("hikers", ana.user_id).unwrap();
    db.insert_group_member(group_id, ben.user_id, false).unwrap();
    db.insert_group_member(group_id, cara.user_id, true).unwrap();

    let chat = ChatService::new(db);
    let (admin_room, general_room) = chat.provision_group_rooms(group_id).unwrap();

    Fixture {
        chat,
        ana,
        ben,
        cara,
        dave,
        group_id,
        admin_room,
        general_room,
    }
}

fn seed_user(db: &Database, username: &str) -> Identity {
    let user_id = db.insert_user(username, None, None).unwrap();
    Identity {
        user_id,
        username: username.to_string(),
    }
}

fn text(body: &str) -> SendMessageRequest {
    SendMessageRequest {
        kind: MessageKind::Text,
        message: Some(body.to_string()),
        file_url: None,
        file_name: None,
        file_size: None,
        reply_to_message_id: None,
    }
}

#[test]
fn direct_room_resolution_is_order_independent() {
    let f = fixture();

    let from_ana = f.chat.resolve_or_create_direct(&f.ana, f.ben.user_id).unwrap();
    let from_ben = f.chat.resolve_or_create_direct(&f.ben, f.ana.user_id).unwrap();
    assert_eq!(from_ana.id, from_ben.id);

    assert!(matches!(
        f.chat.resolve_or_create_direct(&f.ana, f.ana.user_id),
        Err(ChatError::InvalidArgument(_))
    ));
    assert!(matches!(
        f.chat.resolve_or_create_direct(&f.ana, 9999),
        Err(ChatError::NotFound(_))
    ));
}

#[test]
fn direct_unread_flow_matches_the_ledger() {
    let f = fixture();
    let room = f.chat.resolve_or_create_direct(&f.ana, f.ben.user_id).unwrap();
    let addr = RoomAddress::direct(room.id);

    let sent = f.chat.append_direct(room.id, &f.ana, &text("hi")).unwrap();
    assert!(!sent.is_read);

    // A sender's own message never counts as unread for them.
    assert_eq!(f.chat.unread_count(addr, f.ben.user_id).unwrap(), 1);
    assert_eq!(f.chat.unread_count(addr, f.ana.user_id).unwrap(), 0);

    let receipt = f.chat.mark_read(addr, &f.ben, sent.id).unwrap();
    assert_eq!(receipt.read_count, 1);
    assert_eq!(f.chat.unread_count(addr, f.ben.user_id).unwrap(), 0);
    assert!(f.chat.is_read_by(addr, sent.id, f.ben.user_id).unwrap());
}

#[test]
fn cursor_never_regresses() {
    let f = fixture();
    let room = f.chat.resolve_or_create_direct(&f.ana, f.ben.user_id).unwrap();
    let addr = RoomAddress::direct(room.id);

    let mut ids = vec![];
    for body in ["one", "two", "three"] {
        ids.push(f.chat.append_direct(room.id, &f.ana, &text(body)).unwrap().id);
    }

    f.chat.mark_read(addr, &f.ben, ids[2]).unwrap();
    // A stale ack for an older message is a no-op.
    f.chat.mark_read(addr, &f.ben, ids[0]).unwrap();

    assert!(f.chat.is_read_by(addr, ids[2], f.ben.user_id).unwrap());
    assert_eq!(f.chat.unread_count(addr, f.ben.user_id).unwrap(), 0);
}

#[test]
fn fetching_direct_history_reads_on_view() {
    let f = fixture();
    let room = f.chat.resolve_or_create_direct(&f.ana, f.ben.user_id).unwrap();
    let addr = RoomAddress::direct(room.id);

    f.chat.append_direct(room.id, &f.ana, &text("hello")).unwrap();
    f.chat.append_direct(room.id, &f.ana, &text("are you there?")).unwrap();
    assert_eq!(f.chat.unread_count(addr, f.ben.user_id).unwrap(), 2);

    let page = f.chat.page_direct(room.id, &f.ben, 0, 50).unwrap();
    assert_eq!(page.total_elements, 2);
    assert!(page.content.iter().all(|m| m.is_read));
    assert_eq!(f.chat.unread_count(addr, f.ben.user_id).unwrap(), 0);

    // Newest-first ordering by id.
    assert!(page.content[0].id > page.content[1].id);
}

#[test]
fn admin_room_gating_honors_implicit_owner_admin() {
    let f = fixture();

    // Plain member: Forbidden.
    assert!(matches!(
        f.chat
            .append_group(f.group_id, f.admin_room, &f.ben, &text("hi")),
        Err(ChatError::Forbidden(_))
    ));

    // Flagged admin: ok.
    f.chat
        .append_group(f.group_id, f.admin_room, &f.cara, &text("status?"))
        .unwrap();

    // Owner without a membership row: still an implicit admin member.
    f.chat
        .append_group(f.group_id, f.admin_room, &f.ana, &text("all good"))
        .unwrap();

    // Non-member: Forbidden even for the general room.
    assert!(matches!(
        f.chat
            .append_group(f.group_id, f.general_room, &f.dave, &text("hi")),
        Err(ChatError::Forbidden(_))
    ));
}

#[test]
fn cross_room_replies_are_rejected_at_creation() {
    let f = fixture();
    let room = f.chat.resolve_or_create_direct(&f.ana, f.ben.user_id).unwrap();

    let in_general = f
        .chat
        .append_group(f.group_id, f.general_room, &f.ben, &text("original"))
        .unwrap();

    let mut reply = text("wrong room");
    reply.reply_to_message_id = Some(in_general.id);
    assert!(matches!(
        f.chat.append_direct(room.id, &f.ana, &reply),
        Err(ChatError::InvalidArgument(_))
    ));

    // Same room resolves fine.
    let mut ok_reply = text("right room");
    ok_reply.reply_to_message_id = Some(in_general.id);
    let sent = f
        .chat
        .append_group(f.group_id, f.general_room, &f.ana, &ok_reply)
        .unwrap();
    assert_eq!(sent.reply_to_message_id, Some(in_general.id));
}

#[test]
fn soft_delete_hides_but_keeps_the_anchor() {
    let f = fixture();
    let addr = RoomAddress::group(f.group_id, f.general_room);

    let target = f
        .chat
        .append_group(f.group_id, f.general_room, &f.ben, &text("delete me"))
        .unwrap();

    // A non-sender non-admin may not delete.
    assert!(matches!(
        f.chat.soft_delete(addr, target.id, &f.dave),
        Err(ChatError::Forbidden(_))
    ));

    // The group admin may.
    f.chat.soft_delete(addr, target.id, &f.cara).unwrap();

    let page = f
        .chat
        .page_group_live(f.group_id, f.general_room, &f.ben, 0, 50)
        .unwrap();
    assert!(page.content.iter().all(|m| m.id != target.id));

    let hits = f
        .chat
        .search(RoomKind::Group, f.general_room, &f.ben, "delete", 0, 20)
        .unwrap();
    assert_eq!(hits.total_elements, 0);

    // Replying to the deleted message still works: the id stays an anchor.
    let mut reply = text("late answer");
    reply.reply_to_message_id = Some(target.id);
    f.chat
        .append_group(f.group_id, f.general_room, &f.ana, &reply)
        .unwrap();

    // Deleting again finds nothing.
    assert!(matches!(
        f.chat.soft_delete(addr, target.id, &f.cara),
        Err(ChatError::NotFound(_))
    ));
}

#[test]
fn reaction_toggle_round_trips_to_absence() {
    let f = fixture();

    let msg = f
        .chat
        .append_group(f.group_id, f.general_room, &f.ben, &text("nice view"))
        .unwrap();

    let (added, groups) = f
        .chat
        .toggle_reaction(f.group_id, f.general_room, &f.ana, msg.id, "👍")
        .unwrap();
    assert!(added);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 1);

    let (added, groups) = f
        .chat
        .toggle_reaction(f.group_id, f.general_room, &f.ana, msg.id, "👍")
        .unwrap();
    assert!(!added);
    assert!(groups.is_empty());

    // Non-members cannot react; admin rooms require admin.
    assert!(matches!(
        f.chat
            .toggle_reaction(f.group_id, f.general_room, &f.dave, msg.id, "👍"),
        Err(ChatError::Forbidden(_))
    ));
    let admin_msg = f
        .chat
        .append_group(f.group_id, f.admin_room, &f.cara, &text("admins only"))
        .unwrap();
    assert!(matches!(
        f.chat
            .toggle_reaction(f.group_id, f.admin_room, &f.ben, admin_msg.id, "👀"),
        Err(ChatError::Forbidden(_))
    ));
}

#[test]
fn group_page_aggregates_reactions_and_read_counts() {
    let f = fixture();

    let msg = f
        .chat
        .append_group(f.group_id, f.general_room, &f.ana, &text("summit at 9"))
        .unwrap();
    assert_eq!(msg.read_count, 0);
    assert!(msg.is_admin);

    f.chat
        .toggle_reaction(f.group_id, f.general_room, &f.ben, msg.id, "⛰️")
        .unwrap();
    f.chat
        .toggle_reaction(f.group_id, f.general_room, &f.cara, msg.id, "⛰️")
        .unwrap();
    f.chat
        .toggle_reaction(f.group_id, f.general_room, &f.cara, msg.id, "👍")
        .unwrap();

    let addr = RoomAddress::group(f.group_id, f.general_room);
    f.chat.mark_read(addr, &f.ben, msg.id).unwrap();

    let page = f
        .chat
        .page_group_live(f.group_id, f.general_room, &f.cara, 0, 50)
        .unwrap();
    let view = page.content.iter().find(|m| m.id == msg.id).unwrap();

    let mountain = view.reactions.iter().find(|r| r.emoji == "⛰️").unwrap();
    assert_eq!(mountain.count, 2);
    assert_eq!(view.my_emojis, vec!["⛰️".to_string(), "👍".to_string()]);

    // ben acked explicitly and cara read on view; ana is the sender.
    assert_eq!(view.read_count, 2);
}

#[test]
fn group_read_count_is_stable_under_repeated_acks() {
    let f = fixture();
    let addr = RoomAddress::group(f.group_id, f.general_room);

    let msg = f
        .chat
        .append_group(f.group_id, f.general_room, &f.ana, &text("trailhead moved"))
        .unwrap();

    let receipt = f.chat.mark_read(addr, &f.ben, msg.id).unwrap();
    assert_eq!(receipt.read_count, 1);

    // Re-acking the same message changes nothing.
    let again = f.chat.mark_read(addr, &f.ben, msg.id).unwrap();
    assert_eq!(again.read_count, 1);

    // Neither does acking an older message after a newer one.
    let newer = f
        .chat
        .append_group(f.group_id, f.general_room, &f.ana, &text("see you there"))
        .unwrap();
    f.chat.mark_read(addr, &f.ben, newer.id).unwrap();
    let stale = f.chat.mark_read(addr, &f.ben, msg.id).unwrap();
    assert_eq!(stale.read_count, 1);
    assert!(f.chat.is_read_by(addr, newer.id, f.ben.user_id).unwrap());
}

#[test]
fn default_rooms_refuse_deletion() {
    let f = fixture();

    for room in [f.general_room, f.admin_room] {
        assert!(matches!(
            f.chat.delete_room(f.group_id, room, &f.ana),
            Err(ChatError::InvalidArgument(_))
        ));
    }

    // A regular room created later deletes fine, but only for admins.
    let created = f
        .chat
        .create_room(
            f.group_id,
            &f.cara,
            &agora_types::api::CreateRoomRequest {
                name: "trips".into(),
                description: None,
            },
        )
        .unwrap();
    assert!(matches!(
        f.chat.delete_room(f.group_id, created.id, &f.ben),
        Err(ChatError::Forbidden(_))
    ));
    f.chat.delete_room(f.group_id, created.id, &f.ana).unwrap();
}

#[test]
fn provisioning_is_idempotent() {
    let f = fixture();
    let again = f.chat.provision_group_rooms(f.group_id).unwrap();
    assert_eq!(again, (f.admin_room, f.general_room));

    let rooms = f.chat.list_group_rooms(f.group_id, &f.ana).unwrap();
    assert_eq!(rooms.len(), 2);
}

#[test]
fn admin_rooms_are_invisible_to_plain_members() {
    let f = fixture();

    let for_ben = f.chat.list_group_rooms(f.group_id, &f.ben).unwrap();
    assert!(for_ben.iter().all(|r| !r.is_admin_room));

    let for_ana = f.chat.list_group_rooms(f.group_id, &f.ana).unwrap();
    assert!(for_ana.iter().any(|r| r.is_admin_room));

    assert!(matches!(
        f.chat.list_group_rooms(f.group_id, &f.dave),
        Err(ChatError::Forbidden(_))
    ));
}

#[test]
fn room_directory_orders_by_recent_activity() {
    let f = fixture();

    let direct = f.chat.resolve_or_create_direct(&f.ben, f.ana.user_id).unwrap();
    f.chat
        .append_group(f.group_id, f.general_room, &f.ana, &text("group first"))
        .unwrap();
    f.chat
        .append_direct(direct.id, &f.ana, &text("direct later"))
        .unwrap();

    let rooms = f.chat.list_rooms_for_user(&f.ben).unwrap();
    assert!(rooms.len() >= 2);
    match &rooms[0] {
        agora_types::api::RoomSummary::Direct(view) => assert_eq!(view.id, direct.id),
        other => panic!("expected the direct room first, got {:?}", other),
    }
}

#[test]
fn search_is_scoped_and_gated() {
    let f = fixture();

    f.chat
        .append_group(f.group_id, f.general_room, &f.ana, &text("picnic on sunday"))
        .unwrap();

    let hits = f
        .chat
        .search(RoomKind::Group, f.general_room, &f.ben, "sunday", 0, 20)
        .unwrap();
    assert_eq!(hits.total_elements, 1);
    assert_eq!(hits.content[0].username, "ana");

    assert!(matches!(
        f.chat
            .search(RoomKind::Group, f.general_room, &f.dave, "sunday", 0, 20),
        Err(ChatError::Forbidden(_))
    ));
    assert!(matches!(
        f.chat
            .search(RoomKind::Group, f.general_room, &f.ben, "   ", 0, 20),
        Err(ChatError::InvalidArgument(_))
    ));
}
