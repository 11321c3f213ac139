//! End-to-end sessions: server and clients exchanging real messages.

mod common;

use common::Session;
use skirmish_core::{PlayerActionType, Vec2};
use skirmish_networking::protocol::{EntityPosition, NewPlayer};
use skirmish_networking::{ClientState, ConnectionId, ServerMessage};

#[test]
fn test_join_announces_players_both_ways() {
    let mut session = Session::new();
    let a = session.connect(1);
    session.step();
    let b = session.connect(2);
    session.step();

    let entity_a = session.entity_of(a);
    let entity_b = session.entity_of(b);
    assert_ne!(entity_a, entity_b);

    assert_eq!(session.client(a).state(), ClientState::Connected);
    assert_eq!(session.client(a).entity_id(), Some(entity_a));
    assert_eq!(session.client(b).entity_id(), Some(entity_b));
    assert!(session.client(a).remote_position(entity_b).is_some());
    assert!(session.client(b).remote_position(entity_a).is_some());
}

#[test]
fn test_new_player_is_reliable_and_owned_once() {
    let mut session = Session::new();
    let a = session.connect(1);
    session.step();

    let owned: Vec<NewPlayer> = session
        .take_sent_to(a)
        .into_iter()
        .filter_map(|m| match m {
            ServerMessage::NewPlayer(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(owned.len(), 1);
    assert!(owned[0].owner);
    assert_eq!(
        ServerMessage::NewPlayer(owned[0]).delivery(),
        skirmish_networking::DeliveryMethod::ReliableOrdered
    );
}

#[test]
fn test_disconnect_is_atomic() {
    let mut session = Session::new();
    let a = session.connect(1);
    let b = session.connect(2);
    session.run(3);
    let entity_b = session.entity_of(b);

    session.disconnect(b);
    session.server.tick(0.0);
    session.deliver();

    assert_eq!(session.server.connection_count(), 1);
    assert!(session.server.connection(b).is_none());
    assert!(!session.server.match_state().contains_entity(entity_b));
    assert!(!session.server.reconciler().has_player(entity_b));
    assert!(session.server.reconciler().action_history(entity_b).is_none());

    let to_a = session.take_sent_to(a);
    assert!(to_a.contains(&ServerMessage::PlayerLeft { id: entity_b }));
    assert!(session.client(a).remote_position(entity_b).is_none());
}

#[test]
fn test_state_updates_carry_every_entity() {
    let mut session = Session::new();
    let a = session.connect(1);
    let b = session.connect(2);
    session.run(10);

    let updates: Vec<Vec<EntityPosition>> = session
        .take_sent_to(a)
        .into_iter()
        .filter_map(|m| match m {
            ServerMessage::StateUpdate(u) => Some(u.entities),
            _ => None,
        })
        .collect();
    assert!(!updates.is_empty());

    let expected = [session.entity_of(a), session.entity_of(b)];
    for entities in updates.iter().skip(1) {
        let ids: Vec<_> = entities.iter().map(|e| e.id).collect();
        assert_eq!(ids, expected);
    }
}

#[test]
fn test_every_package_is_acknowledged() {
    let mut session = Session::new();
    let a = session.connect(1);
    session.run(2);
    session.client(a).input(PlayerActionType::MoveRight);
    session.run(4);

    let acks: Vec<i32> = session
        .take_sent_to(a)
        .into_iter()
        .filter_map(|m| match m {
            ServerMessage::AcknowledgeCommand { command_id } => Some(command_id),
            _ => None,
        })
        .collect();
    assert!(acks.len() >= 2);
    assert!(acks.windows(2).all(|w| w[0] <= w[1]));
    assert!(*acks.last().unwrap() >= 1);
    let predictor = session.client(a).predictor().unwrap();
    assert_eq!(
        predictor.last_acknowledged_action_id(),
        u64::try_from(*acks.last().unwrap()).unwrap()
    );
}

#[test]
fn test_client_converges_with_server() {
    let mut session = Session::new();
    let a = session.connect(1);
    session.run(10);

    session.client(a).input(PlayerActionType::MoveRight);
    session.run(20);
    session.client(a).input(PlayerActionType::Jump);
    session.run(90);

    let entity = session.entity_of(a);
    let server_position = session.server.match_state().entity(entity).unwrap().position;
    let client_position = session.client(a).predictor().unwrap().position();

    assert!(
        server_position.distance_squared(client_position) < 0.25,
        "server {server_position:?} vs client {client_position:?}"
    );
    assert!(server_position.x > 110.0, "move was applied: {server_position:?}");
    assert!(server_position.y.abs() < 1e-3, "landed: {server_position:?}");
}

#[test]
fn test_malformed_package_keeps_connection() {
    let mut session = Session::new();
    let a = session.connect(1);
    session.step();
    let entity = session.entity_of(a);
    let before = *session.server.match_state().entity(entity).unwrap();

    // Unknown command tag.
    session.data(a, vec![0x7F, 1, 2, 3]);
    // Valid tag, one truncated entry.
    session.data(a, vec![0, 1, 0, 0]);
    // Valid tag, unknown action type in the only entry.
    let mut bad_kind = vec![0];
    bad_kind.extend_from_slice(&9u32.to_le_bytes());
    bad_kind.extend_from_slice(&0.0f32.to_le_bytes());
    bad_kind.push(200);
    bad_kind.extend_from_slice(&before.position.x.to_le_bytes());
    bad_kind.extend_from_slice(&0.0f32.to_le_bytes());
    session.data(a, bad_kind);

    session.server.tick(0.0);
    session.deliver();

    let connection = session.server.connection(a).unwrap();
    assert_eq!(connection.malformed_packets, 1);
    assert_eq!(connection.dropped_entries, 2);
    assert_eq!(session.server.reconciler().last_acknowledged(entity), 0);
    assert_eq!(*session.server.match_state().entity(entity).unwrap(), before);
}

#[test]
fn test_data_from_unknown_connection_is_ignored() {
    let mut session = Session::new();
    session.data(ConnectionId(42), vec![0]);
    session.server.tick(0.0);
    assert_eq!(session.server.connection_count(), 0);
    assert!(session.server.match_state().is_empty());
}

#[test]
fn test_remote_positions_follow_state_updates() {
    let mut session = Session::new();
    let a = session.connect(1);
    let b = session.connect(2);
    session.run(5);

    session.client(b).input(PlayerActionType::MoveLeft);
    session.run(60);

    let entity_b = session.entity_of(b);
    let server_b = session.server.match_state().entity(entity_b).unwrap().position;
    let seen_by_a = session.client(a).remote_position(entity_b).unwrap();
    assert!(server_b.distance_squared(seen_by_a) < 1.0);
    assert!(seen_by_a != Vec2::ZERO);
}
