use super::*;

fn ping_cue(alternate: Option<Vec<Action>>) -> Cue {
    Cue {
        name: "ping".into(),
        trigger: Trigger::UdpMessage(MessageTrigger {
            message: "PING".into(),
            from_device: "A".into(),
            delay_ms: 0,
            count: 2,
        }),
        actions: vec![Action::send_udp("ACK", 0, ["B"])],
        alternate_actions: alternate,
    }
}

#[test]
fn parses_udp_message_cue_with_defaults() {
    let cue: Cue = serde_json::from_value(serde_json::json!({
        "name": "ping",
        "trigger": { "type": "udp_message", "message": "PING", "from_device": "A" },
        "actions": [ { "type": "send_udp", "message": "ACK", "destination": ["B"] } ]
    }))
    .expect("cue");

    let trigger = cue.message_trigger().expect("message trigger");
    assert_eq!(trigger.delay_ms, 0);
    assert_eq!(trigger.count, 1);
    assert_eq!(cue.alternate_actions, None);
    assert_eq!(cue.actions, vec![Action::send_udp("ACK", 0, ["B"])]);
}

#[test]
fn parses_startup_cue() {
    let cue: Cue = serde_json::from_value(serde_json::json!({
        "name": "boot",
        "trigger": { "type": "startup_complete" },
        "actions": [ { "type": "send_udp", "message": "LOAD \"intro.mp4\"", "delay_ms": 250, "destination": ["A", "B"] } ]
    }))
    .expect("cue");

    assert!(cue.is_startup());
    assert_eq!(
        cue.actions,
        vec![Action::send_udp("LOAD \"intro.mp4\"", 250, ["A", "B"])]
    );
}

#[test]
fn unknown_trigger_and_action_types_are_unsupported() {
    let cue: Cue = serde_json::from_value(serde_json::json!({
        "name": "odd",
        "trigger": { "type": "midi_note", "note": 60 },
        "actions": [ { "type": "set_light", "level": 3 } ]
    }))
    .expect("cue");

    assert_eq!(cue.trigger, Trigger::Unsupported);
    assert_eq!(cue.actions, vec![Action::Unsupported]);
}

#[test]
fn trigger_match_is_exact_and_case_sensitive() {
    let cue = ping_cue(None);
    let trigger = cue.message_trigger().expect("trigger");
    assert!(trigger.matches("PING", "A"));
    assert!(!trigger.matches("ping", "A"));
    assert!(!trigger.matches("PING", "a"));
    assert!(!trigger.matches("PING ", "A"));
    assert!(!trigger.matches("PING", UNKNOWN_DEVICE));
}

#[test]
fn alternate_selected_only_at_threshold() {
    let cue = ping_cue(Some(vec![Action::send_udp("RESET", 0, ["B"])]));

    assert!(!cue.select_actions(1).is_alternate());
    assert!(cue.select_actions(2).is_alternate());
    assert!(!cue.select_actions(3).is_alternate());
    assert_eq!(
        cue.select_actions(2).actions(),
        &[Action::send_udp("RESET", 0, ["B"])]
    );
}

#[test]
fn primary_only_cue_ignores_fire_count() {
    let cue = ping_cue(None);
    for count in 0..5 {
        assert_eq!(
            cue.select_actions(count),
            ActionSelection::Primary(&cue.actions)
        );
    }
}
