mod common;

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use artflow_net::codec::{decode, ArtPollReply};
use artflow_net::{ArtPacket, EngineEvent, PortAddress};
use artflow_net::{ArtNetEngine, MemoryNetwork, Port};
use common::{config, host, remote_reply, source, Lan};

fn address(s: &str) -> PortAddress {
    s.parse().unwrap()
}

fn short_names<T: artflow_net::Transport>(engine: &ArtNetEngine<T>) -> Vec<String> {
    engine
        .nodes()
        .map(|node| node.short_name().to_string())
        .collect()
}

#[test]
fn test_two_engines_discover_and_rename() {
    let now = Instant::now();
    let mut lan = Lan::new();
    let alpha = lan.add("alpha", 1);
    let bravo = lan.add("bravo", 2);

    lan.engines[alpha].poll_tick(now);
    lan.drain(now);

    for engine in &lan.engines {
        assert_eq!(short_names(engine), vec!["alpha", "bravo"]);
    }
    let old_id = lan.engines[alpha].node(host(2)).unwrap().id();

    lan.engines[bravo].set_short_name("charlie");

    // Exactly one unsolicited reply
    assert_eq!(lan.network.len(), 1);
    let datagrams = lan.network.take_all();
    match decode(&datagrams[0].payload).unwrap() {
        ArtPacket::PollReply(reply) => assert_eq!(reply.short_name, "charlie"),
        other => panic!("expected PollReply, got {:?}", other),
    }
    for datagram in datagrams {
        for engine in &mut lan.engines {
            engine.handle_datagram(&datagram.payload, datagram.source, now);
        }
    }

    let engine = &lan.engines[alpha];
    assert_eq!(engine.get_nodes().len(), 2);
    let renamed = engine.node(host(2)).unwrap();
    assert_eq!(renamed.short_name(), "charlie");
    assert_ne!(renamed.id(), old_id);

    let events: Vec<EngineEvent> = engine.events().try_iter().collect();
    assert!(events.contains(&EngineEvent::NodeReplaced {
        ip: host(2),
        short_name: "charlie".to_string(),
        long_name: "bravo node".to_string(),
    }));
}

#[test]
fn test_replayed_reply_is_idempotent() {
    let now = Instant::now();
    let network = MemoryNetwork::new();
    let mut engine = ArtNetEngine::new(&config("alpha", 1), network.endpoint(host(1))).unwrap();
    let events = engine.events();

    let reply = remote_reply(9, "dimmer", "Dimmer Rack", 1, &[Port::output(address("0:0:1"))]);
    engine.handle_datagram(&reply, source(9), now);
    let first_id = engine.node(host(9)).unwrap().id();
    engine.handle_datagram(&reply, source(9), now + Duration::from_secs(3));

    assert_eq!(engine.get_nodes().len(), 1);
    assert_eq!(engine.node(host(9)).unwrap().id(), first_id);
    assert_eq!(
        engine.node(host(9)).unwrap().last_reply(),
        now + Duration::from_secs(3)
    );

    let universe = engine.universe("0:0:1").unwrap().unwrap();
    assert_eq!(universe.subscribers().len(), 1);

    let events: Vec<EngineEvent> = events.try_iter().collect();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], EngineEvent::NodeDiscovered { .. }));
    assert!(matches!(events[1], EngineEvent::PortsChanged { .. }));
}

#[test]
fn test_long_name_change_replaces_node() {
    let now = Instant::now();
    let network = MemoryNetwork::new();
    let mut engine = ArtNetEngine::new(&config("alpha", 1), network.endpoint(host(1))).unwrap();

    let ports = [
        Port::output(address("0:0:1")),
        Port::input(address("0:0:2")),
    ];
    engine.handle_datagram(&remote_reply(9, "dimmer", "Dimmer Rack", 1, &ports), source(9), now);
    let first_id = engine.node(host(9)).unwrap().id();

    engine.handle_datagram(&remote_reply(9, "dimmer", "Dimmer Rack 2", 1, &[]), source(9), now);

    let node = engine.node(host(9)).unwrap();
    assert_ne!(node.id(), first_id);
    assert_eq!(node.long_name(), "Dimmer Rack 2");
    assert_eq!(node.ports().count(), 0);
    assert_eq!(engine.get_nodes().len(), 1);

    for universe in engine.universes() {
        assert!(universe.publishers().is_empty());
        assert!(universe.subscribers().is_empty());
    }
}

#[test]
fn test_port_diff_within_page() {
    let now = Instant::now();
    let network = MemoryNetwork::new();
    let mut engine = ArtNetEngine::new(&config("alpha", 1), network.endpoint(host(1))).unwrap();

    let a = Port::output(address("0:0:1"));
    let b = Port::output(address("0:0:2"));
    let c = Port::input(address("0:0:3"));
    let d = Port::output(address("2:3:4"));

    engine.handle_datagram(&remote_reply(9, "rack", "Rack", 1, &[a, b]), source(9), now);
    engine.handle_datagram(&remote_reply(9, "rack", "Rack", 2, &[d]), source(9), now);
    engine.handle_datagram(&remote_reply(9, "rack", "Rack", 1, &[b, c]), source(9), now);

    let node = engine.node(host(9)).unwrap();
    let page1: BTreeSet<_> = node.page(1).iter().map(|p| (p.address, p.direction)).collect();
    let expected: BTreeSet<_> = [b, c].iter().map(|p| (p.address, p.direction)).collect();
    assert_eq!(page1, expected);
    // Other pages untouched
    assert_eq!(node.page(2), &[d]);

    let universe = |s: &str| engine.universe(s).unwrap().unwrap();
    assert!(universe("0:0:1").subscribers().is_empty());
    assert!(universe("0:0:2").subscribers().contains(&host(9)));
    assert!(universe("0:0:3").publishers().contains(&host(9)));
    assert!(universe("2:3:4").subscribers().contains(&host(9)));
}

#[test]
fn test_root_page_aliases() {
    let now = Instant::now();
    let network = MemoryNetwork::new();
    let mut engine = ArtNetEngine::new(&config("alpha", 1), network.endpoint(host(1))).unwrap();

    let a = Port::output(address("0:0:1"));
    let b = Port::output(address("0:0:2"));
    engine.handle_datagram(&remote_reply(9, "rack", "Rack", 0, &[a]), source(9), now);
    engine.handle_datagram(&remote_reply(9, "rack", "Rack", 1, &[b]), source(9), now);

    // Bind index 0 and 1 are the same page
    let node = engine.node(host(9)).unwrap();
    assert_eq!(node.ports().count(), 1);
    assert_eq!(node.page(1), &[b]);
}

#[test]
fn test_silent_nodes_expire() {
    let start = Instant::now();
    let network = MemoryNetwork::new();
    let config = config("alpha", 1).with_node_timeout(Duration::from_secs(10));
    let mut engine = ArtNetEngine::new(&config, network.endpoint(host(1))).unwrap();
    let events = engine.events();

    let ports = [Port::output(address("0:0:7"))];
    engine.handle_datagram(&remote_reply(9, "rack", "Rack", 1, &ports), source(9), start);
    engine.handle_datagram(&remote_reply(8, "desk", "Desk", 1, &[]), source(8), start + Duration::from_secs(8));

    engine.poll_tick(start + Duration::from_secs(5));
    assert_eq!(engine.get_nodes().len(), 2);

    engine.poll_tick(start + Duration::from_secs(15));
    assert!(engine.node(host(9)).is_none());
    assert!(engine.node(host(8)).is_some());
    assert!(engine
        .universe("0:0:7")
        .unwrap()
        .unwrap()
        .subscribers()
        .is_empty());
    assert!(events
        .try_iter()
        .any(|e| e == EngineEvent::NodeLost { ip: host(9) }));
}

#[test]
fn test_announce_describes_local_ports() {
    let network = MemoryNetwork::new();
    let config = config("alpha", 1)
        .with_port(address("1:0:7"), true, false)
        .with_port(address("0:1:8"), false, true);
    let mut engine = ArtNetEngine::new(&config, network.endpoint(host(1))).unwrap();

    engine.announce();
    let replies: Vec<ArtPollReply> = network
        .take_all()
        .iter()
        .map(|d| ArtPollReply::decode(&d.payload).unwrap())
        .collect();

    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].bind_index, 1);
    assert_eq!(replies[0].advertised_ports().unwrap(), vec![Port::input(address("1:0:7"))]);
    assert_eq!(replies[1].bind_index, 2);
    assert_eq!(replies[1].advertised_ports().unwrap(), vec![Port::output(address("0:1:8"))]);
    assert_eq!(replies[0].short_name, "alpha");
    assert_eq!(replies[1].node_report, "#0001 [0002] artflow ok");
}
