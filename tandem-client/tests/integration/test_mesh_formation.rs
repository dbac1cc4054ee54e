use std::collections::HashMap;
use tandem_client::{ClientHandle, Role, RolePolicy, start};

use crate::integration::{ROOM, init_tracing, wait_for_mesh};
use crate::utils::{MemoryHub, client_config, spawn_relay};

const NAMES: [&str; 4] = ["alice", "bob", "carol", "dave"];

async fn form_mesh(policy: RolePolicy) -> (MemoryHub, Vec<ClientHandle>) {
    let (url, _state) = spawn_relay().await;
    let hub = MemoryHub::new();

    let clients: Vec<ClientHandle> = NAMES
        .iter()
        .map(|name| {
            let config = client_config(&url, ROOM, name).with_role_policy(policy);
            start(config, hub.factory(name))
        })
        .collect();

    for client in &clients {
        wait_for_mesh(client, NAMES.len() - 1).await;
    }
    (hub, clients)
}

/// Owner name for every session id.
fn owners(clients: &[ClientHandle]) -> HashMap<tandem_core::SessionId, &'static str> {
    clients
        .iter()
        .zip(NAMES)
        .map(|(client, name)| (client.session_id().unwrap(), name))
        .collect()
}

#[tokio::test]
async fn test_concurrent_joiners_form_full_mesh() {
    init_tracing();

    let (hub, clients) = form_mesh(RolePolicy::ArrivalOrder).await;
    let owners = owners(&clients);

    for (client, name) in clients.iter().zip(NAMES) {
        let mut confirmed: Vec<String> = client
            .peers()
            .into_iter()
            .map(|p| p.confirmed_name.unwrap())
            .collect();
        confirmed.sort();
        let mut expected: Vec<String> = NAMES
            .iter()
            .filter(|n| **n != name)
            .map(|n| n.to_string())
            .collect();
        expected.sort();
        assert_eq!(confirmed, expected, "{name} sees the other members");
    }

    let created = hub.created();
    assert_eq!(created.len(), NAMES.len() * (NAMES.len() - 1));

    for (i, a) in NAMES.iter().enumerate() {
        for b in &NAMES[i + 1..] {
            let pair: Vec<_> = created
                .iter()
                .filter(|l| {
                    let peer = owners[&l.peer];
                    (l.owner == *a && peer == *b) || (l.owner == *b && peer == *a)
                })
                .collect();
            assert_eq!(pair.len(), 2, "one link per side for {a}/{b}");
            let initiators = pair.iter().filter(|l| l.role == Role::Initiator).count();
            assert_eq!(initiators, 1, "exactly one initiator for {a}/{b}");
        }
    }

    for (owner, opened) in hub.opened_by_owner() {
        assert_eq!(opened, NAMES.len() - 1, "{owner} links open once each");
    }
}

#[tokio::test]
async fn test_lower_session_id_initiates() {
    init_tracing();

    let (hub, clients) = form_mesh(RolePolicy::SessionIdOrder).await;
    let ids: HashMap<&str, _> = NAMES
        .iter()
        .copied()
        .zip(clients.iter().map(|c| c.session_id().unwrap()))
        .collect();

    for link in hub.created() {
        let own = ids[link.owner.as_str()];
        let expected = if own < link.peer {
            Role::Initiator
        } else {
            Role::Responder
        };
        assert_eq!(link.role, expected, "{} toward {}", link.owner, link.peer);
    }
}
