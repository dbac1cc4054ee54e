use crate::channel::Role;
use crate::config::RolePolicy;
use std::collections::HashSet;
use tandem_core::{SessionId, UserInfo};

/// Our own place in the room, as far as the relay has told us.
#[derive(Debug, Clone)]
pub struct SelfIdentity {
    pub session_id: Option<SessionId>,
    pub username: String,
}

impl SelfIdentity {
    /// Falls back to the username until the relay has assigned a session id.
    pub fn is_self(&self, user: &UserInfo) -> bool {
        match self.session_id {
            Some(id) => user.id == id,
            None => user.username == self.username,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLink {
    pub peer: SessionId,
    pub name: String,
    pub role: Role,
}

/// Tracks the last roster seen and decides which links to open.
#[derive(Debug)]
pub struct Roster {
    policy: RolePolicy,
    known: HashSet<SessionId>,
}

impl Roster {
    pub fn new(policy: RolePolicy) -> Self {
        Self {
            policy,
            known: HashSet::new(),
        }
    }

    /// Links for everyone already present when we joined.
    pub fn joined(&mut self, me: &SelfIdentity, users: &[UserInfo]) -> Vec<PlannedLink> {
        self.known.clear();
        self.plan(me, users, Role::Responder)
    }

    /// Links for members that were not in the previous roster.
    pub fn updated(&mut self, me: &SelfIdentity, users: &[UserInfo]) -> Vec<PlannedLink> {
        self.plan(me, users, Role::Initiator)
    }

    pub fn replace(&mut self, users: &[UserInfo]) {
        self.known = users.iter().map(|u| u.id).collect();
    }

    pub fn clear(&mut self) {
        self.known.clear();
    }

    fn plan(&mut self, me: &SelfIdentity, users: &[UserInfo], arrival_role: Role) -> Vec<PlannedLink> {
        let links = users
            .iter()
            .filter(|user| !me.is_self(user) && !self.known.contains(&user.id))
            .map(|user| PlannedLink {
                peer: user.id,
                name: user.username.clone(),
                role: self.role_for(me, user.id, arrival_role),
            })
            .collect();
        self.replace(users);
        links
    }

    fn role_for(&self, me: &SelfIdentity, peer: SessionId, arrival_role: Role) -> Role {
        match (self.policy, me.session_id) {
            (RolePolicy::SessionIdOrder, Some(own)) if own < peer => Role::Initiator,
            (RolePolicy::SessionIdOrder, Some(_)) => Role::Responder,
            _ => arrival_role,
        }
    }
}
