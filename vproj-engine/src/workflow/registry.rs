//! Member registry: arrival-ordered, duplicate-free member list

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct MemberRegistry {
    seen: HashSet<String>,
    members: Vec<String>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `token` on first sight; every later call for it returns `false`
    pub fn try_register(&mut self, token: &str) -> bool {
        if self.seen.contains(token) {
            return false;
        }
        self.seen.insert(token.to_string());
        self.members.push(token.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Registered members in arrival order
    pub fn into_members(self) -> Vec<String> {
        self.members
    }
}
