//! Unix group membership lookups for report filtering.
//!
//! Membership is answered from `/etc/group` (supplementary members) and
//! `/etc/passwd` (primary GID), both read through the filesystem
//! abstraction so tests can supply fixture content.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::collector::traits::FileSystem;

/// One parsed `/etc/group` entry.
#[derive(Debug, Clone, Default)]
struct GroupEntry {
    gid: u32,
    members: Vec<String>,
}

/// Resolver for "is this user a member of that group" queries.
///
/// Both files are parsed once at construction; lookups are map reads.
#[derive(Debug, Default)]
pub struct GroupResolver {
    /// group name -> entry
    groups: HashMap<String, GroupEntry>,
    /// username -> primary gid
    primary_gid: HashMap<String, u32>,
}

impl GroupResolver {
    /// Loads group and passwd databases through `fs`.
    ///
    /// Unreadable files leave the corresponding table empty: membership
    /// queries then answer `false`, which filters conservatively.
    pub fn load<F: FileSystem>(fs: &F) -> Self {
        let groups = match fs.read_to_string(Path::new("/etc/group")) {
            Ok(content) => parse_group(&content),
            Err(e) => {
                debug!("cannot read /etc/group: {}", e);
                HashMap::new()
            }
        };
        let primary_gid = match fs.read_to_string(Path::new("/etc/passwd")) {
            Ok(content) => parse_passwd_gids(&content),
            Err(e) => {
                debug!("cannot read /etc/passwd: {}", e);
                HashMap::new()
            }
        };

        Self {
            groups,
            primary_gid,
        }
    }

    /// Returns true if `user` belongs to `group`, either as a listed
    /// supplementary member or through the primary GID. Unknown users and
    /// unknown groups are not members.
    pub fn user_in_group(&self, user: &str, group: &str) -> bool {
        let Some(entry) = self.groups.get(group) else {
            return false;
        };

        if entry.members.iter().any(|member| member == user) {
            return true;
        }

        self.primary_gid.get(user) == Some(&entry.gid)
    }

    /// Keeps only users belonging to `group`, preserving order.
    pub fn filter_members(&self, users: Vec<String>, group: &str) -> Vec<String> {
        users
            .into_iter()
            .filter(|user| self.user_in_group(user, group))
            .collect()
    }
}

/// Parses `/etc/group` content.
///
/// Format: `name:password:gid:member1,member2`.
fn parse_group(content: &str) -> HashMap<String, GroupEntry> {
    let mut map = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() < 3 {
            continue;
        }
        let Ok(gid) = parts[2].parse::<u32>() else {
            continue;
        };

        let members = parts
            .get(3)
            .map(|members| {
                members
                    .split(',')
                    .filter(|member| !member.is_empty())
                    .map(|member| member.to_string())
                    .collect()
            })
            .unwrap_or_default();

        map.insert(parts[0].to_string(), GroupEntry { gid, members });
    }
    map
}

/// Parses `/etc/passwd` content into a username -> primary GID map.
///
/// Format: `username:password:uid:gid:gecos:home:shell`.
fn parse_passwd_gids(content: &str) -> HashMap<String, u32> {
    let mut map = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() >= 4
            && let Ok(gid) = parts[3].parse::<u32>()
        {
            map.insert(parts[0].to_string(), gid);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    fn resolver() -> GroupResolver {
        let mut fs = MockFs::new();
        fs.add_file(
            "/etc/group",
            "\
root:x:0:
atlas:x:5000:alice,bob
physics:x:5001:
",
        );
        fs.add_file(
            "/etc/passwd",
            "\
root:x:0:0:root:/root:/bin/bash
alice:x:1001:5001:Alice:/home/alice:/bin/bash
carol:x:1003:5001:Carol:/home/carol:/bin/bash
",
        );
        GroupResolver::load(&fs)
    }

    #[test]
    fn supplementary_membership_counts() {
        let resolver = resolver();
        assert!(resolver.user_in_group("alice", "atlas"));
        assert!(resolver.user_in_group("bob", "atlas"));
        assert!(!resolver.user_in_group("carol", "atlas"));
    }

    #[test]
    fn primary_gid_membership_counts() {
        let resolver = resolver();
        assert!(resolver.user_in_group("carol", "physics"));
        assert!(resolver.user_in_group("alice", "physics"));
        assert!(!resolver.user_in_group("root", "physics"));
    }

    #[test]
    fn unknown_user_or_group_is_not_a_member() {
        let resolver = resolver();
        assert!(!resolver.user_in_group("mallory", "atlas"));
        assert!(!resolver.user_in_group("alice", "no-such-group"));
    }

    #[test]
    fn filter_members_preserves_order() {
        let resolver = resolver();
        let users = ["carol", "bob", "alice"].map(String::from).to_vec();
        assert_eq!(
            resolver.filter_members(users, "atlas"),
            vec!["bob".to_string(), "alice".to_string()]
        );
    }

    #[test]
    fn missing_databases_filter_everything() {
        let resolver = GroupResolver::load(&MockFs::new());
        assert!(!resolver.user_in_group("alice", "atlas"));
    }
}
