//! Property-based testing for the policy model.
//!
//! These tests use the `proptest` crate to check the graph invariants over generated
//! role graphs: containment is acyclic after any accepted edit, resolution is stable,
//! and deletes leave no dangling references.

#[cfg(test)]
mod tests {
    use crate::{
        descriptor::{ApplicationPrivilegeDescriptor, METHOD_PROPERTY, PERMISSION_PROPERTY},
        graph::PolicyGraph,
        manager::ConfigurationManager,
        permission::WildcardPermission,
        privilege::Privilege,
        resolver::RolePermissionResolver,
        role::{Role, RoleKey},
        user::User,
        DescriptorRegistry,
    };
    use proptest::prelude::*;
    use std::collections::{BTreeSet, HashSet};

    /// Generate valid identifier strings.
    fn identifier_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-z][a-z0-9_-]{0,15}")
            .unwrap()
            .prop_filter("Must not be the placeholder id", |s| s != "0")
    }

    /// Generate an acyclic containment graph over `n` roles: role `i` may only contain
    /// roles with a higher index.
    fn dag_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
        (1usize..8).prop_flat_map(|n| {
            let edges = prop::collection::vec((0..n, 0..n), 0..16)
                .prop_map(|pairs| pairs.into_iter().filter(|(a, b)| a < b).collect::<Vec<_>>());
            (Just(n), edges)
        })
    }

    fn privilege(id: &str, resource: &str) -> Privilege {
        Privilege::new(id, format!("Privilege {id}"), ApplicationPrivilegeDescriptor::TYPE)
            .with_property(PERMISSION_PROPERTY, resource)
            .with_property(METHOD_PROPERTY, "read")
    }

    fn role_id(i: usize) -> String {
        format!("r{i}")
    }

    /// Build a manager holding the DAG, one privilege per role.
    fn build(n: usize, edges: &[(usize, usize)]) -> ConfigurationManager {
        let mut manager = ConfigurationManager::new().unwrap();
        for i in 0..n {
            manager
                .create_privilege(privilege(&format!("p{i}"), &format!("res{i}")))
                .unwrap();
        }
        for i in (0..n).rev() {
            let mut role = Role::new(role_id(i), format!("Role {i}")).add_privilege(format!("p{i}"));
            for (_, to) in edges.iter().filter(|(from, _)| *from == i) {
                role = role.contain(role_id(*to));
            }
            manager.create_role(role).unwrap();
        }
        manager
    }

    proptest! {
        #[test]
        fn prop_self_containment_is_rejected(id in identifier_strategy()) {
            let mut manager = ConfigurationManager::new().unwrap();
            let result = manager.create_role(Role::new(id.clone(), "Self").contain(id.clone()));
            prop_assert!(result.is_err());
            prop_assert!(manager.list_roles().is_empty());
        }

        #[test]
        fn prop_closing_a_chain_is_rejected(len in 2usize..7) {
            let mut manager = ConfigurationManager::new().unwrap();
            for i in (0..len).rev() {
                let mut role = Role::new(role_id(i), format!("Role {i}"));
                if i + 1 < len {
                    role = role.contain(role_id(i + 1));
                }
                manager.create_role(role).unwrap();
            }

            let closing = Role::new(role_id(len - 1), format!("Role {}", len - 1)).contain(role_id(0));
            let error = manager.update_role(closing).unwrap_err();
            prop_assert!(error.validation().unwrap().mentions("contains itself through"));
            prop_assert!(manager.validate_all().is_valid());
        }

        #[test]
        fn prop_resolution_terminates_on_cycles(len in 1usize..7) {
            let graph = PolicyGraph::new();
            for i in 0..len {
                graph.insert_privilege(privilege(&format!("p{i}"), &format!("res{i}")));
                graph.insert_role(
                    Role::new(role_id(i), format!("Role {i}"))
                        .add_privilege(format!("p{i}"))
                        .contain(role_id((i + 1) % len)),
                );
            }
            let registry = DescriptorRegistry::with_defaults();
            let resolved = RolePermissionResolver::new(&graph, &registry).resolve(&role_id(0));
            prop_assert_eq!(resolved.len(), len);
        }

        #[test]
        fn prop_resolution_is_idempotent((n, edges) in dag_strategy()) {
            let manager = build(n, &edges);
            prop_assert!(manager.validate_all().is_valid());
            for i in 0..n {
                prop_assert_eq!(manager.resolve(&role_id(i)), manager.resolve(&role_id(i)));
            }
        }

        #[test]
        fn prop_resolution_is_monotonic((n, edges) in dag_strategy(), target in 0usize..8) {
            let target = target % n;
            let mut manager = build(n, &edges);
            let before: Vec<HashSet<String>> = (0..n).map(|i| manager.resolve(&role_id(i))).collect();

            manager.create_privilege(privilege("extra", "extra")).unwrap();
            let mut role = manager.read_role(&role_id(target)).unwrap();
            role.privilege_ids.insert("extra".to_string());
            manager.update_role(role).unwrap();

            for (i, old) in before.iter().enumerate() {
                let new = manager.resolve(&role_id(i));
                prop_assert!(new.is_superset(old));
            }
            prop_assert!(manager.resolve(&role_id(target)).contains("extra:read"));
        }

        #[test]
        fn prop_delete_leaves_no_dangling_role((n, edges) in dag_strategy(), victim in 0usize..8) {
            let victim = victim % n;
            let mut manager = build(n, &edges);
            let all: BTreeSet<String> = (0..n).map(role_id).collect();
            manager.create_user(User::new("u1", "u1@example.com", "pw"), all).unwrap();

            manager.delete_role(&role_id(victim)).unwrap();

            let key = RoleKey::local(role_id(victim));
            prop_assert!(manager.list_roles().iter().all(|r| !r.contains_role(&key)));
            prop_assert!(manager
                .list_user_role_mappings()
                .iter()
                .all(|m| !m.roles.contains(&role_id(victim))));
            prop_assert!(manager.validate_all().is_valid());
        }

        #[test]
        fn prop_delete_leaves_no_dangling_privilege((n, edges) in dag_strategy(), victim in 0usize..8) {
            let victim = victim % n;
            let mut manager = build(n, &edges);
            let privilege_id = format!("p{victim}");

            manager.delete_privilege(&privilege_id).unwrap();

            prop_assert!(manager.list_roles().iter().all(|r| !r.privilege_ids.contains(&privilege_id)));
            prop_assert!(!manager.validate_all().mentions(&privilege_id));
        }

        #[test]
        fn prop_generated_ids_are_unique(count in 1usize..10) {
            let mut manager = ConfigurationManager::new().unwrap();
            let mut ids = HashSet::new();
            for i in 0..count {
                let created = manager.create_role(Role::new("", format!("Generated {i}"))).unwrap();
                prop_assert_eq!(created.warnings.len(), 1);
                prop_assert!(!created.value.id().is_empty());
                prop_assert!(ids.insert(created.value.id().to_string()));
            }
        }

        #[test]
        fn prop_permission_implies_itself(parts in prop::collection::vec(identifier_strategy(), 1..5)) {
            let permission = WildcardPermission::parse(&parts.join(":")).unwrap();
            prop_assert!(permission.implies(&permission));
            prop_assert!(WildcardPermission::parse("*").unwrap().implies(&permission));
        }
    }
}
