//! Entry points and opinionated helpers for namespaced RBAC kinds.
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use kube::core::ObjectMeta;

use super::{reconcile_object, Applied, InstallContext, MixIn, Outcome};
use crate::utils::Error;

/// Create or update a Role.
pub async fn reconcile_role<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut Role) -> Result<Outcome, Error> + Send,
{
    let template = Role {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            ..Default::default()
        },
        ..Default::default()
    };
    reconcile_object(cx, template, mutator, mixins).await
}

/// Create or update a RoleBinding.
pub async fn reconcile_role_binding<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut RoleBinding) -> Result<Outcome, Error> + Send,
{
    let template = RoleBinding {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            ..Default::default()
        },
        ..Default::default()
    };
    reconcile_object(cx, template, mutator, mixins).await
}

/// A rule of the core API group.
pub fn core_rule(resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![String::new()]),
        resources: Some(resources.iter().map(|r| r.to_string()).collect()),
        verbs: verbs.iter().map(|v| v.to_string()).collect(),
        ..Default::default()
    }
}

/// Replace the rules of a role.
pub fn set_rules(role: &mut Role, rules: Vec<PolicyRule>) {
    role.rules = Some(rules);
}

/// Bind a role of the same namespace to a service account.
pub fn bind_service_account(
    binding: &mut RoleBinding,
    role: &str,
    service_account: &str,
    namespace: &str,
) {
    binding.role_ref = RoleRef {
        api_group: "rbac.authorization.k8s.io".to_owned(),
        kind: "Role".to_owned(),
        name: role.to_owned(),
    };
    binding.subjects = Some(vec![Subject {
        kind: "ServiceAccount".to_owned(),
        name: service_account.to_owned(),
        namespace: Some(namespace.to_owned()),
        api_group: None,
    }]);
}
