//! Owner reference handling.
//!
//! An object holds at most one reference per owner. Owners are matched by kind, name and API
//! group, the version part of `apiVersion` is ignored so a reference written by an older version
//! of the owner's API is replaced rather than duplicated.
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{core::ObjectMeta, Resource};

use super::MixIn;
use crate::utils::Error;

/// Build a reference to `owner`.
///
/// Fails if the owner has not been persisted yet, i.e. has no name or uid.
pub fn owner_reference<K>(
    owner: &K,
    block_owner_deletion: bool,
    controller: bool,
) -> Result<OwnerReference, Error>
where
    K: Resource<DynamicType = ()>,
{
    let meta = owner.meta();
    let kind = K::kind(&());
    let name = meta
        .name
        .clone()
        .ok_or_else(|| Error::OwnerReference(format!("{kind} has no name")))?;
    let uid = meta
        .uid
        .clone()
        .ok_or_else(|| Error::OwnerReference(format!("{kind} {name} has no uid")))?;
    Ok(OwnerReference {
        api_version: K::api_version(&()).into_owned(),
        kind: kind.into_owned(),
        name,
        uid,
        block_owner_deletion: Some(block_owner_deletion),
        controller: Some(controller),
    })
}

/// True if both references point at the same owner.
pub fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    a.kind == b.kind && a.name == b.name && api_group(&a.api_version) == api_group(&b.api_version)
}

// "apps/v1" -> "apps", "v1" -> ""
fn api_group(api_version: &str) -> &str {
    api_version
        .rsplit_once('/')
        .map(|(group, _)| group)
        .unwrap_or_default()
}

/// Replace the matching reference in place, or append it.
pub fn set_owner_reference(meta: &mut ObjectMeta, reference: OwnerReference) {
    let references = meta.owner_references.get_or_insert_with(Vec::new);
    match references
        .iter_mut()
        .find(|existing| same_owner(existing, &reference))
    {
        Some(existing) => *existing = reference,
        None => references.push(reference),
    }
}

/// Reference `owner` as the controlling owner of the object.
pub fn controller_owner<K: Resource<DynamicType = ()>>(owner: &K) -> MixIn {
    owner_mixin(owner_reference(owner, true, true))
}

/// Reference `owner` without taking control, used for objects shared between owners.
pub fn object_owner<K: Resource<DynamicType = ()>>(owner: &K) -> MixIn {
    owner_mixin(owner_reference(owner, false, false))
}

fn owner_mixin(reference: Result<OwnerReference, Error>) -> MixIn {
    // errors surface when the mix-in runs, aborting only the object it is applied to
    let reference = reference.map_err(|err| err.to_string());
    Box::new(move |_, meta| {
        let reference = reference.clone().map_err(Error::OwnerReference)?;
        set_owner_reference(meta, reference);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::OperatorConfig,
        producer::{SimulatorProducer, SimulatorProducerSpec},
        utils::Context,
    };

    fn reference(api_version: &str, kind: &str, name: &str, uid: &str) -> OwnerReference {
        OwnerReference {
            api_version: api_version.to_owned(),
            kind: kind.to_owned(),
            name: name.to_owned(),
            uid: uid.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn version_is_ignored() {
        let a = reference("iot.dentrassi.de/v1alpha1", "SimulatorProducer", "p1", "1");
        let b = reference("iot.dentrassi.de/v1", "SimulatorProducer", "p1", "2");
        assert!(same_owner(&a, &b));
    }

    #[test]
    fn group_kind_and_name_matter() {
        let a = reference("iot.dentrassi.de/v1alpha1", "SimulatorProducer", "p1", "1");
        assert!(!same_owner(
            &a,
            &reference("other.io/v1alpha1", "SimulatorProducer", "p1", "1")
        ));
        assert!(!same_owner(
            &a,
            &reference("iot.dentrassi.de/v1alpha1", "SimulatorConsumer", "p1", "1")
        ));
        assert!(!same_owner(
            &a,
            &reference("iot.dentrassi.de/v1alpha1", "SimulatorProducer", "p2", "1")
        ));
        assert!(!same_owner(
            &reference("v1", "ConfigMap", "c", "1"),
            &reference("apps/v1", "ConfigMap", "c", "1")
        ));
    }

    #[test]
    fn existing_reference_is_replaced() {
        let mut meta = ObjectMeta {
            owner_references: Some(vec![
                reference("v1", "ConfigMap", "other", "9"),
                reference("iot.dentrassi.de/v1", "SimulatorProducer", "p1", "old"),
            ]),
            ..Default::default()
        };

        for _ in 0..3 {
            set_owner_reference(
                &mut meta,
                reference("iot.dentrassi.de/v1alpha1", "SimulatorProducer", "p1", "new"),
            );
        }

        let references = meta.owner_references.unwrap();
        assert_eq!(references.len(), 2);
        assert_eq!(references[0].name, "other");
        assert_eq!(references[1].uid, "new");
        assert_eq!(references[1].api_version, "iot.dentrassi.de/v1alpha1");
    }

    #[test]
    fn controller_and_object_owner_flags() {
        let producer = SimulatorProducer::test();
        let controller = owner_reference(&producer, true, true).unwrap();
        let object = owner_reference(&producer, false, false).unwrap();
        expect_test::expect![[r#"
            OwnerReference {
                api_version: "iot.dentrassi.de/v1alpha1",
                block_owner_deletion: Some(
                    true,
                ),
                controller: Some(
                    true,
                ),
                kind: "SimulatorProducer",
                name: "producer1",
                uid: "producer1-uid",
            }
        "#]]
        .assert_debug_eq(&controller);
        assert_eq!(object.controller, Some(false));
        assert_eq!(object.block_owner_deletion, Some(false));
    }

    #[tokio::test]
    async fn missing_uid_fails_the_mixin() {
        let (cx, _handle) = Context::test(OperatorConfig::test_kubernetes());
        let install = cx.install("default");
        let producer = SimulatorProducer::new("unsaved", SimulatorProducerSpec::default());

        let mut meta = ObjectMeta::default();
        let err = controller_owner(&producer)(&install, &mut meta).unwrap_err();
        assert!(matches!(err, Error::OwnerReference(_)), "{err}");
        assert!(meta.owner_references.is_none());
    }
}
