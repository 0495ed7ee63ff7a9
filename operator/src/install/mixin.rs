//! Small metadata decorations applied after the mutator.
use std::collections::BTreeMap;

use kube::core::ObjectMeta;

use super::InstallContext;
use crate::{labels::managed_labels, utils::Error};

/// Decorates the metadata of an object during create-or-update.
pub type MixIn = Box<dyn Fn(&InstallContext<'_>, &mut ObjectMeta) -> Result<(), Error> + Send + Sync>;

/// Add (or overwrite) the given labels, other labels are kept.
pub fn append_labels(labels: BTreeMap<String, String>) -> MixIn {
    Box::new(move |_, meta| {
        meta.labels
            .get_or_insert_with(BTreeMap::new)
            .extend(labels.clone());
        Ok(())
    })
}

/// Add (or overwrite) the given annotations, other annotations are kept.
pub fn append_annotations(annotations: BTreeMap<String, String>) -> MixIn {
    Box::new(move |_, meta| {
        meta.annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(annotations.clone());
        Ok(())
    })
}

/// Mark the object as managed by this operator, owned kinds are watched through this label.
pub fn managed() -> MixIn {
    append_labels(managed_labels())
}
