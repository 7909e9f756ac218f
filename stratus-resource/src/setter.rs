//! Field setters copy values from a spec into a request object.
//!
//! Building a request and deciding whether it needs sending happen in the same
//! pass: a batch of setters reports whether any of them fired.

use crate::{
    changes::Changes,
    error::ProviderError,
    path::{self, get_value_by_path},
    value::MappingNode,
};

/// Scope that spec-relative paths are qualified with for change lookups.
pub const DEFAULT_CHANGE_SCOPE: &str = "spec";

type Mutator<'a, T> =
    Box<dyn Fn(&MappingNode, &Changes, &mut T) -> Result<bool, ProviderError> + Send + Sync + 'a>;

pub struct ValueSetter<'a, T> {
    path: String,
    mutate: Mutator<'a, T>,
    check_if_changed: bool,
    change_scope: String,
}

impl<'a, T> ValueSetter<'a, T> {
    /// A setter for a single field. It fires whenever the value is present.
    pub fn new<F>(path: impl Into<String>, mutate: F) -> Self
    where
        F: Fn(&MappingNode, &mut T) + Send + Sync + 'a,
    {
        Self::composite(path, move |value, _changes, target| {
            mutate(value, target);
            Ok(true)
        })
    }

    /// A setter whose mutator assembles the target from nested setters.
    ///
    /// The mutator returns whether any nested setter fired; when none did, the
    /// mutator must leave the target alone and the setter counts as not fired.
    pub fn composite<F>(path: impl Into<String>, mutate: F) -> Self
    where
        F: Fn(&MappingNode, &Changes, &mut T) -> Result<bool, ProviderError> + Send + Sync + 'a,
    {
        ValueSetter {
            path: path.into(),
            mutate: Box::new(mutate),
            check_if_changed: false,
            change_scope: DEFAULT_CHANGE_SCOPE.to_string(),
        }
    }

    /// Only fire when the change set records a new or modified value at or
    /// below this setter's path.
    pub fn with_check_if_changed(mut self, check_if_changed: bool) -> Self {
        self.check_if_changed = check_if_changed;
        self
    }

    /// Qualify the path with `scope` instead of `spec` for change lookups,
    /// e.g. `spec.imageConfig` for setters nested under `$.imageConfig`.
    pub fn with_change_scope(mut self, scope: impl Into<String>) -> Self {
        self.change_scope = scope.into();
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Applies the setter and returns whether it fired.
    pub fn apply(
        &self,
        spec: &MappingNode,
        changes: &Changes,
        target: &mut T,
    ) -> Result<bool, ProviderError> {
        let value = match get_value_by_path(&self.path, spec)? {
            Some(value) if !value.is_null() => value,
            _ => return Ok(false),
        };

        if self.check_if_changed
            && !changes.has_changed(&path::qualify(&self.change_scope, &self.path))
        {
            return Ok(false);
        }

        let did_set = (self.mutate)(value, changes, target)?;
        if did_set {
            tracing::trace!(path = %self.path, "field set");
        }
        Ok(did_set)
    }
}

/// Applies every setter to `target` and returns whether any fired.
pub fn apply_all<T>(
    setters: &[ValueSetter<'_, T>],
    spec: &MappingNode,
    changes: &Changes,
    target: &mut T,
) -> Result<bool, ProviderError> {
    let mut any = false;
    for setter in setters {
        any |= setter.apply(spec, changes, target)?;
    }
    Ok(any)
}
