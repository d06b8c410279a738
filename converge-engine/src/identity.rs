//! Identity and set difference between desired and remote items.
//!
//! Items are compared by their identifier string only. An empty identifier
//! means the item is not linked to a remote object yet: it never matches
//! anything, so it always lands on the create side of a diff.

use std::collections::HashSet;

/// Anything that can be compared by natural key.
pub trait Identifiable {
    /// Identifier derived from the natural key. Empty when unlinked.
    fn identifier(&self) -> String;
}

impl<T: Identifiable + ?Sized> Identifiable for &T {
    fn identifier(&self) -> String {
        (**self).identifier()
    }
}

/// Items of `left` whose identifier is absent from `right`.
///
/// Output keeps the order of `left`, but callers must not rely on it.
pub fn difference<'a, L, R>(left: &'a [L], right: &[R]) -> Vec<&'a L>
where
    L: Identifiable,
    R: Identifiable,
{
    let known: HashSet<String> = right
        .iter()
        .map(Identifiable::identifier)
        .filter(|id| !id.is_empty())
        .collect();

    left.iter()
        .filter(|item| {
            let id = item.identifier();
            id.is_empty() || !known.contains(&id)
        })
        .collect()
}

/// Create and delete sets between a desired and a remote collection.
#[derive(Debug)]
pub struct Diff<'a, D, R> {
    /// Declared but not present remotely.
    pub to_create: Vec<&'a D>,
    /// Present remotely but no longer declared.
    pub to_delete: Vec<&'a R>,
}

impl<'a, D, R> Diff<'a, D, R>
where
    D: Identifiable,
    R: Identifiable,
{
    pub fn compute(desired: &'a [D], remote: &'a [R]) -> Self {
        Self {
            to_create: difference(desired, remote),
            to_delete: difference(remote, desired),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}
