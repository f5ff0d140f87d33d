use crate::model::PopulateArg;
use crate::store::pending::{AppliedPopulate, Populatable};

/// Attach zero, one or many referenced-document expansions to a
/// pending find or find-one.
///
/// Single-or-array input is normalized to a list, then folded onto the
/// pending operation. Entries with an empty or missing `path` are
/// dropped silently; `None` returns the input unchanged.
pub fn populate_model<P: Populatable>(pending: P, populate: Option<PopulateArg>) -> P {
    let Some(populate) = populate else {
        return pending;
    };
    populate
        .into_vec()
        .into_iter()
        .fold(pending, |acc, field| {
            match AppliedPopulate::from_field(&field) {
                Some(applied) => acc.populate(applied),
                None => acc,
            }
        })
}
