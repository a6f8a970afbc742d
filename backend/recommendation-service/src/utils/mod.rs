// List helpers shared by the feed composer
use std::collections::HashSet;
use std::hash::Hash;

/// Merge two lists at a fixed positional ratio.
///
/// Takes `primary_step` items from `primary`, then `secondary_step` from
/// `secondary`, and repeats. Once either list runs out the rest of the
/// other is appended as is.
pub fn interleave<T>(
    primary: Vec<T>,
    secondary: Vec<T>,
    primary_step: usize,
    secondary_step: usize,
) -> Vec<T> {
    let mut merged = Vec::with_capacity(primary.len() + secondary.len());
    let mut primary = primary.into_iter().peekable();
    let mut secondary = secondary.into_iter().peekable();

    while primary.peek().is_some() && secondary.peek().is_some() {
        merged.extend(primary.by_ref().take(primary_step.max(1)));
        merged.extend(secondary.by_ref().take(secondary_step.max(1)));
    }

    merged.extend(primary);
    merged.extend(secondary);
    merged
}

/// Drop repeated items, keeping the first occurrence.
pub fn retain_unique<T: Eq + Hash + Clone>(items: &mut Vec<T>) {
    let mut seen = HashSet::with_capacity(items.len());
    items.retain(|item| seen.insert(item.clone()));
}
