#![cfg(feature = "persistent")]
//! Property-based tests for PersistentVector laws.
//!
//! This module verifies the persistence laws and shape invariants of
//! PersistentVector using proptest.

use proptest::prelude::*;
use radixvec::persistent::{BITS_PER_LEVEL, PersistentVector, tree_height};

fn appended(elements: &[i32]) -> PersistentVector<i32> {
    elements
        .iter()
        .fold(PersistentVector::new(), |vector, &element| vector.append(element))
}

// =============================================================================
// Basic Laws
// =============================================================================

proptest! {
    /// Append-Get Law: appending v0..vn yields a vector whose k-th element is vk
    #[test]
    fn prop_append_get_law(elements in prop::collection::vec(any::<i32>(), 0..3000)) {
        let vector = appended(&elements);

        prop_assert_eq!(vector.len(), elements.len());
        for (index, element) in elements.iter().enumerate() {
            prop_assert_eq!(vector.get(index), Ok(element));
        }
        prop_assert!(vector.get(elements.len()).is_err());
    }

    /// Get-Update Law: the updated index holds the new value
    #[test]
    fn prop_get_update_law(
        elements in prop::collection::vec(any::<i32>(), 1..2000),
        seed: usize,
        new_value: i32
    ) {
        let vector = appended(&elements);
        let index = seed % elements.len();
        let updated = vector.update(index, new_value).unwrap();

        prop_assert_eq!(updated.get(index), Ok(&new_value));
    }

    /// Get-Update-Other Law: update does not affect other indices, nor the original
    #[test]
    fn prop_update_persistence_law(
        elements in prop::collection::vec(any::<i32>(), 1..2000),
        seed: usize,
        new_value: i32
    ) {
        let vector = appended(&elements);
        let index = seed % elements.len();
        let updated = vector.update(index, new_value).unwrap();

        for (position, element) in elements.iter().enumerate() {
            if position != index {
                prop_assert_eq!(updated.get(position), Ok(element));
            }
            prop_assert_eq!(vector.get(position), Ok(element));
        }
    }

    /// Append-Pop Law: pop undoes append
    #[test]
    fn prop_append_pop_law(
        elements in prop::collection::vec(any::<i32>(), 0..2000),
        new_element: i32
    ) {
        let vector = appended(&elements);
        let round_trip = vector.append(new_element).pop().unwrap();

        prop_assert_eq!(round_trip.len(), vector.len());
        prop_assert_eq!(round_trip.height(), vector.height());
        prop_assert_eq!(&round_trip, &vector);
    }

    /// Out-of-range Law: errors are reported without touching the vector
    #[test]
    fn prop_out_of_range_is_rejected(
        elements in prop::collection::vec(any::<i32>(), 0..200),
        offset in 0usize..1000
    ) {
        let vector = appended(&elements);
        let index = elements.len() + offset;

        prop_assert!(vector.get(index).is_err());
        prop_assert!(vector.update(index, 0).is_err());
        prop_assert_eq!(vector.iter().copied().collect::<Vec<_>>(), elements);
    }
}

// =============================================================================
// Shape Invariants
// =============================================================================

proptest! {
    /// Height Law: height is ceil(log32(len)), and the measured leftmost path agrees
    #[test]
    fn prop_height_invariant(length in 0usize..40_000) {
        let vector: PersistentVector<usize> = (0..length).collect();

        prop_assert_eq!(vector.height(), tree_height(length));
        prop_assert_eq!(vector.left_path_length(), vector.height());
    }

    /// Height stays consistent through any mix of appends and pops
    #[test]
    fn prop_height_through_operations(
        operations in prop::collection::vec(prop_oneof![3 => Just(true), 1 => Just(false)], 0..3000)
    ) {
        let mut vector = PersistentVector::new();
        let mut model: Vec<usize> = Vec::new();

        for (step, is_append) in operations.into_iter().enumerate() {
            if is_append {
                vector = vector.append(step);
                model.push(step);
            } else if let Ok(popped) = vector.pop() {
                vector = popped;
                model.pop();
            } else {
                prop_assert!(model.is_empty());
            }
            prop_assert_eq!(vector.len(), model.len());
            prop_assert_eq!(vector.left_path_length(), tree_height(model.len()));
        }

        prop_assert_eq!(vector.into_iter().collect::<Vec<_>>(), model);
    }

    /// Every version along a history stays readable and unchanged
    #[test]
    fn prop_multiple_versions_coexist(
        elements in prop::collection::vec(any::<i32>(), 1..300)
    ) {
        let mut versions = vec![PersistentVector::new()];
        for &element in &elements {
            let next = versions.last().unwrap().append(element);
            versions.push(next);
        }

        for (length, version) in versions.iter().enumerate() {
            prop_assert_eq!(version.len(), length);
            prop_assert_eq!(version.iter().copied().collect::<Vec<_>>(), &elements[..length]);
        }
    }

    /// Bulk construction and repeated append agree
    #[test]
    fn prop_from_iter_equals_append(elements in prop::collection::vec(any::<i32>(), 0..3000)) {
        let collected: PersistentVector<i32> = elements.iter().copied().collect();
        let by_append = appended(&elements);

        prop_assert_eq!(collected.height(), by_append.height());
        prop_assert_eq!(collected, by_append);
    }
}

// =============================================================================
// Boundary Laws
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Appending the (32^k + 1)-th element adds exactly one level, and popping
    /// back down to 32^k removes it again
    #[test]
    fn prop_level_boundaries(exponent in 1u32..=3) {
        let boundary = 1usize << (BITS_PER_LEVEL as u32 * exponent);
        let full: PersistentVector<usize> = (0..boundary).collect();
        let grown = full.append(boundary);
        let shrunk = grown.pop().unwrap();

        prop_assert_eq!(grown.height(), full.height() + 1);
        prop_assert_eq!(shrunk.height(), full.height());
        prop_assert_eq!(shrunk.left_path_length(), full.height());
        prop_assert_eq!(&shrunk, &full);
    }
}
