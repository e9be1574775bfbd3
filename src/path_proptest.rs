//! Property-based tests for target path functions.
//!
//! These tests use proptest to generate random targets and verify that
//! invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::path::{depth, is_strictly_within, normalize_target, relative_to, resolve};
    use proptest::prelude::*;
    use std::path::Path;

    // Components that are neither empty nor `.`/`..`
    fn component() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_-][a-zA-Z0-9_.-]{0,8}"
    }

    fn target() -> impl Strategy<Value = String> {
        prop::collection::vec(component(), 0..5).prop_map(|parts| format!("/{}", parts.join("/")))
    }

    // ============================================================================
    // normalize_target property tests
    // ============================================================================

    proptest! {
        /// Property: normalizing twice gives the same result as normalizing once
        #[test]
        fn normalize_is_idempotent(input in target()) {
            let once = normalize_target(&input).unwrap();
            let twice = normalize_target(&once).unwrap();
            prop_assert_eq!(once, twice);
        }

        /// Property: extra slashes never change the normalized form
        #[test]
        fn normalize_ignores_repeated_slashes(input in target()) {
            let doubled = input.replace('/', "//");
            prop_assert_eq!(
                normalize_target(&doubled).unwrap(),
                normalize_target(&input).unwrap()
            );
        }

        /// Property: normalized targets never end with a slash, except the root
        #[test]
        fn normalize_has_no_trailing_slash(input in target()) {
            let normalized = normalize_target(&format!("{}/", input)).unwrap();
            prop_assert!(normalized == "/" || !normalized.ends_with('/'));
        }

        /// Property: targets without a leading slash are rejected
        #[test]
        fn normalize_rejects_relative(input in component()) {
            prop_assert!(normalize_target(&input).is_err());
        }
    }

    // ============================================================================
    // containment property tests
    // ============================================================================

    proptest! {
        /// Property: a child target is strictly within its parent and deeper
        #[test]
        fn child_is_within_parent(parent in target(), child in component()) {
            let parent = normalize_target(&parent).unwrap();
            let nested = normalize_target(&format!("{}/{}", parent, child)).unwrap();
            prop_assert!(is_strictly_within(&nested, &parent));
            prop_assert!(!is_strictly_within(&parent, &nested));
            prop_assert_eq!(depth(&nested), depth(&parent) + 1);
        }

        /// Property: relative_to plus the ancestor resolves to the same path
        #[test]
        fn relative_to_reconstructs_path(parent in target(), child in target()) {
            let parent = normalize_target(&parent).unwrap();
            let tail = normalize_target(&child).unwrap();
            prop_assume!(tail != "/");
            let nested = normalize_target(&format!("{}{}", parent, tail)).unwrap();
            let relative = relative_to(&nested, &parent).unwrap();

            let root = Path::new("/lodge");
            prop_assert_eq!(
                resolve(&resolve(root, &parent), &relative),
                resolve(root, &nested)
            );
        }
    }
}
