//! Property-based tests for key contents and duplication
//!
//! Uses proptest to check that keys hold exactly what they were given and
//! that duplicates never alias the original

use keyset_rs::{Key, LockFlags};
use proptest::prelude::*;

fn name_strategy() -> impl Strategy<Value = String> {
    ("(user|system|dir)", "[a-z0-9_]{1,8}(/[a-z0-9_]{1,8}){0,3}")
        .prop_map(|(ns, rel)| format!("{}/{}", ns, rel))
}

fn meta_name_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(/[a-z]{1,6}){0,1}".prop_filter("reserved marker", |n| n != "binary")
}

proptest! {
    #[test]
    fn prop_string_reads_back(name in name_strategy(), value in any::<String>()) {
        let key = Key::builder(&name).string(&value).build().unwrap();

        prop_assert_eq!(key.name(), name);
        prop_assert_eq!(key.string().unwrap(), value.clone());
        prop_assert_eq!(key.value_size(), value.len());
        prop_assert!(key.is_string());
    }

    #[test]
    fn prop_binary_reads_back(
        name in name_strategy(),
        value in prop::collection::vec(any::<u8>(), 0..64)
    ) {
        let key = Key::builder(&name).binary(value.clone()).build().unwrap();

        prop_assert_eq!(key.name(), name);
        prop_assert!(key.is_binary());
        prop_assert_eq!(key.value(), value);
    }

    #[test]
    fn prop_meta_reads_back(
        name in name_strategy(),
        meta_name in meta_name_strategy(),
        meta_value in any::<String>()
    ) {
        let key = Key::builder(&name).meta(&meta_name, &meta_value).build().unwrap();
        prop_assert_eq!(key.meta_string(&meta_name).unwrap(), meta_value);
        prop_assert!(key.meta_names().contains(&meta_name));
    }

    #[test]
    fn prop_duplicate_mutation_leaves_original(
        name in name_strategy(),
        value in any::<String>(),
        other_name in name_strategy(),
        other_value in any::<String>(),
        meta_name in meta_name_strategy(),
        meta_value in any::<String>()
    ) {
        let original = Key::builder(&name)
            .string(&value)
            .meta(&meta_name, "original")
            .build()
            .unwrap();
        original.lock(LockFlags::all());

        let dup = original.duplicate();
        prop_assert!(!dup.ptr_eq(&original));
        prop_assert_eq!(dup.name(), name.clone());
        prop_assert_eq!(dup.string().unwrap(), value.clone());

        dup.set_name(&other_name).unwrap();
        dup.set_string(&other_value).unwrap();
        dup.set_meta(&meta_name, &meta_value).unwrap();
        dup.set_meta("comment", "changed").unwrap();

        prop_assert_eq!(original.name(), name);
        prop_assert_eq!(original.string().unwrap(), value);
        prop_assert_eq!(original.meta_string(&meta_name).unwrap(), "original");
        prop_assert!(original.meta("comment").is_none() || meta_name == "comment");
        prop_assert!(original.is_locked(LockFlags::all()));
        prop_assert_eq!(original.ref_count(), 1);
    }

    #[test]
    fn prop_mutating_original_leaves_duplicate(
        name in name_strategy(),
        value in any::<String>(),
        other_value in any::<String>()
    ) {
        let original = Key::builder(&name).string(&value).build().unwrap();
        let dup = original.duplicate();

        original.set_string(&other_value).unwrap();
        original.set_meta("comment", "changed").unwrap();

        prop_assert_eq!(dup.string().unwrap(), value);
        prop_assert!(dup.meta("comment").is_none());
    }
}
