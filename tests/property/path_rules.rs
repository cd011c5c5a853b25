// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Path Filtering and Rule Derivation

use cdn_invalidator::paths::{PathFilter, PathSet, JCR_CONTENT};
use cdn_invalidator::rules::{derive_values, parse_mappings, RuleSet};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(String::from),
        Just(JCR_CONTENT.to_string()),
        Just("site".to_string()),
    ]
}

fn repository_path() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("content"), Just("dam"), Just("var")],
        prop::collection::vec(segment(), 0..5),
    )
        .prop_map(|(root, segments)| {
            let mut path = format!("/{}", root);
            for segment in segments {
                path.push('/');
                path.push_str(&segment);
            }
            path
        })
}

fn path_batch() -> impl Strategy<Value = PathSet> {
    prop::collection::btree_set(repository_path(), 0..12)
}

fn root_regex() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just(""),
        Just("/content/.*"),
        Just("/content/site(/.*)?"),
        Just("/dam/[a-z]+"),
        Just("/nowhere"),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Filtering an already filtered batch changes nothing
    #[test]
    fn prop_filter_is_idempotent(paths in path_batch(), regex in root_regex()) {
        let filter = PathFilter::new(regex).unwrap();
        let once = filter.filter(&paths);
        let twice = filter.filter(&once);
        prop_assert_eq!(once, twice);
    }

    /// Every surviving path matches and no longer points below jcr:content
    #[test]
    fn prop_filtered_paths_are_owning_resources(paths in path_batch(), regex in root_regex()) {
        let filter = PathFilter::new(regex).unwrap();
        for path in filter.filter(&paths) {
            let jcr_segment = format!("/{}", JCR_CONTENT);
            prop_assert!(!path.contains(&jcr_segment));
            prop_assert!(!path.trim().is_empty());
            prop_assert!(filter.matches(&path));
        }
    }

    /// No rules, no values
    #[test]
    fn prop_empty_rules_yield_nothing(paths in path_batch()) {
        let rules = RuleSet::default();
        prop_assert!(derive_values(Some(&paths), Some(&rules)).is_empty());
    }

    /// A matching path yields its substituted value unless it is blank
    #[test]
    fn prop_back_reference_substitution(site in "[a-z]{0,5}", rest in "[a-z/]{0,8}") {
        let rules = RuleSet::from_mappings(["/content/([a-z]*)/.*=$1"]).unwrap();
        let paths = PathSet::from([format!("/content/{}/{}", site, rest)]);

        let values = derive_values(Some(&paths), Some(&rules));
        if site.is_empty() {
            prop_assert!(values.is_empty());
        } else {
            prop_assert_eq!(values, PathSet::from([site]));
        }
    }

    /// Parsed rules never carry blank sides or surrounding whitespace
    #[test]
    fn prop_parsed_rules_are_trimmed(raw in prop::collection::vec("[ a-z=]{0,10}", 0..8)) {
        for (pattern, template) in parse_mappings(&raw) {
            prop_assert!(!pattern.is_empty());
            prop_assert!(!template.is_empty());
            prop_assert_eq!(pattern.trim(), pattern.as_str());
            prop_assert_eq!(template.trim(), template.as_str());
        }
    }
}
