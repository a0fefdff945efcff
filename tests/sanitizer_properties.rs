//! Property tests for input sanitizing and reply resolution

use itinerary_gateway::intake::{InvalidInput, MAX_INPUT_CHARS, sanitize};
use itinerary_gateway::itinerary::ResolvedItinerary;
use itinerary_gateway::resolver::resolve;
use itinerary_gateway::upstream::RawModelResponse;
use proptest::prelude::*;

proptest! {
    #[test]
    fn sanitized_text_is_bounded_and_clean(s in any::<String>()) {
        if let Ok(clean) = sanitize(&s) {
            prop_assert!(!clean.is_empty());
            prop_assert!(clean.chars().count() <= MAX_INPUT_CHARS);
            prop_assert!(!clean.contains('<') && !clean.contains('>'));
            prop_assert!(clean.chars().all(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r')));
            prop_assert_eq!(clean.trim(), clean.as_str());
        }
    }

    #[test]
    fn sanitize_is_idempotent(s in any::<String>()) {
        if let Ok(once) = sanitize(&s) {
            prop_assert_eq!(sanitize(&once), Ok(once.clone()));
        }
    }

    #[test]
    fn whitespace_and_markup_only_input_is_empty(s in "[ \t\n<>\u{1}-\u{8}]{0,64}") {
        prop_assert_eq!(sanitize(&s), Err(InvalidInput::Empty));
    }

    #[test]
    fn plain_text_within_limit_survives_unchanged(s in "[a-zA-Z0-9][a-zA-Z0-9 ,.'-]{0,200}[a-zA-Z0-9]") {
        prop_assert_eq!(sanitize(&s), Ok(s.clone()));
    }

    #[test]
    fn resolver_never_panics_on_arbitrary_text(s in any::<String>()) {
        let _ = resolve::<ResolvedItinerary>(&RawModelResponse::from_text(s));
    }

    #[test]
    fn itinerary_wrapped_in_prose_is_found(prefix in "[a-zA-Z .:]{0,40}", suffix in "[a-zA-Z .]{0,40}") {
        let text = format!(
            "{prefix}{{\"title\": \"Oslo\", \"days\": [{{\"title\": \"Day 1\", \"activities\": []}}]}}{suffix}"
        );
        let resolved = resolve::<ResolvedItinerary>(&RawModelResponse::from_text(text));
        prop_assert!(resolved.is_ok(), "{:?}", resolved.err());
    }
}
