//! Tests for fenced and bracket-scan JSON extraction

use super::*;
use crate::itinerary::ResolvedItinerary;
use serde_json::{Value, json};

fn complete<T: std::fmt::Debug>(result: Result<Resolution<T>, ResolveError>) -> (T, ExtractionSource) {
    match result {
        Ok(Resolution::Complete { value, source }) => (value, source),
        other => panic!("expected complete resolution, got {other:?}"),
    }
}

#[test]
fn test_fenced_json_is_extracted() {
    let raw = RawModelResponse::from_text("```json\n{\"title\":\"Rome\",\"days\":[]}\n```");
    let (value, source) = complete(resolve::<Value>(&raw));
    assert_eq!(value, json!({"title": "Rome", "days": []}));
    assert_eq!(source, ExtractionSource::Fenced);
}

#[test]
fn test_fence_with_surrounding_prose_is_extracted() {
    let text = "Here is your plan:\n```json\n{\"title\": \"Oslo\"}\n```\nEnjoy!";
    let (value, source) = complete(resolve::<Value>(&RawModelResponse::from_text(text)));
    assert_eq!(value["title"], "Oslo");
    assert_eq!(source, ExtractionSource::Fenced);
}

#[test]
fn test_plain_json_uses_bracket_scan() {
    let raw = RawModelResponse::from_text(r#"{"title":"Lima","days":[]}"#);
    let (value, source) = complete(resolve::<Value>(&raw));
    assert_eq!(value["title"], "Lima");
    assert_eq!(source, ExtractionSource::BracketScan);
}

#[test]
fn test_prose_wrapped_json_uses_bracket_scan() {
    let raw = RawModelResponse::from_text("Sure! {\"title\": \"Cusco\"} Let me know.");
    let (value, source) = complete(resolve::<Value>(&raw));
    assert_eq!(value["title"], "Cusco");
    assert_eq!(source, ExtractionSource::BracketScan);
}

#[test]
fn test_broken_fence_falls_through_to_bracket_scan() {
    // The fenced interior is invalid but a valid object follows it
    let text = "```json\n{\"title\": }\n```\n{\"title\": \"Quito\"}";
    let raw = RawModelResponse::from_text(text);
    // First `{` to last `}` spans both objects, so the scan cannot parse either
    assert!(matches!(
        resolve::<Value>(&raw),
        Err(ResolveError::MalformedJson { .. })
    ));
}

#[test]
fn test_broken_fence_alone_is_malformed() {
    let raw = RawModelResponse::from_text("```json\n{\"title\": \"Rome\",}\n```");
    assert!(matches!(
        resolve::<Value>(&raw),
        Err(ResolveError::MalformedJson { .. })
    ));
}

#[test]
fn test_text_without_braces_is_no_json_found() {
    let raw = RawModelResponse::from_text("I cannot help with that.");
    assert_eq!(
        resolve::<Value>(&raw),
        Err(ResolveError::NoJsonFound { response_chars: 24 })
    );
}

#[test]
fn test_inverted_braces_are_no_json_found() {
    let raw = RawModelResponse::from_text("} nothing here {");
    assert!(matches!(
        resolve::<Value>(&raw),
        Err(ResolveError::NoJsonFound { .. })
    ));
}

#[test]
fn test_unbalanced_object_is_malformed() {
    let raw = RawModelResponse::from_text(r#"{"title": "Rome", "days": [ }"#);
    assert!(matches!(
        resolve::<Value>(&raw),
        Err(ResolveError::MalformedJson { .. })
    ));
}

#[test]
fn test_typed_target_rejects_wrong_shape_as_malformed() {
    let raw = RawModelResponse::from_text(r#"{"name": "not an itinerary"}"#);
    assert!(matches!(
        resolve::<ResolvedItinerary>(&raw),
        Err(ResolveError::MalformedJson { .. })
    ));
}

#[test]
fn test_typed_itinerary_resolves_with_venue_tags_untouched() {
    let text = r####"```json
{
  "title": "Two days in Lisbon",
  "days": [
    {
      "title": "Day 1: Alfama",
      "activities": [
        {"time": "9:00 AM", "description": "Visit [VENUE]**Castelo de S. Jorge**|https://maps.google.com/?q=Castelo+Lisbon[/VENUE]."}
      ],
      "insiderTip": "Take tram 28 early."
    }
  ],
  "bookingSuggestions": "### Hotels"
}
```"####;
    let (itinerary, _) = complete(resolve::<ResolvedItinerary>(&RawModelResponse::from_text(text)));
    assert_eq!(itinerary.title, "Two days in Lisbon");
    assert_eq!(itinerary.days.len(), 1);
    assert!(
        itinerary.days[0].activities[0]
            .description
            .contains("[VENUE]**Castelo de S. Jorge**|https://maps.google.com/?q=Castelo+Lisbon[/VENUE]")
    );
}

#[test]
fn test_extract_fenced_trims_interior() {
    assert_eq!(extract_fenced("```json   {\"a\":1}   ```"), Some("{\"a\":1}"));
    assert_eq!(extract_fenced("```\n{\"a\":1}\n```"), None);
}

#[test]
fn test_bracket_slice_bounds() {
    assert_eq!(bracket_slice("xx{a}yy{b}zz"), Some("{a}yy{b}"));
    assert_eq!(bracket_slice("no braces"), None);
    assert_eq!(bracket_slice("only { open"), None);
    assert_eq!(bracket_slice("} reversed {"), None);
}
