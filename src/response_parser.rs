use serde_json::Value;
use tracing::debug;

use crate::ai_strategies::AiServiceError;
use crate::models::{
    BACK_MAX_CHARS, FlashcardSource, FRONT_MAX_CHARS, MAX_PROPOSALS, MIN_PROPOSALS,
    ProposedFlashcard,
};

/// One link in the response-parsing chain.
///
/// `try_parse` returns `None` when the parser does not recognize the shape
/// of the input, letting the next parser in the chain have a look. Once a
/// parser recognizes the shape it owns the outcome: a `Some(Err(..))` is
/// final and the chain stops there.
pub trait ResponseParser {
    fn name(&self) -> &'static str;
    fn try_parse(&self, raw: &Value) -> Option<Result<Vec<ProposedFlashcard>, AiServiceError>>;
}

/// Recognizes `{"flashcards": [...]}`. A `flashcards` key holding null (or
/// anything but an array) is treated as unrecognized so the input falls
/// through to the remaining parsers.
pub struct ObjectWithFlashcardsParser;

impl ResponseParser for ObjectWithFlashcardsParser {
    fn name(&self) -> &'static str {
        "object_with_flashcards"
    }

    fn try_parse(&self, raw: &Value) -> Option<Result<Vec<ProposedFlashcard>, AiServiceError>> {
        let items = raw.get("flashcards")?.as_array()?;
        Some(validate_items(items))
    }
}

/// Recognizes a bare top-level array of flashcard objects.
pub struct BareArrayParser;

impl ResponseParser for BareArrayParser {
    fn name(&self) -> &'static str {
        "bare_array"
    }

    fn try_parse(&self, raw: &Value) -> Option<Result<Vec<ProposedFlashcard>, AiServiceError>> {
        let items = raw.as_array()?;
        Some(validate_items(items))
    }
}

/// Recognizes a string whose content is JSON of either of the other two
/// shapes. A string that fails to parse as JSON is a recognized-but-broken
/// input, surfaced as a parse error with the decoder's message.
pub struct JsonStringParser;

impl ResponseParser for JsonStringParser {
    fn name(&self) -> &'static str {
        "json_string"
    }

    fn try_parse(&self, raw: &Value) -> Option<Result<Vec<ProposedFlashcard>, AiServiceError>> {
        let text = raw.as_str()?;
        let decoded: Value = match serde_json::from_str(text.trim()) {
            Ok(value) => value,
            Err(e) => {
                return Some(Err(AiServiceError::Parse(format!(
                    "response string is not valid JSON: {e}"
                ))));
            }
        };

        if let Some(result) = ObjectWithFlashcardsParser.try_parse(&decoded) {
            return Some(result);
        }
        if let Some(result) = BareArrayParser.try_parse(&decoded) {
            return Some(result);
        }
        Some(Err(AiServiceError::Parse(format!(
            "decoded JSON string has unrecognized shape: {}",
            value_type_name(&decoded)
        ))))
    }
}

/// Runs the fixed parser chain over a raw model response.
///
/// Order matters: object-with-`flashcards`-key, then bare array, then
/// JSON-encoded string. The first parser to recognize the shape owns
/// validation and transformation; if none do, the failure names the
/// runtime type of the input.
pub fn parse_ai_response(raw: &Value) -> Result<Vec<ProposedFlashcard>, AiServiceError> {
    let chain: [&dyn ResponseParser; 3] =
        [&ObjectWithFlashcardsParser, &BareArrayParser, &JsonStringParser];

    for parser in chain {
        if let Some(result) = parser.try_parse(raw) {
            debug!(parser = parser.name(), "AI response shape recognized");
            return result;
        }
    }

    Err(AiServiceError::Parse(format!(
        "no parser recognized AI response of type {}",
        value_type_name(raw)
    )))
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Schema validation shared by every parser that recognized an array of
/// candidate items: trims whitespace, enforces per-field lengths and the
/// 5-8 batch size, and stamps `source = ai-full`.
fn validate_items(items: &[Value]) -> Result<Vec<ProposedFlashcard>, AiServiceError> {
    if items.len() < MIN_PROPOSALS || items.len() > MAX_PROPOSALS {
        return Err(AiServiceError::Validation(format!(
            "expected between {MIN_PROPOSALS} and {MAX_PROPOSALS} flashcards, got {}",
            items.len()
        )));
    }

    let mut proposals = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let front = string_field(item, "front", index)?;
        let back = string_field(item, "back", index)?;

        let front = front.trim();
        let back = back.trim();

        if front.is_empty() || front.chars().count() > FRONT_MAX_CHARS {
            return Err(AiServiceError::Validation(format!(
                "flashcard {index}: front must be 1-{FRONT_MAX_CHARS} characters"
            )));
        }
        if back.is_empty() || back.chars().count() > BACK_MAX_CHARS {
            return Err(AiServiceError::Validation(format!(
                "flashcard {index}: back must be 1-{BACK_MAX_CHARS} characters"
            )));
        }

        proposals.push(ProposedFlashcard {
            front: front.to_string(),
            back: back.to_string(),
            source: FlashcardSource::AiFull,
        });
    }

    Ok(proposals)
}

fn string_field<'a>(item: &'a Value, field: &str, index: usize) -> Result<&'a str, AiServiceError> {
    item.get(field).and_then(Value::as_str).ok_or_else(|| {
        AiServiceError::Validation(format!(
            "flashcard {index}: missing or non-string '{field}' field"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cards(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"front": format!("Q{i}"), "back": format!("A{i}")}))
            .collect()
    }

    #[test]
    fn test_object_with_flashcards_key() {
        let raw = json!({ "flashcards": cards(5) });
        let parsed = parse_ai_response(&raw).unwrap();
        assert_eq!(parsed.len(), 5);
        assert_eq!(parsed[0].front, "Q0");
        assert!(parsed.iter().all(|p| p.source == FlashcardSource::AiFull));
    }

    #[test]
    fn test_bare_array() {
        let raw = Value::Array(cards(8));
        let parsed = parse_ai_response(&raw).unwrap();
        assert_eq!(parsed.len(), 8);
    }

    #[test]
    fn test_json_string_of_object() {
        let inner = json!({ "flashcards": cards(6) });
        let raw = Value::String(inner.to_string());
        let parsed = parse_ai_response(&raw).unwrap();
        assert_eq!(parsed.len(), 6);
    }

    #[test]
    fn test_json_string_of_array() {
        let raw = Value::String(Value::Array(cards(5)).to_string());
        assert_eq!(parse_ai_response(&raw).unwrap().len(), 5);
    }

    #[test]
    fn test_null_flashcards_key_falls_through() {
        // Shape is an object, but the key is null, so the object parser
        // must not claim it; with no other parser matching, this is a
        // parse error naming the runtime type.
        let raw = json!({ "flashcards": null });
        let err = parse_ai_response(&raw).unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
        assert!(err.to_string().contains("object"));
    }

    #[test]
    fn test_unrecognized_types_name_the_type() {
        for (raw, name) in [
            (json!(42), "number"),
            (json!(true), "boolean"),
            (Value::Null, "null"),
        ] {
            let err = parse_ai_response(&raw).unwrap_err();
            assert_eq!(err.code(), "PARSE_ERROR");
            assert!(err.to_string().contains(name), "{err} should name {name}");
        }
    }

    #[test]
    fn test_invalid_json_string_is_parse_error() {
        let raw = Value::String("not json at all {".to_string());
        let err = parse_ai_response(&raw).unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_too_few_items_is_validation_not_parse() {
        let raw = json!({ "flashcards": cards(4) });
        let err = parse_ai_response(&raw).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_too_many_items_rejected() {
        let raw = Value::Array(cards(9));
        let err = parse_ai_response(&raw).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_whitespace_trimmed() {
        let mut items = cards(5);
        items[0] = json!({"front": "  padded  ", "back": "\tanswer\n"});
        let parsed = parse_ai_response(&json!({ "flashcards": items })).unwrap();
        assert_eq!(parsed[0].front, "padded");
        assert_eq!(parsed[0].back, "answer");
    }

    #[test]
    fn test_overlong_front_rejected() {
        let mut items = cards(5);
        items[2] = json!({"front": "x".repeat(FRONT_MAX_CHARS + 1), "back": "ok"});
        let err = parse_ai_response(&json!({ "flashcards": items })).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("front"));
    }

    #[test]
    fn test_empty_back_rejected() {
        let mut items = cards(5);
        items[1] = json!({"front": "ok", "back": "   "});
        let err = parse_ai_response(&json!({ "flashcards": items })).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("back"));
    }

    #[test]
    fn test_missing_field_rejected() {
        let mut items = cards(5);
        items[3] = json!({"front": "only front"});
        let err = parse_ai_response(&json!({ "flashcards": items })).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
