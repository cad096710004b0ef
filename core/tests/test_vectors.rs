//! Verify the response parser against JSON test vectors in `test-vectors/`.
//!
//! Each case names the issuing operation, the raw XML reply, and either the
//! expected root and positional fields or the expected error kind.

use captchatrader::{parse_response, ParseError, RequestType, RootElement};

fn operation(name: &str) -> RequestType {
    RequestType::ALL
        .into_iter()
        .find(|t| t.name() == name)
        .unwrap_or_else(|| panic!("unknown operation: {name}"))
}

fn root(name: &str) -> RootElement {
    match name {
        "error" => RootElement::Error,
        "job" => RootElement::Job,
        "success" => RootElement::Success,
        "user" => RootElement::User,
        "queue" => RootElement::Queue,
        other => panic!("unknown root: {other}"),
    }
}

fn error_kind(err: &ParseError) -> &'static str {
    match err {
        ParseError::Malformed(_) => "malformed",
        ParseError::UnexpectedRoot(_) => "unexpected_root",
        ParseError::MissingAttribute { .. } => "missing_attribute",
        ParseError::MissingElement { .. } => "missing_element",
        ParseError::MissingField(_) => "missing_field",
        ParseError::NotAnInteger { .. } => "not_an_integer",
    }
}

#[test]
fn parser_test_vectors() {
    let raw = include_str!("../../test-vectors/parser.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let kind = operation(case["operation"].as_str().unwrap());
        let xml = case["xml"].as_str().unwrap();
        let result = parse_response(xml.as_bytes(), kind.field_count());

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            assert_eq!(error_kind(&err), expected_error.as_str().unwrap(), "{name}: error kind");
            continue;
        }

        let parsed = result.unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(parsed.root(), root(case["expected_root"].as_str().unwrap()), "{name}: root");

        let expected: Vec<Option<String>> = serde_json::from_value(case["expected_fields"].clone()).unwrap();
        assert_eq!(parsed.fields(), expected.as_slice(), "{name}: fields");
    }
}

#[test]
fn every_operation_accepts_an_error_document() {
    for kind in RequestType::ALL {
        let parsed = parse_response(br#"<error status="500">INTERNAL ERROR</error>"#, kind.field_count()).unwrap();
        assert!(parsed.is_failure(), "{kind}");
        assert_eq!(parsed.len(), 3, "{kind}");
        assert_eq!(parsed.get(1), Some("INTERNAL ERROR"), "{kind}");
    }
}
