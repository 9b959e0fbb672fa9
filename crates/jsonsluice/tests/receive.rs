#![allow(missing_docs)]

mod common;

use std::io;

use common::{Entry, TrackedSource, entries, to_english};
use jsonsluice::{
    CharEncoder, Charset, ConvertError, ConverterConfig, JsonConverter, SyntaxError, Value,
};

fn converter(chunk_size: usize) -> JsonConverter {
    JsonConverter::new(ConverterConfig::default().with_chunk_size(chunk_size))
}

#[test]
fn english_names() {
    assert_eq!(to_english(0), "zero");
    assert_eq!(to_english(42), "forty-two");
    assert_eq!(to_english(700), "seven hundred");
    assert_eq!(to_english(7999), "seven thousand nine hundred ninety-nine");
}

#[tokio::test]
async fn bulk_receive_of_a_typed_array() {
    let body: &[u8] = br#"[{"n":0,"t":"zero"},{"n":1,"t":"one"},{"n":2,"t":"two"}]"#;
    let got: Vec<Entry> = converter(4).receive(body, None).await.unwrap();
    assert_eq!(got, entries(3));
}

#[tokio::test]
async fn bulk_receive_drops_the_source() {
    let (source, tracker) = TrackedSource::new(br#"{"n":7,"t":"seven"}"#.to_vec(), 3);
    let got: Entry = converter(5).receive(source, None).await.unwrap();
    assert_eq!(got.t, "seven");
    assert!(tracker.is_dropped());
}

#[tokio::test]
async fn generic_values_keep_number_text() {
    let body: &[u8] = br#" {"price": 1.50, "ids": [12345678901234567890]} "#;
    let value: Value = converter(8).receive(body, None).await.unwrap();
    assert_eq!(value.to_string(), r#"{"price":1.50,"ids":[12345678901234567890]}"#);
}

#[tokio::test]
async fn request_charset_overrides_configuration() {
    let text = r#"{"n":3,"t":"trois é 😀"}"#;
    let mut body = Vec::new();
    CharEncoder::new(Charset::Utf16Le).encode(text, &mut body).unwrap();

    // configured for Latin-1, the request says UTF-16LE
    let config = ConverterConfig::default()
        .with_chunk_size(3)
        .with_charset(Charset::Latin1);
    let got: Entry = JsonConverter::new(config)
        .receive(body.as_slice(), Some(Charset::Utf16Le))
        .await
        .unwrap();
    assert_eq!(got.t, "trois é 😀");
}

#[tokio::test]
async fn configured_charset_applies_without_override() {
    let config = ConverterConfig::default().with_charset(Charset::Latin1);
    let got: String = JsonConverter::new(config)
        .receive(&b"\"caf\xE9\""[..], None)
        .await
        .unwrap();
    assert_eq!(got, "café");
}

#[tokio::test]
async fn byte_order_mark_is_skipped() {
    let got: Vec<u8> = converter(2).receive(&b"\xEF\xBB\xBF[1, 2]"[..], None).await.unwrap();
    assert_eq!(got, [1, 2]);
}

#[tokio::test]
async fn missing_value_is_a_syntax_error() {
    let err = converter(64)
        .receive::<Value, _>(&br#"{"a":}"#[..], None)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ConvertError::Syntax(ref e) if e.kind == SyntaxError::UnexpectedCharacter('}')),
        "{err}"
    );
    assert_eq!(err.position(), Some((1, 6)));
}

#[tokio::test]
async fn trailing_content_is_rejected() {
    let err = converter(64)
        .receive::<Value, _>(&br#"{"a":1} x"#[..], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::TrailingData(_)), "{err}");
    assert_eq!(err.position(), Some((1, 9)));
}

#[tokio::test]
async fn empty_body_ends_too_early() {
    let err = converter(64).receive::<Value, _>(&b"  "[..], None).await.unwrap_err();
    assert!(
        matches!(err, ConvertError::Syntax(ref e) if e.kind == SyntaxError::UnexpectedEndOfInput),
        "{err}"
    );
}

#[tokio::test]
async fn malformed_bytes_fail_decoding() {
    let err = converter(2)
        .receive::<Value, _>(&b"[1, \"\xFF\"]"[..], None)
        .await
        .unwrap_err();
    let ConvertError::Decode(decode) = err else {
        panic!("expected a decode error, got {err}");
    };
    assert_eq!(decode.offset, 5);
}

#[tokio::test]
async fn wrong_shape_is_a_type_mismatch() {
    let err = converter(64)
        .receive::<Entry, _>(&br#"{"n":"zero","t":0}"#[..], None)
        .await
        .unwrap_err();
    let ConvertError::TypeMismatch(mismatch) = err else {
        panic!("expected a type mismatch, got {err}");
    };
    assert!(mismatch.type_name.ends_with("Entry"), "{}", mismatch.type_name);
}

#[tokio::test]
async fn transport_failure_propagates() {
    let source = tokio_test::io::Builder::new()
        .read(b"[1, 2")
        .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"))
        .build();
    let err = converter(64).receive::<Vec<u8>, _>(source, None).await.unwrap_err();
    assert!(
        matches!(err, ConvertError::Transport(ref e) if e.kind() == io::ErrorKind::ConnectionReset),
        "{err}"
    );
}
