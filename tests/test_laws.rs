use proptest::prelude::*;
use query_url::{FieldDecl, QueryEncoder, QueryUrl, TypeDecl, TypeRef};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
struct Probe {
    text: Option<String>,
    number: i64,
    items: Vec<String>,
}

impl QueryUrl for Probe {
    fn declaration() -> TypeDecl {
        TypeDecl::new("Probe")
            .base_url("https://example.com/probe")
            .field(FieldDecl::new("text", TypeRef::String).nullable())
            .field(FieldDecl::new("number", TypeRef::Int))
            .field(FieldDecl::new("items", TypeRef::sequence(TypeRef::String)))
    }
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// Every character is either unreserved or part of a `%XX` escape.
fn is_escaped(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return false;
            }
            if !(bytes[i + 1].is_ascii_hexdigit() && bytes[i + 2].is_ascii_hexdigit()) {
                return false;
            }
            i += 3;
        } else if is_unreserved(bytes[i] as char) {
            i += 1;
        } else {
            return false;
        }
    }
    true
}

fn probe() -> impl Strategy<Value = Probe> {
    (
        proptest::option::of(any::<String>()),
        any::<i64>(),
        proptest::collection::vec(any::<String>(), 0..4),
    )
        .prop_map(|(text, number, items)| Probe {
            text,
            number,
            items,
        })
}

proptest! {
    #[test]
    fn encoding_is_repeatable(probe in probe()) {
        let encoder = QueryEncoder::new();
        let first = encoder.to_query_url(&probe).unwrap();
        let second = encoder.to_query_url(&probe).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn values_are_fully_escaped(probe in probe()) {
        let params = query_url::get_object_query_params(&probe).unwrap();
        for pair in params.split('&') {
            let (key, value) = pair.split_once('=').unwrap();
            prop_assert!(is_escaped(key), "key {:?}", key);
            prop_assert!(is_escaped(value), "value {:?}", value);
        }
    }

    #[test]
    fn blank_text_is_omitted(text in "[ \t]{0,4}", number in any::<i64>()) {
        let probe = Probe { text: Some(text), number, items: Vec::new() };
        prop_assert_eq!(
            query_url::to_query_url(&probe).unwrap(),
            format!("https://example.com/probe?number={number}")
        );
    }

    #[test]
    fn one_pair_per_non_empty_item(items in proptest::collection::vec("[a-z]{0,3}", 0..6)) {
        let probe = Probe { text: None, number: 0, items: items.clone() };
        let params = query_url::get_object_query_params(&probe).unwrap();
        let expected = std::iter::once("number=0".to_owned())
            .chain(items.iter().filter(|item| !item.is_empty()).map(|item| format!("items={item}")))
            .collect::<Vec<_>>()
            .join("&");
        prop_assert_eq!(params, expected);
    }
}
