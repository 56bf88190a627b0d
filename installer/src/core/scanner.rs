//! Bracket matching for JSON values embedded in free text.
//!
//! The scanner is a pure function over the whole buffer. A `None` result means
//! the value has not finished streaming yet; it is never a parse error.

/// Offset of the first `{` or `[` at or after `from`.
pub fn find_value_start(text: &str, from: usize) -> Option<usize> {
    let tail = text.get(from..)?;
    tail.find(['{', '[']).map(|idx| idx + from)
}

/// Find the end of the JSON object or array that opens at `start`.
///
/// Brace depth and bracket depth are tracked independently. A `"` toggles
/// string state unless escaped, and the byte after a `\` inside a string is
/// passed through untouched. Returns the offset one past the byte that brings
/// both depths back to zero outside a string.
pub fn scan(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if start >= bytes.len() {
        return None;
    }

    let mut braces: i64 = 0;
    let mut brackets: i64 = 0;
    let mut opened = false;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => {
                in_string = true;
                continue;
            }
            b'{' => {
                braces += 1;
                opened = true;
            }
            b'[' => {
                brackets += 1;
                opened = true;
            }
            // Closers before the first opener are not part of the value.
            b'}' if opened => braces -= 1,
            b']' if opened => brackets -= 1,
            _ => continue,
        }

        if opened && braces == 0 && brackets == 0 {
            return Some(offset + 1);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    #[test]
    fn matches_nested_object_with_trailing_text() {
        let text = r#"{"a":{"b":[1,2,{"c":3}]}} and then prose"#;
        let end = scan(text, 0).expect("end");
        assert_eq!(&text[..end], r#"{"a":{"b":[1,2,{"c":3}]}}"#);
    }

    #[test]
    fn ignores_brackets_and_escaped_quotes_inside_strings() {
        let text = r#"[{"s":"}{ ][ \" \\"},"x"]]]"#;
        let end = scan(text, 0).expect("end");
        let parsed: Value = serde_json::from_str(&text[..end]).expect("json");
        assert_eq!(parsed, json!([{"s": "}{ ][ \" \\"}, "x"]));
    }

    #[test]
    fn starts_from_offset() {
        let text = r#"prefix {"k":"v"} suffix"#;
        let start = find_value_start(text, 0).expect("start");
        assert_eq!(start, 7);
        let end = scan(text, start).expect("end");
        assert_eq!(&text[start..end], r#"{"k":"v"}"#);
    }

    #[test]
    fn incomplete_value_is_not_found() {
        assert_eq!(scan(r#"{"a":[1,2"#, 0), None);
        assert_eq!(scan(r#"{"a":"unterminated}"#, 0), None);
        assert_eq!(scan("", 0), None);
        assert_eq!(scan("{}", 5), None);
    }

    #[test]
    fn multibyte_text_keeps_char_boundaries() {
        let text = r#"{"emoji":"📝","name":"Crème"} tail"#;
        let end = scan(text, 0).expect("end");
        assert!(text.is_char_boundary(end));
        assert_eq!(&text[end..], " tail");
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-z{}\\[\\]\"\\\\ ]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z\"{}\\[\\]]{1,6}", inner, 0..6)
                    .prop_map(|map| Value::Object(map.into_iter().collect())),
            ]
        })
    }

    fn arb_container() -> impl Strategy<Value = Value> {
        prop_oneof![
            arb_json().prop_map(|value| json!({ "value": value })),
            prop::collection::vec(arb_json(), 0..4).prop_map(Value::Array),
        ]
    }

    proptest! {
        #[test]
        fn scan_isolates_exactly_one_value(
            value in arb_container(),
            garbage in "[a-z }\\]{\\[\"]{0,10}",
        ) {
            let encoded = serde_json::to_string(&value).expect("encode");
            let text = format!("{encoded}{garbage}");
            let end = scan(&text, 0).expect("complete value");
            prop_assert_eq!(end, encoded.len());
            let parsed: Value = serde_json::from_str(&text[..end]).expect("parse");
            prop_assert_eq!(parsed, value);
        }
    }
}
