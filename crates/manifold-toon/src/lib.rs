//! Table-oriented object notation (TOON)
//!
//! A compact indentation-based re-encoding of JSON aimed at reducing token
//! consumption when large structured tool output is fed back to a model.
//! Uniform arrays of flat objects collapse into a one-line header plus one
//! row per element, which is where most of the savings come from:
//!
//! ```text
//! users[2]{id,name,admin}:
//!   1,alice,true
//!   2,bob,false
//! ```
//!
//! Encoding never loses information: [`decode`] recovers a value that is
//! JSON-equivalent to the input of [`encode`]. TOON text is deliberately
//! not valid JSON, which is what makes compression idempotent — a second
//! pass fails the JSON parse and leaves the content alone.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod decode;
mod encode;
mod scalar;

pub use decode::decode;
pub use encode::encode;

/// Errors produced when parsing TOON text
#[derive(Debug, thiserror::Error)]
pub enum ToonError {
    /// Structurally invalid input
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based source line
        line: usize,
        /// What went wrong
        message: String,
    },
    /// An array body does not match its declared length
    #[error("line {line}: array declared {declared} elements, found {found}")]
    LengthMismatch {
        /// 1-based source line of the array header
        line: usize,
        /// Length from the `[N]` header
        declared: usize,
        /// Elements actually present
        found: usize,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn round_trip(value: serde_json::Value) {
        let encoded = encode(&value);
        let decoded = decode(&encoded).unwrap_or_else(|e| panic!("decode failed: {e}\n{encoded}"));
        assert_eq!(decoded, value, "round trip mismatch for:\n{encoded}");
    }

    #[test]
    fn round_trips_scalars() {
        round_trip(json!(null));
        round_trip(json!(true));
        round_trip(json!(42));
        round_trip(json!(-7));
        round_trip(json!(3.25));
        round_trip(json!("hello"));
        round_trip(json!("with, comma: and colon"));
        round_trip(json!(""));
        round_trip(json!("123"));
        round_trip(json!("true"));
    }

    #[test]
    fn round_trips_uniform_object_arrays() {
        round_trip(json!({
            "files": [
                {"path": "/etc/hosts", "size": 312, "writable": false},
                {"path": "/tmp/a.txt", "size": 0, "writable": true},
                {"path": "has, comma", "size": 9, "writable": true},
            ]
        }));
    }

    #[test]
    fn round_trips_nested_structures() {
        round_trip(json!({
            "query": "disk usage",
            "totals": {"bytes": 10_485_760, "entries": 3},
            "entries": [
                {"mount": "/", "used": 0.62},
                {"mount": "/home", "used": 0.81},
            ],
            "warnings": ["stale cache", "slow disk"],
            "meta": {
                "nested": {"deep": [1, 2, 3]},
                "empty_list": [],
                "empty_obj": {},
            }
        }));
    }

    #[test]
    fn round_trips_mixed_arrays() {
        round_trip(json!([1, "two", {"three": 3}, [4, 5], null]));
        round_trip(json!({"items": [{"a": 1, "b": {"c": 2}}, {"a": 1}]}));
    }

    #[test]
    fn round_trips_awkward_strings() {
        round_trip(json!({
            "a": "line\nbreak",
            "b": "  padded  ",
            "c": "\"quoted\"",
            "d": "back\\slash",
            "e": "- looks like a list item",
            "f": "[3]: not a header",
            "weird key!": 1,
            "": "empty key",
        }));
    }

    #[test]
    fn tabular_form_is_compact() {
        let value = json!({"rows": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]});
        let encoded = encode(&value);
        assert_eq!(encoded, "rows[2]{id,name}:\n  1,a\n  2,b\n");
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let err = decode("xs[3]: 1,2").unwrap_err();
        assert!(matches!(err, ToonError::LengthMismatch { declared: 3, found: 2, .. }));
    }

    #[test]
    fn decode_rejects_bad_indentation() {
        assert!(decode("a:\n   b: 1").is_err());
        assert!(decode("a:\n\tb: 1").is_err());
    }

    #[test]
    fn empty_input_is_empty_object() {
        assert_eq!(decode("").unwrap(), json!({}));
        assert_eq!(decode("  \n\n").unwrap(), json!({}));
    }
}
