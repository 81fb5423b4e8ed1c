//! Conversion between TOML and JSON.
//!
//! ```
//! use taplo_convert::{ConvertOptions, from_json, to_json};
//!
//! let converted = from_json(r#"{ "package": { "name": "taplo" } }"#, &ConvertOptions::default()).unwrap();
//! assert_eq!(converted.toml, "[package]\nname = \"taplo\"\n");
//!
//! let (_, dom) = taplo_dom::parse(&converted.toml);
//! assert!(to_json(&dom).unwrap().contains("\"name\": \"taplo\""));
//! ```

mod error;
mod json;
mod toml;

pub use error::ConversionError;
pub use json::{node_value, to_json, to_value};
pub use toml::{ConvertOptions, Converted, NullPolicy, from_json};

/// Whether `text` is a JSON document.
pub fn is_json(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

/// Whether `text` is a TOML document without syntax errors.
pub fn is_toml(text: &str) -> bool {
    taplo_cst::parse(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;
    use serde_json::json;

    fn dom(source: &str) -> taplo_dom::Dom {
        let (parse, dom) = taplo_dom::parse(source);
        assert!(parse.is_ok() && dom.is_valid());
        dom
    }

    fn toml(json: &str) -> String {
        from_json(json, &ConvertOptions::default()).unwrap().toml
    }

    #[test]
    fn test_to_value_keeps_order_and_types() {
        let dom = dom("b = 1\na = 1.5\n[t]\nwhen = 1979-05-27T07:32:00Z\nday = 1979-05-27\n[[items]]\nx = true\n");
        let value = to_value(&dom).unwrap();
        assert_eq!(
            value,
            json!({
                "b": 1,
                "a": 1.5,
                "t": { "when": "1979-05-27T07:32:00Z", "day": "1979-05-27" },
                "items": [{ "x": true }],
            })
        );
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "t", "items"]);
    }

    #[test]
    fn test_non_finite_floats_fail() {
        let error = to_json(&dom("a.b = [1.0, nan]\n")).unwrap_err();
        assert_eq!(
            error,
            ConversionError::NonFiniteFloat {
                path: "a.b[1]".into()
            }
        );
    }

    #[test]
    fn test_from_json() {
        let converted = toml(
            r#"{
                "name": "x",
                "when": "1979-05-27T07:32:00Z",
                "local": "07:32:00",
                "not a date": "1979-13-01",
                "list": [1, "two", { "three": 3 }],
                "server": { "port": 80, "tls": { "on": true } },
                "bin": [{ "name": "a" }, { "name": "b", "meta": { "x": 1 } }]
            }"#,
        );
        insta::assert_snapshot!(converted, @r#"
        name = "x"
        when = 1979-05-27T07:32:00Z
        local = 07:32:00
        "not a date" = "1979-13-01"
        list = [1, "two", { three = 3 }]

        [server]
        port = 80

        [server.tls]
        on = true

        [[bin]]
        name = "a"

        [[bin]]
        name = "b"

        [bin.meta]
        x = 1
        "#);
    }

    #[test]
    fn test_nulls() {
        let converted = from_json(r#"{ "a": null, "b": [1, null], "c": 2 }"#, &ConvertOptions::default()).unwrap();
        assert_eq!(converted.toml, "b = [1]\nc = 2\n");
        assert_eq!(converted.warnings.len(), 2);
        assert!(converted.warnings[0].contains("`a`"));
        assert!(converted.warnings[1].contains("`b[1]`"));

        let options = ConvertOptions {
            null: NullPolicy::Error,
            ..Default::default()
        };
        assert_eq!(
            from_json(r#"{ "x": { "y": null } }"#, &options),
            Err(ConversionError::Null { path: "x.y".into() })
        );
    }

    #[test]
    fn test_from_json_errors() {
        let options = ConvertOptions::default();
        assert!(matches!(from_json("{", &options), Err(ConversionError::InvalidJson(_))));
        assert_eq!(
            from_json("[1]", &options),
            Err(ConversionError::NotAnObject { found: "an array" })
        );
        assert!(matches!(
            from_json(r#"{ "big": 18446744073709551615 }"#, &options),
            Err(ConversionError::IntegerOutOfRange { .. })
        ));
    }

    #[test]
    fn test_detection() {
        assert!(is_json("{\"a\": 1}"));
        assert!(!is_json("a = 1"));
        assert!(is_toml("a = 1"));
        assert!(!is_toml("{\"a\": 1}"));
    }

    mod proptests {
        use super::*;
        use facet_testhelpers::test;
        use proptest::prelude::*;

        fn document() -> impl Strategy<Value = String> {
            prop::string::string_regex(
                "(([a-z]{1,4}(\\.[a-z]{1,3})? = (-?[1-9][0-9]{0,5}|[0-9]\\.[0-9]{1,3}|\"[a-z ]{0,5}\"|true|1979-05-27|07:32:00|\\[1, 2\\]|\\[\\{ y = \"q\" \\}\\]|\\{ x = 1 \\})|\\[[a-z]{1,2}\\]|\\[\\[[a-z]{1,2}\\]\\])\\n){0,12}",
            )
            .unwrap()
        }

        proptest! {
            #[test]
            fn json_round_trip_keeps_values(source in document()) {
                let (parse, dom) = taplo_dom::parse(&source);
                prop_assume!(parse.is_ok());
                let json = to_json(&dom).unwrap();
                let converted = from_json(&json, &ConvertOptions::default()).unwrap();
                let (reparsed, back) = taplo_dom::parse(&converted.toml);
                prop_assert!(reparsed.is_ok() && back.is_valid(), "{}", converted.toml);
                prop_assert_eq!(to_value(&dom).unwrap(), to_value(&back).unwrap());
            }
        }
    }
}
