use std::sync::OnceLock;

use regex::Regex;

static BARE_KEY: OnceLock<Regex> = OnceLock::new();

/// Best-effort normalization of loosely written JSON: single quotes become
/// double quotes, and bare object keys (`{key: 1}`) get quoted. The output is
/// not validated; if the input is malformed beyond these two fixes, the
/// request that carries it will fail downstream instead.
pub fn repair(input: &str) -> String {
    let normalized = input.replace('\'', "\"");

    let bare_key = BARE_KEY.get_or_init(|| {
        Regex::new(r"([{,]\s*)(\w+)\s*:").expect("bare key pattern compiles")
    });

    bare_key
        .replace_all(&normalized, "${1}\"${2}\":")
        .into_owned()
}

#[cfg(test)]
mod test {
    use super::repair;

    #[test]
    fn quotes_bare_keys() {
        assert_eq!(repair("{name: 1}"), "{\"name\": 1}");
        assert_eq!(
            repair("{name: 1, other_key: 2}"),
            "{\"name\": 1, \"other_key\": 2}"
        );
    }

    #[test]
    fn swaps_single_quotes() {
        assert_eq!(repair("{'name': 'ola'}"), "{\"name\": \"ola\"}");
    }

    #[test]
    fn repairs_mixed_loose_input() {
        let repaired = repair("{ name: 'ola', age: 42 }");
        assert_eq!(repaired, "{ \"name\": \"ola\", \"age\": 42 }");

        let parsed: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(parsed["name"], "ola");
        assert_eq!(parsed["age"], 42);
    }

    #[test]
    fn idempotent_on_strict_json() {
        let strict = r#"{"name": "ola", "nested": {"age": 42}, "list": [1, 2]}"#;
        assert_eq!(repair(strict), strict);
        assert_eq!(repair(&repair(strict)), repair(strict));
    }

    #[test]
    fn idempotent_on_repaired_output() {
        let once = repair("{name: 'ola', nested: {age: 42}}");
        assert_eq!(repair(&once), once);
    }

    #[test]
    fn leaves_hopeless_input_alone() {
        assert_eq!(repair(""), "");
        assert_eq!(repair("not json at all"), "not json at all");
    }
}
