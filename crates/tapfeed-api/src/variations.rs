//! Per-platform variation merging.

use serde_json::Value;

const VARIATIONS_KEY: &str = "variations";

/// Flattens `document["variations"][platform_tag]` over the base document.
///
/// Keys of the matching variation replace the base keys (a shallow merge). The `variations`
/// key is always removed when present, whether or not `platform_tag` matched. Documents
/// without `variations`, and non-object documents, are returned unchanged.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tapfeed_api::merge_variations;
///
/// let doc = json!({"a": 1, "variations": {"x86_64_linux": {"a": 2}}});
/// assert_eq!(merge_variations(doc.clone(), "x86_64_linux"), json!({"a": 2}));
/// assert_eq!(merge_variations(doc, "arm64_sonoma"), json!({"a": 1}));
/// ```
pub fn merge_variations(document: Value, platform_tag: &str) -> Value {
    let Value::Object(mut base) = document else {
        return document;
    };

    let Some(variations) = base.remove(VARIATIONS_KEY) else {
        return Value::Object(base);
    };

    // Empty variations count as no match.
    if let Some(Value::Object(variation)) = variations
        .get(platform_tag)
        .filter(|variation| !is_blank(variation))
        .cloned()
    {
        base.extend(variation);
    }

    Value::Object(base)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
