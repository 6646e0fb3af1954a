//! Integration tests for template evaluation across languages

use formflow::template::SyncTemplateLanguage;
use formflow::{LanguageRegistry, TemplateEvaluator, is_truthy};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};

fn context() -> Value {
    json!({
        "form_id": "f1",
        "show_validation": false,
        "data": {
            "name": "Sam",
            "age": 42,
            "pets": [{"kind": "cat", "age": 3}, {"kind": "dog", "age": 7}],
            "empty": ""
        }
    })
}

#[rstest]
#[case("Hello {{data.name}}", json!("Hello Sam"))]
#[case("{{#data.pets}}{{kind}} {{/data.pets}}", json!("cat dog "))]
#[case("{{^data.empty}}none{{/data.empty}}", json!("none"))]
#[case("[[jsonata]] data.age + 1", json!(43))]
#[case("[[jsonata]] data.pets[age > 5].kind", json!("dog"))]
#[case("[[jsonata]] data.pets.kind", json!(["cat", "dog"]))]
#[case("[[jsonata]] $count(data.pets) = 2 ? 'two' : 'other'", json!("two"))]
#[case("[[jsonata]] {'n': data.name, 'adult': data.age >= 18}", json!({"n": "Sam", "adult": true}))]
#[tokio::test]
async fn test_languages(#[case] template: &str, #[case] expected: Value) {
    let evaluator = TemplateEvaluator::new();
    assert_eq!(
        evaluator.evaluate_str(template, Some(&context())).await,
        Some(expected)
    );
}

#[tokio::test]
async fn test_missing_context_returns_template() {
    let evaluator = TemplateEvaluator::new();
    let template = json!({"a": ["[[jsonata]] x", "{{y}}"], "b": 1});
    assert_eq!(evaluator.evaluate(Some(&template), None).await, Some(template));
}

#[tokio::test]
async fn test_nested_templates() {
    let evaluator = TemplateEvaluator::new();
    let template = json!({
        "title": "{{data.name}}",
        "missing": "[[jsonata]] data.nothing",
        "list": ["[[jsonata]] data.nothing", "[[jsonata]] data.age"],
        "literal": 5
    });
    assert_eq!(
        evaluator.evaluate(Some(&template), Some(&context())).await,
        Some(json!({"title": "Sam", "list": [null, 42], "literal": 5}))
    );
}

#[tokio::test]
async fn test_errors_evaluate_to_undefined() {
    let evaluator = TemplateEvaluator::new();
    let context = context();
    assert_eq!(evaluator.evaluate_str("[[jsonata]] data.age >", Some(&context)).await, None);
    assert_eq!(evaluator.evaluate_str("{{#open}}", Some(&context)).await, None);
    assert!(
        evaluator
            .try_evaluate_str("[[jsonata]] $nope()", &context)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_unknown_tag_uses_default_language() {
    let evaluator = TemplateEvaluator::new();
    assert_eq!(
        evaluator.evaluate_str("[[python]] {{data.name}}", Some(&context())).await,
        Some(json!("[[python]] Sam"))
    );
}

struct Reverse;

impl SyncTemplateLanguage for Reverse {
    fn name(&self) -> &'static str {
        "reverse"
    }

    fn evaluate(&self, expression: &str, _context: &Value) -> formflow::Result<Option<Value>> {
        Ok(Some(Value::String(expression.chars().rev().collect())))
    }
}

#[tokio::test]
async fn test_custom_language() {
    let mut registry = LanguageRegistry::standard(8);
    registry.register_sync(Reverse);
    let evaluator = TemplateEvaluator::with_registry(registry);

    assert_eq!(
        evaluator.evaluate_str("[[reverse]] abc", Some(&json!({}))).await,
        Some(json!("cba"))
    );
    assert!(evaluator.registry().has_language("reverse"));
}

#[rstest]
#[case(None, false)]
#[case(Some(json!("false")), false)]
#[case(Some(json!(" 0 ")), false)]
#[case(Some(json!("undefined")), false)]
#[case(Some(json!([])), false)]
#[case(Some(json!("no")), true)]
#[case(Some(json!(-1)), true)]
fn test_truthiness(#[case] value: Option<Value>, #[case] expected: bool) {
    assert_eq!(is_truthy(value.as_ref()), expected);
}
