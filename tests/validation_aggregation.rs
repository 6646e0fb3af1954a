//! Integration tests for form-level validation

use async_trait::async_trait;
use formflow::template::AsyncTemplateLanguage;
use formflow::{
    EngineConfig, FormBuilder, FormConfig, LanguageRegistry, TemplateEvaluator, ValidationIssue,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::time::Duration;

fn config(value: Value) -> FormConfig {
    serde_json::from_value(value).expect("valid form config")
}

fn registration_form() -> FormConfig {
    config(json!({
        "form_id": "registration",
        "fields": [
            {
                "fieldtype": "text",
                "name": "Name",
                "validations": [{"expression": "{{data.name}}", "error_message": "Name is required"}]
            },
            {
                "fieldtype": "fieldset",
                "name": "Address",
                "fields": [{
                    "fieldtype": "text",
                    "name": "Zip",
                    "validations": [{
                        "expression": "[[jsonata]] $length(data.address.zip) = 4",
                        "error_message": "Zip '{{data.address.zip}}' must have 4 digits"
                    }]
                }]
            },
            {
                "fieldtype": "number",
                "name": "Age",
                "dependencies": ["data.name"],
                "conditions": [{"expression": "[[jsonata]] $exists(data.name) and data.name != ''"}],
                "validations": [{"expression": "[[jsonata]] data.age >= 18", "error_message": "Adults only"}]
            }
        ]
    }))
}

#[tokio::test]
async fn test_issues_in_tree_order() {
    let form = FormBuilder::new(registration_form())
        .with_engine_config(EngineConfig::for_testing())
        .mount(json!({"address": {"zip": "123"}}))
        .await
        .unwrap();

    let result = form.validate().await;
    assert!(!result.is_valid);
    assert!(!result.is_validation_timeout);
    assert!(!result.is_validation_failed);
    assert_eq!(
        result.issues,
        vec![
            ValidationIssue {
                state_path: "name".into(),
                error_message: "Name is required".into(),
            },
            ValidationIssue {
                state_path: "address.zip".into(),
                error_message: "Zip '123' must have 4 digits".into(),
            },
        ]
    );
}

#[tokio::test]
async fn test_visibility_changes_the_verdict() {
    let form = FormBuilder::new(registration_form())
        .with_engine_config(EngineConfig::for_testing())
        .mount(json!({"address": {"zip": "0150"}}))
        .await
        .unwrap();

    form.set_value("name", json!("Sam"));
    let result = form.validate().await;
    assert!(!result.is_valid);
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].state_path, "age");

    form.set_value("age", json!(40));
    let result = form.validate().await;
    assert!(result.is_valid);
    assert!(result.issues.is_empty());

    let settings = form.settings();
    assert!(settings.validations.is_valid);
    assert_eq!(settings.form_id, "registration");
}

#[tokio::test]
async fn test_show_validation_does_not_change_validity() {
    let form = FormBuilder::new(registration_form())
        .with_engine_config(EngineConfig::for_testing())
        .mount(json!({}))
        .await
        .unwrap();

    let hidden = form.validate().await;
    form.show_validation(true);
    let shown = form.validate().await;
    assert_eq!(hidden, shown);
    assert!(form.settings().validations.is_show);
    assert_eq!(form.context().get("show_validation"), Some(json!(true)));
}

/// Language that stalls whenever `data.stall` is set
struct Stalling;

#[async_trait]
impl AsyncTemplateLanguage for Stalling {
    fn name(&self) -> &'static str {
        "stall"
    }

    async fn evaluate(&self, expression: &str, context: &Value) -> formflow::Result<Option<Value>> {
        if context.pointer("/data/stall") == Some(&json!(true)) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok(Some(Value::String(expression.trim().to_string())))
    }
}

#[tokio::test(start_paused = true)]
async fn test_never_settling_field_times_out() {
    let mut registry = LanguageRegistry::standard(16);
    registry.register_async(Stalling);

    let form = FormBuilder::new(config(json!({
        "fields": [
            {"fieldtype": "checkbox", "name": "Stall"},
            {
                "fieldtype": "text",
                "name": "Slow",
                "dependencies": ["data.stall"],
                "validations": [{"expression": "[[stall]] ok", "error_message": "never"}]
            }
        ]
    })))
    .with_engine_config(
        EngineConfig::for_testing()
            .with_validation_max_time_ms(300)
            .with_validation_check_interval_ms(10),
    )
    .with_evaluator(TemplateEvaluator::with_registry(registry))
    .mount(json!({"stall": false}))
    .await
    .unwrap();

    form.set_value("stall", json!(true));
    let result = form.validate().await;

    assert!(result.is_validation_timeout);
    assert!(!result.is_valid);
    let duration = form.settings().validations.duration;
    assert!(duration >= Duration::from_millis(300));
    assert!(duration < Duration::from_millis(400));
}
