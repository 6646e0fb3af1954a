//! Integration tests for mounting forms and reacting to data changes

use formflow::{EngineConfig, Form, FormBuilder, FormConfig};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::time::Duration;

async fn mount(config: Value, data: Value) -> Form {
    let config: FormConfig = serde_json::from_value(config).expect("valid form config");
    FormBuilder::new(config)
        .with_engine_config(EngineConfig::for_testing())
        .mount(data)
        .await
        .expect("form mounts")
}

fn spouse_form() -> Value {
    json!({
        "form_id": "household",
        "fields": [
            {"fieldtype": "checkbox", "name": "Married"},
            {
                "fieldtype": "text",
                "name": "Spouse",
                "default": "n/a",
                "dependencies": ["data.married"],
                "conditions": [{"expression": "[[jsonata]] data.married = true"}]
            }
        ]
    })
}

#[tokio::test]
async fn test_condition_flip_prunes_and_restores() {
    let form = mount(spouse_form(), json!({"married": true})).await;
    assert_eq!(form.value("spouse"), Some(json!("n/a")));

    form.set_value("spouse", json!("Alex"));
    assert!(form.settle().await);

    form.set_value("married", json!(false));
    assert!(form.settle().await);
    assert_eq!(form.value("spouse"), None);
    assert!(!form.field("spouse").unwrap().is_visible());

    form.set_value("married", json!(true));
    assert!(form.settle().await);
    assert_eq!(form.value("spouse"), Some(json!("n/a")));
    assert!(form.field("spouse").unwrap().is_visible());
}

#[tokio::test]
async fn test_kept_data_survives_hidden_phase() {
    let mut config = spouse_form();
    config["fields"][1]["keep_data_on_conditions_failed"] = json!(true);
    let form = mount(config, json!({"married": true, "spouse": "Alex"})).await;

    form.set_value("married", json!(false));
    assert!(form.settle().await);
    assert_eq!(form.value("spouse"), Some(json!("Alex")));

    form.set_value("married", json!(true));
    assert!(form.settle().await);
    assert_eq!(form.value("spouse"), Some(json!("Alex")));
}

#[tokio::test]
async fn test_initial_and_default_values() {
    let form = mount(
        json!({
            "fields": [
                {"fieldtype": "text", "name": "First Name"},
                {"fieldtype": "number", "name": "Age"},
                {"fieldtype": "checkboxes", "name": "Tags"},
                {"fieldtype": "text", "name": "Greeting", "default": "Hi {{data.first_name}}"},
                {"fieldtype": "heading", "name": "Title", "content": "Welcome"}
            ]
        }),
        json!({"first_name": "Sam"}),
    )
    .await;

    assert_eq!(
        form.data(),
        json!({
            "first_name": "Sam",
            "age": null,
            "tags": [],
            "greeting": "Hi Sam"
        })
    );
    let first = form.field("first_name").unwrap();
    assert_eq!(first.init_value, Some(json!("Sam")));
    assert_eq!(
        form.field("title").unwrap().dynamic_settings.content,
        Some(json!("Welcome"))
    );
}

#[tokio::test]
async fn test_dependent_label_follows_data() {
    let form = mount(
        json!({
            "fields": [
                {"fieldtype": "text", "name": "Name"},
                {
                    "fieldtype": "heading",
                    "name": "Summary",
                    "dependencies": ["data.name"],
                    "label": "[[jsonata]] 'Hello ' & data.name"
                }
            ]
        }),
        json!({"name": "Sam"}),
    )
    .await;
    assert_eq!(
        form.field("summary").unwrap().dynamic_settings.label,
        Some(json!("Hello Sam"))
    );

    assert_eq!(form.set_value("name", json!("Ada")), 2);
    assert!(form.settle().await);
    assert_eq!(
        form.field("summary").unwrap().dynamic_settings.label,
        Some(json!("Hello Ada"))
    );
}

#[tokio::test]
async fn test_undeclared_dependency_is_not_tracked() {
    let form = mount(
        json!({
            "fields": [
                {"fieldtype": "heading", "name": "Summary", "label": "{{data.name}}"}
            ]
        }),
        json!({"name": "Sam"}),
    )
    .await;

    assert_eq!(form.set_value("name", json!("Ada")), 0);
    assert_eq!(
        form.field("summary").unwrap().dynamic_settings.label,
        Some(json!("Sam"))
    );
}

#[tokio::test]
async fn test_array_items_mount_per_entry() {
    let form = mount(
        json!({
            "fields": [{
                "fieldtype": "array",
                "name": "People",
                "array_item_config": {
                    "fields": [{
                        "fieldtype": "text",
                        "name": "Name",
                        "validations": [{"expression": "{{data.people.0.name}}", "error_message": "Required"}]
                    }]
                }
            }]
        }),
        json!({"people": [{"name": "A"}, {"name": "B"}]}),
    )
    .await;

    let paths: Vec<String> = form
        .fields()
        .iter()
        .map(|field| field.state_path().to_string())
        .collect();
    assert_eq!(paths, vec!["people", "people.0.name", "people.1.name"]);

    form.set_value("people.2", json!({}));
    assert!(form.settle().await);
    assert_eq!(form.value("people.2.name"), Some(json!("")));
    assert_eq!(form.fields().len(), 4);

    form.set_value("people", json!([{"name": "A"}]));
    assert!(form.settle().await);
    assert_eq!(form.fields().len(), 2);
}

#[tokio::test]
async fn test_large_numeric_segments_are_object_keys() {
    let form = mount(
        json!({
            "fields": [
                {"fieldtype": "text", "name": "Zip", "data_path": "zip.90210000"},
                {"fieldtype": "text", "name": "Label", "label": "[[jsonata]] $substring('abc', 1, 1e300)"}
            ]
        }),
        json!({"list": [1]}),
    )
    .await;

    assert_eq!(form.value("zip.90210000"), Some(json!("")));
    assert_eq!(
        form.field("label").unwrap().dynamic_settings.label,
        Some(json!("bc"))
    );

    form.set_value("list.5000000000", json!(2));
    assert_eq!(form.value("list"), Some(json!([1])));
}

#[tokio::test]
async fn test_pages_and_duplicate_names() {
    let form = mount(
        json!({
            "fields": [
                {"fieldtype": "text", "name": "Email"},
                {"fieldtype": "text", "name": "Email", "data_path": "contact.email"},
                {
                    "fieldtype": "pages",
                    "name": "Steps",
                    "pages": [
                        {"fields": [{"fieldtype": "text", "name": "Street"}]},
                        {"fields": [{"fieldtype": "text", "name": "Zip"}]}
                    ]
                }
            ]
        }),
        json!({}),
    )
    .await;

    let paths: Vec<(String, String)> = form
        .fields()
        .iter()
        .map(|field| (field.state_path().to_string(), field.data_path().to_string()))
        .collect();
    assert_eq!(
        paths,
        vec![
            ("email".to_string(), "email".to_string()),
            ("email__1".to_string(), "contact.email".to_string()),
            ("steps".to_string(), "steps".to_string()),
            ("steps.pages.0.street".to_string(), "steps.street".to_string()),
            ("steps.pages.1.zip".to_string(), "steps.zip".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_edits_settles_on_last_value() {
    let config: FormConfig = serde_json::from_value(json!({
        "fields": [{
            "fieldtype": "number",
            "name": "Age",
            "validations": [{"expression": "[[jsonata]] data.age >= 18", "error_message": "Too young"}]
        }]
    }))
    .unwrap();
    let form = FormBuilder::new(config)
        .with_engine_config(EngineConfig::default().with_debounce_ms(100))
        .mount(json!({"age": 30}))
        .await
        .unwrap();

    for age in [10, 11, 12, 13, 14] {
        form.set_value("age", json!(age));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!form.field("age").unwrap().is_settled());

    let result = form.validate().await;
    assert!(!result.is_validation_timeout);
    assert!(!result.is_valid);
    assert_eq!(result.issues[0].error_message, "Too young");
}

#[tokio::test]
async fn test_render_hides_failed_fields() {
    let form = mount(
        json!({
            "fields": [
                {"fieldtype": "checkbox", "name": "Married", "label": "Married"},
                {
                    "fieldtype": "text",
                    "name": "Spouse",
                    "label": "Spouse",
                    "dependencies": ["data.married"],
                    "conditions": [{"expression": "[[jsonata]] data.married"}]
                }
            ]
        }),
        json!({"married": false}),
    )
    .await;

    assert_eq!(form.render(), "- Married: [ ]");
}
