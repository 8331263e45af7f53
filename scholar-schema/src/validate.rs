use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::errors::{unprocessable, SchemaErrors};

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some("is required"),
        "email" => Some("must be a valid email"),
        "length" => Some("has invalid length"),
        "range" => Some("is out of range"),
        "url" => Some("must be a valid URL"),
        _ => None,
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn push_validation_errors(out: &mut SchemaErrors, prefix: &str, errs: &ValidationErrors) {
    for (field, kind) in errs.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let key = join_path(prefix, field);
                for e in field_errors {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| friendly_message(&e.code).map(str::to_string))
                        .unwrap_or_else(|| e.code.to_string());
                    out.push_field(&key, msg);
                }
            }
            ValidationErrorsKind::Struct(struct_errs) => {
                let next = join_path(prefix, field);
                push_validation_errors(out, &next, struct_errs.as_ref());
            }
            ValidationErrorsKind::List(list_errs) => {
                let base = join_path(prefix, field);
                for (idx, nested) in list_errs {
                    let next = format!("{base}[{idx}]");
                    push_validation_errors(out, &next, nested.as_ref());
                }
            }
        }
    }
}

/// Parse `data` as `T` and run its `validator` rules.
///
/// Parse failures land under `_schema`; rule failures under their field
/// path (`chapters[0].title`).
pub fn validate<T>(data: &Value, error_message: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(data.clone())
        .map_err(|e| unprocessable(error_message, json!({"_schema": [e.to_string()]})))?;

    parsed.validate().map_err(|e| {
        let mut out = SchemaErrors::default();
        push_validation_errors(&mut out, "", &e);
        out.into_unprocessable_anyhow(error_message)
    })?;

    Ok(parsed)
}

/// [`validate`], then serialize the typed value back into JSON so that
/// only schema-known fields reach the backend.
pub fn validate_into_value<T>(data: &Value, error_message: &str) -> anyhow::Result<Value>
where
    T: DeserializeOwned + Serialize + Validate,
{
    let parsed = validate::<T>(data, error_message)?;
    Ok(serde_json::to_value(parsed)?)
}

#[cfg(test)]
mod tests {
    use scholar_core::errors::ScholarError;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use validator::Validate;

    use super::{validate, validate_into_value};

    #[derive(Debug, Deserialize, Serialize, Validate)]
    struct Chapter {
        #[validate(length(min = 1, message = "title must not be empty"))]
        title: String,
    }

    #[derive(Debug, Deserialize, Serialize, Validate)]
    #[serde(deny_unknown_fields)]
    struct Lesson {
        #[validate(length(min = 2, message = "name must be at least 2 chars"))]
        name: String,

        #[validate(nested)]
        chapters: Vec<Chapter>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
    }

    #[test]
    fn nested_and_list_errors_are_flattened_with_paths() {
        let data = json!({"name": "x", "chapters": [{"title": ""}]});

        let err = validate::<Lesson>(&data, "Lessons schema validation failed").unwrap_err();
        let e = ScholarError::from_anyhow(&err).expect("must be ScholarError");
        let errors = e.errors.as_ref().unwrap();

        assert_eq!(e.code(), 422);
        assert_eq!(errors["name"][0], "name must be at least 2 chars");
        assert_eq!(errors["chapters[0].title"][0], "title must not be empty");
    }

    #[test]
    fn unknown_fields_are_schema_errors() {
        let data = json!({"name": "Algebra", "chapters": [], "colour": "red"});
        let err = validate::<Lesson>(&data, "bad").unwrap_err();
        let e = ScholarError::from_anyhow(&err).unwrap();
        assert!(e.errors.as_ref().unwrap()["_schema"][0]
            .as_str()
            .unwrap()
            .contains("colour"));
    }

    #[test]
    fn normalized_value_drops_absent_optionals() {
        let data = json!({"name": "Algebra", "chapters": [{"title": "Sets"}]});
        let v = validate_into_value::<Lesson>(&data, "bad").unwrap();
        assert_eq!(v, json!({"name": "Algebra", "chapters": [{"title": "Sets"}]}));
    }
}
