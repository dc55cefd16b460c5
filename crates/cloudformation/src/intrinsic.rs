//! Rendering of [`Value`] trees as CloudFormation intrinsic functions.

use serde_json::{json, Value as Json};
use topology::{LogicalId, Value};

/// Renders `value` as a template fragment.
///
/// | Domain value | Template |
/// |---|---|
/// | `Literal(s)` | `"s"` |
/// | `Pseudo(p)` | `{"Ref": "AWS::..."}` |
/// | `Ref(id)` | `{"Ref": "id"}` |
/// | `Attribute { id, name }` | `{"Fn::GetAtt": ["id", "name"]}` |
/// | `Join(parts)` | `{"Fn::Join": ["", [...]]}` |
pub fn render(value: &Value) -> Json {
    match value {
        Value::Literal(s) => Json::String(s.clone()),
        Value::Pseudo(p) => json!({ "Ref": p.as_str() }),
        Value::Ref(id) => reference(id),
        Value::Attribute { resource, name } => attribute(resource, name),
        Value::Join(parts) => json!({
            "Fn::Join": ["", parts.iter().map(render).collect::<Vec<_>>()]
        }),
    }
}

/// Renders a list of values, collapsing a single entry to a scalar the way
/// policy documents accept it.
pub fn render_one_or_many(values: &[Value]) -> Json {
    match values {
        [single] => render(single),
        many => Json::Array(many.iter().map(render).collect()),
    }
}

pub fn reference(id: &LogicalId) -> Json {
    json!({ "Ref": id.as_str() })
}

pub fn attribute(id: &LogicalId, name: &str) -> Json {
    json!({ "Fn::GetAtt": [id.as_str(), name] })
}

#[cfg(test)]
mod tests {
    use topology::PseudoParameter;

    use super::*;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    #[test]
    fn renders_each_intrinsic() {
        assert_eq!(render(&Value::literal("x")), json!("x"));
        assert_eq!(render(&Value::Pseudo(PseudoParameter::Region)), json!({"Ref": "AWS::Region"}));
        assert_eq!(render(&Value::Ref(id("Repo"))), json!({"Ref": "Repo"}));
        assert_eq!(
            render(&Value::arn_of(&id("Repo"))),
            json!({"Fn::GetAtt": ["Repo", "Arn"]})
        );
    }

    #[test]
    fn renders_joins_with_empty_delimiter() {
        let v = Value::join([
            Value::literal("arn:aws:lambda:"),
            Value::Pseudo(PseudoParameter::Region),
            Value::literal(":fn"),
        ]);
        assert_eq!(
            render(&v),
            json!({"Fn::Join": ["", ["arn:aws:lambda:", {"Ref": "AWS::Region"}, ":fn"]]})
        );
    }

    #[test]
    fn single_resource_collapses_to_scalar() {
        assert_eq!(render_one_or_many(&[Value::literal("*")]), json!("*"));
        assert_eq!(
            render_one_or_many(&[Value::literal("a"), Value::literal("b")]),
            json!(["a", "b"])
        );
    }
}
