use super::*;
use serde_json::json;

#[test]
fn test_task_id_generate_unique() {
    let a = TaskId::generate();
    let b = TaskId::generate();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), TASK_ID_LEN);
}

#[test]
fn test_task_id_serializes_as_string() {
    let id = TaskId::from("abc123");
    assert_eq!(serde_json::to_value(&id).unwrap(), json!("abc123"));
    assert_eq!(id.to_string(), "abc123");
}

#[test]
fn test_request_structured_positional() {
    let req = CommandRequest::from_json(json!({"name": "add", "arguments": [2, 3]})).unwrap();
    assert_eq!(req.name, "add");
    assert_eq!(req.arguments, CommandArgs::Positional(vec![json!(2), json!(3)]));
}

#[test]
fn test_request_structured_named() {
    let req =
        CommandRequest::from_json(json!({"name": "add", "arguments": {"a": 1, "b": 2}})).unwrap();
    match req.arguments {
        CommandArgs::Named(map) => {
            assert_eq!(map["a"], json!(1));
            assert_eq!(map["b"], json!(2));
        }
        other => panic!("expected named args, got {:?}", other),
    }
}

#[test]
fn test_request_flat_form() {
    let req = CommandRequest::from_json(json!({"command": "set_parameter", "key": "w", "value": 4}))
        .unwrap();
    assert_eq!(req.name, "set_parameter");
    match req.arguments {
        CommandArgs::Named(map) => {
            assert_eq!(map.len(), 2);
            assert_eq!(map["key"], json!("w"));
        }
        other => panic!("expected named args, got {:?}", other),
    }
}

#[test]
fn test_request_without_args() {
    let req = CommandRequest::from_json(json!({"command": "undo"})).unwrap();
    assert_eq!(req.arguments, CommandArgs::default());
}

#[test]
fn test_request_missing_name() {
    let err = CommandRequest::from_json(json!({"arguments": []})).unwrap_err();
    assert!(matches!(err, BridgeError::MalformedRequest(_)));
}

#[test]
fn test_request_not_object() {
    let err = CommandRequest::from_json(json!([1, 2])).unwrap_err();
    assert!(matches!(err, BridgeError::MalformedRequest(_)));
}

#[test]
fn test_request_serde_roundtrip_named() {
    let req = CommandRequest::new("echo").with_args(vec![json!("hi")]);
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json, json!({"name": "echo", "arguments": ["hi"]}));
}
