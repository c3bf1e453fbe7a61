//! JSON schemas for request bodies, bound in the container as `schema.<name>`.
use serde_json::{json, Value};

pub fn dummy() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Dummy",
        "type": "object",
        "properties": {
            "id": { "type": ["string", "null"], "format": "uuid" },
            "field": { "type": "string", "minLength": 1, "maxLength": 255 }
        },
        "required": ["field"],
        "additionalProperties": false
    })
}

pub fn login() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Login",
        "type": "object",
        "properties": {
            "username": { "type": "string", "minLength": 1 },
            "password": { "type": "string", "minLength": 1 }
        },
        "required": ["username", "password"]
    })
}
