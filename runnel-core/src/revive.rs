//! Reconstruction of domain values from transport JSON, and the matching
//! serialization.
//!
//! Objects written by [`to_wire`] carry an explicit `__kind` discriminant and
//! are revived by tag. Untagged objects (from peers that only speak the
//! shape-based convention) are matched by the set of field names they carry,
//! checked in a fixed priority order:
//!
//! 1. `{page_content, metadata}` → [`Document`]
//! 2. `{content, type, is_chunk}` → [`Message`] or [`MessageChunk`], by `type`
//! 3. `{text}` → [`PromptValue::String`]
//! 4. `{messages}` → [`PromptValue::Chat`]
//! 5. anything else → generic [`Value::Object`], revived field by field
//!
//! Matching is a superset test, so extra fields never prevent a match. A
//! message whose `type` is not recognized falls through to the next rule.

use crate::error::RunnableError;
use crate::types::{Document, Message, MessageChunk, PromptValue, Role, Value};
use crate::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value as Json};
use std::collections::{BTreeMap, HashMap};

/// Field holding the explicit wire discriminant
pub const KIND_FIELD: &str = "__kind";

const KIND_DOCUMENT: &str = "document";
const KIND_MESSAGE: &str = "message";
const KIND_MESSAGE_CHUNK: &str = "message_chunk";
const KIND_STRING_PROMPT: &str = "string_prompt";
const KIND_CHAT_PROMPT: &str = "chat_prompt";

/// Parse a JSON document and revive it
pub fn deserialize(text: &str) -> Result<Value> {
    let json: Json = serde_json::from_str(text)?;
    revive(json)
}

/// Revive a transport value into a domain value
pub fn revive(json: Json) -> Result<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(b)),
        Json::Number(n) => Ok(Value::Number(n)),
        Json::String(s) => Ok(Value::String(s)),
        Json::Array(items) => items
            .into_iter()
            .map(revive)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Json::Object(obj) => revive_object(obj),
    }
}

fn revive_object(mut obj: Map<String, Json>) -> Result<Value> {
    if let Some(kind) = obj.remove(KIND_FIELD) {
        return revive_tagged(kind, obj);
    }

    if has_fields(&obj, &["page_content", "metadata"]) {
        return revive_document(obj).map(Value::Document);
    }

    if has_fields(&obj, &["content", "type", "is_chunk"]) {
        let is_chunk = obj.get("is_chunk").and_then(Json::as_bool).unwrap_or(false);
        if let Some(role) = parse_role(&obj)? {
            let content = string_field(&obj, "content")?;
            return Ok(if is_chunk {
                Value::MessageChunk(MessageChunk { role, content })
            } else {
                Value::Message(Message { role, content })
            });
        }
    }

    if has_fields(&obj, &["text"]) {
        return Ok(Value::Prompt(PromptValue::String(string_field(&obj, "text")?)));
    }

    if has_fields(&obj, &["messages"]) {
        return revive_chat_prompt(obj).map(Value::Prompt);
    }

    obj.into_iter()
        .map(|(key, value)| Ok((key, revive(value)?)))
        .collect::<Result<BTreeMap<_, _>>>()
        .map(Value::Object)
}

fn revive_tagged(kind: Json, obj: Map<String, Json>) -> Result<Value> {
    let kind = kind
        .as_str()
        .ok_or_else(|| RunnableError::validation(format!("{} must be a string", KIND_FIELD)))?;

    match kind {
        KIND_DOCUMENT => revive_document(obj).map(Value::Document),
        KIND_MESSAGE | KIND_MESSAGE_CHUNK => {
            let role = parse_role(&obj)?.ok_or_else(|| {
                RunnableError::validation(format!(
                    "unknown message type {:?}",
                    obj.get("type").cloned().unwrap_or(Json::Null)
                ))
            })?;
            let content = string_field(&obj, "content")?;
            Ok(if kind == KIND_MESSAGE_CHUNK {
                Value::MessageChunk(MessageChunk { role, content })
            } else {
                Value::Message(Message { role, content })
            })
        }
        KIND_STRING_PROMPT => Ok(Value::Prompt(PromptValue::String(string_field(&obj, "text")?))),
        KIND_CHAT_PROMPT => revive_chat_prompt(obj).map(Value::Prompt),
        other => Err(RunnableError::validation(format!(
            "unknown {} {:?}",
            KIND_FIELD, other
        ))),
    }
}

fn has_fields(obj: &Map<String, Json>, fields: &[&str]) -> bool {
    fields.iter().all(|f| obj.contains_key(*f))
}

fn string_field(obj: &Map<String, Json>, field: &str) -> Result<String> {
    match obj.get(field) {
        Some(Json::String(s)) => Ok(s.clone()),
        Some(other) => Err(RunnableError::validation(format!(
            "field {:?} must be a string, got {}",
            field, other
        ))),
        None => Err(RunnableError::validation(format!(
            "missing field {:?}",
            field
        ))),
    }
}

/// `Ok(None)` when `type` names no known message type
fn parse_role(obj: &Map<String, Json>) -> Result<Option<Role>> {
    let role = match obj.get("type").and_then(Json::as_str) {
        Some("human") => Role::Human,
        Some("ai") => Role::Ai,
        Some("system") => Role::System,
        Some("chat") => Role::Chat {
            role: string_field(obj, "role")?,
        },
        Some("function") => Role::Function {
            name: string_field(obj, "name")?,
        },
        _ => return Ok(None),
    };
    Ok(Some(role))
}

fn revive_document(obj: Map<String, Json>) -> Result<Document> {
    let page_content = string_field(&obj, "page_content")?;
    let metadata = match obj.get("metadata") {
        Some(Json::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<HashMap<_, _>>(),
        Some(Json::Null) | None => HashMap::new(),
        Some(other) => {
            return Err(RunnableError::validation(format!(
                "document metadata must be an object, got {}",
                other
            )))
        }
    };
    Ok(Document {
        page_content,
        metadata,
    })
}

fn revive_chat_prompt(mut obj: Map<String, Json>) -> Result<PromptValue> {
    let items = match obj.remove("messages") {
        Some(Json::Array(items)) => items,
        _ => {
            return Err(RunnableError::validation(
                "prompt messages must be a sequence",
            ))
        }
    };

    let messages = items
        .into_iter()
        .map(|item| match revive(item)? {
            Value::Message(m) => Ok(m),
            Value::MessageChunk(c) => Ok(c.into_message()),
            other => Err(RunnableError::validation(format!(
                "prompt messages must be chat messages, got {:?}",
                other
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(PromptValue::Chat(messages))
}

/// Serialize a value into its tagged wire form
pub fn to_wire(value: &Value) -> Json {
    encode(value, true)
}

/// Serialize a value using only the shape-based convention, without
/// `__kind` tags
pub fn to_structural_wire(value: &Value) -> Json {
    encode(value, false)
}

fn encode(value: &Value, tagged: bool) -> Json {
    let mut obj = match value {
        Value::Null => return Json::Null,
        Value::Bool(b) => return Json::Bool(*b),
        Value::Number(n) => return Json::Number(n.clone()),
        Value::String(s) => return Json::String(s.clone()),
        Value::Array(items) => return Json::Array(items.iter().map(|v| encode(v, tagged)).collect()),
        Value::Object(map) => {
            return Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), encode(v, tagged)))
                    .collect(),
            )
        }
        Value::Document(doc) => with_kind(
            KIND_DOCUMENT,
            json!({
                "page_content": doc.page_content,
                "metadata": doc.metadata,
            }),
        ),
        Value::Message(m) => with_kind(KIND_MESSAGE, encode_message(&m.role, &m.content, false)),
        Value::MessageChunk(c) => {
            with_kind(KIND_MESSAGE_CHUNK, encode_message(&c.role, &c.content, true))
        }
        Value::Prompt(PromptValue::String(text)) => {
            with_kind(KIND_STRING_PROMPT, json!({ "text": text }))
        }
        Value::Prompt(PromptValue::Chat(messages)) => with_kind(
            KIND_CHAT_PROMPT,
            json!({
                "messages": messages
                    .iter()
                    .map(|m| encode(&Value::Message(m.clone()), tagged))
                    .collect::<Vec<_>>(),
            }),
        ),
    };

    if !tagged {
        obj.remove(KIND_FIELD);
    }
    Json::Object(obj)
}

fn with_kind(kind: &str, body: Json) -> Map<String, Json> {
    let mut obj = match body {
        Json::Object(map) => map,
        _ => Map::new(),
    };
    obj.insert(KIND_FIELD.to_string(), Json::String(kind.to_string()));
    obj
}

fn encode_message(role: &Role, content: &str, is_chunk: bool) -> Json {
    let mut obj = json!({
        "content": content,
        "type": role.type_name(),
        "is_chunk": is_chunk,
    });
    match role {
        Role::Chat { role } => obj["role"] = Json::String(role.clone()),
        Role::Function { name } => obj["name"] = Json::String(name.clone()),
        _ => {}
    }
    obj
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        to_wire(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        revive(json).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_superset_match() {
        let value = revive(json!({
            "page_content": "hello",
            "metadata": {"source": "a.txt"},
            "id": "ignored"
        }))
        .unwrap();
        let doc = value.as_document().unwrap();
        assert_eq!(doc.page_content, "hello");
        assert_eq!(doc.metadata["source"], json!("a.txt"));
    }

    #[test]
    fn test_message_variants() {
        let human = revive(json!({"content": "hi", "type": "human", "is_chunk": false})).unwrap();
        assert_eq!(human, Value::Message(Message::human("hi")));

        let chunk = revive(json!({"content": "h", "type": "ai", "is_chunk": true})).unwrap();
        assert_eq!(chunk, Value::MessageChunk(MessageChunk::ai("h")));

        let chat = revive(json!({"content": "x", "type": "chat", "is_chunk": false, "role": "critic"}))
            .unwrap();
        assert_eq!(chat, Value::Message(Message::chat("critic", "x")));

        let function = revive(json!({"content": "42", "type": "function", "is_chunk": true, "name": "add"}))
            .unwrap();
        assert_eq!(
            function,
            Value::MessageChunk(MessageChunk::new(
                Role::Function { name: "add".into() },
                "42"
            ))
        );
    }

    #[test]
    fn test_unknown_message_type_falls_through_to_generic() {
        let value = revive(json!({"content": "x", "type": "tool", "is_chunk": false})).unwrap();
        match value {
            Value::Object(map) => assert_eq!(map["type"], Value::from("tool")),
            other => panic!("expected generic object, got {:?}", other),
        }
    }

    #[test]
    fn test_priority_document_over_text() {
        let value = revive(json!({
            "page_content": "doc",
            "metadata": {},
            "text": "prompt"
        }))
        .unwrap();
        assert!(value.as_document().is_some());
    }

    #[test]
    fn test_prompt_values() {
        let text = revive(json!({"text": "Tell me a joke"})).unwrap();
        assert_eq!(text, Value::Prompt(PromptValue::String("Tell me a joke".into())));

        let chat = revive(json!({"messages": [
            {"content": "be terse", "type": "system", "is_chunk": false},
            {"content": "hi", "type": "human", "is_chunk": false}
        ]}))
        .unwrap();
        assert_eq!(
            chat,
            Value::Prompt(PromptValue::Chat(vec![
                Message::system("be terse"),
                Message::human("hi")
            ]))
        );
    }

    #[test]
    fn test_messages_must_be_sequence() {
        let err = revive(json!({"messages": "nope"})).unwrap_err();
        assert!(matches!(err, RunnableError::Validation(_)));
    }

    #[test]
    fn test_nested_generic_revival() {
        let value = revive(json!({
            "answer": {"content": "ok", "type": "ai", "is_chunk": false},
            "sources": [{"page_content": "p", "metadata": {}}]
        }))
        .unwrap();
        assert_eq!(value.get("answer"), Some(&Value::Message(Message::ai("ok"))));
        match value.get("sources") {
            Some(Value::Array(items)) => assert!(items[0].as_document().is_some()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_tagged_and_structural() {
        let values = vec![
            Value::Document(Document::new("body").with_metadata("page", 3)),
            Value::Message(Message::function("lookup", "{}")),
            Value::MessageChunk(MessageChunk::new(Role::Chat { role: "critic".into() }, "so")),
            Value::Prompt(PromptValue::String("plain".into())),
            Value::Prompt(PromptValue::Chat(vec![Message::system("s"), Message::ai("a")])),
        ];

        for value in values {
            assert_eq!(revive(to_wire(&value)).unwrap(), value);
            assert_eq!(revive(to_structural_wire(&value)).unwrap(), value);
        }
    }

    #[test]
    fn test_tagged_dispatch_beats_shape() {
        // Structurally this looks like a document; the tag says prompt.
        let value = revive(json!({
            "__kind": "string_prompt",
            "text": "hi",
            "page_content": "x",
            "metadata": {}
        }))
        .unwrap();
        assert_eq!(value, Value::Prompt(PromptValue::String("hi".into())));
    }

    #[test]
    fn test_tagged_unknown_kind_rejected() {
        let err = revive(json!({"__kind": "spreadsheet", "cells": []})).unwrap_err();
        assert!(matches!(err, RunnableError::Validation(_)));
    }

    #[test]
    fn test_serde_impls_use_wire_form() {
        let value = Value::Message(Message::human("hi"));
        let text = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
        assert_eq!(deserialize(&text).unwrap(), value);
    }
}
