//! Core domain values that flow between stages.

use crate::error::RunnableError;
use crate::Result;
use std::collections::{BTreeMap, HashMap};

/// Who produced a chat message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Human,
    Ai,
    System,
    /// Arbitrary speaker role
    Chat { role: String },
    /// Output of a function call
    Function { name: String },
}

impl Role {
    /// Wire name of the message type
    pub fn type_name(&self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Ai => "ai",
            Role::System => "system",
            Role::Chat { .. } => "chat",
            Role::Function { .. } => "function",
        }
    }
}

/// A complete chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a new human message
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    /// Create a new AI message
    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a message with an arbitrary speaker role
    pub fn chat(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Chat { role: role.into() },
            content: content.into(),
        }
    }

    /// Create a function result message
    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function { name: name.into() },
            content: content.into(),
        }
    }
}

/// One streamed increment of a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChunk {
    pub role: Role,
    pub content: String,
}

impl MessageChunk {
    /// Create a chunk
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create an AI chunk, the common case for streamed model output
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    /// Convert an assembled chunk into the equivalent complete message
    pub fn into_message(self) -> Message {
        Message {
            role: self.role,
            content: self.content,
        }
    }
}

impl From<MessageChunk> for Message {
    fn from(chunk: MessageChunk) -> Self {
        chunk.into_message()
    }
}

/// A unit of retrieved text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub page_content: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    /// Create a document without metadata
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Set a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Formatted prompt ready to hand to a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptValue {
    /// Plain text prompt
    String(String),
    /// Chat prompt made of messages
    Chat(Vec<Message>),
}

impl PromptValue {
    /// Render the prompt as plain text
    pub fn to_text(&self) -> String {
        match self {
            PromptValue::String(text) => text.clone(),
            PromptValue::Chat(messages) => messages
                .iter()
                .map(|m| format!("{}: {}", m.role.type_name(), m.content))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Render the prompt as chat messages
    pub fn to_messages(&self) -> Vec<Message> {
        match self {
            PromptValue::String(text) => vec![Message::human(text.clone())],
            PromptValue::Chat(messages) => messages.clone(),
        }
    }
}

/// A value revived from the wire: plain JSON data or a domain value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    /// Object with no recognized shape
    Object(BTreeMap<String, Value>),
    Document(Document),
    Message(Message),
    MessageChunk(MessageChunk),
    Prompt(PromptValue),
}

impl Value {
    /// String payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Document payload, if this is a document
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Message payload, if this is a complete message
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Chunk payload, if this is a message chunk
    pub fn as_message_chunk(&self) -> Option<&MessageChunk> {
        match self {
            Value::MessageChunk(c) => Some(c),
            _ => None,
        }
    }

    /// Prompt payload, if this is a prompt value
    pub fn as_prompt(&self) -> Option<&PromptValue> {
        match self {
            Value::Prompt(p) => Some(p),
            _ => None,
        }
    }

    /// Field lookup on generic objects
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Value::Document(d)
    }
}

impl From<Message> for Value {
    fn from(m: Message) -> Self {
        Value::Message(m)
    }
}

impl From<MessageChunk> for Value {
    fn from(c: MessageChunk) -> Self {
        Value::MessageChunk(c)
    }
}

impl From<PromptValue> for Value {
    fn from(p: PromptValue) -> Self {
        Value::Prompt(p)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

/// Values that can be assembled from streamed increments.
///
/// Concatenating every chunk of a stream in order yields a value equivalent
/// to the non-streamed output.
pub trait Concat: Sized {
    fn concat(self, other: Self) -> Result<Self>;
}

impl Concat for String {
    fn concat(mut self, other: Self) -> Result<Self> {
        self.push_str(&other);
        Ok(self)
    }
}

impl<T> Concat for Vec<T> {
    fn concat(mut self, other: Self) -> Result<Self> {
        self.extend(other);
        Ok(self)
    }
}

impl Concat for MessageChunk {
    fn concat(mut self, other: Self) -> Result<Self> {
        if self.role != other.role {
            return Err(RunnableError::validation(format!(
                "cannot concatenate {} chunk with {} chunk",
                self.role.type_name(),
                other.role.type_name()
            )));
        }
        self.content.push_str(&other.content);
        Ok(self)
    }
}

impl Concat for Value {
    fn concat(self, other: Self) -> Result<Self> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(a.concat(b)?)),
            (Value::MessageChunk(a), Value::MessageChunk(b)) => {
                Ok(Value::MessageChunk(a.concat(b)?))
            }
            (Value::Array(a), Value::Array(b)) => Ok(Value::Array(a.concat(b)?)),
            (Value::Object(mut a), Value::Object(b)) => {
                for (key, value) in b {
                    let merged = match a.remove(&key) {
                        Some(existing) => existing.concat(value)?,
                        None => value,
                    };
                    a.insert(key, merged);
                }
                Ok(Value::Object(a))
            }
            (Value::Null, other) | (other, Value::Null) => Ok(other),
            (a, b) => Err(RunnableError::validation(format!(
                "cannot concatenate {:?} with {:?}",
                a, b
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_concat() {
        let full = MessageChunk::ai("Hel")
            .concat(MessageChunk::ai("lo"))
            .unwrap()
            .concat(MessageChunk::ai("!"))
            .unwrap();
        assert_eq!(full.content, "Hello!");
        assert_eq!(full.into_message(), Message::ai("Hello!"));
    }

    #[test]
    fn test_chunk_concat_role_mismatch() {
        let err = MessageChunk::ai("a")
            .concat(MessageChunk::new(Role::Human, "b"))
            .unwrap_err();
        assert!(matches!(err, RunnableError::Validation(_)));
    }

    #[test]
    fn test_value_object_concat_merges_fields() {
        let mut a = BTreeMap::new();
        a.insert("text".to_string(), Value::from("foo"));
        let mut b = BTreeMap::new();
        b.insert("text".to_string(), Value::from("bar"));
        b.insert("done".to_string(), Value::from(true));

        let merged = Value::Object(a).concat(Value::Object(b)).unwrap();
        assert_eq!(merged.get("text"), Some(&Value::from("foobar")));
        assert_eq!(merged.get("done"), Some(&Value::from(true)));
    }

    #[test]
    fn test_null_is_concat_identity() {
        let chunk = Value::from(MessageChunk::ai("hi"));
        assert_eq!(Value::Null.concat(chunk.clone()).unwrap(), chunk);
        assert_eq!(chunk.clone().concat(Value::Null).unwrap(), chunk);
        assert!(Value::from("a").concat(Value::from(true)).is_err());
    }

    #[test]
    fn test_prompt_rendering() {
        let prompt = PromptValue::Chat(vec![Message::system("be brief"), Message::human("hi")]);
        assert_eq!(prompt.to_text(), "system: be brief\nhuman: hi");
        assert_eq!(
            PromptValue::String("hi".into()).to_messages(),
            vec![Message::human("hi")]
        );
    }
}
