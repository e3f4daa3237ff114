/// Attribute value reported by the device SDK
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Number(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl AttributeValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// One `(source, attribute, value)` callback invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeEvent {
    /// SDK identifier of the device that raised the callback
    pub source: String,
    pub attribute: String,
    pub value: AttributeValue,
}

impl AttributeEvent {
    pub fn new(
        source: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            source: source.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}
