use chrono::{DateTime, Utc};

use super::level::Level;

/// Logger name which prints messages with a `[✔]` symbol instead of their
/// regular level.
pub const SUCCESS_NAME: &str = "clio.success";

/// Logger name which prints messages without a bracketed prefix.
pub const NO_PREFIX_NAME: &str = "clio.noprefix";

/// Special-case formatting selected by the logger name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Standard,
    Success,
    NoPrefix,
}

impl RenderMode {
    pub fn from_logger_name(name: &str) -> Self {
        match name {
            SUCCESS_NAME => RenderMode::Success,
            NO_PREFIX_NAME => RenderMode::NoPrefix,
            _ => RenderMode::Standard,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Str(value.clone())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(value: &[u8]) -> Self {
        FieldValue::Bytes(value.to_vec())
    }
}

macro_rules! impl_from_int {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_int!(Int: i8, i16, i32, i64);
impl_from_int!(Uint: u8, u16, u32, u64);

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::Uint(value as u64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A single structured log event.
///
/// Records are assembled with the consuming `with_*` methods and are not
/// changed afterwards. The render mode is resolved whenever the logger name
/// is set so encoders never compare names themselves.
#[derive(Debug, Clone)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    level: Level,
    logger_name: String,
    message: String,
    fields: Vec<Field>,
    stack: Option<String>,
    render_mode: RenderMode,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            logger_name: String::new(),
            message: message.into(),
            fields: Vec::new(),
            stack: None,
            render_mode: RenderMode::Standard,
        }
    }

    pub fn with_logger_name(self, name: impl Into<String>) -> Self {
        let logger_name = name.into();
        let render_mode = RenderMode::from_logger_name(&logger_name);
        Self {
            logger_name,
            render_mode,
            ..self
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push(Field::new(key, value));
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn with_stack(self, stack: impl Into<String>) -> Self {
        Self {
            stack: Some(stack.into()),
            ..self
        }
    }

    pub fn with_timestamp(self, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, ..self }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }
}
