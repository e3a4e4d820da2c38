use serde_json::Value;
use yansi::{Color, Style};

use super::{
    level::Level,
    record::{Field, FieldValue, LogRecord, RenderMode},
    LogEncoder,
};
use crate::utils::{format_local, format_utc_millis, hex_dump};

const RESET: &[u8] = b"\x1b[0m";
const SUCCESS_SYMBOL: &str = "✔";

/// Key substituted for fields that were logged with an empty key.
pub const BLANK_KEY: &str = "value";

/// Element keys of an encoded line. An empty key omits that element.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub time_key: String,
    pub level_key: String,
    pub message_key: String,
    pub stack_key: String,
    pub datetime_format: String,
}

impl EncoderConfig {
    pub fn new() -> Self {
        Self {
            time_key: String::new(),
            level_key: "L".to_string(),
            message_key: "M".to_string(),
            stack_key: "S".to_string(),
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }

    pub fn with_time_key(self, key: impl Into<String>) -> Self {
        Self {
            time_key: key.into(),
            ..self
        }
    }

    pub fn with_stack_key(self, key: impl Into<String>) -> Self {
        Self {
            stack_key: key.into(),
            ..self
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColorPolicy {
    pub enabled: bool,
    pub level_colors: [Color; 7],
    pub dim: Color,
    pub success: Color,
}

impl ColorPolicy {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            level_colors: [
                Color::BrightBlack,
                Color::White,
                Color::Yellow,
                Color::Red,
                Color::Red,
                Color::Red,
                Color::Red,
            ],
            dim: Color::Fixed(240),
            success: Color::Green,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn with_level_color(mut self, level: Level, color: Color) -> Self {
        self.level_colors[level.index()] = color;
        self
    }

    pub fn level_color(&self, level: Level) -> Color {
        self.level_colors[level.index()]
    }
}

impl Default for ColorPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Human oriented encoder: a level symbol, the message, then fields as
/// tab separated `key:value` pairs.
#[derive(Debug, Clone)]
pub struct ConsoleEncoder {
    config: EncoderConfig,
    colors: ColorPolicy,
    escape_all: bool,
}

impl ConsoleEncoder {
    pub fn new(config: EncoderConfig, colors: ColorPolicy) -> Self {
        Self {
            config,
            colors,
            escape_all: false,
        }
    }

    /// Escapes newlines, tabs and backslashes in messages and fields, so each
    /// record always occupies a single line (stack traces excepted).
    pub fn strict(self) -> Self {
        Self {
            escape_all: true,
            ..self
        }
    }

    pub fn colors(&self) -> &ColorPolicy {
        &self.colors
    }

    fn apply_color(&self, buf: &mut Vec<u8>, color: Color) {
        if self.colors.enabled {
            buf.extend_from_slice(RESET);
            buf.extend_from_slice(Style::new().fg(color).prefix().as_bytes());
        }
    }

    fn reset(&self, buf: &mut Vec<u8>) {
        if self.colors.enabled {
            buf.extend_from_slice(RESET);
        }
    }

    fn push_text(&self, buf: &mut Vec<u8>, text: &str) {
        if !self.escape_all {
            buf.extend_from_slice(text.as_bytes());
            return;
        }

        for c in text.chars() {
            match c {
                '\\' => buf.extend_from_slice(b"\\\\"),
                '\n' => buf.extend_from_slice(b"\\n"),
                '\r' => buf.extend_from_slice(b"\\r"),
                '\t' => buf.extend_from_slice(b"\\t"),
                _ => {
                    let mut utf8 = [0u8; 4];
                    buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                }
            }
        }
    }

    fn push_field(&self, buf: &mut Vec<u8>, field: &Field) {
        let key = if field.key.is_empty() {
            BLANK_KEY
        } else {
            field.key.as_str()
        };
        self.push_text(buf, key);
        buf.push(b':');

        match &field.value {
            FieldValue::Str(s) => self.push_text(buf, s),
            FieldValue::Int(i) => buf.extend_from_slice(i.to_string().as_bytes()),
            FieldValue::Uint(u) => buf.extend_from_slice(u.to_string().as_bytes()),
            FieldValue::Float(f) => buf.extend_from_slice(f.to_string().as_bytes()),
            FieldValue::Bool(b) => buf.extend_from_slice(b.to_string().as_bytes()),
            FieldValue::Bytes(bytes) => self.push_text(buf, &hex_dump(bytes)),
        }
    }

    fn write_record(&self, buf: &mut Vec<u8>, record: &LogRecord) {
        let mut has_prefix = false;

        if !self.config.time_key.is_empty() {
            self.apply_color(buf, self.colors.dim);
            let time = format_local(record.timestamp(), &self.config.datetime_format);
            buf.extend_from_slice(time.as_bytes());
            has_prefix = true;
        }

        // the level color also covers the message
        self.apply_color(buf, self.colors.level_color(record.level()));

        if !self.config.level_key.is_empty() {
            let symbol = match record.render_mode() {
                RenderMode::Success => {
                    self.apply_color(buf, self.colors.success);
                    Some(SUCCESS_SYMBOL)
                }
                RenderMode::Standard => Some(record.level().symbol()),
                RenderMode::NoPrefix => None,
            };

            if let Some(symbol) = symbol {
                if has_prefix {
                    buf.push(b' ');
                }
                buf.push(b'[');
                buf.extend_from_slice(symbol.as_bytes());
                buf.push(b']');
                has_prefix = true;
            }
        }

        if has_prefix {
            buf.push(b' ');
        }

        let fields = record.fields();

        if !self.config.message_key.is_empty() {
            self.push_text(buf, record.message());
            if !fields.is_empty() {
                buf.extend_from_slice(b"  ");
            }
        }

        self.apply_color(buf, self.colors.dim);

        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                buf.push(b'\t');
            }
            self.push_field(buf, field);
        }

        if let Some(stack) = record.stack() {
            if !self.config.stack_key.is_empty() {
                buf.push(b'\n');
                buf.extend_from_slice(stack.as_bytes());
            }
        }

        self.reset(buf);
        buf.push(b'\n');
    }
}

impl LogEncoder for ConsoleEncoder {
    fn encode(&self, record: &LogRecord) -> eyre::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(64 + record.message().len());
        self.write_record(&mut buf, record);
        Ok(buf)
    }
}

/// Machine oriented encoder producing one JSON object per line.
#[derive(Debug, Clone, Default)]
pub struct JsonEncoder;

impl JsonEncoder {
    pub fn new() -> Self {
        Self
    }

    fn push_pair(
        buf: &mut Vec<u8>,
        first: &mut bool,
        key: &str,
        value: &Value,
    ) -> eyre::Result<()> {
        if !*first {
            buf.push(b',');
        }
        *first = false;
        serde_json::to_writer(&mut *buf, key)?;
        buf.push(b':');
        serde_json::to_writer(&mut *buf, value)?;
        Ok(())
    }

    fn field_value(value: &FieldValue) -> Value {
        match value {
            FieldValue::Str(s) => Value::from(s.as_str()),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Uint(u) => Value::from(*u),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::from(f.to_string())),
            FieldValue::Bool(b) => Value::from(*b),
            FieldValue::Bytes(bytes) => Value::from(hex::encode(bytes)),
        }
    }
}

impl LogEncoder for JsonEncoder {
    fn encode(&self, record: &LogRecord) -> eyre::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(128);
        let mut first = true;
        buf.push(b'{');

        Self::push_pair(&mut buf, &mut first, "level", &Value::from(record.level().as_str()))?;
        Self::push_pair(
            &mut buf,
            &mut first,
            "ts",
            &Value::from(format_utc_millis(record.timestamp())),
        )?;
        if !record.logger_name().is_empty() {
            Self::push_pair(&mut buf, &mut first, "logger", &Value::from(record.logger_name()))?;
        }
        Self::push_pair(&mut buf, &mut first, "msg", &Value::from(record.message()))?;

        for field in record.fields() {
            let key = if field.key.is_empty() {
                BLANK_KEY
            } else {
                field.key.as_str()
            };
            Self::push_pair(&mut buf, &mut first, key, &Self::field_value(&field.value))?;
        }

        if let Some(stack) = record.stack() {
            Self::push_pair(&mut buf, &mut first, "stacktrace", &Value::from(stack))?;
        }

        buf.extend_from_slice(b"}\n");
        Ok(buf)
    }
}
