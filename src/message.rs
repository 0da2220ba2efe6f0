/*!
日志消息。

消息在过滤器链中流动，可以是文本、结构化 JSON 值、错误，或是 `log!` 多个参数合并成的列表。
写入输出目标之前统一转换为文本；列表以逗号连接，嵌套的列表和 JSON 数组展开。
*/

use std::error::Error as StdError;
use std::fmt;
use std::io;

use serde::Serialize;
use serde_json::Value;

/// 日志消息
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// 文本消息
    Text(String),
    /// 结构化消息
    Json(Value),
    /// 多个参数合并成的序列
    List(Vec<Message>),
    /// 错误，JSON 过滤器会附带错误详情
    Error(ErrorMessage),
}

/// 错误消息的内容
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorMessage {
    /// 错误描述
    pub message: String,
    /// 错误代码，I/O 错误取其种类
    pub code: Option<String>,
    /// 由外到内的错误来源
    pub causes: Vec<String>,
}

impl ErrorMessage {
    /// 从错误及其来源链提取
    pub fn new(err: &(dyn StdError + 'static)) -> Self {
        let code = err
            .downcast_ref::<io::Error>()
            .map(|e| format!("{:?}", e.kind()));
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            code,
            causes,
        }
    }

    /// 错误描述加来源链，每个来源一行
    pub fn stack(&self) -> String {
        let mut stack = format!("Error: {}", self.message);
        for cause in &self.causes {
            stack.push_str("\n    caused by: ");
            stack.push_str(cause);
        }
        stack
    }

    /// `{"code": ..., "message": ..., "stack": ...}`，没有代码时省略 `code`
    pub fn details(&self) -> Value {
        let mut details = serde_json::Map::new();
        if let Some(code) = &self.code {
            details.insert("code".to_string(), Value::from(code.as_str()));
        }
        details.insert("message".to_string(), Value::from(self.message.as_str()));
        details.insert("stack".to_string(), Value::from(self.stack()));
        Value::Object(details)
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.message)
    }
}

impl Message {
    /// 判断消息是否为空，空消息不会被写出
    ///
    /// 空文本、`null`、`false`、数值零和空 JSON 字符串视为空；列表永远不为空。
    pub fn is_blank(&self) -> bool {
        match self {
            Message::Text(text) => text.is_empty(),
            Message::Json(Value::Null) => true,
            Message::Json(Value::Bool(b)) => !b,
            Message::Json(Value::Number(n)) => n.as_f64() == Some(0.0),
            Message::Json(Value::String(s)) => s.is_empty(),
            Message::Json(_) => false,
            Message::List(_) | Message::Error(_) => false,
        }
    }

    /// 把错误转换为消息
    ///
    /// ```
    /// use qlogger_rs::Message;
    ///
    /// let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no config");
    /// assert_eq!(Message::error(&err).to_string(), "Error: no config");
    /// ```
    pub fn error(err: &(dyn StdError + 'static)) -> Self {
        Message::Error(ErrorMessage::new(err))
    }

    /// 把可序列化的值转换为结构化消息，序列化失败时退化为错误文本
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Message::Json(value),
            Err(e) => Message::Text(format!("unserializable message: {}", e)),
        }
    }

    /// 消费消息并返回文本表示（文本消息零拷贝）
    #[inline]
    pub fn into_text(self) -> String {
        match self {
            Message::Text(text) => text,
            Message::Json(Value::String(s)) => s,
            other => other.to_string(),
        }
    }

    /// 文本消息的内容
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            _ => None,
        }
    }

    /// 转换为 JSON 值，供 JSON 类过滤器使用
    pub fn to_json(&self) -> Value {
        match self {
            Message::Text(text) => Value::String(text.clone()),
            Message::Json(value) => value.clone(),
            Message::List(items) => Value::Array(items.iter().map(Message::to_json).collect()),
            Message::Error(err) => Value::String(err.to_string()),
        }
    }
}

fn join<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    each: fn(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        each(f, item)?;
    }
    Ok(())
}

/// 列表元素：嵌套列表和数组展开，`null` 为空
fn write_item(f: &mut fmt::Formatter<'_>, item: &Message) -> fmt::Result {
    match item {
        Message::List(items) => join(f, items, write_item),
        Message::Json(value) => write_value(f, value),
        other => write!(f, "{}", other),
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Array(values) => join(f, values, write_value),
        Value::Null => Ok(()),
        Value::String(s) => f.write_str(s),
        other => write!(f, "{}", other),
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Text(text) => f.write_str(text),
            Message::Json(Value::String(s)) => f.write_str(s),
            Message::Json(value) => write!(f, "{}", value),
            Message::List(items) => join(f, items, write_item),
            Message::Error(err) => write!(f, "{}", err),
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<&String> for Message {
    fn from(text: &String) -> Self {
        Message::Text(text.clone())
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Message::Json(value)
    }
}

impl<T: Into<Message>> From<Vec<T>> for Message {
    fn from(items: Vec<T>) -> Self {
        Message::List(items.into_iter().map(Into::into).collect())
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Message {
                fn from(value: $ty) -> Self {
                    Message::Json(Value::from(value))
                }
            }
        )*
    };
}

impl_from_scalar!(bool, i32, i64, u32, u64, f64);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_messages() {
        assert!(Message::from("").is_blank());
        assert!(Message::Json(Value::Null).is_blank());
        assert!(Message::from(false).is_blank());
        assert!(Message::from(0).is_blank());
        assert!(!Message::from("x").is_blank());
        assert!(!Message::from(json!({})).is_blank());
        assert!(!Message::List(Vec::new()).is_blank());
    }

    #[test]
    fn test_text_coercion() {
        assert_eq!(Message::from("hello").into_text(), "hello");
        assert_eq!(Message::from(json!("quoted")).into_text(), "quoted");
        assert_eq!(Message::from(json!({"a": 1})).into_text(), r#"{"a":1}"#);
        assert_eq!(Message::from(42).to_string(), "42");
    }

    #[test]
    fn test_list_rendering() {
        let msg = Message::from(vec![Message::from("a"), Message::from(1), Message::from(json!([2, 3]))]);
        assert_eq!(msg.to_string(), "a,1,2,3");
        assert_eq!(msg.to_json(), json!(["a", 1, [2, 3]]));

        let nested = Message::List(vec![
            Message::from(vec!["x", "y"]),
            Message::Json(Value::Null),
            Message::from(json!(["z", null, {"k": 1}])),
        ]);
        assert_eq!(nested.into_text(), r#"x,y,,z,,{"k":1}"#);
    }

    #[test]
    fn test_error_message() {
        #[derive(Debug)]
        struct Outer(io::Error);
        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("cannot load config")
            }
        }
        impl StdError for Outer {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        let err = Outer(io::Error::new(io::ErrorKind::NotFound, "app.toml missing"));
        let msg = Message::error(&err);
        assert!(!msg.is_blank());
        assert_eq!(msg.to_string(), "Error: cannot load config");
        assert_eq!(msg.to_json(), json!("Error: cannot load config"));

        let Message::Error(details) = msg else {
            panic!("not an error message");
        };
        assert_eq!(details.code, None);
        assert_eq!(details.causes, vec!["app.toml missing"]);
        assert_eq!(
            details.details(),
            json!({
                "message": "cannot load config",
                "stack": "Error: cannot load config\n    caused by: app.toml missing",
            })
        );

        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let Message::Error(details) = Message::error(&io) else {
            panic!("not an error message");
        };
        assert_eq!(details.code.as_deref(), Some("PermissionDenied"));
    }

    #[test]
    fn test_serializable_message() {
        #[derive(serde::Serialize)]
        struct Login<'a> {
            user: &'a str,
            ok: bool,
        }

        let msg = Message::json(&Login { user: "ann", ok: true });
        assert_eq!(msg, Message::Json(json!({"user": "ann", "ok": true})));
        assert_eq!(msg.into_text(), r#"{"user":"ann","ok":true}"#);
    }
}
