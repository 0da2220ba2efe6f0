/*!
常用格式化过滤器。

每个过滤器都实现 [`Filter`]，把消息包装成一行最终输出：

- [`BasicFilter`]：`2014-10-19 01:23:45.678 [info] message`
- [`JsonFilter`]：模板字段 + `time` + `level` + 消息
- [`KubeFilter`]：Kubernetes 容器日志风格的 JSON
- [`PinoFilter`]：与 pino 兼容的 JSON

时间均取自全局 [`Timebase`](crate::Timebase)。
*/

use serde_json::{Map, Value};

use crate::filter::Filter;
use crate::level::Level;
use crate::message::Message;
use crate::timebase;
use crate::timestamps::{format_basic_date, format_json_date};

/// 基本过滤器：本地时间戳 + 级别名 + 消息
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicFilter;

impl BasicFilter {
    /// 创建基本过滤器
    pub fn new() -> Self {
        Self
    }
}

impl Filter for BasicFilter {
    fn filter(&self, message: Message, level: Level) -> Option<Message> {
        let stamp = format_basic_date(None);
        let text = message.into_text();
        let mut line = String::with_capacity(stamp.len() + text.len() + 12);
        line.push_str(&stamp);
        line.push_str(" [");
        line.push_str(level.name());
        line.push_str("] ");
        line.push_str(&text);
        Some(Message::Text(line))
    }
}

/// 对象消息合并字段，其余消息放到 `key` 下
fn merge_message(bundle: &mut Map<String, Value>, message: Message, key: &str) {
    match message {
        Message::Json(Value::Object(fields)) => bundle.extend(fields),
        other => {
            bundle.insert(key.to_string(), other.to_json());
        }
    }
}

/// JSON 过滤器
///
/// 输出的字段顺序：模板字段、`time`（毫秒）、`level`（级别名），
/// 最后是对象消息的各字段，或非对象消息的 `message`。
/// 后写入的同名字段覆盖先前的值，但保留原来的位置。
/// 错误消息写成 `"message": "Error: ..."`，另附 `error` 对象（`code`、`message`、`stack`）。
#[derive(Debug, Clone)]
pub struct JsonFilter {
    template: Map<String, Value>,
}

impl JsonFilter {
    /// 使用默认模板 `{"time": 0, "level": "", "message": ""}`
    pub fn new() -> Self {
        let mut template = Map::new();
        template.insert("time".to_string(), Value::from(0));
        template.insert("level".to_string(), Value::from(""));
        template.insert("message".to_string(), Value::from(""));
        Self { template }
    }

    /// 使用自定义模板（主机名、应用名等固定字段）
    pub fn with_template(template: Map<String, Value>) -> Self {
        Self { template }
    }

    /// 当前模板
    pub fn template(&self) -> &Map<String, Value> {
        &self.template
    }
}

impl Default for JsonFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for JsonFilter {
    fn filter(&self, message: Message, level: Level) -> Option<Message> {
        let mut bundle = self.template.clone();
        bundle.insert("time".to_string(), Value::from(timebase::global().get_timestamp()));
        bundle.insert("level".to_string(), Value::from(level.name()));
        match message {
            Message::Error(err) => {
                bundle.insert("message".to_string(), Value::from(err.to_string()));
                bundle.insert("error".to_string(), err.details());
            }
            other => merge_message(&mut bundle, other, "message"),
        }
        Some(Message::Text(Value::Object(bundle).to_string()))
    }
}

/// Kubernetes 风格的 JSON 过滤器
///
/// `{"time": "2019-02-01T02:16:37.368Z", "type": "stdout", "message": ...}`，
/// [`with_level`](KubeFilter::with_level) 之后在 `message` 前加上 `level`。
#[derive(Debug, Clone)]
pub struct KubeFilter {
    stream: String,
    include_level: bool,
}

impl KubeFilter {
    /// 创建过滤器，`stream` 填入 `type` 字段
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            include_level: false,
        }
    }

    /// 输出 `level` 字段
    pub fn with_level(mut self) -> Self {
        self.include_level = true;
        self
    }
}

impl Default for KubeFilter {
    fn default() -> Self {
        Self::new("stdout")
    }
}

impl Filter for KubeFilter {
    fn filter(&self, message: Message, level: Level) -> Option<Message> {
        let mut bundle = Map::new();
        bundle.insert("time".to_string(), Value::from(format_json_date(None)));
        bundle.insert("type".to_string(), Value::from(self.stream.as_str()));
        if self.include_level {
            bundle.insert("level".to_string(), Value::from(level.name()));
        }
        bundle.insert("message".to_string(), message.to_json());
        Some(Message::Text(Value::Object(bundle).to_string()))
    }
}

/// 把级别映射到 pino 的数值级别
pub fn pino_level(level: Level) -> u8 {
    match level {
        Level::Emerg | Level::Alert | Level::Crit => 60,
        Level::Error => 50,
        Level::Warning => 40,
        Level::Notice | Level::Info => 30,
        Level::Debug => 20,
        Level::Trace | Level::All | Level::None => 10,
    }
}

/// 与 pino 兼容的 JSON 过滤器
#[derive(Debug, Clone)]
pub struct PinoFilter {
    pid: u32,
    name: Option<String>,
}

impl PinoFilter {
    /// 创建过滤器
    pub fn new() -> Self {
        Self {
            pid: std::process::id(),
            name: None,
        }
    }

    /// 设置 `name` 字段
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Default for PinoFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for PinoFilter {
    fn filter(&self, message: Message, level: Level) -> Option<Message> {
        let mut bundle = Map::new();
        bundle.insert("level".to_string(), Value::from(pino_level(level)));
        bundle.insert("time".to_string(), Value::from(timebase::global().get_timestamp()));
        bundle.insert("pid".to_string(), Value::from(self.pid));
        if let Some(name) = &self.name {
            bundle.insert("name".to_string(), Value::from(name.as_str()));
        }
        merge_message(&mut bundle, message, "msg");
        Some(Message::Text(Value::Object(bundle).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(message: Option<Message>) -> Map<String, Value> {
        match serde_json::from_str(&message.unwrap().into_text()).unwrap() {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    fn keys(map: &Map<String, Value>) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_basic_filter() {
        let line = BasicFilter::new()
            .filter(Message::from("hello"), Level::Warning)
            .unwrap()
            .into_text();
        // "YYYY-MM-DD HH:MM:SS.mmm [warning] hello"
        assert_eq!(line.len(), 23 + " [warning] hello".len());
        assert!(line.ends_with(" [warning] hello"));
        assert_eq!(&line[4..5], "-");
        assert_eq!(&line[19..20], ".");
    }

    #[test]
    fn test_json_filter_text_message() {
        let before = timebase::now_millis();
        let map = parse(JsonFilter::new().filter(Message::from("hello"), Level::Info));

        assert_eq!(keys(&map), vec!["time", "level", "message"]);
        assert!(map["time"].as_u64().unwrap() >= before);
        assert_eq!(map["level"], "info");
        assert_eq!(map["message"], "hello");
    }

    #[test]
    fn test_json_filter_merges_objects() {
        let mut template = Map::new();
        template.insert("host".to_string(), json!("web-1"));
        let filter = JsonFilter::with_template(template);

        let map = parse(filter.filter(Message::from(json!({"user": "ann", "id": 7})), Level::Error));
        assert_eq!(keys(&map), vec!["host", "time", "level", "user", "id"]);
        assert_eq!(map["host"], "web-1");
        assert_eq!(map["level"], "error");
        assert_eq!(map["id"], 7);
    }

    #[test]
    fn test_json_filter_message_fields_override() {
        let map = parse(JsonFilter::new().filter(Message::from(json!({"level": "custom"})), Level::Info));
        assert_eq!(keys(&map), vec!["time", "level", "message"]);
        assert_eq!(map["level"], "custom");
        assert_eq!(map["message"], "");
    }

    #[test]
    fn test_kube_filter() {
        let map = parse(KubeFilter::new("stderr").with_level().filter(Message::from("boom"), Level::Crit));
        assert_eq!(keys(&map), vec!["time", "type", "level", "message"]);
        assert_eq!(map["type"], "stderr");
        assert_eq!(map["level"], "crit");
        assert_eq!(map["message"], "boom");
        let time = map["time"].as_str().unwrap();
        assert_eq!(time.len(), 24);
        assert!(time.ends_with('Z'));

        let map = parse(KubeFilter::default().filter(Message::from(json!({"a": 1})), Level::Info));
        assert_eq!(keys(&map), vec!["time", "type", "message"]);
        assert_eq!(map["type"], "stdout");
        assert_eq!(map["message"], json!({"a": 1}));
    }

    #[test]
    fn test_json_filter_error_message() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "db down");
        let map = parse(JsonFilter::new().filter(Message::error(&err), Level::Error));

        assert_eq!(keys(&map), vec!["time", "level", "message", "error"]);
        assert_eq!(map["message"], "Error: db down");
        assert_eq!(
            map["error"],
            json!({"code": "ConnectionRefused", "message": "db down", "stack": "Error: db down"})
        );
    }

    #[test]
    fn test_pino_levels() {
        assert_eq!(pino_level(Level::Emerg), 60);
        assert_eq!(pino_level(Level::Crit), 60);
        assert_eq!(pino_level(Level::Error), 50);
        assert_eq!(pino_level(Level::Warning), 40);
        assert_eq!(pino_level(Level::Notice), 30);
        assert_eq!(pino_level(Level::Info), 30);
        assert_eq!(pino_level(Level::Debug), 20);
        assert_eq!(pino_level(Level::Trace), 10);
        assert_eq!(pino_level(Level::All), 10);
    }

    #[test]
    fn test_pino_filter() {
        let map = parse(PinoFilter::new().with_name("api").filter(Message::from("hi"), Level::Warning));
        assert_eq!(keys(&map), vec!["level", "time", "pid", "name", "msg"]);
        assert_eq!(map["level"], 40);
        assert_eq!(map["pid"], std::process::id());
        assert_eq!(map["name"], "api");
        assert_eq!(map["msg"], "hi");

        let map = parse(PinoFilter::new().filter(Message::from(json!({"req": 1})), Level::Info));
        assert_eq!(keys(&map), vec!["level", "time", "pid", "req"]);
    }
}
