use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the session binds to a debuggee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    Launch,
    Attach,
}

/// One launch configuration as the host authored it, typically deserialized
/// from a JSON launch file. Adapter-specific keys are preserved in `extra`
/// and passed through to launch/attach verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfiguration {
    pub name: String,
    /// Adapter type identifier, e.g. "lldb" or "gdb".
    #[serde(rename = "type")]
    pub adapter_type: String,
    pub request: RequestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default)]
    pub no_debug: bool,
    /// Opaque payload carried from a `terminated` event into the next
    /// restart of this configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_data: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl SessionConfiguration {
    pub fn new(name: impl Into<String>, adapter_type: impl Into<String>, request: RequestKind) -> Self {
        Self {
            name: name.into(),
            adapter_type: adapter_type.into(),
            request,
            program: None,
            args: vec![],
            cwd: None,
            no_debug: false,
            restart_data: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_launch_configuration_json_roundtrip() {
        let raw = r#"{
            "name": "debug main",
            "type": "lldb",
            "request": "launch",
            "program": "target/debug/main",
            "args": ["--verbose"],
            "stopOnEntry": true
        }"#;
        let config: SessionConfiguration = serde_json::from_str(raw).unwrap();
        assert_eq!(config.name, "debug main");
        assert_eq!(config.adapter_type, "lldb");
        assert_eq!(config.request, RequestKind::Launch);
        assert_eq!(config.program.as_deref(), Some("target/debug/main"));
        assert!(!config.no_debug);
        assert_eq!(config.extra.get("stopOnEntry"), Some(&serde_json::json!(true)));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json.get("type"), Some(&serde_json::json!("lldb")));
        assert_eq!(json.get("stopOnEntry"), Some(&serde_json::json!(true)));
    }
}
