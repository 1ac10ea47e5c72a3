use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// 从页面收到的一条 postMessage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// 浏览器给出的发送方 origin
    pub origin: String,
    /// 消息体，可能是字符串也可能是对象
    #[serde(default)]
    pub data: JsonValue,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, data: JsonValue) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// 测量数据，结构由模拟器决定，最后一次推送为准
pub type Measurements = JsonValue;

/// 发给嵌入模拟器的采集请求
///
/// 模拟器接受哪种指令并不确定，所以每次都把所有形态发一遍。
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub payload: JsonValue,
}

impl CaptureRequest {
    /// 全部冗余形态：字符串指令 + 结构化指令对象
    pub fn all_shapes() -> Vec<CaptureRequest> {
        [
            json!("getCircuit"),
            json!("exportCircuit"),
            json!({ "type": "getState" }),
            json!({ "type": "requestCircuit" }),
            json!({ "command": "export" }),
            json!({ "action": "getCircuitState" }),
        ]
        .into_iter()
        .map(|payload| CaptureRequest { payload })
        .collect()
    }
}
