//! AST 的序列化与反序列化
//!
//! 存储和传输使用的嵌套结构：
//!
//! ```json
//! {"node_type": "operator", "value": "AND", "left": {...}, "right": {...}}
//! {"node_type": "operand", "value": "age Gt 30", "left": null, "right": null}
//! ```
//!
//! 缺失的子节点显式输出为 `null`。嵌套深度超过 [`MAX_AST_DEPTH`] 的结构拒绝重建。

use crate::error::{Result, RuleError};
use crate::models::{AstNode, MAX_AST_DEPTH};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// 节点的线上格式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_type: String,
    #[serde(default)]
    pub left: Option<Box<NodeRecord>>,
    #[serde(default)]
    pub right: Option<Box<NodeRecord>>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl From<&AstNode> for NodeRecord {
    fn from(node: &AstNode) -> Self {
        match node {
            AstNode::Operand { value } => Self {
                node_type: "operand".to_string(),
                left: None,
                right: None,
                value: Some(Value::String(value.clone())),
            },
            AstNode::Operator {
                operator,
                left,
                right,
            } => Self {
                node_type: "operator".to_string(),
                left: Some(Box::new(left.as_ref().into())),
                right: Some(Box::new(right.as_ref().into())),
                value: Some(Value::String(operator.to_string())),
            },
        }
    }
}

impl NodeRecord {
    fn into_ast(self, depth: usize) -> Result<AstNode> {
        if depth > MAX_AST_DEPTH {
            return Err(RuleError::NodeTooDeep(MAX_AST_DEPTH));
        }

        match self.node_type.as_str() {
            "operator" => {
                let operator = match self.value {
                    Some(Value::String(s)) => s.parse()?,
                    Some(other) => return Err(RuleError::UnsupportedOperator(other.to_string())),
                    None => return Err(RuleError::MissingField("operator.value".to_string())),
                };
                let left = self
                    .left
                    .ok_or_else(|| RuleError::MissingField("operator.left".to_string()))?;
                let right = self
                    .right
                    .ok_or_else(|| RuleError::MissingField("operator.right".to_string()))?;

                Ok(AstNode::operator(
                    operator,
                    left.into_ast(depth + 1)?,
                    right.into_ast(depth + 1)?,
                ))
            }
            // 叶子节点只取 value，忽略可能存在的子节点
            "operand" => match self.value {
                Some(Value::String(value)) => Ok(AstNode::operand(value)),
                Some(other) => Err(RuleError::InvalidOperand(other.to_string())),
                None => Err(RuleError::MissingField("operand.value".to_string())),
            },
            other => Err(RuleError::UnsupportedNodeType(other.to_string())),
        }
    }
}

impl TryFrom<NodeRecord> for AstNode {
    type Error = RuleError;

    fn try_from(record: NodeRecord) -> Result<Self> {
        record.into_ast(1)
    }
}

/// 沿 left/right 迭代计算嵌套深度，超过上限后停止
fn nesting_depth(value: &Value) -> usize {
    let mut deepest = 0;
    let mut pending = vec![(value, 1)];

    while let Some((node, depth)) = pending.pop() {
        deepest = deepest.max(depth);
        if deepest > MAX_AST_DEPTH {
            break;
        }
        for key in ["left", "right"] {
            if let Some(child) = node.get(key).filter(|child| !child.is_null()) {
                pending.push((child, depth + 1));
            }
        }
    }

    deepest
}

impl Serialize for AstNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        NodeRecord::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AstNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = NodeRecord::deserialize(deserializer)?;
        AstNode::try_from(record).map_err(serde::de::Error::custom)
    }
}

impl AstNode {
    /// 转换为嵌套的 JSON 结构
    pub fn to_dict(&self) -> Value {
        // NodeRecord 只包含字符串和嵌套对象，序列化不会失败
        serde_json::to_value(NodeRecord::from(self)).unwrap_or(Value::Null)
    }

    /// 从嵌套的 JSON 结构重建 AST
    pub fn from_dict(value: &Value) -> Result<Self> {
        // 先检查深度，避免反序列化时无界递归
        if nesting_depth(value) > MAX_AST_DEPTH {
            return Err(RuleError::NodeTooDeep(MAX_AST_DEPTH));
        }
        let record = NodeRecord::deserialize(value).map_err(|e| RuleError::MissingField(e.to_string()))?;
        AstNode::try_from(record)
    }
}

/// 从嵌套结构重建 AST
pub fn reconstruct_ast(value: &Value) -> Result<AstNode> {
    AstNode::from_dict(value)
}
