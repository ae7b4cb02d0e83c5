//! 规则引擎领域模型

use crate::error::{Result, RuleError};
use crate::operators::{Comparator, LogicalOperator};
use serde_json::{Map, Value};
use std::fmt;

/// 解析、合并、反序列化得到的 AST 最大深度
///
/// 不超过 serde_json 默认的 128 层嵌套限制，任何生成的树都能以 JSON 形式再提交回来。
pub const MAX_AST_DEPTH: usize = 100;

/// 规则 AST 节点
///
/// 叶子节点保存比较的字符串形式（`age Gt 30`），内部节点用 AND/OR 连接两棵子树。
/// 树构建后不可变，合并规则时通过新建 Operator 节点包裹已有子树。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
    Operand {
        value: String,
    },
    Operator {
        operator: LogicalOperator,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
}

impl AstNode {
    pub fn operand(value: impl Into<String>) -> Self {
        Self::Operand {
            value: value.into(),
        }
    }

    pub fn operator(operator: LogicalOperator, left: AstNode, right: AstNode) -> Self {
        Self::Operator {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: AstNode, right: AstNode) -> Self {
        Self::operator(LogicalOperator::And, left, right)
    }

    pub fn or(left: AstNode, right: AstNode) -> Self {
        Self::operator(LogicalOperator::Or, left, right)
    }

    /// 序列化形式中的 node_type
    pub fn node_type(&self) -> &'static str {
        match self {
            Self::Operand { .. } => "operand",
            Self::Operator { .. } => "operator",
        }
    }

    /// 序列化形式中的 value
    pub fn value(&self) -> &str {
        match self {
            Self::Operand { value } => value,
            Self::Operator { operator, .. } => operator.as_str(),
        }
    }

    /// 树的深度（单个叶子为 1）
    pub fn depth(&self) -> usize {
        match self {
            Self::Operand { .. } => 1,
            Self::Operator { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// 叶子节点数量
    pub fn operand_count(&self) -> usize {
        match self {
            Self::Operand { .. } => 1,
            Self::Operator { left, right, .. } => left.operand_count() + right.operand_count(),
        }
    }
}

impl From<Condition> for AstNode {
    fn from(condition: Condition) -> Self {
        Self::operand(condition.to_string())
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AstNode(type={}, value={})", self.node_type(), self.value())
    }
}

/// 比较右侧的常量
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Integer(i64),
    String(String),
}

impl fmt::Display for Literal {
    /// 字符串统一用单引号包裹，不做转义
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::String(s) => write!(f, "'{}'", s),
        }
    }
}

/// 单个字段比较（叶子节点的结构化形式）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub comparator: Comparator,
    pub literal: Literal,
}

impl Condition {
    pub fn new(field: impl Into<String>, comparator: Comparator, literal: Literal) -> Self {
        Self {
            field: field.into(),
            comparator,
            literal,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.comparator, self.literal)
    }
}

/// 评估数据 - 字段名到值的映射
///
/// 只有整数和字符串可以参与比较，其余类型在评估时报错。
#[derive(Debug, Clone, Default)]
pub struct DataRecord {
    fields: Map<String, Value>,
}

impl DataRecord {
    /// 从 JSON 值创建，必须是对象
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(RuleError::InvalidRecord(json_type_name(&other).to_string())),
        }
    }

    /// 从 JSON 字符串创建
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// 插入字段，返回自身以便链式构建
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// 获取 JSON 值的类型名称
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
