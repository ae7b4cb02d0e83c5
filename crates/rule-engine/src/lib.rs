//! 规则表达式引擎
//!
//! 提供中缀规则表达式的解析、合并、评估能力：
//! - `age > 30 AND department = 'Sales'` 形式的规则解析为 AST
//! - 多条规则以 OR 合并
//! - 对字段数据求值
//! - AST 与嵌套 JSON 结构互转，用于存储和传输

pub mod codec;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod http;
pub mod lexer;
pub mod models;
pub mod operators;
pub mod parser;
pub mod service;
pub mod store;

pub use codec::{NodeRecord, reconstruct_ast};
pub use compiler::{combine_rules, create_rule};
pub use error::{ErrorCategory, Result, RuleError};
pub use evaluator::{OperandParts, RuleEvaluator, evaluate_rule};
pub use models::{AstNode, Condition, DataRecord, Literal, MAX_AST_DEPTH};
pub use operators::{Comparator, LogicalOperator};
pub use service::RuleEngineService;
pub use store::{RuleSource, RuleStore, StoredRule};
