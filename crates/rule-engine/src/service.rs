//! 规则引擎服务
//!
//! 组合编译、评估与存储，对外提供创建、合并、评估三个操作。

use crate::compiler;
use crate::error::Result;
use crate::evaluator::evaluate_rule;
use crate::models::{AstNode, DataRecord};
use crate::store::{RuleStore, StoredRule};
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct RuleEngineService {
    store: RuleStore,
}

impl RuleEngineService {
    pub fn new(store: RuleStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// 解析并保存一条规则
    #[instrument(skip(self))]
    pub fn create_rule(&self, rule_string: &str) -> Result<StoredRule> {
        let ast = compiler::create_rule(rule_string)?;
        Ok(self.store.insert_rule(rule_string, &ast))
    }

    /// 合并并保存多条规则
    #[instrument(skip(self))]
    pub fn combine_rules(&self, rule_strings: &[String]) -> Result<StoredRule> {
        let ast = compiler::combine_rules(rule_strings)?;
        Ok(self.store.insert_combined(rule_strings, &ast))
    }

    /// 从序列化的 AST 重建规则并对用户数据求值
    #[instrument(skip(self, ast, user_data))]
    pub fn evaluate_rule(&self, ast: &Value, user_data: Value) -> Result<bool> {
        let ast = AstNode::from_dict(ast)?;
        let record = DataRecord::from_value(user_data)?;
        debug!(root = %ast, fields = record.len(), "开始评估规则");
        evaluate_rule(&ast, &record)
    }

    /// 对已保存的规则求值
    #[instrument(skip(self, user_data))]
    pub fn evaluate_stored(&self, id: &Uuid, user_data: Value) -> Result<bool> {
        let stored = self.store.require(id)?;
        self.evaluate_rule(&stored.ast, user_data)
    }

    pub fn get_rule(&self, id: &Uuid) -> Result<StoredRule> {
        self.store.require(id)
    }

    pub fn list_rules(&self) -> Vec<StoredRule> {
        self.store.list_all()
    }
}
