//! 规则存储管理
//!
//! 使用 DashMap 提供线程安全的内存存储，保存创建过的单条规则和合并规则，
//! 以及它们的 AST（序列化形式）。

use crate::error::{Result, RuleError};
use crate::models::AstNode;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// 规则来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSource {
    /// 单条规则字符串
    Single { rule_string: String },
    /// 多条规则合并
    Combined { rule_strings: Vec<String> },
}

/// 已保存的规则
#[derive(Debug, Clone, Serialize)]
pub struct StoredRule {
    pub id: Uuid,
    #[serde(flatten)]
    pub source: RuleSource,
    pub ast: Value,
    pub created_at: DateTime<Utc>,
}

impl StoredRule {
    fn new(source: RuleSource, ast: &AstNode) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            ast: ast.to_dict(),
            created_at: Utc::now(),
        }
    }

    /// 从保存的序列化形式重建 AST
    pub fn to_ast(&self) -> Result<AstNode> {
        AstNode::from_dict(&self.ast)
    }
}

/// 规则存储
#[derive(Clone, Default)]
pub struct RuleStore {
    rules: Arc<DashMap<Uuid, StoredRule>>,
}

impl RuleStore {
    /// 创建新的规则存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取当前存储的规则数量
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 保存单条规则
    #[instrument(skip(self, ast))]
    pub fn insert_rule(&self, rule_string: &str, ast: &AstNode) -> StoredRule {
        let stored = StoredRule::new(
            RuleSource::Single {
                rule_string: rule_string.to_string(),
            },
            ast,
        );
        self.rules.insert(stored.id, stored.clone());

        info!(rule_id = %stored.id, "规则已保存");
        stored
    }

    /// 保存合并规则
    #[instrument(skip(self, rule_strings, ast), fields(count = rule_strings.len()))]
    pub fn insert_combined(&self, rule_strings: &[String], ast: &AstNode) -> StoredRule {
        let stored = StoredRule::new(
            RuleSource::Combined {
                rule_strings: rule_strings.to_vec(),
            },
            ast,
        );
        self.rules.insert(stored.id, stored.clone());

        info!(rule_id = %stored.id, "合并规则已保存");
        stored
    }

    /// 获取规则
    pub fn get(&self, id: &Uuid) -> Option<StoredRule> {
        self.rules.get(id).map(|r| r.clone())
    }

    /// 获取规则，不存在时返回错误
    pub fn require(&self, id: &Uuid) -> Result<StoredRule> {
        self.get(id)
            .ok_or_else(|| RuleError::RuleNotFound(id.to_string()))
    }

    /// 获取所有规则，按创建时间倒序
    pub fn list_all(&self) -> Vec<StoredRule> {
        let mut rules: Vec<StoredRule> = self.rules.iter().map(|r| r.value().clone()).collect();
        rules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{combine_rules, create_rule};

    #[test]
    fn test_insert_and_get() {
        let store = RuleStore::new();
        assert!(store.is_empty());

        let ast = create_rule("age > 30").unwrap();
        let stored = store.insert_rule("age > 30", &ast);

        assert_eq!(store.len(), 1);
        let fetched = store.get(&stored.id).unwrap();
        assert_eq!(
            fetched.source,
            RuleSource::Single {
                rule_string: "age > 30".to_string()
            }
        );
        assert_eq!(fetched.to_ast().unwrap(), ast);
    }

    #[test]
    fn test_insert_combined() {
        let store = RuleStore::new();
        let rules = vec!["age > 30".to_string(), "salary > 10".to_string()];
        let ast = combine_rules(&rules).unwrap();

        let stored = store.insert_combined(&rules, &ast);
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["kind"], "combined");
        assert_eq!(json["rule_strings"][1], "salary > 10");
        assert_eq!(json["ast"]["value"], "OR");
    }

    #[test]
    fn test_require_missing() {
        let store = RuleStore::new();
        let err = store.require(&Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), "RULE_NOT_FOUND");
    }

    #[test]
    fn test_list_all() {
        let store = RuleStore::new();
        let ast = create_rule("a > 1").unwrap();
        store.insert_rule("a > 1", &ast);
        store.insert_rule("a > 1", &ast);

        assert_eq!(store.list_all().len(), 2);
    }

    #[test]
    fn test_clone_shares_storage() {
        let store = RuleStore::new();
        let other = store.clone();
        let ast = create_rule("a > 1").unwrap();
        other.insert_rule("a > 1", &ast);
        assert_eq!(store.len(), 1);
    }
}
