//! 按模型分组与版本排序
//!
//! 纯函数，只读地处理记录快照。

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::BenchmarkRecord;

/// 同一模型的版本组
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedModel {
    /// 模型名，缺失模型的记录归入空字符串组
    pub model: String,
    /// 最新版本（`all_versions[0]`）
    pub latest_data: BenchmarkRecord,
    pub created_at: DateTime<Utc>,
    /// 按 createdAt 降序、id 降序排列
    pub all_versions: Vec<BenchmarkRecord>,
    pub has_multiple_versions: bool,
}

/// 新的在前：createdAt 降序，相同时 id 降序
fn recency(a: &BenchmarkRecord, b: &BenchmarkRecord) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// 按模型名精确分组
///
/// 输出与输入顺序无关：组内按 [`recency`] 排序，组间按最新版本排序
pub fn group_by_model(records: Vec<BenchmarkRecord>) -> Vec<GroupedModel> {
    let mut buckets: HashMap<String, Vec<BenchmarkRecord>> = HashMap::new();
    for record in records {
        buckets
            .entry(record.model_key().to_string())
            .or_default()
            .push(record);
    }

    let mut groups: Vec<GroupedModel> = buckets
        .into_iter()
        .filter_map(|(model, mut versions)| {
            versions.sort_by(recency);
            let latest_data = versions.first()?.clone();
            Some(GroupedModel {
                model,
                created_at: latest_data.created_at,
                latest_data,
                has_multiple_versions: versions.len() > 1,
                all_versions: versions,
            })
        })
        .collect();

    groups.sort_by(|a, b| recency(&a.latest_data, &b.latest_data));
    groups
}

/// 按模型名子串过滤（不区分大小写），空白关键字返回原列表
pub fn filter_by_search_term(groups: Vec<GroupedModel>, term: &str) -> Vec<GroupedModel> {
    let term = term.trim();
    if term.is_empty() {
        return groups;
    }
    let needle = term.to_lowercase();
    groups
        .into_iter()
        .filter(|g| g.model.to_lowercase().contains(&needle))
        .collect()
}

/// 仅保留最新版本或任一历史版本被收藏的组
pub fn filter_by_favorite(groups: Vec<GroupedModel>, only_favorites: bool) -> Vec<GroupedModel> {
    if !only_favorites {
        return groups;
    }
    groups
        .into_iter()
        .filter(|g| g.latest_data.favorite || g.all_versions.iter().any(|r| r.favorite))
        .collect()
}

/// 指定模型的最新记录
pub fn latest_for_model<'a>(
    records: &'a [BenchmarkRecord],
    model: &str,
) -> Option<&'a BenchmarkRecord> {
    records
        .iter()
        .filter(|r| r.model_key() == model)
        .min_by(|a, b| recency(a, b))
}

/// 按创建时间降序排列记录（列表接口使用）
pub fn sort_by_recency(records: &mut [BenchmarkRecord]) {
    records.sort_by(recency);
}

/// 截取第 `page` 页（从 1 开始）
pub fn paginate<T: Clone>(items: &[T], page: u32, limit: u32) -> Vec<T> {
    let limit = limit.max(1) as usize;
    let start = (page.max(1) as usize - 1).saturating_mul(limit);
    items.iter().skip(start).take(limit).cloned().collect()
}
