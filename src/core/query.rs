use crate::domain::model::{ListQuery, Page, Record, SortKey};
use serde_json::Value;
use std::cmp::Ordering;

/// 解析 `limit`、`page`、`search`、`sort` 查詢參數
///
/// 無法解析或為 0 的 `limit`/`page` 會退回預設值，其餘未知參數忽略。
pub fn parse_list_query(query: Option<&str>, default_limit: usize) -> ListQuery {
    let mut list_query = ListQuery {
        limit: default_limit,
        ..ListQuery::default()
    };

    let Some(query) = query else {
        return list_query;
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "limit" => {
                if let Some(limit) = parse_positive(&value) {
                    list_query.limit = limit;
                }
            }
            "page" => {
                if let Some(page) = parse_positive(&value) {
                    list_query.page = page;
                }
            }
            "search" => {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    list_query.search = Some(trimmed.to_string());
                }
            }
            "sort" => list_query.sort = SortKey::parse(&value),
            _ => {}
        }
    }

    list_query
}

fn parse_positive(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

/// 在記憶體中套用搜尋、排序與分頁，回傳分頁信封
pub fn apply(records: Vec<Record>, query: &ListQuery) -> Page {
    let mut filtered = filter_search(records, query.search.as_deref());

    if let Some(sort) = &query.sort {
        sort_records(&mut filtered, sort);
    }

    let total = filtered.len();
    let data = filtered
        .into_iter()
        .skip(query.offset())
        .take(query.limit)
        .collect();

    Page {
        data,
        total,
        page: query.page,
        limit: query.limit,
    }
}

pub fn filter_search(records: Vec<Record>, search: Option<&str>) -> Vec<Record> {
    match search {
        Some(needle) => {
            let needle = needle.to_lowercase();
            records
                .into_iter()
                .filter(|record| record.matches_search(&needle))
                .collect()
        }
        None => records,
    }
}

/// 穩定排序；缺少該欄位的紀錄不論方向都排在最後
pub fn sort_records(records: &mut [Record], sort: &SortKey) {
    records.sort_by(|a, b| {
        match (a.get(&sort.field), b.get(&sort.field)) {
            (Some(x), Some(y)) => {
                let ordering = compare_values(x, y);
                if sort.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        // 型別不同時以字串表示比較
        _ => a.to_string().cmp(&b.to_string()),
    }
}
