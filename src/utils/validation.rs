// 表单校验
// 所有写操作在访问数据库前先在这里校验输入

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

/// 校验一组邮箱，返回去掉首尾空白后的结果
pub fn validate_emails(emails: &[String], message: &str) -> AppResult<Vec<String>> {
    emails
        .iter()
        .map(|email| {
            let email = email.trim();
            if is_valid_email(email) {
                Ok(email.to_string())
            } else {
                Err(AppError::InvalidData(message.to_string()))
            }
        })
        .collect()
}

pub fn validate_email(email: &str, message: &str) -> AppResult<String> {
    let email = email.trim();
    if is_valid_email(email) {
        Ok(email.to_string())
    } else {
        Err(AppError::InvalidData(message.to_string()))
    }
}

pub fn require_non_empty(value: &str, message: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(AppError::InvalidData(message.to_string()))
    } else {
        Ok(value.to_string())
    }
}

pub fn parse_uuid(value: &str, message: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value.trim()).map_err(|_| AppError::InvalidData(message.to_string()))
}

/// 解析俱乐部详情。表单提交的是 JSON 字符串，缺省为 `{}`。
/// 数字和布尔值按文本保存，嵌套结构和 null 视为格式错误。
pub fn parse_details(raw: Option<&str>) -> AppResult<BTreeMap<String, String>> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("{}");
    let invalid = || AppError::InvalidData("Invalid details format.".to_string());

    let Value::Object(map) = serde_json::from_str::<Value>(raw).map_err(|_| invalid())? else {
        return Err(invalid());
    };

    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            Value::Number(n) => Ok((key, n.to_string())),
            Value::Bool(b) => Ok((key, b.to_string())),
            _ => Err(invalid()),
        })
        .collect()
}

/// 按首次出现顺序去重
pub fn dedup_emails<I, S>(emails: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    emails
        .into_iter()
        .map(Into::into)
        .filter(|email| seen.insert(email.clone()))
        .collect()
}
