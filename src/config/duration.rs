//! # 时长窗口格式校验
//!
//! 团队限流窗口与用量查询范围共用同一格式：`^[0-9]+(s|m|h|d|w|y)$`。

use regex::Regex;
use std::sync::LazyLock;

static DURATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(s|m|h|d|w|y)$").unwrap());

/// 校验时长字符串是否符合窗口格式
#[must_use]
pub fn is_valid_duration(value: &str) -> bool {
    DURATION_PATTERN.is_match(value)
}
