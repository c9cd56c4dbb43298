//! 每页条数代码与分页元数据 / Page-size codes and page metadata

use serde::Serialize;
use utoipa::ToSchema;

pub const DEFAULT_PER_PAGE: i64 = 25;
pub const DEFAULT_PAGE_SIZE_CODE: &str = "1";

/// 规范化每页条数代码，未知或缺省时为 "1"
pub fn page_size_code(code: Option<&str>) -> &'static str {
    match code.map(str::trim) {
        Some("2") => "2",
        Some("3") => "3",
        Some("4") => "4",
        _ => DEFAULT_PAGE_SIZE_CODE,
    }
}

/// 每页条数代码表："1"→25，"2"→50，"3"→100，"4"→全部
/// 未知或缺省代码使用 25
pub fn per_page_for(code: Option<&str>, total_users: i64) -> i64 {
    match page_size_code(code) {
        "2" => 50,
        "3" => 100,
        "4" => total_users.max(1),
        _ => DEFAULT_PER_PAGE,
    }
}

/// 页码，非数字或小于 1 时为 1
pub fn page_number(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageMeta {
    pub page: i64,
    /// 每页条数代码，翻页链接原样带回
    pub records_per_page: String,
    pub per_page: i64,
    pub total_entries: i64,
    pub total_pages: i64,
    /// RFC 5988 Link 头的值
    pub link: String,
}

impl PageMeta {
    pub fn new(base_url: &str, page: i64, code: Option<&str>, total_entries: i64) -> Self {
        let code = page_size_code(code);
        let per_page = per_page_for(Some(code), total_entries);
        let total_pages = ((total_entries + per_page - 1) / per_page).max(1);
        Self {
            page,
            records_per_page: code.to_string(),
            per_page,
            total_entries,
            total_pages,
            link: build_link_header(base_url, page, code, total_pages),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// 构建 Link 头 / Build the Link header value
pub fn build_link_header(base_url: &str, page: i64, code: &str, last: i64) -> String {
    let link = |p: i64, rel: &str| {
        format!(
            "<{}?page={}&records_per_page={}>; rel=\"{}\"",
            base_url, p, code, rel
        )
    };
    let mut links = vec![link(1, "first"), link(last, "last")];
    if page < last {
        links.push(link(page + 1, "next"));
    }
    if page > 1 {
        links.push(link(page - 1, "prev"));
    }
    links.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_page_sizes() {
        assert_eq!(per_page_for(Some("1"), 500), 25);
        assert_eq!(per_page_for(Some("2"), 500), 50);
        assert_eq!(per_page_for(Some("3"), 500), 100);
        assert_eq!(per_page_for(Some("4"), 500), 500);
        assert_eq!(per_page_for(Some("4"), 0), 1);
        assert_eq!(per_page_for(Some("9"), 500), 25);
        assert_eq!(per_page_for(None, 500), 25);
    }

    #[test]
    fn page_defaults_to_one() {
        assert_eq!(page_number(None), 1);
        assert_eq!(page_number(Some("abc")), 1);
        assert_eq!(page_number(Some("0")), 1);
        assert_eq!(page_number(Some("3")), 3);
    }

    #[test]
    fn test_link_header_build() {
        let meta = PageMeta::new("/users/list", 2, Some("2"), 195);
        assert_eq!(meta.per_page, 50);
        assert_eq!(meta.total_pages, 4);
        assert_eq!(meta.offset(), 50);
        assert!(meta
            .link
            .contains("</users/list?page=3&records_per_page=2>; rel=\"next\""));
        assert!(meta
            .link
            .contains("</users/list?page=1&records_per_page=2>; rel=\"prev\""));
        assert!(meta
            .link
            .contains("</users/list?page=4&records_per_page=2>; rel=\"last\""));
    }

    #[test]
    fn unknown_code_links_with_default_code() {
        let meta = PageMeta::new("/users/list", 1, Some("9"), 60);
        assert_eq!(meta.records_per_page, "1");
        assert_eq!(meta.per_page, 25);
        assert!(meta.link.contains("page=2&records_per_page=1>; rel=\"next\""));
    }

    #[test]
    fn last_page_has_no_next() {
        let meta = PageMeta::new("/users/list", 1, None, 10);
        assert_eq!(meta.total_pages, 1);
        assert!(!meta.link.contains("rel=\"next\""));
        assert!(!meta.link.contains("rel=\"prev\""));
    }
}
