//! Localized envelope messages
//!
//! The `message` field of every envelope is a short summary taken from this
//! catalogue in the language negotiated for the request. The `error` field
//! keeps the specific reason and is not translated. Log lines stay English.
//!
//! The negotiated language lives in task-local storage next to the request
//! id; see [`crate::middleware::locale_middleware`].

use roster_core::Language;
use std::future::Future;
use tokio::task_local;

task_local! {
    static LANGUAGE: Language;
}

/// Catalogue entry for a client-facing summary message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Retrieved,
    Created,
    Registered,
    LoggedIn,
    TokenRefreshed,
    Updated,
    NothingToUpdate,
    Deleted,
    ServiceHealthy,
    BadRequest,
    Conflict,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    RequestTimeout,
    PayloadTooLarge,
    UnsupportedMediaType,
    ServiceUnavailable,
    InternalError,
}

impl MessageKey {
    pub fn text(self, language: Language) -> &'static str {
        match language {
            Language::En => self.english(),
            Language::Zh => self.chinese(),
        }
    }

    /// Text in the language of the request being handled
    pub fn localized(self) -> &'static str {
        self.text(current_language())
    }

    fn english(self) -> &'static str {
        match self {
            Self::Retrieved => "Retrieved successfully",
            Self::Created => "Created successfully",
            Self::Registered => "Registration successful",
            Self::LoggedIn => "Login successful",
            Self::TokenRefreshed => "Token refreshed",
            Self::Updated => "Updated successfully",
            Self::NothingToUpdate => "Nothing to update",
            Self::Deleted => "Deleted successfully",
            Self::ServiceHealthy => "Service is running normally",
            Self::BadRequest => "Bad request",
            Self::Conflict => "Resource already exists",
            Self::Unauthorized => "Authentication failed",
            Self::Forbidden => "Permission denied",
            Self::NotFound => "Resource not found",
            Self::MethodNotAllowed => "Method not allowed",
            Self::RequestTimeout => "Request timeout",
            Self::PayloadTooLarge => "Payload too large",
            Self::UnsupportedMediaType => "Unsupported media type",
            Self::ServiceUnavailable => "Service temporarily unavailable",
            Self::InternalError => "Internal server error",
        }
    }

    fn chinese(self) -> &'static str {
        match self {
            Self::Retrieved => "获取成功",
            Self::Created => "创建成功",
            Self::Registered => "注册成功",
            Self::LoggedIn => "登录成功",
            Self::TokenRefreshed => "令牌刷新成功",
            Self::Updated => "更新成功",
            Self::NothingToUpdate => "没有需要更新的内容",
            Self::Deleted => "删除成功",
            Self::ServiceHealthy => "服务运行正常",
            Self::BadRequest => "请求参数错误",
            Self::Conflict => "资源已存在",
            Self::Unauthorized => "认证失败",
            Self::Forbidden => "权限不足",
            Self::NotFound => "资源不存在",
            Self::MethodNotAllowed => "请求方法不允许",
            Self::RequestTimeout => "请求超时",
            Self::PayloadTooLarge => "请求体过大",
            Self::UnsupportedMediaType => "不支持的媒体类型",
            Self::ServiceUnavailable => "服务暂时不可用",
            Self::InternalError => "内部服务器错误",
        }
    }
}

/// Language of the request being handled, English outside any request
pub fn current_language() -> Language {
    LANGUAGE.try_with(|language| *language).unwrap_or_default()
}

/// Run `fut` with `language` in scope
pub async fn with_language<F: Future>(language: Language, fut: F) -> F::Output {
    LANGUAGE.scope(language, fut).await
}

/// Pick the preferred supported language from an `Accept-Language` value.
///
/// Highest quality wins and earlier entries win ties. `*` stands for
/// `fallback`, as does a missing header or one naming nothing supported.
pub fn negotiate(accept_language: Option<&str>, fallback: Language) -> Language {
    let Some(value) = accept_language else {
        return fallback;
    };

    let mut best: Option<(Language, f32)> = None;
    for entry in value.split(',') {
        let mut parts = entry.split(';');
        let tag = parts.next().unwrap_or_default().trim();
        let quality = parts
            .find_map(|param| param.trim().strip_prefix("q="))
            .and_then(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        if quality <= 0.0 {
            continue;
        }

        let language = if tag == "*" {
            fallback
        } else {
            match Language::from_tag(tag) {
                Some(language) => language,
                None => continue,
            }
        };

        if best.map_or(true, |(_, q)| quality > q) {
            best = Some((language, quality));
        }
    }

    best.map_or(fallback, |(language, _)| language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_languages_have_text() {
        assert_eq!(MessageKey::LoggedIn.text(Language::En), "Login successful");
        assert_eq!(MessageKey::LoggedIn.text(Language::Zh), "登录成功");
        assert_eq!(MessageKey::InternalError.text(Language::Zh), "内部服务器错误");
    }

    #[test]
    fn test_negotiate_prefers_highest_quality() {
        assert_eq!(negotiate(Some("zh-CN,zh;q=0.9,en;q=0.8"), Language::En), Language::Zh);
        assert_eq!(negotiate(Some("zh;q=0.4, en-GB;q=0.7"), Language::Zh), Language::En);
        assert_eq!(negotiate(Some("en, zh"), Language::Zh), Language::En);
    }

    #[test]
    fn test_negotiate_falls_back() {
        assert_eq!(negotiate(None, Language::Zh), Language::Zh);
        assert_eq!(negotiate(Some("fr-FR, de;q=0.5"), Language::Zh), Language::Zh);
        assert_eq!(negotiate(Some("*"), Language::Zh), Language::Zh);
        assert_eq!(negotiate(Some("zh;q=0"), Language::En), Language::En);
        assert_eq!(negotiate(Some(""), Language::En), Language::En);
    }

    #[tokio::test]
    async fn test_localized_follows_scope() {
        assert_eq!(MessageKey::Deleted.localized(), "Deleted successfully");

        let text = with_language(Language::Zh, async { MessageKey::Deleted.localized() }).await;
        assert_eq!(text, "删除成功");
    }
}
