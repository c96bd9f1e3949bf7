//! Content-script decision logic.
//!
//! On every page load the content script asks the background runtime four
//! questions in one batch (see [`page_queries`]) and then decides whether the
//! spoofed user-agent must also be visible to page JavaScript.  The actual
//! override of `navigator.userAgent` is performed by an [`Injector`], which is
//! an external collaborator.

use serde_json::{json, Value};

use crate::protocol::request::{Request, Response};

/// The batch sent by the content script, in answer order.
pub fn page_queries(uri: &str) -> Vec<Request> {
    vec![
        Request::new("settings.getEnabled"),
        Request::new("settings.getJavascriptProtectionEnabled"),
        Request::new("useragent.get"),
        Request::with_data("exceptions.uriMatch", json!({ "uri": uri })),
    ]
}

/// What the background runtime reported about the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub enabled: bool,
    pub javascript_protection: bool,
    pub useragent: Option<String>,
    /// `true` unless the exception check explicitly answered `false`.
    pub excepted: bool,
}

impl PageState {
    /// Interprets the answers to [`page_queries`].
    ///
    /// Only exact booleans count: a missing or malformed slot is treated as
    /// the safe answer (disabled / excepted).
    pub fn from_responses(responses: &[Response]) -> Self {
        let slot = |i: usize| responses.get(i).and_then(Option::as_ref);
        Self {
            enabled: slot(0) == Some(&Value::Bool(true)),
            javascript_protection: slot(1) == Some(&Value::Bool(true)),
            useragent: slot(2)
                .and_then(Value::as_str)
                .filter(|ua| !ua.is_empty())
                .map(str::to_string),
            excepted: slot(3) != Some(&Value::Bool(false)),
        }
    }

    /// Returns the injection to perform, if any.
    pub fn plan(&self) -> Option<InjectionPlan> {
        if !self.enabled || !self.javascript_protection || self.excepted {
            return None;
        }
        self.useragent.as_deref().map(InjectionPlan::new)
    }
}

/// A user-agent override to apply inside a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPlan {
    pub useragent: String,
    /// `useragent` escaped for embedding in a quoted script literal.
    pub script_literal: String,
}

impl InjectionPlan {
    pub fn new(useragent: &str) -> Self {
        Self {
            useragent: useragent.to_string(),
            script_literal: escape_script_literal(useragent),
        }
    }
}

/// Prefixes every `"` and `'` with a backslash.
pub fn escape_script_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '"' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Applies an [`InjectionPlan`] to the page (overrides `navigator.userAgent`
/// and `navigator.appVersion`).
#[cfg_attr(test, mockall::automock)]
pub trait Injector: Send + Sync {
    fn inject(&self, plan: &InjectionPlan);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(enabled: bool, protection: bool, ua: Value, uri_match: Value) -> Vec<Response> {
        vec![
            Some(Value::Bool(enabled)),
            Some(Value::Bool(protection)),
            Some(ua),
            Some(uri_match),
        ]
    }

    #[test]
    fn test_page_queries_ask_four_questions_in_order() {
        let queries = page_queries("https://example.com/");
        let actions: Vec<&str> = queries.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(
            actions,
            vec![
                "settings.getEnabled",
                "settings.getJavascriptProtectionEnabled",
                "useragent.get",
                "exceptions.uriMatch"
            ]
        );
        assert_eq!(queries[3].params().get("uri"), Some(&json!("https://example.com/")));
    }

    #[test]
    fn test_plan_when_everything_allows_injection() {
        // Arrange
        let state = PageState::from_responses(&answers(true, true, json!("UA/1"), json!(false)));

        // Act
        let plan = state.plan();

        // Assert
        assert_eq!(plan, Some(InjectionPlan::new("UA/1")));
    }

    #[test]
    fn test_no_plan_when_disabled() {
        let state = PageState::from_responses(&answers(false, true, json!("UA/1"), json!(false)));
        assert_eq!(state.plan(), None);
    }

    #[test]
    fn test_no_plan_when_protection_off() {
        let state = PageState::from_responses(&answers(true, false, json!("UA/1"), json!(false)));
        assert_eq!(state.plan(), None);
    }

    #[test]
    fn test_no_plan_when_uri_is_excepted_or_unknown() {
        let excepted = PageState::from_responses(&answers(true, true, json!("UA/1"), json!(true)));
        let unknown = PageState::from_responses(&[Some(json!(true)), Some(json!(true)), Some(json!("UA/1")), None]);
        assert_eq!(excepted.plan(), None);
        assert_eq!(unknown.plan(), None);
    }

    #[test]
    fn test_no_plan_for_empty_or_missing_useragent() {
        let empty = PageState::from_responses(&answers(true, true, json!(""), json!(false)));
        let null = PageState::from_responses(&answers(true, true, Value::Null, json!(false)));
        assert_eq!(empty.plan(), None);
        assert_eq!(null.plan(), None);
    }

    #[test]
    fn test_escape_script_literal_escapes_both_quote_kinds() {
        assert_eq!(escape_script_literal(r#"a"b'c"#), r#"a\"b\'c"#);
        assert_eq!(escape_script_literal("plain"), "plain");
    }

    #[test]
    fn test_mock_injector_receives_plan() {
        // Arrange
        let mut injector = MockInjector::new();
        injector
            .expect_inject()
            .withf(|plan| plan.useragent == "UA/2")
            .times(1)
            .return_const(());
        let state = PageState::from_responses(&answers(true, true, json!("UA/2"), json!(false)));

        // Act
        if let Some(plan) = state.plan() {
            injector.inject(&plan);
        }
    }
}
