//! Page windows for list and connection fields.
//!
//! Effective page size, in order of precedence:
//!
//! 1. the requested `first` / `limit`
//! 2. the type's declared default
//! 3. the configured global default (top-level fields only)
//!
//! and whatever is picked is clamped to the type's declared max, falling back
//! to the configured global max. A field with none of these is unlimited, as
//! is a nested field of a type without declared limits unless it asks for a
//! page size.

use serde_json::Value;

use super::errors::TranslatorError;
use super::TranslatorSettings;
use crate::cypher::ast::{Clause, Expr, OrderItem, WithClause};
use crate::cypher::ParamCollector;
use crate::schema_model::PaginationLimits;
use crate::selection::SelectionTree;
use crate::utils::cursor::{decode_cursor, encode_cursor, signature};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: Option<u64>,
    /// `after` could not be decoded for this connection; the page is empty
    pub cursor_rejected: bool,
    /// Cursor signature of the connection, empty when signing is off
    pub signature: String,
}

impl PageWindow {
    pub fn has_next_page(&self, returned: u64, total: u64) -> bool {
        !self.cursor_rejected && self.offset.saturating_add(returned) < total
    }

    pub fn has_previous_page(&self, total: u64) -> bool {
        if self.cursor_rejected {
            total > 0
        } else {
            self.offset > 0
        }
    }

    /// Cursor of the `index`-th row of the page.
    pub fn cursor_at(&self, index: u64) -> String {
        encode_cursor(&self.signature, self.offset.saturating_add(index))
    }

    pub fn is_unbounded(&self) -> bool {
        self.offset == 0 && self.limit.is_none()
    }
}

pub fn effective_limit(
    settings: &TranslatorSettings,
    limits: PaginationLimits,
    requested: Option<u64>,
    top_level: bool,
) -> Option<u64> {
    let fallback = if top_level { settings.default_limit } else { None };
    let chosen = requested.or(limits.default).or(fallback);
    // nested fields of types without declared limits are only cut on request
    let bounded = top_level || limits != PaginationLimits::default();
    match (chosen, limits.max.or(settings.max_limit)) {
        (Some(n), Some(max)) => Some(n.min(max)),
        (None, Some(max)) if bounded => Some(max),
        (chosen, _) => chosen,
    }
}

/// Signature over everything that determines the order of a connection.
pub fn connection_signature(
    settings: &TranslatorSettings,
    parent: &str,
    field: &SelectionTree,
) -> String {
    if !settings.cursor_signing {
        return String::new();
    }
    let text = |v: Option<&Value>| v.map(Value::to_string).unwrap_or_default();
    signature(&[
        parent,
        &field.field,
        &text(field.where_arg()),
        &text(field.sort_arg()),
    ])
}

/// Window of a connection field from `first` / `after`.
pub fn connection_window(
    settings: &TranslatorSettings,
    limits: PaginationLimits,
    field: &SelectionTree,
    parent: &str,
    top_level: bool,
) -> Result<PageWindow, TranslatorError> {
    let first = field.u64_argument("first").map_err(|e| {
        TranslatorError::from(e).in_field(field.response_key())
    })?;
    let after = field
        .after()
        .map_err(|e| TranslatorError::from(e).in_field(field.response_key()))?;
    let signature = connection_signature(settings, parent, field);
    let limit = effective_limit(settings, limits, first, top_level);

    let Some(cursor) = after else {
        return Ok(PageWindow {
            offset: 0,
            limit,
            cursor_rejected: false,
            signature,
        });
    };
    match decode_cursor(cursor, &signature) {
        Ok(position) => Ok(PageWindow {
            offset: position.saturating_add(1),
            limit,
            cursor_rejected: false,
            signature,
        }),
        Err(err) => {
            log::info!(
                "rejecting cursor on `{}`, returning an empty page: {}",
                field.response_key(),
                err
            );
            Ok(PageWindow {
                offset: 0,
                limit: Some(0),
                cursor_rejected: true,
                signature,
            })
        }
    }
}

/// Window of a plain list field from `limit` / `offset`.
pub fn list_window(
    settings: &TranslatorSettings,
    limits: PaginationLimits,
    field: &SelectionTree,
    top_level: bool,
) -> Result<PageWindow, TranslatorError> {
    let requested = field
        .u64_argument("limit")
        .map_err(|e| TranslatorError::from(e).in_field(field.response_key()))?;
    let offset = field
        .u64_argument("offset")
        .map_err(|e| TranslatorError::from(e).in_field(field.response_key()))?
        .unwrap_or(0);
    Ok(PageWindow {
        offset,
        limit: effective_limit(settings, limits, requested, top_level),
        cursor_rejected: false,
        signature: String::new(),
    })
}

/// `WITH * ORDER BY .. SKIP $o LIMIT $l`, or `None` when there is nothing
/// to order or cut.
pub fn window_clause(
    params: &mut ParamCollector,
    scope: &str,
    window: &PageWindow,
    order_by: Vec<OrderItem>,
) -> Option<Clause> {
    if order_by.is_empty() && window.is_unbounded() {
        return None;
    }
    let skip = (window.offset > 0)
        .then(|| Expr::param(params.bind(scope, "offset", Value::from(window.offset))));
    let limit = window
        .limit
        .map(|l| Expr::param(params.bind(scope, "limit", Value::from(l))));
    Some(Clause::With(WithClause {
        order_by,
        skip,
        limit,
        ..WithClause::star()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher::ToCypher;
    use serde_json::json;

    fn settings() -> TranslatorSettings {
        TranslatorSettings::default()
    }

    #[test]
    fn test_effective_limit_precedence() {
        let none = PaginationLimits::default();
        let declared = PaginationLimits {
            default: Some(5),
            max: Some(20),
        };
        let global = TranslatorSettings {
            default_limit: Some(50),
            max_limit: Some(100),
            ..settings()
        };

        assert_eq!(effective_limit(&settings(), none, None, true), None);
        assert_eq!(effective_limit(&settings(), none, Some(7), true), Some(7));
        assert_eq!(effective_limit(&settings(), declared, None, false), Some(5));
        assert_eq!(effective_limit(&settings(), declared, Some(70), true), Some(20));
        assert_eq!(effective_limit(&global, none, None, true), Some(50));
        assert_eq!(effective_limit(&global, none, Some(500), false), Some(100));
        // nested fields never take the global default or the global max
        assert_eq!(effective_limit(&global, none, None, false), None);
        assert_eq!(effective_limit(&global, none, Some(30), false), Some(30));
        assert_eq!(effective_limit(&global, declared, None, false), Some(5));
        let max_only = PaginationLimits {
            default: None,
            max: Some(20),
        };
        assert_eq!(effective_limit(&settings(), max_only, None, false), Some(20));
    }

    #[test]
    fn test_out_of_range_cursor_gives_empty_page() {
        let unsigned = TranslatorSettings {
            cursor_signing: false,
            ..settings()
        };
        let field = SelectionTree::new("moviesConnection")
            .with_argument("after", json!(encode_cursor("", u64::MAX)));
        let window =
            connection_window(&unsigned, PaginationLimits::default(), &field, "Query", true)
                .unwrap();
        assert!(window.cursor_rejected);
        assert_eq!(window.limit, Some(0));
    }

    #[test]
    fn test_last_representable_cursor() {
        let unsigned = TranslatorSettings {
            cursor_signing: false,
            ..settings()
        };
        let position = crate::utils::cursor::MAX_OFFSET - 1;
        let field = SelectionTree::new("moviesConnection")
            .with_argument("first", json!(5))
            .with_argument("after", json!(encode_cursor("", position)));
        let window =
            connection_window(&unsigned, PaginationLimits::default(), &field, "Query", true)
                .unwrap();
        assert!(!window.cursor_rejected);
        assert_eq!(window.offset, position + 1);
        assert!(!window.has_next_page(u64::MAX, u64::MAX));
        assert_eq!(window.cursor_at(u64::MAX), encode_cursor("", u64::MAX));
    }

    #[test]
    fn test_twenty_edges_in_four_windows() {
        let total = 20;
        let mut after: Option<String> = None;
        let mut seen = Vec::new();
        let mut has_next = Vec::new();

        for _ in 0..4 {
            let mut field = SelectionTree::new("actorsConnection").with_argument("first", json!(5));
            if let Some(cursor) = &after {
                field = field.with_argument("after", json!(cursor));
            }
            let window =
                connection_window(&settings(), PaginationLimits::default(), &field, "Movie", false)
                    .unwrap();
            let returned = window.limit.unwrap().min(total - window.offset);
            seen.extend(window.offset..window.offset + returned);
            has_next.push(window.has_next_page(returned, total));
            after = Some(window.cursor_at(returned - 1));
        }

        assert_eq!(seen, (0..20).collect::<Vec<_>>());
        assert_eq!(has_next, vec![true, true, true, false]);
    }

    #[test]
    fn test_cursor_from_other_connection_gives_empty_page() {
        let first_page = SelectionTree::new("actorsConnection")
            .with_argument("sort", json!([{"node": {"name": "ASC"}}]));
        let window =
            connection_window(&settings(), PaginationLimits::default(), &first_page, "Movie", false)
                .unwrap();
        let cursor = window.cursor_at(2);

        let resorted = SelectionTree::new("actorsConnection")
            .with_argument("sort", json!([{"node": {"name": "DESC"}}]))
            .with_argument("after", json!(cursor));
        let window =
            connection_window(&settings(), PaginationLimits::default(), &resorted, "Movie", false)
                .unwrap();
        assert!(window.cursor_rejected);
        assert_eq!(window.limit, Some(0));
        assert!(!window.has_next_page(0, 10));
        assert!(window.has_previous_page(10));
        assert!(!window.has_previous_page(0));
    }

    #[test]
    fn test_garbage_cursor_gives_empty_page() {
        let field = SelectionTree::new("moviesConnection").with_argument("after", json!("%%%"));
        let window =
            connection_window(&settings(), PaginationLimits::default(), &field, "Query", true)
                .unwrap();
        assert!(window.cursor_rejected);
    }

    #[test]
    fn test_list_window_and_clause() {
        let field = SelectionTree::new("movies")
            .with_argument("limit", json!(10))
            .with_argument("offset", json!(30));
        let window = list_window(&settings(), PaginationLimits::default(), &field, true).unwrap();
        assert_eq!((window.offset, window.limit), (30, Some(10)));

        let mut params = ParamCollector::new();
        let clause = window_clause(&mut params, "this", &window, Vec::new()).unwrap();
        assert_eq!(
            clause.to_cypher(),
            "WITH * SKIP $this_offset LIMIT $this_limit"
        );
        assert_eq!(params.get("this_limit"), Some(&json!(10)));

        let unbounded = PageWindow::default();
        assert!(window_clause(&mut params, "this", &unbounded, Vec::new()).is_none());
    }
}
