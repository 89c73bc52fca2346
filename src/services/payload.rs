//! Aladin bestseller payload parsing
//!
//! The ItemList endpoint answers with a JSON document whose `item` array is
//! ranked, first entry being the current bestseller. Aladin escapes single
//! quotes as `\'`, which is not valid JSON, so bodies are normalized before
//! being handed to serde.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    models::{Genre, NewBook},
};

#[derive(Debug, Deserialize)]
struct ItemListResponse {
    #[serde(default)]
    item: Vec<ItemListEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemListEntry {
    title: Option<String>,
    author: Option<String>,
    publisher: Option<String>,
    pub_date: Option<String>,
    description: Option<String>,
    cover: Option<String>,
    isbn: Option<String>,
    isbn13: Option<String>,
    item_id: Option<i64>,
}

/// Replace Aladin's `\'` escapes with plain quotes.
///
/// A quote is only unescaped when preceded by an odd run of backslashes, so
/// an escaped backslash followed by a quote (`\\'`) is left intact.
pub fn normalize_body(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut backslashes = 0usize;

    for c in body.chars() {
        if c == '\'' && backslashes % 2 == 1 {
            out.pop();
        }
        if c == '\\' {
            backslashes += 1;
        } else {
            backslashes = 0;
        }
        out.push(c);
    }

    out
}

/// Keep only the characters that may appear in an ISBN
fn sanitize_isbn(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Check the shape of a raw body: JSON, no `errorCode`, non-empty `item` array
pub fn validate_response(body: &str) -> AppResult<()> {
    let value: Value = serde_json::from_str(&normalize_body(body))
        .map_err(|e| AppError::CatalogMalformedResponse(format!("body is not JSON: {}", e)))?;

    if let Some(code) = value.get("errorCode") {
        let message = value
            .get("errorMessage")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(AppError::CatalogMalformedResponse(format!(
            "catalog error {}: {}",
            code, message
        )));
    }

    match value.get("item").and_then(Value::as_array) {
        Some(items) if !items.is_empty() => Ok(()),
        Some(_) => Err(AppError::CatalogMalformedResponse(
            "item list is empty".to_string(),
        )),
        None => Err(AppError::CatalogMalformedResponse(
            "item list is missing".to_string(),
        )),
    }
}

fn first_entry(payload: &str) -> AppResult<ItemListEntry> {
    let response: ItemListResponse = serde_json::from_str(&normalize_body(payload))
        .map_err(|e| AppError::Parse(format!("invalid bestseller payload: {}", e)))?;

    response
        .item
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Parse("bestseller payload has no items".to_string()))
}

fn entry_code(entry: &ItemListEntry) -> Option<String> {
    [entry.isbn13.as_deref(), entry.isbn.as_deref()]
        .into_iter()
        .flatten()
        .map(sanitize_isbn)
        .find(|code| !code.is_empty())
}

/// Identifying code (ISBN-13, falling back to ISBN-10) of the top-ranked title
pub fn extract_identifying_code(payload: &str) -> AppResult<String> {
    let entry = first_entry(payload)?;
    entry_code(&entry)
        .ok_or_else(|| AppError::Parse("top-ranked title carries no isbn".to_string()))
}

/// Build an unsaved book from the top-ranked title.
///
/// `force_new` lets the store insert the book even though a row with the
/// same isbn already exists (it belongs to another genre).
pub fn materialize_book(
    payload: &str,
    genre: Genre,
    mark_bestseller: bool,
    force_new: bool,
) -> AppResult<NewBook> {
    let entry = first_entry(payload)?;
    let isbn = entry_code(&entry)
        .ok_or_else(|| AppError::Parse("top-ranked title carries no isbn".to_string()))?;
    let title = non_blank(entry.title)
        .ok_or_else(|| AppError::Parse(format!("title missing for isbn {}", isbn)))?;

    let published_at = entry
        .pub_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());

    Ok(NewBook {
        isbn,
        genre,
        best_seller: mark_bestseller,
        title,
        author: non_blank(entry.author),
        publisher: non_blank(entry.publisher),
        published_at,
        description: non_blank(entry.description),
        image_url: non_blank(entry.cover),
        aladin_item_id: entry.item_id,
        force_new,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "version": "20131101",
        "title": "알라딘 베스트셀러 리스트 - 소설/시/희곡",
        "totalResults": 2,
        "item": [
            {
                "title": "The Vegetarian",
                "author": "Han Kang (지은이)",
                "pubDate": "2022-03-28",
                "description": "A novel about Yeong-hye\'s refusal",
                "isbn": "8936434594",
                "isbn13": "9788936434595",
                "itemId": 294641233,
                "cover": "https://image.aladin.co.kr/product/cover.jpg",
                "publisher": "Changbi",
                "bestRank": 1
            },
            {
                "title": "Second",
                "isbn13": "9780000000002"
            }
        ]
    }"#;

    #[test]
    fn test_normalize_unescapes_single_quotes() {
        assert_eq!(normalize_body(r#"a\'b"#), "a'b");
        assert_eq!(normalize_body(r#"a\\\'b"#), r#"a\\'b"#);
    }

    #[test]
    fn test_normalize_keeps_escaped_backslash_before_quote() {
        assert_eq!(normalize_body(r#"a\\'b"#), r#"a\\'b"#);

        let body = r#"{"item":[{"title":"a\\'b","isbn13":"9781111111111"}]}"#;
        assert!(validate_response(body).is_ok());
        let book = materialize_book(body, Genre::Fiction, true, false).unwrap();
        assert_eq!(book.title, r"a\'b");
    }

    #[test]
    fn test_extract_code_prefers_isbn13() {
        assert_eq!(extract_identifying_code(PAYLOAD).unwrap(), "9788936434595");
    }

    #[test]
    fn test_extract_code_falls_back_to_isbn10() {
        let payload = r#"{"item":[{"title":"Old","isbn":"89-364-3459-4","isbn13":""}]}"#;
        assert_eq!(extract_identifying_code(payload).unwrap(), "8936434594");
    }

    #[test]
    fn test_extract_code_without_isbn_fails() {
        let payload = r#"{"item":[{"title":"No code"}]}"#;
        assert!(matches!(extract_identifying_code(payload), Err(AppError::Parse(_))));
    }

    #[test]
    fn test_extract_code_from_empty_list_fails() {
        assert!(matches!(extract_identifying_code(r#"{"item":[]}"#), Err(AppError::Parse(_))));
        assert!(matches!(extract_identifying_code("not json"), Err(AppError::Parse(_))));
    }

    #[test]
    fn test_materialize_book_from_first_entry() {
        let book = materialize_book(PAYLOAD, Genre::Fiction, true, false).unwrap();
        assert_eq!(book.isbn, "9788936434595");
        assert_eq!(book.title, "The Vegetarian");
        assert_eq!(book.genre, Genre::Fiction);
        assert!(book.best_seller);
        assert!(!book.force_new);
        assert_eq!(book.author.as_deref(), Some("Han Kang (지은이)"));
        assert_eq!(book.published_at, NaiveDate::from_ymd_opt(2022, 3, 28));
        assert_eq!(book.aladin_item_id, Some(294641233));
        assert_eq!(
            book.description.as_deref(),
            Some("A novel about Yeong-hye's refusal")
        );
    }

    #[test]
    fn test_materialize_book_keeps_force_new() {
        let book = materialize_book(PAYLOAD, Genre::ScienceFiction, true, true).unwrap();
        assert!(book.force_new);
        assert_eq!(book.genre, Genre::ScienceFiction);
    }

    #[test]
    fn test_materialize_book_ignores_bad_date() {
        let payload = r#"{"item":[{"title":"T","isbn13":"9781111111111","pubDate":"soon"}]}"#;
        let book = materialize_book(payload, Genre::Essay, true, false).unwrap();
        assert!(book.published_at.is_none());
    }

    #[test]
    fn test_materialize_book_requires_title() {
        let payload = r#"{"item":[{"title":"  ","isbn13":"9781111111111"}]}"#;
        assert!(matches!(
            materialize_book(payload, Genre::Essay, true, false),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_response() {
        assert!(validate_response(PAYLOAD).is_ok());

        let error = r#"{"errorCode": 100, "errorMessage": "잘못된 TTBKey 입니다."}"#;
        assert!(matches!(
            validate_response(error),
            Err(AppError::CatalogMalformedResponse(_))
        ));
        assert!(matches!(
            validate_response(r#"{"item": []}"#),
            Err(AppError::CatalogMalformedResponse(_))
        ));
        assert!(matches!(
            validate_response(r#"{"title": "x"}"#),
            Err(AppError::CatalogMalformedResponse(_))
        ));
        assert!(matches!(
            validate_response("<html>"),
            Err(AppError::CatalogMalformedResponse(_))
        ));
    }
}
