use axum::{
    http::{HeaderName, HeaderValue},
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::cart::MAX_LINE_QUANTITY;

/// Header carrying the cart badge count alongside every cart fragment
pub const CART_COUNT_HEADER: &str = "x-cart-count";

/// `{ok: true, request_id}` body returned when a request is created
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedRequestResponse {
    pub ok: bool,
    pub request_id: Uuid,
}

impl CreatedRequestResponse {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            ok: true,
            request_id,
        }
    }
}

/// HTML fragment with the cart badge count in a header
pub fn cart_fragment_response(html: String, item_count: i64) -> Response {
    let mut response = Html(html).into_response();
    response.headers_mut().insert(
        HeaderName::from_static(CART_COUNT_HEADER),
        HeaderValue::from(item_count),
    );
    response
}

/// Parses a required form id field.
pub fn require_uuid(field: &str, raw: Option<&str>) -> Result<Uuid, ServiceError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ServiceError::ValidationError(format!("Missing {field}")))?;

    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::ValidationError(format!("Malformed {field}: {raw}")))
}

/// Parses an optional quantity field; absent or blank means one.
///
/// Quantities above [`MAX_LINE_QUANTITY`] are rejected rather than stored.
pub fn parse_quantity(raw: Option<&str>) -> Result<i32, ServiceError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(1),
        Some(value) => match numeric_quantity(value) {
            Some(quantity) => bounded_quantity(quantity),
            None => Err(ServiceError::ValidationError(format!(
                "Malformed qty: {value}"
            ))),
        },
    }
}

/// Like [`parse_quantity`], but text that is not a number counts as one.
pub fn parse_quantity_or_one(raw: Option<&str>) -> Result<i32, ServiceError> {
    match raw.map(str::trim).and_then(numeric_quantity) {
        Some(quantity) => bounded_quantity(quantity),
        None => Ok(1),
    }
}

/// Signed decimal digits, saturated to the i64 range.
fn numeric_quantity(value: &str) -> Option<i64> {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let saturated = if value.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    };
    Some(value.parse::<i64>().unwrap_or(saturated))
}

fn bounded_quantity(quantity: i64) -> Result<i32, ServiceError> {
    if quantity > i64::from(MAX_LINE_QUANTITY) {
        return Err(ServiceError::ValidationError(format!(
            "qty must be at most {MAX_LINE_QUANTITY}"
        )));
    }
    // Anything below i32 range removes or clamps the line the same way zero does.
    Ok(i32::try_from(quantity).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn missing_or_blank_ids_are_validation_errors() {
        assert_matches!(
            require_uuid("item_id", None),
            Err(ServiceError::ValidationError(msg)) if msg == "Missing item_id"
        );
        assert_matches!(
            require_uuid("item_id", Some("  ")),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            require_uuid("item_id", Some("not-a-uuid")),
            Err(ServiceError::ValidationError(_))
        );

        let id = Uuid::new_v4();
        assert_eq!(require_uuid("item_id", Some(&id.to_string())).unwrap(), id);
    }

    #[test]
    fn quantity_defaults_to_one() {
        assert_eq!(parse_quantity(None).unwrap(), 1);
        assert_eq!(parse_quantity(Some("")).unwrap(), 1);
        assert_eq!(parse_quantity(Some(" 3 ")).unwrap(), 3);
        assert_eq!(parse_quantity(Some("-2")).unwrap(), -2);
        assert!(parse_quantity(Some("two")).is_err());
    }

    #[test]
    fn oversized_quantities_are_rejected() {
        assert_eq!(parse_quantity(Some("999")).unwrap(), MAX_LINE_QUANTITY);
        assert_matches!(
            parse_quantity(Some("1000")),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            parse_quantity(Some("2147483647")),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            parse_quantity(Some("99999999999999999999999")),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(parse_quantity(Some("-99999999999999999999999")).unwrap(), 0);
    }

    #[test]
    fn lenient_quantity_only_forgives_non_numbers() {
        assert_eq!(parse_quantity_or_one(Some("lots")).unwrap(), 1);
        assert_eq!(parse_quantity_or_one(None).unwrap(), 1);
        assert_eq!(parse_quantity_or_one(Some("4")).unwrap(), 4);
        assert_matches!(
            parse_quantity_or_one(Some("2147483647")),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn fragment_response_carries_count_header() {
        let response = cart_fragment_response("<div></div>".into(), 5);
        assert_eq!(response.headers().get(CART_COUNT_HEADER).unwrap(), "5");
    }
}
