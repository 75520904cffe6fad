//! Surrogate keys and redemption codes.
//!
//! Keys are `<prefix>-<uuid v4>`. The prefix is only there to make ids readable in
//! logs; nothing parses it.

use uuid::Uuid;

const CODE_PREFIX: &str = "tix";
const CODE_RANDOM_LEN: usize = 10;

fn prefixed(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

/// `event-<uuid>`
#[must_use]
pub fn event_id() -> String {
    prefixed("event")
}

/// `tcat-<uuid>`
#[must_use]
pub fn ticket_category_id() -> String {
    prefixed("tcat")
}

/// `cart-<uuid>`
#[must_use]
pub fn cart_id() -> String {
    prefixed("cart")
}

/// `trans-<uuid>`
#[must_use]
pub fn transaction_id() -> String {
    prefixed("trans")
}

/// `tdet-<uuid>`
#[must_use]
pub fn transaction_detail_id() -> String {
    prefixed("tdet")
}

/// `ticket-<uuid>`
#[must_use]
pub fn ticket_id() -> String {
    prefixed("ticket")
}

/// Short redemption code: `tix` followed by 10 lowercase hex characters.
#[must_use]
pub fn ticket_code() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{CODE_PREFIX}{}", &random[..CODE_RANDOM_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert!(event_id().starts_with("event-"));
        assert!(ticket_category_id().starts_with("tcat-"));
        assert!(cart_id().starts_with("cart-"));
        assert!(transaction_id().starts_with("trans-"));
        assert!(transaction_detail_id().starts_with("tdet-"));
        assert!(ticket_id().starts_with("ticket-"));
    }

    #[test]
    fn test_ticket_code_shape() {
        let code = ticket_code();
        assert_eq!(code.len(), CODE_PREFIX.len() + CODE_RANDOM_LEN);
        assert!(code.starts_with(CODE_PREFIX));
        assert!(code[CODE_PREFIX.len()..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(ticket_code(), code);
    }
}
