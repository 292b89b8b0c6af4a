//! crates/shop_core/src/identity.rs
//!
//! Resolves whose cart a request operates on.

use crate::domain::{GuestToken, OwnerIdentity, Principal, PrincipalKind};

/// Name of the cookie carrying the guest token.
pub const GUEST_TOKEN_COOKIE: &str = "guest_token";

/// Default lifetime of the guest cookie: 7 days.
pub const GUEST_TOKEN_TTL_MINUTES: i64 = 10_080;

/// The resolved owner, plus the token to persist on the client when one was minted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub owner: OwnerIdentity,
    pub issued_guest_token: Option<GuestToken>,
}

/// Resolves the cart owner for a request. Never fails:
///
/// 1. an authenticated user principal owns the cart;
/// 2. otherwise a well-formed guest token presented by the client does;
/// 3. otherwise a fresh guest token is minted and reported in `issued_guest_token`.
///
/// Admin principals never own carts and fall through to the guest branches.
pub fn resolve_owner(principal: Option<&Principal>, presented_guest_token: Option<&str>) -> Resolution {
    if let Some(user) = principal.filter(|p| p.kind == PrincipalKind::User) {
        return Resolution {
            owner: OwnerIdentity::User(user.id),
            issued_guest_token: None,
        };
    }

    if let Some(token) = presented_guest_token.and_then(|raw| raw.parse::<GuestToken>().ok()) {
        return Resolution {
            owner: OwnerIdentity::Guest(token),
            issued_guest_token: None,
        };
    }

    let token = GuestToken::generate();
    Resolution {
        owner: OwnerIdentity::Guest(token),
        issued_guest_token: Some(token),
    }
}
