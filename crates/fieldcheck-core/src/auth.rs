//! Caller identity gate

use fieldcheck_util::{FieldcheckError, Result, UserId};

/// Require a caller identity. Every user-facing operation goes through this
/// first; a missing identity is an error, never a silent no-op.
pub fn authenticate(caller: Option<&UserId>) -> Result<&UserId> {
    caller.ok_or_else(|| FieldcheckError::unauthenticated("Authentication required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identity_is_unauthenticated() {
        let err = authenticate(None).unwrap_err();
        assert!(matches!(err, FieldcheckError::Unauthenticated(_)));

        let user = UserId::new("u-prov");
        assert_eq!(authenticate(Some(&user)).unwrap(), &user);
    }
}
