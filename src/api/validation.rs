use super::ApiError;
use crate::domain::{AccountId, Role};

pub fn validate_account_id(id: i32) -> Result<AccountId, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid account ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(AccountId::new(id))
}

/// Parses a role tag from a request body. Unknown tags are reported on the
/// `role` field.
pub fn parse_role(tag: &str) -> Result<Role, ApiError> {
    tag.parse::<Role>().map_err(|_| {
        ApiError::validation(format!(
            "role: '{}' is not one of {}",
            tag,
            Role::ALL.map(|r| r.as_str()).join(", ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_account_id() {
        assert_eq!(validate_account_id(1).unwrap(), AccountId::new(1));
        assert!(validate_account_id(12345).is_ok());
        assert!(validate_account_id(0).is_err());
        assert!(validate_account_id(-1).is_err());
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("manager").unwrap(), Role::Manager);
        let err = parse_role("OWNER").unwrap_err();
        assert!(err.to_string().contains("role"));
        assert!(err.to_string().contains("EMPLOYEE"));
    }
}
