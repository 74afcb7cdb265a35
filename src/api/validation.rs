use super::ApiError;

const MAX_SECTION_NAME_LEN: usize = 32;

pub fn validate_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

/// Cheap shape check; whether the section exists is the content service's call.
pub fn validate_section_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Section name cannot be empty"));
    }

    if trimmed.len() > MAX_SECTION_NAME_LEN || !trimmed.chars().all(|c| c.is_ascii_alphabetic())
    {
        return Err(ApiError::validation(
            "Section name can only contain letters",
        ));
    }

    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id(1).is_ok());
        assert!(validate_id(0).is_err());
        assert!(validate_id(-4).is_err());
    }

    #[test]
    fn test_validate_section_name() {
        assert_eq!(validate_section_name(" hero ").unwrap(), "hero");
        assert!(validate_section_name("").is_err());
        assert!(validate_section_name("hero; drop").is_err());
        assert!(validate_section_name(&"a".repeat(33)).is_err());
        // unknown but well-formed names pass through
        assert!(validate_section_name("footer").is_ok());
    }
}
