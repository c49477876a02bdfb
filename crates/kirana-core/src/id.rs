use ulid::Ulid;
use uuid::Uuid;

use crate::error::{Error, Result};

/// ULID-backed UUIDs: random enough for keys, but creation-ordered when
/// sorted, which keeps paginated listings stable without a second index.
pub fn generate_id() -> Uuid {
    Uuid::from(Ulid::new())
}

pub fn parse_id(value: &str) -> Result<Uuid> {
    value
        .parse::<Ulid>()
        .map(Uuid::from)
        .or_else(|_| value.parse::<Uuid>())
        .map_err(|_| Error::InvalidIdFormat(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn parses_uuid_and_ulid_forms() {
        let id = generate_id();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
        let ulid = Ulid::from(id);
        assert_eq!(parse_id(&ulid.to_string()).unwrap(), id);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_id("not-an-id").is_err());
    }
}
