//! Shared domain primitives

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// UUID stored as CHAR(36) in MySQL/TiDB.
/// sqlx's uuid feature maps to BINARY(16); our schema keeps the textual form,
/// so encoding/decoding goes through String.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringUuid(pub Uuid);

impl StringUuid {
    pub fn new_v4() -> Self {
        StringUuid(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        StringUuid(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parse from the canonical hyphenated form.
    pub fn parse_str(s: &str) -> Result<Self, uuid::Error> {
        Ok(StringUuid(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for StringUuid {
    fn from(uuid: Uuid) -> Self {
        StringUuid(uuid)
    }
}

impl From<StringUuid> for Uuid {
    fn from(s: StringUuid) -> Self {
        s.0
    }
}

impl std::ops::Deref for StringUuid {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for StringUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for StringUuid {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StringUuid(Uuid::parse_str(s)?))
    }
}

impl sqlx::Type<sqlx::MySql> for StringUuid {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::MySql>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for StringUuid {
    fn decode(value: sqlx::mysql::MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::MySql>>::decode(value)?;
        let uuid = Uuid::parse_str(&s)?;
        Ok(StringUuid(uuid))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for StringUuid {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<u8>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::MySql>>::encode_by_ref(&self.0.to_string(), buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v4_is_not_nil() {
        assert!(!StringUuid::new_v4().is_nil());
    }

    #[test]
    fn test_nil() {
        let id = StringUuid::nil();
        assert!(id.is_nil());
        assert_eq!(id.0, Uuid::nil());
    }

    #[test]
    fn test_parse_round_trip() {
        let s = "3f1b9a52-7c44-4e0d-9b67-2a9c1d8e5f00";
        let id: StringUuid = s.parse().unwrap();
        assert_eq!(id.to_string(), s);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(StringUuid::parse_str("not-a-uuid").is_err());
        assert!("".parse::<StringUuid>().is_err());
    }

    #[test]
    fn test_uuid_conversions() {
        let raw = Uuid::new_v4();
        let wrapped: StringUuid = raw.into();
        let back: Uuid = wrapped.into();
        assert_eq!(raw, back);
        assert_eq!(*wrapped, raw);
    }

    #[test]
    fn test_serde_transparent() {
        let s = "3f1b9a52-7c44-4e0d-9b67-2a9c1d8e5f00";
        let id: StringUuid = s.parse().unwrap();

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", s));

        let decoded: StringUuid = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_usable_as_map_key() {
        use std::collections::HashSet;

        let a = StringUuid::new_v4();
        let b = StringUuid::new_v4();

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        set.insert(a);

        assert_eq!(set.len(), 2);
    }
}
