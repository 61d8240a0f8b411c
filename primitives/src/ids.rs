use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Generates a `Uuid`-backed newtype identifier with the usual set of
/// conversions: `Display`/`FromStr`, serde as a plain string, and - under
/// the `postgres` feature - `ToSql`/`FromSql` delegating to the
/// underlying `Uuid`.
macro_rules! uuid_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.0.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                struct IdVisitor;

                impl<'de> Visitor<'de> for IdVisitor {
                    type Value = $name;

                    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                        formatter.write_str("a UUID string")
                    }

                    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
                    where
                        E: de::Error,
                    {
                        value.parse().map_err(|err| E::custom(format!("{err}")))
                    }

                    fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
                    where
                        E: de::Error,
                    {
                        self.visit_str(&value)
                    }
                }

                deserializer.deserialize_str(IdVisitor)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'a> tokio_postgres::types::FromSql<'a> for $name {
            fn from_sql(
                ty: &tokio_postgres::types::Type,
                raw: &'a [u8],
            ) -> Result<$name, Box<dyn std::error::Error + Sync + Send>> {
                Ok($name(<Uuid as tokio_postgres::types::FromSql>::from_sql(
                    ty, raw,
                )?))
            }

            tokio_postgres::types::accepts!(UUID);
        }

        #[cfg(feature = "postgres")]
        impl tokio_postgres::types::ToSql for $name {
            fn to_sql(
                &self,
                ty: &tokio_postgres::types::Type,
                w: &mut bytes::BytesMut,
            ) -> Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>>
            {
                <Uuid as tokio_postgres::types::ToSql>::to_sql(&self.0, ty, w)
            }

            tokio_postgres::types::accepts!(UUID);

            tokio_postgres::types::to_sql_checked!();
        }
    };
}

uuid_id!(WalletId, "Identifies a single user's wallet.");
uuid_id!(TeamId, "Identifies a team that owns campaigns.");
uuid_id!(UserId, "Identifies an authenticated platform user.");
uuid_id!(CampaignId, "Identifies an ad campaign.");
uuid_id!(AdId, "Identifies a single ad creative within a campaign.");
uuid_id!(ImpressionId, "Identifies a reserved/served/confirmed impression.");

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrips_through_display_and_from_str() {
        let id = CampaignId::new();
        let parsed: CampaignId = id.to_string().parse().unwrap();

        assert_eq!(id, parsed);
    }

    #[test]
    fn serializes_as_a_plain_uuid_string() {
        let id = AdId::new();

        assert_eq!(
            serde_json::Value::String(id.to_string()),
            serde_json::to_value(id).unwrap()
        );
    }
}
