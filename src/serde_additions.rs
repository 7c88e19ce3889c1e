pub mod duration_secs {
    use serde::{
        de::{Error as DeError, Visitor},
        Deserializer, Serializer,
    };

    use coarsetime::Duration;
    use std::fmt;

    struct SecondsVisitor;

    impl<'de> Visitor<'de> for SecondsVisitor {
        type Value = Duration;

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: DeError,
        {
            if value < 0 {
                return Err(E::custom("a duration cannot be negative"));
            }
            Ok(Duration::from_secs(value as _))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: DeError,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: DeError,
        {
            if !value.is_finite() || value < 0.0 {
                return Err(E::custom("a duration must be a non-negative number"));
            }
            Ok(Duration::from_secs(value as _))
        }

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a number of seconds")
        }
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserializer.deserialize_any(SecondsVisitor)
    }
}

pub mod one_or_many {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<String>>, D::Error> {
        Ok(
            match Option::<OneOrMany>::deserialize(deserializer)? {
                None => None,
                Some(OneOrMany::One(value)) => Some(vec![value]),
                Some(OneOrMany::Many(values)) => Some(values),
            },
        )
    }
}
