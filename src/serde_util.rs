//! Serde helpers shared by the option and wire-reply types in this crate.

use std::time::Duration;

use bson::Bson;
use serde::{Deserialize, Deserializer, Serializer};

fn get_u64(val: &Bson) -> Option<u64> {
    match *val {
        Bson::Int32(i) => u64::try_from(i).ok(),
        Bson::Int64(i) => u64::try_from(i).ok(),
        Bson::Double(f) if f >= 0.0 && f.fract() == 0.0 => Some(f as u64),
        _ => None,
    }
}

pub(crate) fn serialize_duration_option_as_int_millis<S: Serializer>(
    val: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match val {
        Some(duration) if duration.as_millis() > i32::MAX as u128 => {
            serializer.serialize_i64(duration.as_millis() as i64)
        }
        Some(duration) => serializer.serialize_i32(duration.as_millis() as i32),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn deserialize_duration_option_from_u64_millis<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<u64>::deserialize(deserializer)?;
    Ok(millis.map(Duration::from_millis))
}

pub(crate) fn serialize_u64_as_i64<S: Serializer>(
    val: &u64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    bson::serde_helpers::serialize_u64_as_i64(val, serializer)
}

#[allow(dead_code)]
pub(crate) fn deserialize_u64_from_bson_number<'de, D>(
    deserializer: D,
) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let bson = Bson::deserialize(deserializer)?;
    get_u64(&bson).ok_or_else(|| {
        serde::de::Error::custom(format!("could not deserialize u64 from {:?}", bson))
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(
            serialize_with = "serialize_duration_option_as_int_millis",
            deserialize_with = "deserialize_duration_option_from_u64_millis",
            default
        )]
        max_time: Option<Duration>,
    }

    #[test]
    fn duration_round_trips_as_millis() {
        let w = Wrapper {
            max_time: Some(Duration::from_millis(1500)),
        };
        let doc = bson::to_document(&w).unwrap();
        assert_eq!(doc.get_i32("max_time").unwrap(), 1500);
        let back: Wrapper = bson::from_document(doc).unwrap();
        assert_eq!(back.max_time, w.max_time);
    }
}
