//! Serde adapter for `[T; N]` with a const-generic `N`.
//!
//! Use with `#[serde(with = "crate::core::fixed_array")]`. Serialised as a
//! plain sequence; deserialisation rejects any other length.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S, T, const N: usize>(items: &[T; N], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    serializer.collect_seq(items.iter())
}

pub fn deserialize<'de, D, T, const N: usize>(deserializer: D) -> Result<[T; N], D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let items = Vec::<T>::deserialize(deserializer)?;
    let len = items.len();
    items.try_into().map_err(|_| {
        let expected = format!("an array of {} elements", N);
        D::Error::invalid_length(len, &expected.as_str())
    })
}
