//! Module that allows to (de-)serialize a `BTreeMap` with structured keys with `serde`.
//!
//! JSON objects only allow string keys. Maps keyed by a struct or a tuple are therefore written as
//! a list of `{"key": .., "val": ..}` entries, in the order of the keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Helper struct that allows (de-)serialization of a `BTreeMap` as this type.
///
/// Example:
/// ```ignore
/// serde_json::to_string_pretty(&KeyedMap::from(map)).unwrap();
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyedMap<K: Ord, V>(
    #[serde(with = "crate::serde::keyed_map")]
    #[serde(bound(
        deserialize = "K: Ord, for<'de_k> K: Deserialize<'de_k>, for<'de_v> V: Deserialize<'de_v>",
        serialize = "K: Serialize, V: Serialize",
    ))]
    pub BTreeMap<K, V>,
);

impl<K: Ord, V> From<BTreeMap<K, V>> for KeyedMap<K, V> {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self(map)
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for KeyedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A single entry of the map.
#[derive(Deserialize, Serialize)]
struct Entry<K, V> {
    key: K,
    val: V,
}

/// Serialize a `BTreeMap` as an ordered sequence of entries.
pub fn serialize<K: Serialize, V: Serialize, S: Serializer>(
    map: &BTreeMap<K, V>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(map.iter().map(|(key, val)| Entry { key, val }))
}

/// Deserialize a `BTreeMap` from a sequence of entries. Later duplicates replace earlier ones.
pub fn deserialize<'de, K: Deserialize<'de> + Ord, V: Deserialize<'de>, D>(
    deserializer: D,
) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<Entry<K, V>>::deserialize(deserializer)
        .map(|v| v.into_iter().map(|entry| (entry.key, entry.val)).collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    struct Key {
        protocol: String,
        nodes: u32,
    }

    #[test]
    fn struct_keys_are_written_in_order() {
        let map: KeyedMap<Key, f64> = [
            (
                Key {
                    protocol: "olsr".to_string(),
                    nodes: 10,
                },
                0.5,
            ),
            (
                Key {
                    protocol: "aodv".to_string(),
                    nodes: 30,
                },
                0.75,
            ),
        ]
        .into_iter()
        .collect();

        let ser = serde_json::to_string(&map).unwrap();
        assert_eq!(
            ser,
            r#"[{"key":{"protocol":"aodv","nodes":30},"val":0.75},{"key":{"protocol":"olsr","nodes":10},"val":0.5}]"#
        );

        let de: KeyedMap<Key, f64> = serde_json::from_str(&ser).unwrap();
        assert_eq!(de, map);
    }
}
