use bson::Bson;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Ordered list of product names held by an account.
///
/// Older documents wrap the list in a single mapping keyed by position
/// (`[{ "0": "CurrencyService", "1": "InvestmentStock" }]`). That shape is
/// accepted on read and always written back as a plain list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Products(Vec<String>);

impl Products {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Products(names.into_iter().map(Into::into).collect())
    }

    fn from_bson(value: Bson) -> Result<Self, String> {
        let Bson::Array(items) = value else {
            return Err(format!("products must be an array, found {:?}", value.element_type()));
        };

        let mut names = Vec::new();

        for item in items {
            match item {
                Bson::String(name) => names.push(name),
                Bson::Document(positions) => {
                    let mut entries = Vec::with_capacity(positions.len());

                    for (key, value) in positions {
                        let position: u32 = key.parse()
                            .map_err(|_| format!("product position [{key}] is not an integer"))?;

                        let Bson::String(name) = value else {
                            return Err(format!("product at position [{key}] is not a string"));
                        };

                        entries.push((position, name));
                    }

                    entries.sort_by_key(|(position, _)| *position);
                    names.extend(entries.into_iter().map(|(_, name)| name));
                }
                other => return Err(format!("unsupported product entry {:?}", other.element_type()))
            }
        }

        Ok(Products(names))
    }
}

impl Serialize for Products {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Products {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Bson::deserialize(deserializer)?;
        Products::from_bson(value).map_err(de::Error::custom)
    }
}
