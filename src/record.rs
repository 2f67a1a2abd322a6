use serde::ser::SerializeMap;
use serde::{de, Deserialize, Serialize};
use std::fmt;

///
/// Read access to named text fields. Absent fields are `None`, never an empty
/// placeholder, so callers can branch on missing data explicitly.
///
pub trait FieldLookup {
    fn field(&self, name: &str) -> Option<&str>;
}

///
/// A row of named text values in source column order.
///
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Appends a field, or replaces the value in place if the name is already present.
    ///
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldLookup for Record {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct RecordVisitor;

impl<'de> de::Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an object of field names to values")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: de::MapAccess<'de>,
    {
        let mut record = Record::new();
        while let Some((name, value)) = access.next_entry::<String, serde_json::Value>()? {
            // Nulls read as absent; numbers and booleans keep their textual form.
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => record.insert(name, s),
                serde_json::Value::Number(n) => record.insert(name, n.to_string()),
                serde_json::Value::Bool(b) => record.insert(name, b.to_string()),
                other => {
                    return Err(de::Error::custom(format!(
                        "field '{name}' must be a scalar, found {other}"
                    )))
                }
            }
        }
        Ok(record)
    }
}

impl<'de> de::Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(RecordVisitor)
    }
}

///
/// A bibliographic row. `Title` and `Doi` are mandatory; every other column is
/// carried through untouched.
///
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Article {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Doi")]
    pub doi: String,
    #[serde(flatten)]
    pub extra: Record,
}

impl Article {
    pub const TITLE: &'static str = "Title";
    pub const DOI: &'static str = "Doi";

    ///
    /// Builds an article from a generic record, returning `None` when either the
    /// title or the DOI is absent or empty.
    ///
    pub fn from_record(record: Record) -> Option<Self> {
        let title = record.field(Self::TITLE).filter(|t| !t.is_empty())?.to_string();
        let doi = record.field(Self::DOI).filter(|d| !d.is_empty())?.to_string();
        let extra = record
            .fields
            .into_iter()
            .filter(|(n, _)| n != Self::TITLE && n != Self::DOI)
            .collect();
        Some(Article { title, doi, extra })
    }
}

impl FieldLookup for Article {
    fn field(&self, name: &str) -> Option<&str> {
        match name {
            Self::TITLE => Some(&self.title),
            Self::DOI => Some(&self.doi),
            _ => self.extra.field(name),
        }
    }
}
