use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored set of database connection credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbAccount {
    pub id: i64,
    pub title: String,
    pub engine: String,
    pub host: String,
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub name: String,
    /// JSON text in the database; an object (or `null`) on the wire.
    #[serde(with = "options_object")]
    pub options: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Extra connection settings kept as JSON in `DbAccount::options`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountOptions {
    #[serde(default)]
    pub charset: Option<String>,
}

impl DbAccount {
    /// Decode the JSON options. An empty column yields the defaults.
    pub fn parsed_options(&self) -> Result<AccountOptions, serde_json::Error> {
        if self.options.trim().is_empty() {
            return Ok(AccountOptions::default());
        }
        serde_json::from_str(&self.options)
    }
}

/// Payload for creating or editing an account.
///
/// On update, `password` and `options` left out keep their stored values, so
/// an account read back from the API can be sent again unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewDbAccount {
    pub title: String,
    pub engine: String,
    pub host: String,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
    pub options: Option<AccountOptions>,
}

impl NewDbAccount {
    pub(crate) fn options_json(&self) -> Result<Option<String>, serde_json::Error> {
        self.options.as_ref().map(serde_json::to_string).transpose()
    }
}

mod options_object {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(raw: &str, serializer: S) -> Result<S::Ok, S::Error> {
        if raw.trim().is_empty() {
            return serializer.serialize_none();
        }
        // malformed text is passed through as a string rather than failing the response
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => value.serialize(serializer),
            Err(_) => serializer.serialize_str(raw),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => String::new(),
            Value::String(raw) => raw,
            other => other.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(options: &str) -> DbAccount {
        DbAccount {
            id: 1,
            title: String::new(),
            engine: "mysql".into(),
            host: "localhost".into(),
            user: "root".into(),
            password: "secret".into(),
            name: "app".into(),
            options: options.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn parses_charset_from_options() {
        let opts = account(r#"{"charset":"latin1"}"#).parsed_options().unwrap();
        assert_eq!(opts.charset.as_deref(), Some("latin1"));
        assert_eq!(account("").parsed_options().unwrap(), AccountOptions::default());
        assert!(account("{not json").parsed_options().is_err());
    }

    #[test]
    fn password_is_never_serialized() {
        let json = serde_json::to_value(account("")).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["user"], "root");
        assert!(json["options"].is_null());
    }

    #[test]
    fn serialized_account_reads_back_as_edit_payload() {
        let json = serde_json::to_value(account(r#"{"charset":"latin1"}"#)).unwrap();
        assert_eq!(json["options"]["charset"], "latin1");

        let edit: NewDbAccount = serde_json::from_value(json).unwrap();
        assert_eq!(edit.password, None);
        assert_eq!(
            edit.options.and_then(|o| o.charset).as_deref(),
            Some("latin1")
        );
    }
}
