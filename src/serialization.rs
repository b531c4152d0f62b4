//! JSON encoding and decoding with a configurable wire convention.
//!
//! Rust types keep their snake_case field names; [`SerializationOptions`]
//! decides how struct fields are spelled on the wire, how `chrono` timestamps
//! are written, and whether unknown response fields are tolerated.
//!
//! The rules apply to struct fields and date values only:
//!
//! - A field whose name is a plain snake_case identifier (`user_id`) is
//!   spelled in the configured convention. A field serde already renamed
//!   (`#[serde(rename = "userID")]`, `#[serde(rename_all = "camelCase")]`) is
//!   sent and matched verbatim.
//! - Map keys (`HashMap`, `BTreeMap`, `serde_json::Value` objects), enum
//!   variant names and ordinary strings pass through untouched.
//! - Only `chrono::DateTime` values are written in the configured date format,
//!   and only values read as dates are parsed with it.
//!
//! Fields that serde buffers before decoding (`#[serde(flatten)]`, untagged or
//! internally tagged enums) are not renamed; spell those with serde attributes.

mod de;
mod ser;

use self::de::WireDeserializer;
use self::ser::WireSerializer;
use crate::Error;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;

/// The `yyyy-MM-ddTHH:mm:ss.fffZ` timestamp shape, as a chrono format string.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// How struct field names are spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingConvention {
    /// `userId`
    #[default]
    CamelCase,
    /// `UserId`
    PascalCase,
    /// `user_id`
    SnakeCase,
    /// `user-id`
    KebabCase,
    /// Fields are sent and read exactly as the types spell them.
    AsIs,
}

impl NamingConvention {
    /// Spells a Rust field name in this convention.
    ///
    /// # Examples
    ///
    /// ```
    /// use bracer::serialization::NamingConvention;
    ///
    /// assert_eq!(NamingConvention::CamelCase.to_wire("created_at"), "createdAt");
    /// assert_eq!(NamingConvention::PascalCase.to_wire("created_at"), "CreatedAt");
    /// assert_eq!(NamingConvention::KebabCase.to_wire("created_at"), "created-at");
    /// ```
    pub fn to_wire(self, key: &str) -> String {
        match self {
            NamingConvention::AsIs => key.to_string(),
            style => rename(key, style),
        }
    }
}

/// What to do with response fields the target type does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFields {
    /// Drop them silently.
    #[default]
    Ignore,
    /// Fail the decode, naming every unknown field.
    Reject,
}

/// Immutable encoding/decoding rules.
///
/// # Examples
///
/// ```
/// use bracer::serialization::{NamingConvention, SerializationOptions, UnknownFields};
///
/// let strict = SerializationOptions::default()
///     .with_naming(NamingConvention::PascalCase)
///     .with_unknown_fields(UnknownFields::Reject);
///
/// assert_eq!(strict.naming(), NamingConvention::PascalCase);
/// assert_eq!(strict.date_format(), "%Y-%m-%dT%H:%M:%S%.3fZ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationOptions {
    naming: NamingConvention,
    date_format: String,
    unknown_fields: UnknownFields,
}

impl Default for SerializationOptions {
    fn default() -> Self {
        Self {
            naming: NamingConvention::default(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            unknown_fields: UnknownFields::default(),
        }
    }
}

impl SerializationOptions {
    /// Returns a copy using `naming` for struct fields.
    pub fn with_naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    /// Returns a copy writing timestamps with a chrono strftime pattern.
    ///
    /// Timestamps are rendered in UTC.
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Returns a copy with the given unknown-field handling.
    pub fn with_unknown_fields(mut self, unknown_fields: UnknownFields) -> Self {
        self.unknown_fields = unknown_fields;
        self
    }

    /// Field naming convention.
    pub fn naming(&self) -> NamingConvention {
        self.naming
    }

    /// Timestamp format pattern.
    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    /// Unknown-field handling.
    pub fn unknown_fields(&self) -> UnknownFields {
        self.unknown_fields
    }

    // RFC 3339 in, configured format out. Unrenderable patterns leave the text alone.
    fn encode_date(&self, text: String) -> String {
        let Ok(timestamp) = DateTime::parse_from_rfc3339(&text) else {
            return text;
        };
        let mut rendered = String::new();
        match write!(
            rendered,
            "{}",
            timestamp.with_timezone(&Utc).format(&self.date_format)
        ) {
            Ok(()) => rendered,
            Err(_) => text,
        }
    }

    // Configured format in, RFC 3339 out, so chrono's own Deserialize impls accept it.
    fn decode_date(&self, text: String) -> String {
        if DateTime::parse_from_rfc3339(&text).is_ok() {
            return text;
        }
        match NaiveDateTime::parse_from_str(&text, &self.date_format) {
            Ok(naive) => Utc
                .from_utc_datetime(&naive)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Err(_) => text,
        }
    }

    fn field_to_wire(&self, field: &str) -> String {
        if is_plain_field_name(field) {
            self.naming.to_wire(field)
        } else {
            field.to_string()
        }
    }

    // Unmatched keys are left alone so unknown-field handling sees them as sent.
    fn field_from_wire(&self, key: String, fields: &[&'static str]) -> String {
        match fields.iter().find(|field| self.field_to_wire(field) == key) {
            Some(field) => (*field).to_string(),
            None => key,
        }
    }
}

/// Encodes `value` as JSON text.
///
/// # Errors
///
/// Returns [`Error::SerializationFailed`] if the value cannot be represented
/// as JSON (for example a map with non-string keys).
///
/// # Examples
///
/// ```
/// use bracer::serialization::{serialize, SerializationOptions};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct NewItem {
///     display_name: String,
/// }
///
/// let json = serialize(
///     &NewItem { display_name: "lamp".into() },
///     &SerializationOptions::default(),
/// )
/// .unwrap();
/// assert_eq!(json, r#"{"displayName":"lamp"}"#);
/// ```
pub fn serialize<T>(value: &T, options: &SerializationOptions) -> Result<String, Error>
where
    T: Serialize + ?Sized,
{
    let tree = value
        .serialize(WireSerializer::new(options))
        .map_err(|e| Error::SerializationFailed(e.to_string()))?;
    serde_json::to_string(&tree).map_err(|e| Error::SerializationFailed(e.to_string()))
}

/// Decodes JSON text into `T`.
///
/// Empty or whitespace-only text decodes to `T::default()`.
///
/// # Errors
///
/// Returns [`Error::DeserializationFailed`] carrying the raw text if it is not
/// valid JSON, does not fit `T`, or (under [`UnknownFields::Reject`]) contains
/// fields `T` does not declare.
///
/// # Examples
///
/// ```
/// use bracer::serialization::{deserialize, SerializationOptions};
/// use serde::Deserialize;
///
/// #[derive(Debug, Default, Deserialize, PartialEq)]
/// struct Item {
///     item_id: u32,
/// }
///
/// let options = SerializationOptions::default();
/// let item: Item = deserialize(r#"{"itemId": 7}"#, &options).unwrap();
/// assert_eq!(item, Item { item_id: 7 });
///
/// let empty: Item = deserialize("", &options).unwrap();
/// assert_eq!(empty, Item::default());
/// ```
pub fn deserialize<T>(text: &str, options: &SerializationOptions) -> Result<T, Error>
where
    T: DeserializeOwned + Default,
{
    if text.trim().is_empty() {
        return Ok(T::default());
    }

    let failed = |serde_error: String| Error::DeserializationFailed {
        raw_response: text.to_string(),
        serde_error,
        status: None,
    };

    let tree: Value = serde_json::from_str(text).map_err(|e| failed(e.to_string()))?;
    let wire = WireDeserializer::new(tree, options);

    match options.unknown_fields {
        UnknownFields::Ignore => T::deserialize(wire).map_err(|e| failed(e.to_string())),
        UnknownFields::Reject => {
            let mut unknown = Vec::new();
            let value: T = serde_ignored::deserialize(wire, |path| unknown.push(path.to_string()))
                .map_err(|e| failed(e.to_string()))?;
            if unknown.is_empty() {
                Ok(value)
            } else {
                Err(failed(format!("unknown field(s): {}", unknown.join(", "))))
            }
        }
    }
}

// Rust field names as derive emits them; anything else came from a serde attribute.
fn is_plain_field_name(field: &str) -> bool {
    !field.is_empty()
        && field
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

fn rename(key: &str, style: NamingConvention) -> String {
    // Leading underscores are usually meaningful (`_id`, `__typename`).
    let body = key.trim_start_matches('_');
    let prefix = &key[..key.len() - body.len()];
    let words = split_words(body);

    let mut out = String::from(prefix);
    match style {
        NamingConvention::SnakeCase => out.push_str(&words.join("_")),
        NamingConvention::KebabCase => out.push_str(&words.join("-")),
        NamingConvention::CamelCase | NamingConvention::PascalCase => {
            for (i, word) in words.iter().enumerate() {
                if i == 0 && style == NamingConvention::CamelCase {
                    out.push_str(word);
                } else {
                    out.push_str(&capitalize(word));
                }
            }
        }
        NamingConvention::AsIs => out.push_str(body),
    }
    out
}

// Lowercased words of a snake, kebab, camel or Pascal case identifier.
fn split_words(key: &str) -> Vec<String> {
    let chars: Vec<char> = key.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // "userId" -> user|Id, "HTTPServer" -> HTTP|Server
            if prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use std::collections::{BTreeMap, HashMap};

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Item {
        id: u32,
        name: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Order {
        order_id: u64,
        line_items: Vec<Item>,
        placed_at: Option<DateTime<Utc>>,
    }

    #[test]
    fn splits_mixed_identifiers() {
        assert_eq!(split_words("userId"), ["user", "id"]);
        assert_eq!(split_words("HTTPServerError"), ["http", "server", "error"]);
        assert_eq!(split_words("line_items"), ["line", "items"]);
        assert_eq!(split_words("content-type"), ["content", "type"]);
        assert_eq!(split_words("v2Name"), ["v2", "name"]);
    }

    #[test]
    fn renames_preserve_leading_underscores() {
        assert_eq!(NamingConvention::CamelCase.to_wire("_private_key"), "_privateKey");

        let options = SerializationOptions::default();
        let fields = &["__type_name", "id"];
        assert_eq!(options.field_from_wire("__typeName".into(), fields), "__type_name");
        assert_eq!(options.field_from_wire("extra".into(), fields), "extra");
    }

    #[test]
    fn attribute_spelled_fields_are_verbatim() {
        let options = SerializationOptions::default().with_naming(NamingConvention::PascalCase);
        assert_eq!(options.field_to_wire("user_id"), "UserId");
        assert_eq!(options.field_to_wire("userID"), "userID");
        assert_eq!(options.field_to_wire("displayName"), "displayName");
    }

    #[test]
    fn nested_keys_follow_the_convention() {
        let order = Order {
            order_id: 9,
            line_items: vec![Item {
                id: 1,
                name: "Test Item".into(),
            }],
            placed_at: None,
        };

        let json = serialize(&order, &SerializationOptions::default()).unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&json).unwrap(),
            serde_json::json!({
                "orderId": 9,
                "lineItems": [{"id": 1, "name": "Test Item"}],
                "placedAt": null
            })
        );

        let pascal = SerializationOptions::default().with_naming(NamingConvention::PascalCase);
        let back: Order = deserialize(&serialize(&order, &pascal).unwrap(), &pascal).unwrap();
        assert_eq!(back, order);
    }

    #[test]
    fn as_is_leaves_keys_untouched() {
        let options = SerializationOptions::default().with_naming(NamingConvention::AsIs);
        let mut map = HashMap::new();
        map.insert("Mixed_Key", 1);

        assert_eq!(serialize(&map, &options).unwrap(), r#"{"Mixed_Key":1}"#);
    }

    #[test]
    fn timestamps_use_the_configured_format() {
        let placed_at = DateTime::parse_from_rfc3339("2024-03-05T10:20:30.123456+02:00")
            .unwrap()
            .with_timezone(&Utc);
        let order = Order {
            placed_at: Some(placed_at),
            ..Default::default()
        };

        let json = serialize(&order, &SerializationOptions::default()).unwrap();
        assert!(json.contains(r#""placedAt":"2024-03-05T08:20:30.123Z""#), "{json}");

        let day_first = SerializationOptions::default().with_date_format("%d/%m/%Y %H:%M:%S");
        let json = serialize(&order, &day_first).unwrap();
        assert!(json.contains(r#""placedAt":"05/03/2024 08:20:30""#), "{json}");

        let back: Order = deserialize(&json, &day_first).unwrap();
        assert_eq!(
            back.placed_at.unwrap().to_rfc3339(),
            "2024-03-05T08:20:30+00:00"
        );
    }

    #[test]
    fn ordinary_strings_are_not_dates() {
        let item = Item {
            id: 1,
            name: "2024 spring catalogue".into(),
        };
        let json = serialize(&item, &SerializationOptions::default()).unwrap();
        assert!(json.contains("2024 spring catalogue"));
    }

    #[test]
    fn type_mismatch_is_a_deserialization_error() {
        let err = deserialize::<Item>(
            r#"{"id":"not-a-number","name":"x"}"#,
            &SerializationOptions::default(),
        )
        .unwrap_err();

        match err {
            Error::DeserializationFailed {
                raw_response,
                serde_error,
                status,
            } => {
                assert!(raw_response.contains("not-a-number"));
                assert!(serde_error.contains("invalid type"), "{serde_error}");
                assert_eq!(status, None);
            }
            other => panic!("Expected DeserializationFailed, got {:?}", other),
        }
    }

    #[test]
    fn unknown_fields_are_ignored_by_default() {
        let item: Item = deserialize(
            r#"{"id":1,"name":"a","colour":"red"}"#,
            &SerializationOptions::default(),
        )
        .unwrap();
        assert_eq!(item.id, 1);
    }

    #[test]
    fn strict_mode_names_unknown_fields() {
        let strict = SerializationOptions::default().with_unknown_fields(UnknownFields::Reject);

        let err =
            deserialize::<Item>(r#"{"id":1,"name":"a","colour":"red"}"#, &strict).unwrap_err();
        assert!(err.to_string().contains("colour"), "{err}");

        let ok: Item = deserialize(r#"{"id":1,"name":"a"}"#, &strict).unwrap();
        assert_eq!(ok.name, "a");
    }

    #[test]
    fn blank_text_is_the_default_value() {
        let options = SerializationOptions::default();
        assert_eq!(deserialize::<Item>("  \n", &options).unwrap(), Item::default());
        assert_eq!(deserialize::<Vec<Item>>("", &options).unwrap(), Vec::new());
        assert_eq!(deserialize::<Option<Item>>("null", &options).unwrap(), None);
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Tagged {
        label_set: BTreeMap<String, i32>,
        created_by: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Profile {
        user_id: u32,
        display_name: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Account {
        #[serde(rename = "userID")]
        user_id: u32,
        home_page: String,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    enum Event {
        Renamed { old_name: String, new_name: String },
        Removed(u32),
    }

    #[test]
    fn map_keys_are_sent_as_written() {
        let mut headers = BTreeMap::new();
        headers.insert("user_id".to_string(), 1);
        headers.insert("Content-Type".to_string(), 2);

        let json = serialize(&headers, &SerializationOptions::default()).unwrap();
        assert_eq!(json, r#"{"Content-Type":2,"user_id":1}"#);

        let pascal = SerializationOptions::default().with_naming(NamingConvention::PascalCase);
        assert_eq!(serialize(&headers, &pascal).unwrap(), json);
    }

    #[test]
    fn map_keys_are_read_as_written() {
        let options = SerializationOptions::default();
        let map: BTreeMap<String, i32> =
            deserialize(r#"{"userId":1,"X-Trace":2}"#, &options).unwrap();
        assert_eq!(map.get("userId"), Some(&1));
        assert_eq!(map.get("X-Trace"), Some(&2));
        assert_eq!(map.len(), 2);

        let numbered: HashMap<u32, String> =
            deserialize(r#"{"1":"a","20":"b"}"#, &options).unwrap();
        assert_eq!(numbered[&1], "a");
        assert_eq!(numbered[&20], "b");
    }

    #[test]
    fn maps_inside_structs_keep_their_keys() {
        let mut label_set = BTreeMap::new();
        label_set.insert("build_number".to_string(), 42);
        let tagged = Tagged {
            label_set,
            created_by: "ci".into(),
        };

        let options = SerializationOptions::default();
        let json = serialize(&tagged, &options).unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&json).unwrap(),
            serde_json::json!({
                "labelSet": {"build_number": 42},
                "createdBy": "ci"
            })
        );

        let back: Tagged = deserialize(&json, &options).unwrap();
        assert_eq!(back, tagged);
    }

    #[test]
    fn serde_rename_all_round_trips() {
        let options = SerializationOptions::default();
        let profile: Profile =
            deserialize(r#"{"userId":7,"displayName":"Ada"}"#, &options).unwrap();
        assert_eq!(
            profile,
            Profile {
                user_id: 7,
                display_name: "Ada".into()
            }
        );

        let json = serialize(&profile, &options).unwrap();
        assert_eq!(json, r#"{"displayName":"Ada","userId":7}"#);

        let strict = options.with_unknown_fields(UnknownFields::Reject);
        let back: Profile = deserialize(&json, &strict).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn serde_rename_is_kept_verbatim() {
        let account = Account {
            user_id: 3,
            home_page: "https://example.com".into(),
        };

        for naming in [NamingConvention::CamelCase, NamingConvention::SnakeCase] {
            let options = SerializationOptions::default().with_naming(naming);
            let json = serialize(&account, &options).unwrap();
            assert!(json.contains(r#""userID":3"#), "{json}");

            let back: Account = deserialize(&json, &options).unwrap();
            assert_eq!(back, account);
        }
    }

    #[test]
    fn struct_variant_fields_follow_the_convention() {
        let event = Event::Renamed {
            old_name: "a".into(),
            new_name: "b".into(),
        };

        let options = SerializationOptions::default();
        let json = serialize(&event, &options).unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&json).unwrap(),
            serde_json::json!({"Renamed": {"oldName": "a", "newName": "b"}})
        );
        assert_eq!(deserialize::<Vec<Event>>(&format!("[{json}]"), &options).unwrap(), [event]);

        let removed: Vec<Event> = deserialize(r#"[{"Removed":4}]"#, &options).unwrap();
        assert_eq!(removed, [Event::Removed(4)]);
    }

    #[test]
    fn timestamp_shaped_strings_are_left_alone() {
        let options = SerializationOptions::default();
        let text = "2024-01-01T12:00:00+02:00".to_string();
        assert_eq!(serialize(&text, &options).unwrap(), r#""2024-01-01T12:00:00+02:00""#);

        let item = Item {
            id: 1,
            name: text.clone(),
        };
        let json = serialize(&item, &options).unwrap();
        assert!(json.contains(r#""name":"2024-01-01T12:00:00+02:00""#), "{json}");

        let day_first = options.with_date_format("%d/%m/%Y %H:%M:%S");
        let item: Item =
            deserialize(r#"{"id":2,"name":"05/03/2024 08:20:30"}"#, &day_first).unwrap();
        assert_eq!(item.name, "05/03/2024 08:20:30");
    }

    #[test]
    fn non_string_map_keys_fail_to_serialize() {
        let mut map = HashMap::new();
        map.insert((1, 2), "pair");

        let err = serialize(&map, &SerializationOptions::default()).unwrap_err();
        assert!(matches!(err, Error::SerializationFailed(_)));
    }
}
