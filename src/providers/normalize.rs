//! Turns the provider's keyed payload into an ordered list of display records.

use crate::core::{CurrencyPair, DisplayRecord, FetchError};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// One entry of the "last quote" payload. Every field is optional and untrusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuoteRecord {
    #[serde(default, deserialize_with = "text")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub codein: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub high: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub low: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub bid: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub ask: Option<String>,
    #[serde(default, rename = "varBid", deserialize_with = "text")]
    pub var_bid: Option<String>,
    #[serde(default, rename = "pctChange", deserialize_with = "text")]
    pub pct_change: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub create_date: Option<String>,
}

/// Keeps strings and bare numbers as text; any other JSON value reads as absent.
fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub type RawPayload = BTreeMap<String, RawQuoteRecord>;

/// Decodes the top-level object of record objects. A record whose fields
/// cannot be read is dropped here rather than failing the whole payload.
pub fn decode_payload(body: &str) -> Result<RawPayload, FetchError> {
    let objects: BTreeMap<String, Map<String, Value>> =
        serde_json::from_str(body).map_err(|e| {
            debug!(error = %e, "Quote payload is not a keyed record object");
            FetchError::DecodeError(e.to_string())
        })?;

    Ok(objects
        .into_iter()
        .filter_map(
            |(key, fields)| match serde_json::from_value(Value::Object(fields)) {
                Ok(raw) => Some((key, raw)),
                Err(e) => {
                    debug!(key = %key, error = %e, "Dropping unreadable quote");
                    None
                }
            },
        )
        .collect())
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// A raw record that passed the usability filter.
struct Usable<'a> {
    key: &'a str,
    raw: &'a RawQuoteRecord,
    name: &'a str,
    price: f64,
}

fn usable<'a>(key: &'a str, raw: &'a RawQuoteRecord) -> Option<Usable<'a>> {
    let name = non_empty(raw.name.as_ref())?;
    let price = parse_number(non_empty(raw.bid.as_ref()))?;
    Some(Usable {
        key,
        raw,
        name,
        price,
    })
}

/// Splits a payload key like `USDBRL` into its three-letter codes.
fn split_key(key: &str) -> Option<(&str, &str)> {
    (key.len() == 6 && key.chars().all(|c| c.is_ascii_alphabetic())).then(|| key.split_at(3))
}

/// Base and counter codes: the record's own fields first, then the requested
/// pair with the same payload key, then the key itself.
fn pair_codes(item: &Usable, requested: Option<&CurrencyPair>) -> (String, String) {
    let base = non_empty(item.raw.code.as_ref())
        .map(str::to_string)
        .or_else(|| requested.map(|pair| pair.base.clone()))
        .or_else(|| split_key(item.key).map(|(base, _)| base.to_string()))
        .unwrap_or_else(|| item.key.to_string());
    let counter = non_empty(item.raw.codein.as_ref())
        .map(str::to_string)
        .or_else(|| requested.map(|pair| pair.counter.clone()))
        .or_else(|| {
            item.key
                .strip_prefix(base.as_str())
                .filter(|rest| !rest.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_default();
    (base, counter)
}

/// Filters out unusable raw records and maps the rest to display records.
///
/// Output follows the order of `requested`; keys that match no requested pair
/// come last in key order. Yields `EmptyResult` when nothing survives.
pub fn normalize(
    payload: &RawPayload,
    requested: &[CurrencyPair],
) -> Result<Vec<DisplayRecord>, FetchError> {
    let mut items: Vec<Usable> = payload
        .iter()
        .filter_map(|(key, raw)| {
            let item = usable(key, raw);
            if item.is_none() {
                debug!(key = %key, "Dropping quote without name or bid");
            }
            item
        })
        .collect();

    if items.is_empty() {
        return Err(FetchError::EmptyResult);
    }

    let by_key: HashMap<String, (usize, &CurrencyPair)> = requested
        .iter()
        .enumerate()
        .map(|(i, pair)| (pair.payload_key(), (i, pair)))
        .collect();
    items.sort_by_key(|item| by_key.get(item.key).map_or(usize::MAX, |(i, _)| *i));

    let codes: Vec<(String, String)> = items
        .iter()
        .map(|item| pair_codes(item, by_key.get(item.key).map(|(_, pair)| *pair)))
        .collect();
    let mut base_counts: HashMap<&str, usize> = HashMap::new();
    for (base, _) in &codes {
        *base_counts.entry(base.as_str()).or_default() += 1;
    }

    // Base code alone, or BASE-COUNTER when the base repeats. Payload keys are
    // unique, so they settle anything still colliding.
    let candidates: Vec<String> = codes
        .iter()
        .map(|(base, counter)| {
            if base_counts[base.as_str()] > 1 {
                format!("{base}-{counter}")
            } else {
                base.clone()
            }
        })
        .collect();
    let mut id_counts: HashMap<&str, usize> = HashMap::new();
    for id in &candidates {
        *id_counts.entry(id.as_str()).or_default() += 1;
    }

    let records = items
        .iter()
        .zip(codes.iter().zip(&candidates))
        .map(|(item, ((base, counter), candidate))| {
            let id = if id_counts[candidate.as_str()] > 1 {
                item.key.to_string()
            } else {
                candidate.clone()
            };
            let name = item
                .name
                .split_once('/')
                .map_or(item.name, |(head, _)| head)
                .trim()
                .to_string();
            let last_update = non_empty(item.raw.create_date.as_ref())
                .or_else(|| non_empty(item.raw.timestamp.as_ref()))
                .unwrap_or_default()
                .to_string();

            DisplayRecord {
                id,
                pair: format!("{base}/{counter}"),
                name,
                price: item.price,
                variation_percent: parse_number(item.raw.pct_change.as_deref()).unwrap_or(0.0),
                variation_absolute: parse_number(item.raw.var_bid.as_deref()).unwrap_or(0.0),
                last_update,
            }
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USD_BRL: &str = r#"{
        "USDBRL": {
            "code": "USD",
            "codein": "BRL",
            "name": "Dólar Americano/Real Brasileiro",
            "bid": "5.00",
            "pctChange": "1.5",
            "varBid": "0.07",
            "create_date": "2024-01-01 10:00:00"
        }
    }"#;

    fn pairs(list: &[&str]) -> Vec<CurrencyPair> {
        list.iter().map(|p| p.parse().unwrap()).collect()
    }

    #[test]
    fn test_normalizes_single_record() {
        let payload = decode_payload(USD_BRL).unwrap();
        let records = normalize(&payload, &pairs(&["USD-BRL"])).unwrap();

        assert_eq!(
            records,
            vec![DisplayRecord {
                id: "USD".to_string(),
                pair: "USD/BRL".to_string(),
                name: "Dólar Americano".to_string(),
                price: 5.00,
                variation_percent: 1.5,
                variation_absolute: 0.07,
                last_update: "2024-01-01 10:00:00".to_string(),
            }]
        );
    }

    #[test]
    fn test_drops_records_without_name_or_bid() {
        let body = r#"{
            "USDBRL": {"code": "USD", "codein": "BRL", "name": "Dólar Americano/Real Brasileiro", "bid": "5.00"},
            "EURBRL": {"code": "EUR", "codein": "BRL", "bid": "5.40"},
            "GBPBRL": {"code": "GBP", "codein": "BRL", "name": "Libra Esterlina/Real Brasileiro"},
            "BTCBRL": {"code": "BTC", "codein": "BRL", "name": "", "bid": "300000"},
            "JPYBRL": {"code": "JPY", "codein": "BRL", "name": "Iene Japonês/Real Brasileiro", "bid": "n/a"}
        }"#;
        let payload = decode_payload(body).unwrap();
        let records = normalize(&payload, &[]).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "USD");
    }

    #[test]
    fn test_nothing_usable_is_empty_result() {
        let body = r#"{"EURBRL": {"code": "EUR", "codein": "BRL", "bid": "5.40"}}"#;
        let payload = decode_payload(body).unwrap();
        assert_eq!(normalize(&payload, &[]), Err(FetchError::EmptyResult));

        let empty = decode_payload("{}").unwrap();
        assert_eq!(normalize(&empty, &[]), Err(FetchError::EmptyResult));
    }

    #[test]
    fn test_malformed_payload_is_decode_error() {
        for body in [
            "[]",
            "not json",
            r#"{"USDBRL": "5.00"}"#,
            r#"{"USDBRL": []}"#,
            "",
        ] {
            assert!(matches!(
                decode_payload(body),
                Err(FetchError::DecodeError(_))
            ));
        }
    }

    #[test]
    fn test_order_follows_requested_pairs() {
        let body = r#"{
            "USDBRL": {"code": "USD", "codein": "BRL", "name": "Dólar", "bid": "5.00"},
            "EURBRL": {"code": "EUR", "codein": "BRL", "name": "Euro", "bid": "5.40"},
            "BTCBRL": {"code": "BTC", "codein": "BRL", "name": "Bitcoin", "bid": "300000"},
            "ARSBRL": {"code": "ARS", "codein": "BRL", "name": "Peso", "bid": "0.005"}
        }"#;
        let payload = decode_payload(body).unwrap();
        let records = normalize(&payload, &pairs(&["BTC-BRL", "USD-BRL", "EUR-BRL"])).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(ids, vec!["BTC", "USD", "EUR", "ARS"]);
    }

    #[test]
    fn test_shared_base_codes_get_unique_ids() {
        let body = r#"{
            "USDBRL": {"code": "USD", "codein": "BRL", "name": "Dólar Americano/Real Brasileiro", "bid": "5.00"},
            "USDEUR": {"code": "USD", "codein": "EUR", "name": "Dólar Americano/Euro", "bid": "0.92"}
        }"#;
        let payload = decode_payload(body).unwrap();
        let records = normalize(&payload, &pairs(&["USD-BRL", "USD-EUR"])).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(ids, vec!["USD-BRL", "USD-EUR"]);
    }

    #[test]
    fn test_lenient_fields() {
        let body = r#"{
            "BTCBRL": {"name": "Bitcoin", "bid": 300000.5, "pctChange": "abc", "timestamp": "1704103200"}
        }"#;
        let payload = decode_payload(body).unwrap();
        let records = normalize(&payload, &[]).unwrap();
        let record = &records[0];

        assert_eq!(record.id, "BTC");
        assert_eq!(record.pair, "BTC/BRL");
        assert_eq!(record.name, "Bitcoin");
        assert_eq!(record.price, 300000.5);
        assert_eq!(record.variation_percent, 0.0);
        assert_eq!(record.variation_absolute, 0.0);
        assert_eq!(record.last_update, "1704103200");
    }

    #[test]
    fn test_codes_taken_from_requested_pair() {
        let body = r#"{
            "BTCBRL": {"codein": "BRL", "name": "Bitcoin/Real Brasileiro", "bid": "300000"},
            "DOGEBRL": {"name": "Dogecoin/Real Brasileiro", "bid": "0.45"}
        }"#;
        let payload = decode_payload(body).unwrap();
        let records = normalize(&payload, &pairs(&["BTC-BRL", "DOGE-BRL"])).unwrap();

        assert_eq!(records[0].id, "BTC");
        assert_eq!(records[0].pair, "BTC/BRL");
        assert_eq!(records[1].id, "DOGE");
        assert_eq!(records[1].pair, "DOGE/BRL");
    }

    #[test]
    fn test_bad_typed_field_only_affects_its_record() {
        let body = r#"{
            "USDBRL": {"code": "USD", "codein": "BRL", "name": "Dólar Americano/Real Brasileiro", "bid": "5.00"},
            "EURBRL": {"code": "EUR", "codein": "BRL", "name": "Euro/Real Brasileiro", "bid": "5.40", "high": false},
            "GBPBRL": {"code": "GBP", "codein": "BRL", "name": ["Libra"], "bid": "6.30"}
        }"#;
        let payload = decode_payload(body).unwrap();
        let records = normalize(&payload, &pairs(&["USD-BRL", "EUR-BRL", "GBP-BRL"])).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(ids, vec!["USD", "EUR"]);
        assert_eq!(records[1].price, 5.40);
    }

    #[test]
    fn test_same_pair_under_two_keys_keeps_ids_unique() {
        let body = r#"{
            "USDBRL": {"code": "USD", "codein": "BRL", "name": "Dólar Americano/Real Brasileiro", "bid": "5.00"},
            "USDBRLT": {"code": "USD", "codein": "BRL", "name": "Dólar Turismo/Real Brasileiro", "bid": "5.20"},
            "EURBRL": {"code": "EUR", "codein": "BRL", "name": "Euro/Real Brasileiro", "bid": "5.40"}
        }"#;
        let payload = decode_payload(body).unwrap();
        let records = normalize(&payload, &[]).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(ids, vec!["EUR", "USDBRL", "USDBRLT"]);
        assert_eq!(records[1].pair, "USD/BRL");
        assert_eq!(records[2].pair, "USD/BRL");
    }

    #[test]
    fn test_counter_derived_from_key() {
        let body = r#"{"BTCUSD": {"code": "BTC", "name": "Bitcoin/Dólar", "bid": "42000"}}"#;
        let payload = decode_payload(body).unwrap();
        let records = normalize(&payload, &[]).unwrap();
        assert_eq!(records[0].pair, "BTC/USD");
    }

    #[test]
    fn test_normalize_is_repeatable() {
        let payload = decode_payload(USD_BRL).unwrap();
        let requested = pairs(&["USD-BRL"]);
        assert_eq!(
            normalize(&payload, &requested).unwrap(),
            normalize(&payload, &requested).unwrap()
        );
    }
}
