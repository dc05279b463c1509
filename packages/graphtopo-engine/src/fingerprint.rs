//! Request fingerprinting
//!
//! A fingerprint is a blake3 hash over the dataset identity, the exact
//! graph content, and the canonicalized analysis parameters. Two requests
//! that differ only in parameter key order or float formatting produce the
//! same fingerprint; any change in graph content or parameter values
//! produces a different one.

use crate::error::{EngineError, Result};
use graphtopo_core::{AnalysisParams, GraphData};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const HASH_LEN: usize = 32;

/// Content-addressed identity of a computation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; HASH_LEN]);

impl Fingerprint {
    pub fn zero() -> Self {
        Self([0u8; HASH_LEN])
    }

    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(HASH_LEN * 2);
        for b in &self.0 {
            s.push_str(&format!("{:02x}", b));
        }
        s
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != HASH_LEN * 2 {
            return Err(EngineError::InvalidParameter(format!(
                "Fingerprint hex must be {} chars, got {}",
                HASH_LEN * 2,
                s.len()
            )));
        }
        let mut out = [0u8; HASH_LEN];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk)
                .map_err(|e| EngineError::InvalidParameter(e.to_string()))?;
            out[i] = u8::from_str_radix(hex, 16)
                .map_err(|e| EngineError::InvalidParameter(e.to_string()))?;
        }
        Ok(Self(out))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Fingerprint::from_hex(&s).map_err(D::Error::custom)
    }
}

/// Builds fingerprints from request components
#[derive(Debug, Default)]
pub struct FingerprintBuilder;

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn fingerprint(
        &self,
        dataset_id: &str,
        graph: &GraphData,
        params: &AnalysisParams,
    ) -> Result<Fingerprint> {
        let mut hasher = blake3::Hasher::new();
        // Variable-length fields are length-prefixed so no byte sequence
        // can straddle a field boundary
        hasher.update(&(dataset_id.len() as u64).to_le_bytes());
        hasher.update(dataset_id.as_bytes());
        self.hash_graph(&mut hasher, graph);
        let canonical = canonical_json(&serde_json::to_value(params).map_err(|e| {
            EngineError::InvalidParameter(format!("Unserializable parameters: {}", e))
        })?)?;
        hasher.update(canonical.as_bytes());
        Ok(Fingerprint(*hasher.finalize().as_bytes()))
    }

    /// Hash the graph by sorted node ids and normalized sorted edge list,
    /// so construction order never affects the digest
    fn hash_graph(&self, hasher: &mut blake3::Hasher, graph: &GraphData) {
        let ids = graph.node_ids();
        hasher.update(&(ids.len() as u64).to_le_bytes());
        for id in ids {
            hasher.update(&id.to_le_bytes());
        }
        let edges = graph.edge_list();
        hasher.update(&(edges.len() as u64).to_le_bytes());
        for (a, b) in edges {
            hasher.update(&a.to_le_bytes());
            hasher.update(&b.to_le_bytes());
        }
    }
}

/// Serialize a JSON value deterministically: object keys sorted, no
/// insignificant whitespace. Non-finite numbers are rejected upstream by
/// parameter validation.
pub fn canonical_json(value: &serde_json::Value) -> Result<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &serde_json::Value, out: &mut String) -> Result<()> {
    match value {
        serde_json::Value::Null => out.push_str("null"),
        serde_json::Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        serde_json::Value::Number(n) => out.push_str(&n.to_string()),
        serde_json::Value::String(s) => {
            let encoded = serde_json::to_string(s)
                .map_err(|e| EngineError::InvalidParameter(e.to_string()))?;
            out.push_str(&encoded);
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let encoded = serde_json::to_string(key)
                    .map_err(|e| EngineError::InvalidParameter(e.to_string()))?;
                out.push_str(&encoded);
                out.push(':');
                write_canonical(&map[*key], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphtopo_core::MetricKind;
    use pretty_assertions::assert_eq;

    fn sample_graph() -> GraphData {
        GraphData::from_edge_list(&[(1, 2), (2, 3)]).unwrap()
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b":1,"a":2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"a":2,"b":1}"#).unwrap();
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
        assert_eq!(canonical_json(&a).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_fingerprint_stable_across_option_order() {
        let builder = FingerprintBuilder::new();
        let graph = sample_graph();

        let mut p1 = AnalysisParams::default();
        p1.options
            .insert("alpha".into(), serde_json::Value::Bool(true));
        p1.options.insert("beta".into(), serde_json::json!(7));

        let mut p2 = AnalysisParams::default();
        p2.options.insert("beta".into(), serde_json::json!(7));
        p2.options
            .insert("alpha".into(), serde_json::Value::Bool(true));

        let f1 = builder.fingerprint("ds-1", &graph, &p1).unwrap();
        let f2 = builder.fingerprint("ds-1", &graph, &p2).unwrap();
        assert_eq!(f1, f2);
    }

    #[test]
    fn test_fingerprint_sensitive_to_params() {
        let builder = FingerprintBuilder::new();
        let graph = sample_graph();

        let p1 = AnalysisParams::default();
        let mut p2 = AnalysisParams::default();
        p2.metrics = vec![MetricKind::BetweennessCentrality];

        let f1 = builder.fingerprint("ds-1", &graph, &p1).unwrap();
        let f2 = builder.fingerprint("ds-1", &graph, &p2).unwrap();
        assert_ne!(f1, f2);
    }

    #[test]
    fn test_fingerprint_sensitive_to_graph_content() {
        let builder = FingerprintBuilder::new();
        let params = AnalysisParams::default();

        let g1 = sample_graph();
        let g2 = GraphData::from_edge_list(&[(1, 2), (2, 3), (1, 3)]).unwrap();

        let f1 = builder.fingerprint("ds-1", &g1, &params).unwrap();
        let f2 = builder.fingerprint("ds-1", &g2, &params).unwrap();
        assert_ne!(f1, f2);
    }

    #[test]
    fn test_fingerprint_sensitive_to_dataset_id() {
        let builder = FingerprintBuilder::new();
        let graph = sample_graph();
        let params = AnalysisParams::default();

        let f1 = builder.fingerprint("ds-1", &graph, &params).unwrap();
        let f2 = builder.fingerprint("ds-2", &graph, &params).unwrap();
        assert_ne!(f1, f2);
    }

    #[test]
    fn test_fingerprint_independent_of_edge_order() {
        let builder = FingerprintBuilder::new();
        let params = AnalysisParams::default();

        let g1 = GraphData::from_edge_list(&[(1, 2), (2, 3)]).unwrap();
        let g2 = GraphData::from_edge_list(&[(2, 3), (1, 2)]).unwrap();

        let f1 = builder.fingerprint("ds-1", &g1, &params).unwrap();
        let f2 = builder.fingerprint("ds-1", &g2, &params).unwrap();
        assert_eq!(f1, f2);
    }

    #[test]
    fn test_framing_distinguishes_field_boundaries() {
        let builder = FingerprintBuilder::new();
        let params = AnalysisParams::default();

        // Without length prefixes these two would hash identical byte
        // streams: a one-char id plus node 0 versus an id whose tail
        // mimics the encoded node bytes
        let short_id_with_node = GraphData::from_nodes_and_edges(&[0], &[]).unwrap();
        let long_id_empty_graph = GraphData::from_nodes_and_edges(&[], &[]).unwrap();

        let f1 = builder
            .fingerprint("d", &short_id_with_node, &params)
            .unwrap();
        let f2 = builder
            .fingerprint("d\0\0\0\0\0\0\0\0", &long_id_empty_graph, &params)
            .unwrap();
        assert_ne!(f1, f2);
    }

    #[test]
    fn test_hex_roundtrip() {
        let builder = FingerprintBuilder::new();
        let f = builder
            .fingerprint("ds-1", &sample_graph(), &AnalysisParams::default())
            .unwrap();
        let hex = f.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(Fingerprint::from_hex(&hex).unwrap(), f);
        assert!(Fingerprint::from_hex("abc").is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_hex_roundtrip(bytes in proptest::array::uniform32(0u8..)) {
            let f = Fingerprint(bytes);
            proptest::prop_assert_eq!(Fingerprint::from_hex(&f.to_hex()).unwrap(), f);
        }

        #[test]
        fn prop_canonical_json_insertion_order_independent(
            pairs in proptest::collection::btree_map("[a-z]{1,8}", -1000i64..1000, 0..10),
        ) {
            let mut forward = serde_json::Map::new();
            for (k, v) in &pairs {
                forward.insert(k.clone(), serde_json::json!(v));
            }
            let mut backward = serde_json::Map::new();
            for (k, v) in pairs.iter().rev() {
                backward.insert(k.clone(), serde_json::json!(v));
            }

            let a = canonical_json(&serde_json::Value::Object(forward)).unwrap();
            let b = canonical_json(&serde_json::Value::Object(backward)).unwrap();
            proptest::prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn test_serde_as_hex_string() {
        let f = Fingerprint::zero();
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, format!("\"{}\"", "0".repeat(64)));
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
