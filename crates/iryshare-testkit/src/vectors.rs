//! Golden envelope documents.
//!
//! Envelopes written by other clients must keep decoding. Each vector is a
//! wire document plus what decoding it should yield.

use iryshare_core::{Envelope, FormatVersion, PolicyKind};

/// Expected outcome of decoding a golden envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// Decodes with this version, policy kind and recipient count.
    Valid {
        version: FormatVersion,
        kind: PolicyKind,
        recipients: usize,
    },
    /// Rejected as malformed.
    Malformed,
}

/// A golden envelope.
#[derive(Debug, Clone)]
pub struct GoldenEnvelope {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Wire bytes.
    pub json: String,
    pub expected: Expected,
}

const OWNER: &str = "0x1111111111111111111111111111111111111111";
const BOB: &str = "0x2222222222222222222222222222222222222222";
const CAROL: &str = "0x3333333333333333333333333333333333333333";

fn has_balance() -> serde_json::Value {
    serde_json::json!([{
        "conditionType": "evmBasic",
        "contractAddress": "",
        "standardContractType": "",
        "chain": "ethereum",
        "method": "eth_getBalance",
        "parameters": [":userAddress", "latest"],
        "returnValueTest": { "comparator": ">=", "value": "0" }
    }])
}

fn is_address(address: &str) -> serde_json::Value {
    serde_json::json!({
        "conditionType": "evmBasic",
        "contractAddress": "",
        "standardContractType": "",
        "chain": "ethereum",
        "method": "",
        "parameters": [":userAddress"],
        "returnValueTest": { "comparator": "=", "value": address }
    })
}

fn members(addresses: &[&str]) -> serde_json::Value {
    let mut clauses = Vec::new();
    for (i, address) in addresses.iter().enumerate() {
        if i > 0 {
            clauses.push(serde_json::json!({ "operator": "or" }));
        }
        clauses.push(is_address(address));
    }
    serde_json::Value::Array(clauses)
}

/// Get all golden envelopes.
pub fn all_envelopes() -> Vec<GoldenEnvelope> {
    vec![
        GoldenEnvelope {
            name: "1.0 with balance check",
            json: serde_json::json!({
                "version": "1.0",
                "ciphertext": "bm9uY2UxMjM0NTY3ODlhYmNkZWY=",
                "dataToEncryptHash": "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
                "accessControlConditions": has_balance(),
                "originalFileName": "hello.txt",
                "originalFileType": "text/plain",
                "ownerAddress": OWNER,
                "recipientAddresses": [BOB],
                "encryptedAt": "2025-03-01T12:00:00.000Z"
            })
            .to_string(),
            expected: Expected::Valid {
                version: FormatVersion::V1_0,
                kind: PolicyKind::HasBalance,
                recipients: 1,
            },
        },
        GoldenEnvelope {
            name: "1.1 republished with members",
            json: serde_json::json!({
                "version": "1.1",
                "ciphertext": "bm9uY2UxMjM0NTY3ODlhYmNkZWY=",
                "dataToEncryptHash": "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
                "accessControlConditions": members(&[OWNER, BOB, CAROL]),
                "originalFileName": "hello.txt",
                "originalFileType": "text/plain",
                "ownerAddress": OWNER,
                "recipientAddresses": [BOB, CAROL],
                "encryptedAt": "2025-03-01T12:00:00.000Z",
                "updatedAt": "2025-03-02T08:30:00.000Z"
            })
            .to_string(),
            expected: Expected::Valid {
                version: FormatVersion::V1_1,
                kind: PolicyKind::Members,
                recipients: 2,
            },
        },
        GoldenEnvelope {
            name: "missing version reads as 1.0",
            json: serde_json::json!({
                "ciphertext": "bm9uY2U=",
                "dataToEncryptHash": "00",
                "accessControlConditions": has_balance(),
                "ownerAddress": OWNER,
                "encryptedAt": "2025-03-01T12:00:00Z"
            })
            .to_string(),
            expected: Expected::Valid {
                version: FormatVersion::V1_0,
                kind: PolicyKind::HasBalance,
                recipients: 0,
            },
        },
        GoldenEnvelope {
            name: "unknown version",
            json: serde_json::json!({
                "version": "2.0",
                "ciphertext": "bm9uY2U=",
                "dataToEncryptHash": "00",
                "accessControlConditions": has_balance(),
                "ownerAddress": OWNER,
                "encryptedAt": "2025-03-01T12:00:00Z"
            })
            .to_string(),
            expected: Expected::Malformed,
        },
        GoldenEnvelope {
            name: "missing ciphertext",
            json: serde_json::json!({
                "version": "1.0",
                "dataToEncryptHash": "00",
                "accessControlConditions": has_balance(),
                "ownerAddress": OWNER,
                "encryptedAt": "2025-03-01T12:00:00Z"
            })
            .to_string(),
            expected: Expected::Malformed,
        },
        GoldenEnvelope {
            name: "trailing operator",
            json: serde_json::json!({
                "version": "1.0",
                "ciphertext": "bm9uY2U=",
                "dataToEncryptHash": "00",
                "accessControlConditions": [is_address(OWNER), { "operator": "or" }],
                "ownerAddress": OWNER,
                "encryptedAt": "2025-03-01T12:00:00Z"
            })
            .to_string(),
            expected: Expected::Malformed,
        },
        GoldenEnvelope {
            name: "not an object",
            json: "[]".to_string(),
            expected: Expected::Malformed,
        },
    ]
}

/// Decode `vector` and compare against its expectation.
pub fn check_envelope(vector: &GoldenEnvelope) -> Result<(), String> {
    let decoded = Envelope::decode(vector.json.as_bytes());
    match (vector.expected, decoded) {
        (Expected::Malformed, Err(_)) => Ok(()),
        (Expected::Malformed, Ok(envelope)) => Err(format!(
            "{}: decoded as version {} but should be rejected",
            vector.name,
            envelope.version.as_str()
        )),
        (Expected::Valid { .. }, Err(e)) => Err(format!("{}: {e}", vector.name)),
        (
            Expected::Valid {
                version,
                kind,
                recipients,
            },
            Ok(envelope),
        ) => {
            if envelope.version != version {
                return Err(format!("{}: version {:?}", vector.name, envelope.version));
            }
            if envelope.access_policy.kind() != kind {
                return Err(format!("{}: policy kind {:?}", vector.name, envelope.access_policy.kind()));
            }
            if envelope.recipients.len() != recipients {
                return Err(format!("{}: {} recipients", vector.name, envelope.recipients.len()));
            }
            Ok(())
        }
    }
}

/// Check every golden envelope.
pub fn verify_all_envelopes() -> Result<(), Vec<String>> {
    let failures: Vec<String> = all_envelopes()
        .iter()
        .filter_map(|v| check_envelope(v).err())
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_envelopes() {
        if let Err(failures) = verify_all_envelopes() {
            panic!("golden envelope failures:\n{}", failures.join("\n"));
        }
    }

    #[test]
    fn test_valid_envelopes_reencode() {
        for vector in all_envelopes() {
            let Ok(envelope) = Envelope::decode(vector.json.as_bytes()) else {
                continue;
            };
            let again = Envelope::decode(&envelope.to_bytes().unwrap()).unwrap();
            assert_eq!(again, envelope, "{}", vector.name);
        }
    }
}
