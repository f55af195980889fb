//! Access policies and the policy compiler.
//!
//! A policy is a list of conditions interleaved with boolean operators,
//! serialised in the EVM basic-condition layout the access-control network
//! understands:
//!
//! ```text
//! [ {condition}, {"operator": "or"}, {condition}, ... ]
//! ```
//!
//! Two shapes are produced by [`PolicyCompiler`]:
//!
//! - [`PolicyMode::HasBalance`]: a single `eth_getBalance(:userAddress) >= 0`
//!   check. Every signer satisfies it, so it does **not** restrict decryption
//!   to the owner and recipients. This is the historical behaviour and stays
//!   the default; the envelope still records who the file was shared with.
//! - [`PolicyMode::Members`]: one `:userAddress == <address>` condition per
//!   allowed identity, joined with `or`.
//!
//! Both shapes use the same wire schema, so switching modes never changes the
//! envelope format.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{CoreError, Result};

/// Placeholder the network substitutes with the authenticated signer.
pub const USER_ADDRESS_PARAM: &str = ":userAddress";

/// Chain named in compiled conditions unless configured otherwise.
pub const DEFAULT_CHAIN: &str = "ethereum";

const EVM_BASIC: &str = "evmBasic";
const BALANCE_METHOD: &str = "eth_getBalance";

/// Comparison applied to a condition's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
}

impl Comparator {
    /// Apply this comparator to two ordered values.
    pub fn holds<T: Ord>(self, actual: T, expected: T) -> bool {
        match self {
            Comparator::Eq => actual == expected,
            Comparator::Gt => actual > expected,
            Comparator::Gte => actual >= expected,
            Comparator::Lt => actual < expected,
            Comparator::Lte => actual <= expected,
        }
    }
}

/// Boolean operator joining two conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOperator {
    And,
    Or,
}

impl BoolOperator {
    pub fn apply(self, lhs: bool, rhs: bool) -> bool {
        match self {
            BoolOperator::And => lhs && rhs,
            BoolOperator::Or => lhs || rhs,
        }
    }
}

/// Expected return value of a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnValueTest {
    pub comparator: Comparator,
    pub value: String,
}

/// A single access condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCondition {
    #[serde(default = "evm_basic")]
    pub condition_type: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub standard_contract_type: String,
    pub chain: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub return_value_test: ReturnValueTest,
}

fn evm_basic() -> String {
    EVM_BASIC.to_string()
}

/// Typed interpretation of an [`AccessCondition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Native balance of the signer compared against a threshold.
    Balance {
        chain: String,
        comparator: Comparator,
        threshold: u128,
    },
    /// The signer's address compared against a fixed address.
    UserAddress {
        comparator: Comparator,
        address: Address,
    },
    /// A condition this implementation cannot evaluate.
    Unsupported(String),
}

impl AccessCondition {
    /// `eth_getBalance(:userAddress, latest) >= 0` on the given chain.
    pub fn has_balance(chain: impl Into<String>) -> Self {
        Self {
            condition_type: evm_basic(),
            contract_address: String::new(),
            standard_contract_type: String::new(),
            chain: chain.into(),
            method: BALANCE_METHOD.to_string(),
            parameters: vec![USER_ADDRESS_PARAM.to_string(), "latest".to_string()],
            return_value_test: ReturnValueTest {
                comparator: Comparator::Gte,
                value: "0".to_string(),
            },
        }
    }

    /// `:userAddress == address`.
    pub fn is_address(chain: impl Into<String>, address: &Address) -> Self {
        Self {
            condition_type: evm_basic(),
            contract_address: String::new(),
            standard_contract_type: String::new(),
            chain: chain.into(),
            method: String::new(),
            parameters: vec![USER_ADDRESS_PARAM.to_string()],
            return_value_test: ReturnValueTest {
                comparator: Comparator::Eq,
                value: address.as_str().to_string(),
            },
        }
    }

    /// Interpret this condition.
    pub fn predicate(&self) -> Predicate {
        let test = &self.return_value_test;
        let on_user = self.parameters.first().map(String::as_str) == Some(USER_ADDRESS_PARAM);

        if !on_user || !self.contract_address.is_empty() {
            return Predicate::Unsupported(format!(
                "condition on {:?} with contract {:?}",
                self.parameters, self.contract_address
            ));
        }

        match self.method.as_str() {
            BALANCE_METHOD => match test.value.parse::<u128>() {
                Ok(threshold) => Predicate::Balance {
                    chain: self.chain.clone(),
                    comparator: test.comparator,
                    threshold,
                },
                Err(_) => Predicate::Unsupported(format!("balance threshold {:?}", test.value)),
            },
            "" => match Address::parse(&test.value) {
                Ok(address) => Predicate::UserAddress {
                    comparator: test.comparator,
                    address,
                },
                Err(_) => Predicate::Unsupported(format!("address value {:?}", test.value)),
            },
            other => Predicate::Unsupported(format!("method {other:?}")),
        }
    }
}

/// One element of a policy: a condition or an operator between two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyClause {
    Operator { operator: BoolOperator },
    Condition(AccessCondition),
}

/// Coarse classification of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// The universal balance check; any signer passes.
    HasBalance,
    /// Explicit address membership.
    Members,
    /// Anything else.
    Custom,
}

/// The predicate structure embedded in an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessPolicy(Vec<PolicyClause>);

impl AccessPolicy {
    /// Build from raw clauses, checking structure.
    pub fn from_clauses(clauses: Vec<PolicyClause>) -> Result<Self> {
        let policy = Self(clauses);
        policy.validate()?;
        Ok(policy)
    }

    pub fn clauses(&self) -> &[PolicyClause] {
        &self.0
    }

    /// Conditions in order, without operators.
    pub fn conditions(&self) -> impl Iterator<Item = &AccessCondition> {
        self.0.iter().filter_map(|c| match c {
            PolicyClause::Condition(cond) => Some(cond),
            PolicyClause::Operator { .. } => None,
        })
    }

    /// Check that the policy is non-empty and alternates condition/operator,
    /// starting and ending with a condition.
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(CoreError::InvalidPolicy("no conditions".to_string()));
        }
        for (i, clause) in self.0.iter().enumerate() {
            let expect_condition = i % 2 == 0;
            match (expect_condition, clause) {
                (true, PolicyClause::Condition(_)) | (false, PolicyClause::Operator { .. }) => {}
                (true, PolicyClause::Operator { .. }) => {
                    return Err(CoreError::InvalidPolicy(format!(
                        "operator at position {i} where a condition was expected"
                    )))
                }
                (false, PolicyClause::Condition(_)) => {
                    return Err(CoreError::InvalidPolicy(format!(
                        "condition at position {i} where an operator was expected"
                    )))
                }
            }
        }
        if self.0.len() % 2 == 0 {
            return Err(CoreError::InvalidPolicy("trailing operator".to_string()));
        }
        Ok(())
    }

    pub fn kind(&self) -> PolicyKind {
        let predicates: Vec<Predicate> = self.conditions().map(AccessCondition::predicate).collect();

        if let [Predicate::Balance {
            comparator: Comparator::Gte,
            threshold: 0,
            ..
        }] = predicates.as_slice()
        {
            return PolicyKind::HasBalance;
        }

        let all_or = self.0.iter().all(|c| match c {
            PolicyClause::Operator { operator } => *operator == BoolOperator::Or,
            PolicyClause::Condition(_) => true,
        });
        let all_members = predicates.iter().all(|p| {
            matches!(
                p,
                Predicate::UserAddress {
                    comparator: Comparator::Eq,
                    ..
                }
            )
        });

        if all_or && all_members && !predicates.is_empty() {
            PolicyKind::Members
        } else {
            PolicyKind::Custom
        }
    }

    /// The identities the policy admits, when it encodes membership at all.
    ///
    /// Returns `None` for policies that do not restrict by address, including
    /// the default balance predicate.
    pub fn allowed_identities(&self) -> Option<BTreeSet<Address>> {
        if self.kind() != PolicyKind::Members {
            return None;
        }
        Some(
            self.conditions()
                .filter_map(|c| match c.predicate() {
                    Predicate::UserAddress { address, .. } => Some(address),
                    _ => None,
                })
                .collect(),
        )
    }
}

/// How recipients are turned into conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Single balance check; does not enforce membership.
    #[default]
    HasBalance,
    /// Per-identity address checks.
    Members,
}

/// Compiles recipient sets into access policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyCompiler {
    mode: PolicyMode,
    chain: String,
}

impl Default for PolicyCompiler {
    fn default() -> Self {
        Self::new(PolicyMode::default())
    }
}

impl PolicyCompiler {
    pub fn new(mode: PolicyMode) -> Self {
        Self {
            mode,
            chain: DEFAULT_CHAIN.to_string(),
        }
    }

    /// Use a different chain name in compiled conditions.
    pub fn with_chain(mut self, chain: impl Into<String>) -> Self {
        self.chain = chain.into();
        self
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Compile a policy admitting `owner` plus `recipients`.
    ///
    /// Never fails. Duplicate recipients and the owner listed as a recipient
    /// collapse before compilation.
    pub fn compile(&self, recipients: &[Address], owner: &Address) -> AccessPolicy {
        match self.mode {
            PolicyMode::HasBalance => AccessPolicy(vec![PolicyClause::Condition(
                AccessCondition::has_balance(&self.chain),
            )]),
            PolicyMode::Members => {
                let others: BTreeSet<&Address> =
                    recipients.iter().filter(|r| *r != owner).collect();

                let mut clauses = vec![PolicyClause::Condition(AccessCondition::is_address(
                    &self.chain,
                    owner,
                ))];
                for recipient in others {
                    clauses.push(PolicyClause::Operator {
                        operator: BoolOperator::Or,
                    });
                    clauses.push(PolicyClause::Condition(AccessCondition::is_address(
                        &self.chain,
                        recipient,
                    )));
                }
                AccessPolicy(clauses)
            }
        }
    }
}

/// Compile with the default compiler (balance predicate on [`DEFAULT_CHAIN`]).
pub fn compile_policy(recipients: &[Address], owner: &Address) -> AccessPolicy {
    PolicyCompiler::default().compile(recipients, owner)
}
