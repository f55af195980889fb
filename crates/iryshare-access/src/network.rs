//! The access-control network.
//!
//! The network encrypts content under a policy and later releases the
//! plaintext only to a session whose signer satisfies that policy. Callers
//! never pre-check membership themselves; whatever the network decides is the
//! answer.

use async_trait::async_trait;
use tracing::debug;

use iryshare_core::{AccessCondition, AccessPolicy, Address, Comparator, PolicyClause, Predicate};

use crate::crypto::{ContentHash, NetworkSecret};
use crate::error::{AccessError, Result};
use crate::oracle::{BalanceOracle, StaticBalances};
use crate::session::AuthSig;

/// Output of [`AccessControlNetwork::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// Base64 ciphertext.
    pub ciphertext: String,
    /// Hex SHA-256 of the plaintext; binds the ciphertext at decrypt time.
    pub data_to_encrypt_hash: String,
}

/// The decryption/access-control collaborator.
#[async_trait]
pub trait AccessControlNetwork: Send + Sync {
    /// Encrypt `plaintext` so that only signers satisfying `policy` can
    /// decrypt it.
    async fn encrypt(
        &self,
        plaintext: &[u8],
        policy: &AccessPolicy,
        session: &AuthSig,
    ) -> Result<EncryptedData>;

    /// Decrypt if the session's signer satisfies `policy`.
    async fn decrypt(
        &self,
        ciphertext: &str,
        data_to_encrypt_hash: &str,
        policy: &AccessPolicy,
        session: &AuthSig,
    ) -> Result<Vec<u8>>;
}

/// A single-node access-control network.
///
/// Holds the network secret, evaluates policies against a
/// [`BalanceOracle`], and derives one content key per plaintext hash.
pub struct LocalAccessNode<O = StaticBalances> {
    secret: NetworkSecret,
    oracle: O,
}

impl LocalAccessNode<StaticBalances> {
    /// A node with a random secret and zero balances for everyone.
    pub fn generate() -> Self {
        Self::new(NetworkSecret::generate(), StaticBalances::new())
    }
}

impl<O: BalanceOracle> LocalAccessNode<O> {
    pub fn new(secret: NetworkSecret, oracle: O) -> Self {
        Self { secret, oracle }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Evaluate `policy` for `signer`, left to right.
    pub async fn evaluate(&self, policy: &AccessPolicy, signer: &Address) -> Result<bool> {
        policy
            .validate()
            .map_err(|e| AccessError::InvalidPolicy(e.to_string()))?;

        let mut verdict = false;
        let mut pending = None;
        for clause in policy.clauses() {
            match clause {
                PolicyClause::Operator { operator } => pending = Some(*operator),
                PolicyClause::Condition(condition) => {
                    let holds = self.check(condition, signer).await?;
                    verdict = match pending.take() {
                        Some(op) => op.apply(verdict, holds),
                        None => holds,
                    };
                }
            }
        }
        Ok(verdict)
    }

    async fn check(&self, condition: &AccessCondition, signer: &Address) -> Result<bool> {
        match condition.predicate() {
            Predicate::Balance {
                chain,
                comparator,
                threshold,
            } => {
                let balance = self.oracle.balance(&chain, signer).await?;
                Ok(comparator.holds(balance, threshold))
            }
            Predicate::UserAddress {
                comparator: Comparator::Eq,
                address,
            } => Ok(&address == signer),
            Predicate::UserAddress { comparator, .. } => Err(AccessError::InvalidPolicy(format!(
                "comparator {comparator:?} is not defined on addresses"
            ))),
            Predicate::Unsupported(what) => Err(AccessError::InvalidPolicy(format!(
                "unsupported condition: {what}"
            ))),
        }
    }
}

#[async_trait]
impl<O: BalanceOracle> AccessControlNetwork for LocalAccessNode<O> {
    async fn encrypt(
        &self,
        plaintext: &[u8],
        policy: &AccessPolicy,
        session: &AuthSig,
    ) -> Result<EncryptedData> {
        session.verify()?;
        policy
            .validate()
            .map_err(|e| AccessError::InvalidPolicy(e.to_string()))?;

        let hash = ContentHash::of(plaintext);
        let ciphertext = self.secret.derive_content_key(&hash).seal(plaintext)?;

        debug!(
            signer = %session.address,
            bytes = plaintext.len(),
            hash = %hash.to_hex(),
            "encrypted content"
        );

        Ok(EncryptedData {
            ciphertext,
            data_to_encrypt_hash: hash.to_hex(),
        })
    }

    async fn decrypt(
        &self,
        ciphertext: &str,
        data_to_encrypt_hash: &str,
        policy: &AccessPolicy,
        session: &AuthSig,
    ) -> Result<Vec<u8>> {
        session.verify()?;

        if !self.evaluate(policy, &session.address).await? {
            debug!(signer = %session.address, "policy not satisfied");
            return Err(AccessError::AccessDenied(format!(
                "{} does not satisfy the access policy",
                session.address
            )));
        }

        let expected = ContentHash::from_hex(data_to_encrypt_hash)?;
        let plaintext = self.secret.derive_content_key(&expected).open(ciphertext)?;

        if ContentHash::of(&plaintext) != expected {
            return Err(AccessError::DecryptionError(
                "plaintext does not match dataToEncryptHash".to_string(),
            ));
        }

        debug!(signer = %session.address, bytes = plaintext.len(), "decrypted content");
        Ok(plaintext)
    }
}
