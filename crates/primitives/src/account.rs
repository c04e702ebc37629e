use crate::constants::{HASH_LENGTH, KECCAK_EMPTY};
use alloy_primitives::{Bytes, B256, U256};

const FIELD_NONCE: u8 = 0b0001;
const FIELD_BALANCE: u8 = 0b0010;
const FIELD_INCARNATION: u8 = 0b0100;
const FIELD_CODE_HASH: u8 = 0b1000;

const KNOWN_FIELDS: u8 = FIELD_NONCE | FIELD_BALANCE | FIELD_INCARNATION | FIELD_CODE_HASH;

/// A ledger account as held in the state table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    /// Number of transactions sent from, or contracts created by, this account.
    pub nonce: u64,
    /// Balance in wei.
    pub balance: U256,
    /// Keccak-256 hash of the contract code; [`KECCAK_EMPTY`] for accounts
    /// without code.
    pub code_hash: B256,
    /// Storage epoch of the account. Bumped each time a contract is created
    /// at this address, so storage of a self-destructed predecessor stays
    /// unreachable.
    pub incarnation: u64,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            code_hash: KECCAK_EMPTY,
            incarnation: 0,
        }
    }
}

impl Account {
    /// Creates an account with the given balance.
    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }

    /// Returns `true` if the account is empty as defined by EIP-161:
    /// zero nonce, zero balance and no code.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code_hash == KECCAK_EMPTY
    }

    /// Length of [`Self::encode_for_storage`] output.
    pub fn encoding_length_for_storage(&self, omit_code_hash: bool) -> usize {
        let mut len = 1;
        if self.nonce != 0 {
            len += 1 + minimal_byte_length(self.nonce);
        }
        if !self.balance.is_zero() {
            len += 1 + self.balance.byte_len();
        }
        if self.incarnation != 0 {
            len += 1 + minimal_byte_length(self.incarnation);
        }
        if self.code_hash != KECCAK_EMPTY && !omit_code_hash {
            len += 1 + HASH_LENGTH;
        }
        len
    }

    /// Encodes the account in the compact state-table layout: one
    /// field-presence bitmap byte, then each present field as a length byte
    /// followed by its minimal big-endian bytes.
    ///
    /// Account change-sets of live accounts set `omit_code_hash`; the hash
    /// is recoverable through the contract-code table.
    pub fn encode_for_storage(&self, omit_code_hash: bool) -> Bytes {
        let mut buffer = Vec::with_capacity(self.encoding_length_for_storage(omit_code_hash));
        buffer.push(0);
        if self.nonce != 0 {
            buffer[0] |= FIELD_NONCE;
            push_u64(&mut buffer, self.nonce);
        }
        if !self.balance.is_zero() {
            buffer[0] |= FIELD_BALANCE;
            let be = self.balance.to_be_bytes_trimmed_vec();
            buffer.push(be.len() as u8);
            buffer.extend_from_slice(&be);
        }
        if self.incarnation != 0 {
            buffer[0] |= FIELD_INCARNATION;
            push_u64(&mut buffer, self.incarnation);
        }
        if self.code_hash != KECCAK_EMPTY && !omit_code_hash {
            buffer[0] |= FIELD_CODE_HASH;
            buffer.push(HASH_LENGTH as u8);
            buffer.extend_from_slice(self.code_hash.as_slice());
        }
        buffer.into()
    }

    /// Decodes [`Self::encode_for_storage`] output.
    ///
    /// The empty byte string denotes the absence of an account and decodes
    /// to `None`.
    pub fn decode_for_storage(encoded: &[u8]) -> Result<Option<Self>, AccountDecodeError> {
        let Some((field_set, mut fields)) = encoded.split_first() else {
            return Ok(None);
        };
        if field_set & !KNOWN_FIELDS != 0 {
            return Err(AccountDecodeError::UnknownFields(*field_set));
        }

        let mut account = Self::default();
        if field_set & FIELD_NONCE != 0 {
            account.nonce = take_u64(&mut fields)?;
        }
        if field_set & FIELD_BALANCE != 0 {
            let be = take_field(&mut fields, HASH_LENGTH)?;
            // The length is capped at 32, so the conversion cannot fail.
            account.balance = U256::try_from_be_slice(be).unwrap_or_default();
        }
        if field_set & FIELD_INCARNATION != 0 {
            account.incarnation = take_u64(&mut fields)?;
        }
        if field_set & FIELD_CODE_HASH != 0 {
            let hash = take_field(&mut fields, HASH_LENGTH)?;
            if hash.len() != HASH_LENGTH {
                return Err(AccountDecodeError::FieldTooShort {
                    len: hash.len(),
                    expected: HASH_LENGTH,
                });
            }
            account.code_hash = B256::from_slice(hash);
        }
        if !fields.is_empty() {
            return Err(AccountDecodeError::TrailingBytes(fields.len()));
        }
        Ok(Some(account))
    }
}

/// Failure to decode a state-table account entry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AccountDecodeError {
    /// The field-presence bitmap carries bits this version does not know.
    #[error("unknown bits in account field set {0:#04x}")]
    UnknownFields(u8),
    /// The input ends in the middle of a field.
    #[error("account encoding ends mid-field")]
    UnexpectedEnd,
    /// A field is longer than its type allows.
    #[error("account field of {len} bytes exceeds the {max}-byte maximum")]
    FieldTooLong { len: usize, max: usize },
    /// A fixed-width field is shorter than its type requires.
    #[error("account field of {len} bytes, expected {expected}")]
    FieldTooShort { len: usize, expected: usize },
    /// Input continues after the last announced field.
    #[error("{0} trailing bytes after account fields")]
    TrailingBytes(usize),
}

fn minimal_byte_length(value: u64) -> usize {
    // Only called for non-zero values.
    8 - value.leading_zeros() as usize / 8
}

fn push_u64(buffer: &mut Vec<u8>, value: u64) {
    let len = minimal_byte_length(value);
    buffer.push(len as u8);
    buffer.extend_from_slice(&value.to_be_bytes()[8 - len..]);
}

fn take_field<'a>(fields: &mut &'a [u8], max: usize) -> Result<&'a [u8], AccountDecodeError> {
    let (len, rest) = fields.split_first().ok_or(AccountDecodeError::UnexpectedEnd)?;
    let len = *len as usize;
    if len > max {
        return Err(AccountDecodeError::FieldTooLong { len, max });
    }
    if rest.len() < len {
        return Err(AccountDecodeError::UnexpectedEnd);
    }
    let (field, rest) = rest.split_at(len);
    *fields = rest;
    Ok(field)
}

fn take_u64(fields: &mut &[u8]) -> Result<u64, AccountDecodeError> {
    let be = take_field(fields, 8)?;
    Ok(be.iter().fold(0, |acc, byte| (acc << 8) | u64::from(*byte)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn default_account_is_empty() {
        assert!(Account::default().is_empty());
        assert!(!Account::with_balance(U256::from(1)).is_empty());

        let mut account = Account::default();
        account.nonce = 1;
        assert!(!account.is_empty());

        let mut account = Account::default();
        account.code_hash = b256!("cafe00000000000000000000000000000000000000000000000000000000beef");
        assert!(!account.is_empty());
    }

    #[test]
    fn encoding_round_trips() {
        let account = Account {
            nonce: 13,
            balance: U256::from(900_000_000_000_000_000u64),
            code_hash: b256!("2f7e208975852b2ea3b1c4a0e3a74b26ab6ab2b97d9d44693294ba81e7b4b9bd"),
            incarnation: 3,
        };
        let encoded = account.encode_for_storage(false);
        assert_eq!(encoded.len(), account.encoding_length_for_storage(false));
        assert_eq!(Account::decode_for_storage(&encoded).unwrap(), Some(account));
    }

    #[test]
    fn default_account_encodes_to_field_set_only() {
        let encoded = Account::default().encode_for_storage(false);
        assert_eq!(encoded.as_ref(), [0u8]);
        assert_eq!(
            Account::decode_for_storage(&encoded).unwrap(),
            Some(Account::default())
        );
    }

    #[test]
    fn empty_input_decodes_to_no_account() {
        assert_eq!(Account::decode_for_storage(&[]).unwrap(), None);
    }

    #[test]
    fn omitted_code_hash_decodes_as_empty() {
        let account = Account {
            nonce: 2,
            balance: U256::from(1_000u64),
            code_hash: b256!("2f7e208975852b2ea3b1c4a0e3a74b26ab6ab2b97d9d44693294ba81e7b4b9bd"),
            incarnation: 1,
        };
        let encoded = account.encode_for_storage(true);
        let decoded = Account::decode_for_storage(&encoded).unwrap().unwrap();
        assert_eq!(decoded.code_hash, KECCAK_EMPTY);
        assert_eq!(decoded.nonce, account.nonce);
        assert_eq!(decoded.balance, account.balance);
        assert_eq!(decoded.incarnation, account.incarnation);
    }

    #[test]
    fn fields_use_minimal_big_endian_widths() {
        let account = Account {
            nonce: 0x0102,
            balance: U256::from(0x2au8),
            ..Account::default()
        };
        let encoded = account.encode_for_storage(false);
        assert_eq!(encoded.as_ref(), [0b0011, 2, 0x01, 0x02, 1, 0x2a]);
    }

    #[test]
    fn decode_rejects_malformed_input() {
        assert_eq!(
            Account::decode_for_storage(&[0b1_0000]),
            Err(AccountDecodeError::UnknownFields(0b1_0000))
        );
        assert_eq!(
            Account::decode_for_storage(&[FIELD_NONCE, 4, 0x01]),
            Err(AccountDecodeError::UnexpectedEnd)
        );
        assert_eq!(
            Account::decode_for_storage(&[FIELD_NONCE, 9, 0, 0, 0, 0, 0, 0, 0, 0, 1]),
            Err(AccountDecodeError::FieldTooLong { len: 9, max: 8 })
        );
        assert_eq!(
            Account::decode_for_storage(&[0, 0xaa]),
            Err(AccountDecodeError::TrailingBytes(1))
        );
    }
}
