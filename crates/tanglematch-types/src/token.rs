//! Native token amounts riding on outputs.

use serde::{Deserialize, Serialize};

use crate::{error::Result, TanglematchError, TokenId};

/// An amount of one native token class.
///
/// Amounts are integer base units. The engine never fractions a native token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeToken {
    pub token_id: TokenId,
    pub amount: u64,
}

impl NativeToken {
    #[must_use]
    pub fn new(token_id: TokenId, amount: u64) -> Self {
        Self { token_id, amount }
    }
}

/// Add `tokens` into `acc`, summing amounts per token class.
pub fn merge_into(acc: &mut Vec<NativeToken>, tokens: &[NativeToken]) -> Result<()> {
    for token in tokens {
        if token.amount == 0 {
            continue;
        }
        match acc.iter_mut().find(|t| t.token_id == token.token_id) {
            Some(existing) => {
                existing.amount = existing
                    .amount
                    .checked_add(token.amount)
                    .ok_or(TanglematchError::AmountOverflow)?;
            }
            None => acc.push(*token),
        }
    }
    Ok(())
}

/// Subtract `take` from `have`, returning what remains.
///
/// Fails if any token class in `take` exceeds what `have` carries.
pub fn subtract(have: &[NativeToken], take: &[NativeToken]) -> Result<Vec<NativeToken>> {
    let mut remaining: Vec<NativeToken> = Vec::new();
    merge_into(&mut remaining, have)?;
    for token in take {
        if token.amount == 0 {
            continue;
        }
        let held = remaining
            .iter_mut()
            .find(|t| t.token_id == token.token_id)
            .ok_or(TanglematchError::NativeTokenMismatch {
                token: token.token_id,
            })?;
        held.amount =
            held.amount
                .checked_sub(token.amount)
                .ok_or(TanglematchError::NativeTokenMismatch {
                    token: token.token_id,
                })?;
    }
    remaining.retain(|t| t.amount > 0);
    Ok(remaining)
}

/// Multiset equality of two token lists. Ordering and zero-amount entries
/// are ignored.
#[must_use]
pub fn same_token_set(a: &[NativeToken], b: &[NativeToken]) -> bool {
    let normalize = |tokens: &[NativeToken]| {
        let mut merged = Vec::new();
        if merge_into(&mut merged, tokens).is_err() {
            return None;
        }
        merged.sort_by_key(|t| t.token_id);
        Some(merged)
    };
    match (normalize(a), normalize(b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_per_class() {
        let t1 = TokenId::dummy();
        let t2 = TokenId::dummy();
        let mut acc = vec![NativeToken::new(t1, 10)];
        merge_into(&mut acc, &[NativeToken::new(t1, 5), NativeToken::new(t2, 7)]).unwrap();
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.iter().find(|t| t.token_id == t1).unwrap().amount, 15);
        assert_eq!(acc.iter().find(|t| t.token_id == t2).unwrap().amount, 7);
    }

    #[test]
    fn merge_rejects_overflow() {
        let t1 = TokenId::dummy();
        let mut acc = vec![NativeToken::new(t1, u64::MAX)];
        let err = merge_into(&mut acc, &[NativeToken::new(t1, 1)]).unwrap_err();
        assert!(matches!(err, TanglematchError::AmountOverflow));
    }

    #[test]
    fn subtract_drops_exhausted_classes() {
        let t1 = TokenId::dummy();
        let t2 = TokenId::dummy();
        let have = vec![NativeToken::new(t1, 10), NativeToken::new(t2, 3)];
        let left = subtract(&have, &[NativeToken::new(t1, 10)]).unwrap();
        assert_eq!(left, vec![NativeToken::new(t2, 3)]);
    }

    #[test]
    fn subtract_fails_on_missing_class() {
        let have = vec![NativeToken::new(TokenId::dummy(), 10)];
        let err = subtract(&have, &[NativeToken::new(TokenId::dummy(), 1)]).unwrap_err();
        assert!(matches!(err, TanglematchError::NativeTokenMismatch { .. }));
    }

    #[test]
    fn set_equality_ignores_order_and_zeros() {
        let t1 = TokenId::dummy();
        let t2 = TokenId::dummy();
        let a = vec![NativeToken::new(t1, 4), NativeToken::new(t2, 9)];
        let b = vec![
            NativeToken::new(t2, 9),
            NativeToken::new(t1, 4),
            NativeToken::new(TokenId::dummy(), 0),
        ];
        assert!(same_token_set(&a, &b));
        assert!(!same_token_set(&a, &b[..1]));
    }
}
