//! Founder batch slicing.
//!
//! Batches are a pure function of the founder count, the batch sizes and how
//! many founders are already registered, so a resumed run sends exactly the
//! slices that are still missing.

use std::ops::Range;

use daomig_core::{ConfigError, Founder};

use crate::abi::{address_token, Token};

/// Founders included in the instance-creation call.
pub fn initial_batch(total: usize, initial_size: usize) -> Range<usize> {
    0..total.min(initial_size)
}

/// Follow-up batches for founders `added..total`.
pub fn remaining_batches(total: usize, added: usize, batch_size: usize) -> Vec<Range<usize>> {
    let step = batch_size.max(1);
    (added.min(total)..total)
        .step_by(step)
        .map(|start| start..(start + step).min(total))
        .collect()
}

/// Every batch of a complete run: the initial one followed by the rest.
/// Empty batches are omitted.
pub fn plan_batches(total: usize, initial_size: usize, batch_size: usize) -> Vec<Range<usize>> {
    let first = initial_batch(total, initial_size);
    let rest = remaining_batches(total, first.end, batch_size);
    std::iter::once(first)
        .filter(|r| !r.is_empty())
        .chain(rest)
        .collect()
}

/// The three parallel arrays (`address[]`, `uint256[]` tokens, `uint256[]`
/// reputation) the factory expects for a slice of founders.
pub fn founder_arrays(founders: &[Founder]) -> Result<[Token; 3], ConfigError> {
    let mut addresses = Vec::with_capacity(founders.len());
    let mut tokens = Vec::with_capacity(founders.len());
    let mut reputation = Vec::with_capacity(founders.len());
    for f in founders {
        addresses.push(address_token(f.address));
        let wei = |field: &str, a: &daomig_core::Amount| {
            a.to_wei()
                .map(Token::Uint)
                .map_err(|e| ConfigError::invalid(format!("founders[{}].{field}", f.address), e.to_string()))
        };
        tokens.push(wei("tokens", &f.tokens)?);
        reputation.push(wei("reputation", &f.reputation)?);
    }
    Ok([Token::Array(addresses), Token::Array(tokens), Token::Array(reputation)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;
    use rstest::rstest;

    #[rstest]
    #[case::none(0, vec![])]
    #[case::one(1, vec![0..1])]
    #[case::exactly_initial(20, vec![0..20])]
    #[case::initial_plus_one_full(120, vec![0..20, 20..120])]
    #[case::several_with_remainder(137, vec![0..20, 20..120, 120..137])]
    #[case::many(321, vec![0..20, 20..120, 120..220, 220..320, 320..321])]
    fn plans_cover_every_founder_once(#[case] total: usize, #[case] expected: Vec<Range<usize>>) {
        let plan = plan_batches(total, 20, 100);
        assert_eq!(plan, expected);
        let covered: Vec<usize> = plan.into_iter().flatten().collect();
        assert_eq!(covered, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn resume_after_second_batch_sends_only_the_remainder() {
        assert_eq!(remaining_batches(137, 120, 100), vec![120..137]);
        assert!(remaining_batches(137, 137, 100).is_empty());
    }

    #[test]
    fn batch_size_change_between_runs_still_resumes_exactly() {
        // First run used 100-founder batches and stopped after 20 + 100.
        assert_eq!(remaining_batches(137, 120, 5), vec![120..125, 125..130, 130..135, 135..137]);
    }

    #[test]
    fn arrays_convert_amounts_to_wei() {
        let founders: Vec<Founder> = serde_json::from_value(serde_json::json!([
            { "address": "0x1111111111111111111111111111111111111111", "tokens": 1, "reputation": "0.5" }
        ]))
        .unwrap();
        let [addrs, tokens, rep] = founder_arrays(&founders).unwrap();
        assert_eq!(addrs, Token::Array(vec![address_token(founders[0].address)]));
        assert_eq!(tokens, Token::Array(vec![Token::Uint(U256::exp10(18))]));
        assert_eq!(rep, Token::Array(vec![Token::Uint(U256::exp10(17) * 5)]));
    }

    #[test]
    fn whale_allocations_beyond_uint128_are_encoded() {
        let founders: Vec<Founder> = serde_json::from_value(serde_json::json!([
            { "address": "0x1111111111111111111111111111111111111111",
              "tokens": "1000000000000000000000000000000", "reputation": 0 }
        ]))
        .unwrap();
        let [_, tokens, _] = founder_arrays(&founders).unwrap();
        assert_eq!(tokens, Token::Array(vec![Token::Uint(U256::exp10(48))]));
    }
}
