//! Solidity argument codec on top of `ethers::abi`.
//!
//! Parameter documents carry constructor and initializer arguments as JSON
//! literals; [`coerce`] turns each literal into a token of the declared
//! type. Encoding and decoding are `ethers::abi`'s, with failures mapped to
//! [`AbiError`].

use std::collections::BTreeMap;

pub use ethers::abi::{encode, Abi, Constructor, Event, Function, Param, ParamType, Token};
use ethers::abi::RawLog;
use ethers::types::{H256, U256};
use serde_json::Value;

use daomig_core::{Address, Bytes32};

use crate::error::AbiError;

// ---------------------------------------------------------------------------
// Token helpers
// ---------------------------------------------------------------------------

pub fn token_address(token: &Token) -> Option<Address> {
    match token {
        Token::Address(a) => Some(Address::from(*a)),
        _ => None,
    }
}

pub fn token_uint(token: &Token) -> Option<U256> {
    match token {
        Token::Uint(v) => Some(*v),
        _ => None,
    }
}

/// A `bytes32` value as a [`Bytes32`].
pub fn token_bytes32(token: &Token) -> Option<Bytes32> {
    match token {
        Token::FixedBytes(b) if b.len() == Bytes32::LEN => Bytes32::from_slice(b).ok(),
        _ => None,
    }
}

/// `bytes32` token of a hash.
pub fn bytes32_token(hash: Bytes32) -> Token {
    Token::FixedBytes(hash.as_bytes().to_vec())
}

pub fn address_token(address: Address) -> Token {
    Token::Address(address.0)
}

// ---------------------------------------------------------------------------
// JSON coercion
// ---------------------------------------------------------------------------

fn parse_u256(ty: &ParamType, value: &Value, text: &str) -> Result<U256, AbiError> {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_dec_str(text).ok(),
    };
    parsed.ok_or_else(|| AbiError::coerce(ty, value, "not an integer below 2^256"))
}

fn magnitude(ty: &ParamType, value: &Value) -> Result<(bool, U256), AbiError> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Ok((false, U256::from(v)))
            } else if let Some(v) = n.as_i64() {
                Ok((true, U256::from(v.unsigned_abs())))
            } else {
                Err(AbiError::coerce(ty, value, "not an integer"))
            }
        }
        Value::String(s) => match s.strip_prefix('-') {
            Some(rest) => Ok((true, parse_u256(ty, value, rest)?)),
            None => Ok((false, parse_u256(ty, value, s)?)),
        },
        Value::Bool(b) => Ok((false, U256::from(u8::from(*b)))),
        _ => Err(AbiError::coerce(ty, value, "expected a number or numeric string")),
    }
}

fn coerce_uint(ty: &ParamType, bits: usize, value: &Value) -> Result<Token, AbiError> {
    let (negative, v) = magnitude(ty, value)?;
    if negative && !v.is_zero() {
        return Err(AbiError::coerce(ty, value, "negative value for an unsigned type"));
    }
    if v.bits() > bits {
        return Err(AbiError::coerce(ty, value, "out of range"));
    }
    Ok(Token::Uint(v))
}

fn coerce_int(ty: &ParamType, bits: usize, value: &Value) -> Result<Token, AbiError> {
    let (negative, v) = magnitude(ty, value)?;
    let limit = U256::one() << (bits - 1);
    if (negative && v > limit) || (!negative && v >= limit) {
        return Err(AbiError::coerce(ty, value, "out of range"));
    }
    // Two's complement over the full word.
    let word = if negative { (!v).overflowing_add(U256::one()).0 } else { v };
    Ok(Token::Int(word))
}

fn hex_or_text(ty: &ParamType, value: &Value) -> Result<Vec<u8>, AbiError> {
    match value {
        Value::String(s) if s.starts_with("0x") => {
            hex::decode(&s[2..]).map_err(|e| AbiError::coerce(ty, value, e.to_string()))
        }
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        _ => Err(AbiError::coerce(ty, value, "expected a hex string")),
    }
}

fn coerce_items(inner: &ParamType, items: &[Value]) -> Result<Vec<Token>, AbiError> {
    items.iter().map(|v| coerce(inner, v)).collect()
}

/// Convert a JSON literal into a token of type `ty`.
///
/// Addresses and byte strings come as `0x` hex; integers as numbers or
/// decimal/hex strings; `bytesN` also accepts short UTF-8 text, right-padded.
pub fn coerce(ty: &ParamType, value: &Value) -> Result<Token, AbiError> {
    match ty {
        ParamType::Address => match value {
            Value::String(s) => s
                .parse::<Address>()
                .map(address_token)
                .map_err(|e| AbiError::coerce(ty, value, e.to_string())),
            _ => Err(AbiError::coerce(ty, value, "expected an address string")),
        },
        ParamType::Bool => match value {
            Value::Bool(b) => Ok(Token::Bool(*b)),
            Value::String(s) if s == "true" || s == "false" => Ok(Token::Bool(s == "true")),
            _ => Err(AbiError::coerce(ty, value, "expected a boolean")),
        },
        ParamType::Uint(bits) => coerce_uint(ty, *bits, value),
        ParamType::Int(bits) => coerce_int(ty, *bits, value),
        ParamType::FixedBytes(n) => {
            let bytes = hex_or_text(ty, value)?;
            let is_hex = matches!(value, Value::String(s) if s.starts_with("0x"));
            if (is_hex && bytes.len() != *n) || bytes.len() > *n {
                return Err(AbiError::coerce(ty, value, format!("expected {n} bytes, got {}", bytes.len())));
            }
            let mut word = bytes;
            word.resize(*n, 0);
            Ok(Token::FixedBytes(word))
        }
        ParamType::Bytes => match value {
            Value::String(s) if s.starts_with("0x") => hex_or_text(ty, value).map(Token::Bytes),
            _ => Err(AbiError::coerce(ty, value, "expected 0x-prefixed hex")),
        },
        ParamType::String => match value {
            Value::String(s) => Ok(Token::String(s.clone())),
            Value::Number(n) => Ok(Token::String(n.to_string())),
            _ => Err(AbiError::coerce(ty, value, "expected a string")),
        },
        ParamType::Array(inner) => match value {
            Value::Array(items) => coerce_items(inner, items).map(Token::Array),
            _ => Err(AbiError::coerce(ty, value, "expected an array")),
        },
        ParamType::FixedArray(inner, n) => match value {
            Value::Array(items) if items.len() == *n => coerce_items(inner, items).map(Token::FixedArray),
            _ => Err(AbiError::coerce(ty, value, format!("expected an array of {n}"))),
        },
        ParamType::Tuple(_) => Err(AbiError::UnsupportedType(ty.to_string())),
    }
}

/// Coerce JSON literals against `params`, checking the count first.
pub fn coerce_params(method: &str, params: &[Param], values: &[Value]) -> Result<Vec<Token>, AbiError> {
    if params.len() != values.len() {
        return Err(AbiError::ArgCount {
            method: method.to_owned(),
            expected: params.len(),
            found: values.len(),
        });
    }
    params.iter().zip(values).map(|(p, v)| coerce(&p.kind, v)).collect()
}

// ---------------------------------------------------------------------------
// Calls, outputs and logs
// ---------------------------------------------------------------------------

/// The overload of `name` taking `arity` arguments.
pub fn function_by_arity<'a>(abi: &'a Abi, name: &str, arity: usize) -> Option<&'a Function> {
    abi.functions_by_name(name)
        .ok()?
        .iter()
        .find(|f| f.inputs.len() == arity)
}

/// Canonical `name(type,...)` form of a function.
pub fn signature(function: &Function) -> String {
    let kinds: Vec<String> = function.inputs.iter().map(|p| p.kind.to_string()).collect();
    format!("{}({})", function.name, kinds.join(","))
}

/// Selector followed by the encoded arguments.
pub fn encode_call(function: &Function, args: &[Token]) -> Result<Vec<u8>, AbiError> {
    if args.len() != function.inputs.len() {
        return Err(AbiError::ArgCount {
            method: function.name.clone(),
            expected: function.inputs.len(),
            found: args.len(),
        });
    }
    function.encode_input(args).map_err(|e| AbiError::Encode {
        method: function.name.clone(),
        reason: e.to_string(),
    })
}

pub fn decode_output(function: &Function, data: &[u8]) -> Result<Vec<Token>, AbiError> {
    function
        .decode_output(data)
        .map_err(|e| AbiError::Decode(format!("{} output: {e}", function.name)))
}

/// Decode a tuple of `types` from `data`.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    ethers::abi::decode(types, data).map_err(|e| AbiError::Decode(e.to_string()))
}

/// First topic of every non-anonymous log emitted by `event`.
pub fn event_topic(event: &Event) -> Bytes32 {
    Bytes32::from(event.signature())
}

/// Whether a log with these topics was emitted by `event`.
pub fn log_matches(event: &Event, topics: &[Bytes32]) -> bool {
    !event.anonymous && topics.first() == Some(&event_topic(event))
}

/// Decode a log into named values.
///
/// Indexed dynamic values are only available as their hash and decode as
/// `bytes32`.
pub fn decode_log(event: &Event, topics: &[Bytes32], data: &[u8]) -> Result<BTreeMap<String, Token>, AbiError> {
    let raw = RawLog {
        topics: topics.iter().map(|t| H256::from(*t)).collect(),
        data: data.to_vec(),
    };
    let log = event
        .parse_log(raw)
        .map_err(|e| AbiError::Decode(format!("{}: {e}", event.name)))?;
    Ok(log.params.into_iter().map(|p| (p.name, p.value)).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn word(v: u64) -> Vec<u8> {
        let mut w = [0u8; 32];
        U256::from(v).to_big_endian(&mut w);
        w.to_vec()
    }

    fn event(value: Value) -> Event {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn transfer_event_topic() {
        let transfer = event(json!({
            "type": "event",
            "name": "Transfer",
            "inputs": [
                { "name": "from", "type": "address", "indexed": true },
                { "name": "to", "type": "address", "indexed": true },
                { "name": "value", "type": "uint256", "indexed": false }
            ],
            "anonymous": false
        }));
        assert_eq!(
            event_topic(&transfer).to_string(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn coerce_literals_by_type() {
        let addr = "0x1111111111111111111111111111111111111111";
        assert_eq!(
            coerce(&ParamType::Address, &json!(addr)).unwrap(),
            address_token(addr.parse().unwrap())
        );
        assert_eq!(coerce(&ParamType::Uint(256), &json!(42)).unwrap(), Token::Uint(U256::from(42)));
        assert_eq!(
            coerce(&ParamType::Uint(256), &json!("1000000000000000000000")).unwrap(),
            Token::Uint(U256::exp10(21))
        );
        assert_eq!(coerce(&ParamType::Uint(256), &json!("0x10")).unwrap(), Token::Uint(U256::from(16)));
        assert!(coerce(&ParamType::Uint(8), &json!(256)).is_err());
        assert!(coerce(&ParamType::Uint(256), &json!(-1)).is_err());
        assert_eq!(coerce(&ParamType::Bool, &json!(true)).unwrap(), Token::Bool(true));
        assert_eq!(
            coerce(&ParamType::FixedBytes(4), &json!("GEN")).unwrap(),
            Token::FixedBytes(b"GEN\0".to_vec())
        );
        assert!(coerce(&ParamType::FixedBytes(4), &json!("0x0000001f00")).is_err());
        assert!(coerce(&ParamType::Address, &json!(12)).is_err());
        assert!(matches!(
            coerce(&ParamType::Tuple(vec![ParamType::Bool]), &json!([true])),
            Err(AbiError::UnsupportedType(_))
        ));
    }

    #[test]
    fn uint256_literals_use_the_full_word() {
        let two_pow_200 = "1606938044258990275541962092341162602522202993782792835301376";
        assert_eq!(
            coerce(&ParamType::Uint(256), &json!(two_pow_200)).unwrap(),
            Token::Uint(U256::one() << 200)
        );
        let max = U256::MAX.to_string();
        assert_eq!(coerce(&ParamType::Uint(256), &json!(max)).unwrap(), Token::Uint(U256::MAX));
        let too_big = "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(coerce(&ParamType::Uint(256), &json!(too_big)).is_err());
        assert!(coerce(&ParamType::Uint(128), &json!((U256::one() << 128).to_string())).is_err());
    }

    #[test]
    fn signed_literals_are_twos_complement() {
        assert_eq!(coerce(&ParamType::Int(256), &json!(-1)).unwrap(), Token::Int(U256::MAX));
        assert_eq!(coerce(&ParamType::Int(8), &json!("-128")).unwrap(), Token::Int(U256::MAX - 127));
        assert!(coerce(&ParamType::Int(8), &json!(128)).is_err());
        assert!(coerce(&ParamType::Int(8), &json!(-129)).is_err());
    }

    #[test]
    fn abi_ignores_unknown_items_and_resolves_overloads() {
        let abi: Abi = serde_json::from_value(json!([
            { "type": "constructor", "inputs": [{ "name": "_avatar", "type": "address" }], "stateMutability": "nonpayable" },
            { "type": "fallback", "stateMutability": "payable" },
            { "type": "function", "name": "mint", "inputs": [{ "name": "to", "type": "address" }],
              "outputs": [], "stateMutability": "nonpayable" },
            { "type": "function", "name": "mint", "inputs": [
                { "name": "to", "type": "address" }, { "name": "amount", "type": "uint256" }
            ], "outputs": [{ "name": "", "type": "bool" }], "stateMutability": "nonpayable" },
            { "type": "event", "name": "NewOrg", "inputs": [{ "name": "_avatar", "type": "address", "indexed": false }], "anonymous": false }
        ]))
        .unwrap();
        assert_eq!(abi.constructor.as_ref().map(|c| c.inputs.len()), Some(1));
        let mint = function_by_arity(&abi, "mint", 2).unwrap();
        assert_eq!(signature(mint), "mint(address,uint256)");
        assert!(function_by_arity(&abi, "mint", 3).is_none());
        assert!(function_by_arity(&abi, "burn", 0).is_none());
        assert!(abi.event("NewOrg").is_ok());
    }

    #[test]
    fn log_decodes_indexed_and_data_values() {
        let instance = event(json!({
            "type": "event",
            "name": "SchemeInstance",
            "inputs": [
                { "name": "_scheme", "type": "address", "indexed": true },
                { "name": "_name", "type": "string", "indexed": false }
            ],
            "anonymous": false
        }));
        let scheme = Address::repeat_byte(9);
        let mut topic = [0u8; 32];
        topic[12..].copy_from_slice(scheme.as_bytes());
        let topics = vec![event_topic(&instance), Bytes32::from_slice(&topic).unwrap()];
        let data = encode(&[Token::String("ContributionReward".into())]);

        assert!(log_matches(&instance, &topics));
        let values = decode_log(&instance, &topics, &data).unwrap();
        assert_eq!(token_address(&values["_scheme"]), Some(scheme));
        assert_eq!(values["_name"], Token::String("ContributionReward".into()));
        assert!(!log_matches(&instance, &topics[1..]));
    }

    #[test]
    fn encode_call_checks_arity() {
        let f: Function = serde_json::from_value(json!({
            "name": "transfer",
            "inputs": [{ "name": "to", "type": "address" }, { "name": "value", "type": "uint256" }],
            "outputs": [{ "name": "", "type": "bool" }],
            "stateMutability": "nonpayable"
        }))
        .unwrap();
        let err = encode_call(&f, &[Token::Uint(U256::one())]).unwrap_err();
        assert!(matches!(err, AbiError::ArgCount { expected: 2, found: 1, .. }));
        let data = encode_call(&f, &[address_token(Address::ZERO), Token::Uint(U256::one())]).unwrap();
        assert_eq!(&data[..4], &hex::decode("a9059cbb").unwrap()[..]);
        assert_eq!(data.len(), 4 + 64);

        let mistyped = encode_call(&f, &[Token::Bool(true), Token::Uint(U256::one())]).unwrap_err();
        assert!(matches!(mistyped, AbiError::Encode { .. }));
    }

    #[test]
    fn truncated_data_is_a_decode_error() {
        let err = decode(&[ParamType::Uint(256)], &[0u8; 10]).unwrap_err();
        assert!(matches!(err, AbiError::Decode(_)));
    }

    #[test]
    fn oversized_bytes_length_is_a_decode_error() {
        // offset 32, then a length word far beyond the buffer
        let mut data = word(32);
        data.extend([0xff; 32]);
        assert!(matches!(decode(&[ParamType::Bytes], &data), Err(AbiError::Decode(_))));

        let mut data = word(32);
        data.extend(word(1 << 30));
        data.extend([0xab; 32]);
        assert!(matches!(decode(&[ParamType::String], &data), Err(AbiError::Decode(_))));
    }

    #[test]
    fn oversized_array_length_is_a_decode_error() {
        let mut data = word(32);
        data.extend(word(u64::from(u32::MAX)));
        data.extend(word(1));
        let types = [ParamType::Array(Box::new(ParamType::Uint(256)))];
        assert!(matches!(decode(&types, &data), Err(AbiError::Decode(_))));

        let mut data = word(32);
        data.extend([0xff; 32]);
        assert!(matches!(decode(&types, &data), Err(AbiError::Decode(_))));
    }

    #[test]
    fn offset_past_the_end_is_a_decode_error() {
        let data = word(4096);
        assert!(matches!(decode(&[ParamType::Bytes], &data), Err(AbiError::Decode(_))));
    }

    #[test]
    fn mixed_tuple_decodes_to_the_encoded_tokens() {
        let types = vec![
            ParamType::Address,
            ParamType::String,
            ParamType::FixedArray(Box::new(ParamType::Uint(256)), 2),
            ParamType::Array(Box::new(ParamType::FixedBytes(4))),
        ];
        let tokens = vec![
            address_token(Address::repeat_byte(7)),
            Token::String("My DAO".into()),
            Token::FixedArray(vec![Token::Uint(U256::from(5)), Token::Uint(U256::MAX)]),
            Token::Array(vec![Token::FixedBytes(vec![0, 0, 0, 0x1f])]),
        ];
        assert_eq!(decode(&types, &encode(&tokens)).unwrap(), tokens);
    }
}
