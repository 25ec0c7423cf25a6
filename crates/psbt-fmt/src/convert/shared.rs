//! Converters for keyless fields whose value needs little interpretation.

use std::marker::PhantomData;

use bitcoin::ScriptBuf;

use super::{Converter, FieldKind, XONLY_LEN, expect_keyless, invalid_value, to_array};
use crate::config::ParseConfig;
use crate::error::{DecodeError, PsbtResult};
use crate::kv::KeyValue;

/// Keyless field holding a script.
#[derive(Debug)]
pub struct ScriptConverter<K>(PhantomData<K>);

impl<K: FieldKind> Converter for ScriptConverter<K> {
    type Value = ScriptBuf;

    const NAME: &'static str = K::NAME;

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<ScriptBuf, DecodeError> {
        expect_keyless(kv, K::TYPE_BYTE, K::NAME)?;
        Ok(ScriptBuf::from_bytes(kv.value.clone()))
    }

    fn encode(value: &ScriptBuf) -> PsbtResult<KeyValue> {
        Ok(KeyValue::keyless(K::TYPE_BYTE, value.as_bytes().to_vec()))
    }

    fn check(_value: &ScriptBuf) -> bool {
        true
    }
}

/// Keyless field whose value is kept as opaque bytes.
#[derive(Debug)]
pub struct RawConverter<K>(PhantomData<K>);

impl<K: FieldKind> Converter for RawConverter<K> {
    type Value = Vec<u8>;

    const NAME: &'static str = K::NAME;

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<Vec<u8>, DecodeError> {
        expect_keyless(kv, K::TYPE_BYTE, K::NAME)?;
        Ok(kv.value.clone())
    }

    fn encode(value: &Vec<u8>) -> PsbtResult<KeyValue> {
        Ok(KeyValue::keyless(K::TYPE_BYTE, value.clone()))
    }

    fn check(_value: &Vec<u8>) -> bool {
        true
    }
}

/// Keyless field holding exactly 32 bytes, like an x-only key or a hash.
#[derive(Debug)]
pub struct XOnlyKeyConverter<K>(PhantomData<K>);

impl<K: FieldKind> Converter for XOnlyKeyConverter<K> {
    type Value = [u8; XONLY_LEN];

    const NAME: &'static str = K::NAME;

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<[u8; XONLY_LEN], DecodeError> {
        expect_keyless(kv, K::TYPE_BYTE, K::NAME)?;
        to_array(&kv.value).ok_or_else(|| invalid_value(kv, K::NAME, "expected 32 bytes"))
    }

    fn encode(value: &[u8; XONLY_LEN]) -> PsbtResult<KeyValue> {
        Ok(KeyValue::keyless(K::TYPE_BYTE, value.to_vec()))
    }

    fn check(_value: &[u8; XONLY_LEN]) -> bool {
        true
    }
}
