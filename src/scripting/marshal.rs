//! Host values crossing into the sandbox, and argument checks for the
//! host functions.

use super::scriptable::ScriptableMap;
use mlua::prelude::*;

/// A value the host can hand to a listener.
///
/// Maps travel as [`ScriptableMap`] userdata, so only the curated wrapper
/// methods are reachable from script code.
#[derive(Debug, Clone)]
pub enum HostValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Map(ScriptableMap),
}

impl IntoLua for HostValue {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        match self {
            Self::Nil => Ok(LuaValue::Nil),
            Self::Boolean(value) => Ok(LuaValue::Boolean(value)),
            Self::Integer(value) => value.into_lua(lua),
            Self::Number(value) => Ok(LuaValue::Number(value)),
            Self::String(value) => lua.create_string(value).map(LuaValue::String),
            Self::Map(map) => lua.create_userdata(map).map(LuaValue::UserData),
        }
    }
}

impl From<ScriptableMap> for HostValue {
    fn from(map: ScriptableMap) -> Self {
        Self::Map(map)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Converts listener arguments; the first failure aborts the call.
pub fn convert_args(lua: &Lua, args: Vec<HostValue>) -> LuaResult<LuaMultiValue> {
    args.into_iter().map(|arg| arg.into_lua(lua)).collect()
}

pub fn usage(signature: &str) -> LuaError {
    LuaError::runtime(format!("Usage: {signature}"))
}

/// Checks that exactly `count` arguments were passed.
pub fn expect_arity(args: &[LuaValue], count: usize, signature: &str) -> LuaResult<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(usage(signature))
    }
}

/// Reads argument `index` as a UTF-8 string.
pub fn string_arg(args: &[LuaValue], index: usize, signature: &str) -> LuaResult<String> {
    match args.get(index) {
        Some(LuaValue::String(s)) => Ok(s.to_str().map_err(|_| usage(signature))?.to_string()),
        _ => Err(usage(signature)),
    }
}

/// Reads argument `index` as raw string bytes.
pub fn bytes_arg(args: &[LuaValue], index: usize, signature: &str) -> LuaResult<Vec<u8>> {
    match args.get(index) {
        Some(LuaValue::String(s)) => Ok(s.as_bytes().to_vec()),
        _ => Err(usage(signature)),
    }
}

pub fn function_arg(args: &[LuaValue], index: usize, signature: &str) -> LuaResult<LuaFunction> {
    match args.get(index) {
        Some(LuaValue::Function(f)) => Ok(f.clone()),
        _ => Err(usage(signature)),
    }
}
