//! Conversions between interpreter objects and host [`Value`]s.
//!
//! This is the fixed decode table of the scripting surface: none, bool,
//! int, float and str map to their `Value` counterparts; lists, tuples and
//! string-keyed dicts map to `Value::Json`; everything else is opaque and
//! decodes to its `repr()` string. Bool is checked before int because
//! Python bools are ints.

use pyrite_types::{value_to_json, Value};
use rustpython_vm::{AsObject, PyObjectRef, PyResult, TryFromObject, VirtualMachine};

/// Decode an interpreter object into a host value.
pub(crate) fn to_value(vm: &VirtualMachine, obj: &PyObjectRef) -> PyResult<Value> {
    if vm.is_none(obj) {
        return Ok(Value::None);
    }
    if obj.fast_isinstance(vm.ctx.types.bool_type) {
        let n = i64::try_from_object(vm, obj.clone())?;
        return Ok(Value::Bool(n != 0));
    }
    if obj.fast_isinstance(vm.ctx.types.int_type) {
        // Ints that do not fit i64 decode to their decimal string.
        return Ok(match i64::try_from_object(vm, obj.clone()) {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Str(obj.str(vm)?.as_str().to_owned()),
        });
    }
    if obj.fast_isinstance(vm.ctx.types.float_type) {
        return Ok(Value::Float(f64::try_from_object(vm, obj.clone())?));
    }
    if obj.fast_isinstance(vm.ctx.types.str_type) {
        return Ok(Value::Str(obj.str(vm)?.as_str().to_owned()));
    }
    if obj.fast_isinstance(vm.ctx.types.list_type)
        || obj.fast_isinstance(vm.ctx.types.tuple_type)
    {
        let elements = vm.extract_elements_with(obj, Ok)?;
        let mut array = Vec::with_capacity(elements.len());
        for element in &elements {
            array.push(value_to_json(&to_value(vm, element)?));
        }
        return Ok(Value::Json(serde_json::Value::Array(array)));
    }
    if obj.fast_isinstance(vm.ctx.types.dict_type) {
        if let Some(map) = dict_to_json(vm, obj)? {
            return Ok(Value::Json(serde_json::Value::Object(map)));
        }
        // Non-string keys: fall through to the opaque representation.
    }
    Ok(Value::Str(opaque_repr(vm, obj)))
}

/// Encode a host value into an interpreter object.
pub(crate) fn to_py(vm: &VirtualMachine, value: &Value) -> PyResult<PyObjectRef> {
    Ok(match value {
        Value::None => vm.ctx.none(),
        Value::Bool(b) => vm.ctx.new_bool(*b).into(),
        Value::Int(n) => vm.ctx.new_int(*n).into(),
        Value::Float(f) => vm.ctx.new_float(*f).into(),
        Value::Str(s) => vm.ctx.new_str(s.as_str()).into(),
        Value::Json(json) => json_to_py(vm, json)?,
    })
}

fn json_to_py(vm: &VirtualMachine, json: &serde_json::Value) -> PyResult<PyObjectRef> {
    Ok(match json {
        serde_json::Value::Null => vm.ctx.none(),
        serde_json::Value::Bool(b) => vm.ctx.new_bool(*b).into(),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                vm.ctx.new_int(i).into()
            } else if let Some(f) = n.as_f64() {
                vm.ctx.new_float(f).into()
            } else {
                vm.ctx.new_str(n.to_string()).into()
            }
        }
        serde_json::Value::String(s) => vm.ctx.new_str(s.as_str()).into(),
        serde_json::Value::Array(items) => {
            let mut elements = Vec::with_capacity(items.len());
            for item in items {
                elements.push(json_to_py(vm, item)?);
            }
            vm.ctx.new_list(elements).into()
        }
        serde_json::Value::Object(map) => {
            let dict = vm.ctx.new_dict();
            for (key, item) in map {
                dict.set_item(key.as_str(), json_to_py(vm, item)?, vm)?;
            }
            dict.into()
        }
    })
}

/// Decode a dict with string keys, or `None` if any key is not a string.
fn dict_to_json(
    vm: &VirtualMachine,
    obj: &PyObjectRef,
) -> PyResult<Option<serde_json::Map<String, serde_json::Value>>> {
    let items = vm.call_method(obj, "items", ())?;
    let pairs = vm.extract_elements_with(&items, Ok)?;
    let mut map = serde_json::Map::with_capacity(pairs.len());
    for pair in &pairs {
        let kv = vm.extract_elements_with(pair, Ok)?;
        if kv.len() != 2 {
            return Ok(None);
        }
        if !kv[0].fast_isinstance(vm.ctx.types.str_type) {
            return Ok(None);
        }
        let key = kv[0].str(vm)?.as_str().to_owned();
        map.insert(key, value_to_json(&to_value(vm, &kv[1])?));
    }
    Ok(Some(map))
}

fn opaque_repr(vm: &VirtualMachine, obj: &PyObjectRef) -> String {
    obj.repr(vm)
        .map(|s| s.as_str().to_owned())
        .unwrap_or_else(|_| "<unrepresentable object>".to_owned())
}
