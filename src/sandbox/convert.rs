//! JSON bridging between host data and engine values.
//!
//! Everything crossing the sandbox boundary is JSON-shaped: init data and
//! hostcall results go in with [`json_to_js`], script-produced records come
//! back out with [`js_to_json`]. Functions and symbols flatten to null.

use rquickjs::{Ctx, IntoJs, Object, Value};

/// Build an engine value from JSON.
pub fn json_to_js<'js>(ctx: &Ctx<'js>, value: &serde_json::Value) -> rquickjs::Result<Value<'js>> {
    match value {
        serde_json::Value::Null => Ok(Value::new_null(ctx.clone())),
        serde_json::Value::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // Ledger amounts overflow i32; those ride as floats.
                if let Ok(small) = i32::try_from(i) {
                    Ok(Value::new_int(ctx.clone(), small))
                } else {
                    Ok(Value::new_float(ctx.clone(), i as f64))
                }
            } else if let Some(f) = n.as_f64() {
                Ok(Value::new_float(ctx.clone(), f))
            } else {
                Ok(Value::new_null(ctx.clone()))
            }
        }
        serde_json::Value::String(s) => s.clone().into_js(ctx),
        serde_json::Value::Array(items) => {
            let arr = rquickjs::Array::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                arr.set(i, json_to_js(ctx, item)?)?;
            }
            Ok(arr.into_value())
        }
        serde_json::Value::Object(fields) => {
            let obj = Object::new(ctx.clone())?;
            for (key, item) in fields {
                obj.set(key.as_str(), json_to_js(ctx, item)?)?;
            }
            Ok(obj.into_value())
        }
    }
}

/// Conversion bottoms out here. Scripts can hand back cyclic values
/// (`t.push(t)`); anything past this depth flattens to null.
const MAX_DEPTH: usize = 64;

/// Flatten an engine value to JSON. Depth-bounded, so cyclic or absurdly
/// nested script values cannot recurse the host stack.
pub fn js_to_json<'js>(value: Value<'js>) -> rquickjs::Result<serde_json::Value> {
    js_to_json_bounded(value, MAX_DEPTH)
}

fn js_to_json_bounded<'js>(value: Value<'js>, depth: usize) -> rquickjs::Result<serde_json::Value> {
    if depth == 0 {
        return Ok(serde_json::Value::Null);
    }
    if value.is_null() || value.is_undefined() {
        return Ok(serde_json::Value::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(serde_json::Value::Bool(b));
    }
    if let Some(i) = value.as_int() {
        return Ok(serde_json::json!(i));
    }
    if let Some(f) = value.as_float() {
        return Ok(serde_json::json!(f));
    }
    if let Some(s) = value.as_string() {
        return Ok(serde_json::Value::String(s.to_string()?));
    }
    // Functions satisfy as_object; catch them first.
    if value.is_function() {
        return Ok(serde_json::Value::Null);
    }
    if let Some(arr) = value.as_array() {
        let mut items = Vec::with_capacity(arr.len());
        for i in 0..arr.len() {
            let item: Value = arr.get(i)?;
            items.push(js_to_json_bounded(item, depth - 1)?);
        }
        return Ok(serde_json::Value::Array(items));
    }
    if let Some(obj) = value.as_object() {
        let mut fields = serde_json::Map::new();
        for prop in obj.props::<String, Value<'js>>() {
            let (key, item) = prop?;
            fields.insert(key, js_to_json_bounded(item, depth - 1)?);
        }
        return Ok(serde_json::Value::Object(fields));
    }
    Ok(serde_json::Value::Null)
}

/// Render an engine-level failure for diagnostics. Script exceptions carry
/// their own message and stack through structured channels; this covers the
/// rest (OOM, interrupts, conversion faults).
pub fn engine_error_text(err: &rquickjs::Error) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{AsyncContext, AsyncRuntime};

    async fn fresh_context() -> AsyncContext {
        let runtime = AsyncRuntime::new().unwrap();
        AsyncContext::full(&runtime).await.unwrap()
    }

    #[tokio::test]
    async fn json_roundtrips_through_the_engine() {
        let context = fresh_context().await;
        context
            .with(|ctx| {
                let input = serde_json::json!({
                    "name": "balance check",
                    "count": 3,
                    "ratio": 0.5,
                    "flags": [true, false, null],
                    "nested": {"accountId": "0.0.1001"},
                });
                let js = json_to_js(&ctx, &input).unwrap();
                let back = js_to_json(js).unwrap();
                assert_eq!(back, input);
            })
            .await;
    }

    #[tokio::test]
    async fn large_integers_survive_as_floats() {
        let context = fresh_context().await;
        context
            .with(|ctx| {
                let input = serde_json::json!({"tinybars": 5_000_000_000i64});
                let js = json_to_js(&ctx, &input).unwrap();
                let back = js_to_json(js).unwrap();
                assert_eq!(back["tinybars"].as_f64(), Some(5_000_000_000.0));
            })
            .await;
    }

    #[tokio::test]
    async fn functions_flatten_to_null() {
        let context = fresh_context().await;
        context
            .with(|ctx| {
                let value: Value = ctx.eval("(function () { return 1; })").unwrap();
                assert_eq!(js_to_json(value).unwrap(), serde_json::Value::Null);
            })
            .await;
    }

    #[tokio::test]
    async fn cyclic_values_flatten_instead_of_recursing_forever() {
        let context = fresh_context().await;
        context
            .with(|ctx| {
                let value: Value = ctx
                    .eval("(() => { const t = []; t.push(t); return { tools: t }; })()")
                    .unwrap();
                let json = js_to_json(value).unwrap();
                // the chain bottoms out as null instead of aborting the host
                let tools = json.get("tools").unwrap();
                assert!(tools.is_array());
            })
            .await;
    }

    #[tokio::test]
    async fn undefined_and_null_both_map_to_null() {
        let context = fresh_context().await;
        context
            .with(|ctx| {
                let undef: Value = ctx.eval("undefined").unwrap();
                let null: Value = ctx.eval("null").unwrap();
                assert_eq!(js_to_json(undef).unwrap(), serde_json::Value::Null);
                assert_eq!(js_to_json(null).unwrap(), serde_json::Value::Null);
            })
            .await;
    }
}
