//! `Array` and `Array.prototype`

use super::{arg, call_with_index, define_constructor, native};
use crate::error::messages;
use crate::runtime::interpreter::{Interpreter, JsResult, MAX_VALUE_DEPTH};
use crate::runtime::object::{ObjectKind, ObjectRef};
use crate::runtime::value::{relative_index, Value};

pub fn register_array(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.array_prototype.clone();
    let constructor = define_constructor(
        interp,
        "Array",
        1,
        &prototype,
        native(construct_array),
        native(construct_array),
    );

    interp.define_method(&constructor, "isArray", 1, |_, _, args| {
        Ok(Value::Boolean(arg(args, 0).is_array()))
    });

    interp.define_method(&constructor, "of", 0, |interp, _, args| {
        Ok(interp.new_array(args.to_vec()))
    });

    interp.define_method(&constructor, "from", 1, |interp, _, args| {
        let source = arg(args, 0);
        let items = match &source {
            Value::Undefined | Value::Null => {
                return Err(interp.type_error(format!(
                    "{} is not iterable",
                    source.to_js_string()
                )));
            }
            Value::String(_) => interp.iterate(&source)?,
            Value::Object(obj) => {
                let iterable = matches!(
                    obj.borrow().kind,
                    ObjectKind::Array(_) | ObjectKind::Map(_) | ObjectKind::Set(_)
                );
                if iterable {
                    interp.iterate(&source)?
                } else {
                    // array-like: { length: n }
                    let length = interp.get(&source, "length")?;
                    let length = interp.to_number(&length)?;
                    let length = if length.is_finite() && length > 0.0 {
                        length as usize
                    } else {
                        0
                    };
                    let mut items = Vec::with_capacity(length);
                    for i in 0..length {
                        items.push(interp.get(&source, &i.to_string())?);
                    }
                    items
                }
            }
            _ => Vec::new(),
        };
        let map_fn = arg(args, 1);
        if !map_fn.is_callable() {
            return Ok(interp.new_array(items));
        }
        let mut mapped = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            mapped.push(interp.call(&map_fn, Value::Undefined, &[item, Value::Number(i as f64)])?);
        }
        Ok(interp.new_array(mapped))
    });

    register_mutators(interp);
    register_accessors(interp);
    register_iteration(interp);
}

/// `Array(n)` / `Array(a, b, c)`
fn construct_array(interp: &mut Interpreter, _: &Value, args: &[Value]) -> JsResult<Value> {
    if let [Value::Number(n)] = args {
        if n.fract() != 0.0 || *n < 0.0 || *n > u32::MAX as f64 {
            return Err(interp.range_error("Invalid array length"));
        }
        return Ok(interp.new_array(vec![Value::Undefined; *n as usize]));
    }
    Ok(interp.new_array(args.to_vec()))
}

fn this_array(interp: &Interpreter, this: &Value, method: &str) -> JsResult<ObjectRef> {
    match this {
        Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Array(_)) => Ok(obj.clone()),
        _ => Err(interp.type_error(format!(
            "Array.prototype.{} called on a non-array",
            method
        ))),
    }
}

fn snapshot(array: &ObjectRef) -> Vec<Value> {
    array.borrow().array_elements().cloned().unwrap_or_default()
}

fn element_at(array: &ObjectRef, index: usize) -> Option<Value> {
    array
        .borrow()
        .array_elements()
        .and_then(|elements| elements.get(index).cloned())
}

/// Mutate the elements of an array, refusing frozen arrays
fn mutate<R>(
    interp: &Interpreter,
    array: &ObjectRef,
    f: impl FnOnce(&mut Vec<Value>) -> R,
) -> JsResult<R> {
    let mut obj = array.borrow_mut();
    if obj.is_frozen() {
        return Err(interp.type_error("Cannot modify a frozen array"));
    }
    match &mut obj.kind {
        ObjectKind::Array(elements) => Ok(f(elements)),
        _ => Err(interp.type_error("not an array")),
    }
}

fn register_mutators(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.array_prototype.clone();

    interp.define_method(&prototype, "push", 1, |interp, this, args| {
        let array = this_array(interp, this, "push")?;
        let len = mutate(interp, &array, |elements| {
            elements.extend_from_slice(args);
            elements.len()
        })?;
        Ok(Value::Number(len as f64))
    });

    interp.define_method(&prototype, "pop", 0, |interp, this, _| {
        let array = this_array(interp, this, "pop")?;
        Ok(mutate(interp, &array, Vec::pop)?.unwrap_or_default())
    });

    interp.define_method(&prototype, "shift", 0, |interp, this, _| {
        let array = this_array(interp, this, "shift")?;
        let first = mutate(interp, &array, |elements| {
            (!elements.is_empty()).then(|| elements.remove(0))
        })?;
        Ok(first.unwrap_or_default())
    });

    interp.define_method(&prototype, "unshift", 1, |interp, this, args| {
        let array = this_array(interp, this, "unshift")?;
        let len = mutate(interp, &array, |elements| {
            elements.splice(0..0, args.iter().cloned());
            elements.len()
        })?;
        Ok(Value::Number(len as f64))
    });

    interp.define_method(&prototype, "splice", 2, |interp, this, args| {
        let array = this_array(interp, this, "splice")?;
        let len = snapshot(&array).len();
        let start = relative_index(interp.to_number(&arg(args, 0))?, len);
        let delete_count = match args.len() {
            0 => 0,
            1 => len - start,
            _ => {
                let count = interp.to_number(&arg(args, 1))?;
                let count = if count.is_nan() { 0.0 } else { count.trunc() };
                (count.max(0.0) as usize).min(len - start)
            }
        };
        let inserted: Vec<Value> = args.iter().skip(2).cloned().collect();
        let removed = mutate(interp, &array, |elements| {
            elements
                .splice(start..start + delete_count, inserted)
                .collect::<Vec<_>>()
        })?;
        Ok(interp.new_array(removed))
    });

    interp.define_method(&prototype, "reverse", 0, |interp, this, _| {
        let array = this_array(interp, this, "reverse")?;
        mutate(interp, &array, |elements| elements.reverse())?;
        Ok(this.clone())
    });

    interp.define_method(&prototype, "fill", 1, |interp, this, args| {
        let array = this_array(interp, this, "fill")?;
        let len = snapshot(&array).len();
        let value = arg(args, 0);
        let start = relative_index(interp.to_number(&arg(args, 1))?, len);
        let end = match arg(args, 2) {
            Value::Undefined => len,
            other => relative_index(interp.to_number(&other)?, len),
        };
        mutate(interp, &array, |elements| {
            for slot in elements.iter_mut().take(end).skip(start) {
                *slot = value.clone();
            }
        })?;
        Ok(this.clone())
    });

    interp.define_method(&prototype, "sort", 1, |interp, this, args| {
        let array = this_array(interp, this, "sort")?;
        let compare = arg(args, 0);
        if !compare.is_undefined() && !compare.is_callable() {
            return Err(interp.type_error(
                "The comparison function must be either a function or undefined",
            ));
        }
        let sorted = merge_sort(interp, snapshot(&array), &compare)?;
        mutate(interp, &array, |elements| *elements = sorted)?;
        Ok(this.clone())
    });
}

fn register_accessors(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.array_prototype.clone();

    interp.define_method(&prototype, "slice", 2, |interp, this, args| {
        let elements = snapshot(&this_array(interp, this, "slice")?);
        let len = elements.len();
        let start = relative_index(interp.to_number(&arg(args, 0))?, len);
        let end = match arg(args, 1) {
            Value::Undefined => len,
            other => relative_index(interp.to_number(&other)?, len),
        };
        let slice = if start < end {
            elements[start..end].to_vec()
        } else {
            Vec::new()
        };
        Ok(interp.new_array(slice))
    });

    interp.define_method(&prototype, "concat", 1, |interp, this, args| {
        let mut result = snapshot(&this_array(interp, this, "concat")?);
        for value in args {
            match value.as_object().and_then(|o| o.borrow().array_elements().cloned()) {
                Some(elements) => result.extend(elements),
                None => result.push(value.clone()),
            }
        }
        Ok(interp.new_array(result))
    });

    interp.define_method(&prototype, "join", 1, |interp, this, args| {
        let elements = snapshot(&this_array(interp, this, "join")?);
        let separator = match arg(args, 0) {
            Value::Undefined => ",".to_string(),
            other => interp.to_string(&other)?,
        };
        join(interp, &elements, &separator).map(Value::String)
    });

    interp.define_method(&prototype, "toString", 0, |interp, this, _| {
        let elements = snapshot(&this_array(interp, this, "toString")?);
        join(interp, &elements, ",").map(Value::String)
    });

    interp.define_method(&prototype, "indexOf", 1, |interp, this, args| {
        let elements = snapshot(&this_array(interp, this, "indexOf")?);
        let target = arg(args, 0);
        let start = relative_index(interp.to_number(&arg(args, 1))?, elements.len());
        let found = elements
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, v)| v.strict_equals(&target))
            .map(|(i, _)| i as f64);
        Ok(Value::Number(found.unwrap_or(-1.0)))
    });

    interp.define_method(&prototype, "lastIndexOf", 1, |interp, this, args| {
        let elements = snapshot(&this_array(interp, this, "lastIndexOf")?);
        let target = arg(args, 0);
        let found = elements
            .iter()
            .rposition(|v| v.strict_equals(&target))
            .map(|i| i as f64);
        Ok(Value::Number(found.unwrap_or(-1.0)))
    });

    interp.define_method(&prototype, "includes", 1, |interp, this, args| {
        let elements = snapshot(&this_array(interp, this, "includes")?);
        let target = arg(args, 0);
        Ok(Value::Boolean(
            elements.iter().any(|v| v.same_value_zero(&target)),
        ))
    });

    interp.define_method(&prototype, "at", 1, |interp, this, args| {
        let elements = snapshot(&this_array(interp, this, "at")?);
        let index = interp.to_number(&arg(args, 0))?;
        let index = if index.is_nan() { 0.0 } else { index.trunc() };
        let index = if index < 0.0 {
            elements.len() as f64 + index
        } else {
            index
        };
        Ok(if index < 0.0 {
            Value::Undefined
        } else {
            elements.get(index as usize).cloned().unwrap_or_default()
        })
    });

    interp.define_method(&prototype, "flat", 0, |interp, this, args| {
        let elements = snapshot(&this_array(interp, this, "flat")?);
        let depth = match arg(args, 0) {
            Value::Undefined => 1.0,
            other => interp.to_number(&other)?,
        };
        let mut result = Vec::new();
        flatten_into(interp, &mut result, elements, depth)?;
        Ok(interp.new_array(result))
    });
}

fn register_iteration(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.array_prototype.clone();

    interp.define_method(&prototype, "forEach", 1, |interp, this, args| {
        let array = this_array(interp, this, "forEach")?;
        let callback = callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        let len = snapshot(&array).len();
        for i in 0..len {
            let Some(element) = element_at(&array, i) else {
                break;
            };
            call_with_index(interp, &callback, &this_arg, element, i, this)?;
        }
        Ok(Value::Undefined)
    });

    interp.define_method(&prototype, "map", 1, |interp, this, args| {
        let array = this_array(interp, this, "map")?;
        let callback = callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        let elements = snapshot(&array);
        let mut result = Vec::with_capacity(elements.len());
        for (i, element) in elements.into_iter().enumerate() {
            result.push(call_with_index(interp, &callback, &this_arg, element, i, this)?);
        }
        Ok(interp.new_array(result))
    });

    interp.define_method(&prototype, "flatMap", 1, |interp, this, args| {
        let array = this_array(interp, this, "flatMap")?;
        let callback = callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        let mut result = Vec::new();
        for (i, element) in snapshot(&array).into_iter().enumerate() {
            let mapped = call_with_index(interp, &callback, &this_arg, element, i, this)?;
            flatten_into(interp, &mut result, vec![mapped], 1.0)?;
        }
        Ok(interp.new_array(result))
    });

    interp.define_method(&prototype, "filter", 1, |interp, this, args| {
        let array = this_array(interp, this, "filter")?;
        let callback = callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        let mut result = Vec::new();
        for (i, element) in snapshot(&array).into_iter().enumerate() {
            if call_with_index(interp, &callback, &this_arg, element.clone(), i, this)?
                .to_boolean()
            {
                result.push(element);
            }
        }
        Ok(interp.new_array(result))
    });

    interp.define_method(&prototype, "find", 1, |interp, this, args| {
        Ok(find(interp, this, args, "find", false)?
            .map(|(_, v)| v)
            .unwrap_or_default())
    });

    interp.define_method(&prototype, "findIndex", 1, |interp, this, args| {
        let index = find(interp, this, args, "findIndex", false)?.map(|(i, _)| i as f64);
        Ok(Value::Number(index.unwrap_or(-1.0)))
    });

    interp.define_method(&prototype, "findLast", 1, |interp, this, args| {
        Ok(find(interp, this, args, "findLast", true)?
            .map(|(_, v)| v)
            .unwrap_or_default())
    });

    interp.define_method(&prototype, "some", 1, |interp, this, args| {
        Ok(Value::Boolean(
            find(interp, this, args, "some", false)?.is_some(),
        ))
    });

    interp.define_method(&prototype, "every", 1, |interp, this, args| {
        let array = this_array(interp, this, "every")?;
        let callback = callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        for (i, element) in snapshot(&array).into_iter().enumerate() {
            if !call_with_index(interp, &callback, &this_arg, element, i, this)?.to_boolean() {
                return Ok(Value::Boolean(false));
            }
        }
        Ok(Value::Boolean(true))
    });

    interp.define_method(&prototype, "reduce", 1, |interp, this, args| {
        let array = this_array(interp, this, "reduce")?;
        let elements = snapshot(&array);
        reduce(interp, this, args, elements.into_iter().enumerate().collect())
    });

    interp.define_method(&prototype, "reduceRight", 1, |interp, this, args| {
        let array = this_array(interp, this, "reduceRight")?;
        let elements = snapshot(&array);
        reduce(interp, this, args, elements.into_iter().enumerate().rev().collect())
    });
}

fn callable(interp: &Interpreter, value: &Value) -> JsResult<Value> {
    if value.is_callable() {
        Ok(value.clone())
    } else {
        Err(interp.type_error(format!(
            "{} is not a function",
            crate::runtime::inspect::inspect(value)
        )))
    }
}

/// First element (from the end when `reverse`) the predicate accepts
fn find(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    method: &str,
    reverse: bool,
) -> JsResult<Option<(usize, Value)>> {
    let array = this_array(interp, this, method)?;
    let callback = callable(interp, &arg(args, 0))?;
    let this_arg = arg(args, 1);
    let mut indexed: Vec<(usize, Value)> = snapshot(&array).into_iter().enumerate().collect();
    if reverse {
        indexed.reverse();
    }
    for (i, element) in indexed {
        if call_with_index(interp, &callback, &this_arg, element.clone(), i, this)?.to_boolean() {
            return Ok(Some((i, element)));
        }
    }
    Ok(None)
}

fn reduce(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    indexed: Vec<(usize, Value)>,
) -> JsResult<Value> {
    let callback = callable(interp, &arg(args, 0))?;
    let mut items = indexed.into_iter();
    let mut accumulator = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match items.next() {
            Some((_, first)) => first,
            None => {
                return Err(interp.type_error("Reduce of empty array with no initial value"));
            }
        },
    };
    for (i, element) in items {
        accumulator = interp.call(
            &callback,
            Value::Undefined,
            &[accumulator, element, Value::Number(i as f64), this.clone()],
        )?;
    }
    Ok(accumulator)
}

fn join(interp: &mut Interpreter, elements: &[Value], separator: &str) -> JsResult<String> {
    let mut parts = Vec::with_capacity(elements.len());
    for element in elements {
        parts.push(match element {
            Value::Undefined | Value::Null => String::new(),
            other => interp.to_string(other)?,
        });
    }
    Ok(parts.join(separator))
}

/// Append `elements` to `out`, splicing nested arrays up to `depth` levels.
/// Iterative, so self-containing arrays hit the depth limit instead of the
/// native stack.
fn flatten_into(
    interp: &Interpreter,
    out: &mut Vec<Value>,
    elements: Vec<Value>,
    depth: f64,
) -> JsResult<()> {
    let mut stack = vec![(elements.into_iter(), depth)];
    while let Some((iter, depth)) = stack.last_mut() {
        let Some(element) = iter.next() else {
            stack.pop();
            continue;
        };
        let nested = if *depth >= 1.0 {
            element
                .as_object()
                .and_then(|o| o.borrow().array_elements().cloned())
        } else {
            None
        };
        match nested {
            Some(inner) => {
                let depth = *depth - 1.0;
                if stack.len() >= MAX_VALUE_DEPTH {
                    return Err(interp.range_error(messages::STACK_OVERFLOW));
                }
                stack.push((inner.into_iter(), depth));
            }
            None => out.push(element),
        }
    }
    Ok(())
}

/// Stable merge sort. A comparator may throw or be inconsistent, so the
/// standard library sort (which may panic on inconsistent orderings) is
/// not used.
fn merge_sort(
    interp: &mut Interpreter,
    mut items: Vec<Value>,
    compare: &Value,
) -> JsResult<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(interp, items, compare)?;
    let right = merge_sort(interp, right, compare)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        if compare_elements(interp, compare, r, l)? < 0.0 {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn compare_elements(
    interp: &mut Interpreter,
    compare: &Value,
    a: &Value,
    b: &Value,
) -> JsResult<f64> {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => return Ok(0.0),
        (Value::Undefined, _) => return Ok(1.0),
        (_, Value::Undefined) => return Ok(-1.0),
        _ => {}
    }
    if compare.is_callable() {
        let result = interp.call(compare, Value::Undefined, &[a.clone(), b.clone()])?;
        let n = interp.to_number(&result)?;
        return Ok(if n.is_nan() { 0.0 } else { n });
    }
    let a = interp.to_string(a)?;
    let b = interp.to_string(b)?;
    Ok(match a.cmp(&b) {
        std::cmp::Ordering::Less => -1.0,
        std::cmp::Ordering::Equal => 0.0,
        std::cmp::Ordering::Greater => 1.0,
    })
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;

    fn eval_string(source: &str) -> String {
        Runtime::new().eval(source).expect("eval").to_js_string()
    }

    #[test]
    fn test_mutators() {
        assert_eq!(
            eval_string("const a = [1, 2, 3]; a.push(4); a.shift(); a.unshift(0); a.join()"),
            "0,2,3,4"
        );
        assert_eq!(
            eval_string("const a = [1, 2, 3, 4, 5]; const r = a.splice(1, 2, 'x'); a.join() + '|' + r.join()"),
            "1,x,4,5|2,3"
        );
        assert_eq!(eval_string("[1, 2, 3].fill(0, 1).join()"), "1,0,0");
    }

    #[test]
    fn test_sort_default_and_comparator() {
        assert_eq!(eval_string("[10, 9, 1, 100].sort().join()"), "1,10,100,9");
        assert_eq!(eval_string("[10, 9, 1, 100].sort((a, b) => a - b).join()"), "1,9,10,100");
        assert_eq!(
            eval_string("[{ k: 1, v: 'a' }, { k: 0, v: 'b' }, { k: 1, v: 'c' }].sort((x, y) => x.k - y.k).map(o => o.v).join('')"),
            "bac"
        );
    }

    #[test]
    fn test_higher_order_methods() {
        assert_eq!(
            eval_string("[1, 2, 3, 4].filter(n => n % 2 === 0).map(n => n * 10).join()"),
            "20,40"
        );
        assert_eq!(eval_string("[1, 2, 3].reduce((a, b) => a + b, 0)"), "6");
        assert_eq!(eval_string("[5, 12, 8].find(n => n > 6)"), "12");
        assert_eq!(eval_string("[5, 12, 8].findIndex(n => n > 100)"), "-1");
        assert_eq!(eval_string("[1, [2, [3, [4]]]].flat(2).length"), "4");
        assert_eq!(eval_string("[NaN].includes(NaN) && [NaN].indexOf(NaN) === -1"), "true");
    }

    #[test]
    fn test_reduce_empty_throws() {
        let err = Runtime::new().eval("[].reduce((a, b) => a + b)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Reduce of empty array with no initial value"
        );
    }

    #[test]
    fn test_flat_infinity_on_self_containing_array() {
        assert_eq!(eval_string("[1, [2, [3, [4]]]].flat(Infinity).join()"), "1,2,3,4");
        let err = Runtime::new()
            .eval("const a = [1]; a.push(a); a.flat(Infinity)")
            .unwrap_err();
        assert_eq!(err.to_string(), "RangeError: Maximum call stack size exceeded");
    }

    #[test]
    fn test_array_from() {
        assert_eq!(eval_string("Array.from('abc').join('-')"), "a-b-c");
        assert_eq!(eval_string("Array.from({ length: 3 }, (_, i) => i * 2).join()"), "0,2,4");
        assert_eq!(eval_string("Array.isArray([]) && !Array.isArray('x')"), "true");
    }
}
