//! `Promise` and the timer functions
//!
//! Combinators (`all`, `allSettled`, `race`, `any`) attach native reactions
//! to each input and settle a fresh promise from shared bookkeeping.

use super::{arg, define_constructor, define_global, native};
use crate::event_loop::PromiseRef;
use crate::runtime::inspect::inspect;
use crate::runtime::interpreter::{Interpreter, Interrupt, JsResult};
use crate::runtime::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

pub fn register_promise(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.promise_prototype.clone();
    let constructor = define_constructor(
        interp,
        "Promise",
        1,
        &prototype,
        native(|interp, _, _| {
            Err(interp.type_error("Promise constructor cannot be invoked without 'new'"))
        }),
        native(|interp, _, args| {
            let executor = arg(args, 0);
            if !executor.is_callable() {
                return Err(interp.type_error(format!(
                    "Promise resolver {} is not a function",
                    inspect(&executor)
                )));
            }
            let promise = interp.event_loop.create_promise();
            let (resolve, reject) = interp.resolving_functions(&promise);
            match interp.call(&executor, Value::Undefined, &[resolve, reject.clone()]) {
                Ok(_) => {}
                Err(Interrupt::Throw(reason)) => {
                    interp.call(&reject, Value::Undefined, &[reason])?;
                }
                Err(abort) => return Err(abort),
            }
            Ok(interp.promise_object(promise))
        }),
    );

    interp.define_method(&constructor, "resolve", 1, |interp, _, args| {
        let value = arg(args, 0);
        if Interpreter::promise_state(&value).is_some() {
            return Ok(value);
        }
        let promise = interp.promise_resolve(value)?;
        Ok(interp.promise_object(promise))
    });

    interp.define_method(&constructor, "reject", 1, |interp, _, args| {
        let promise = interp.event_loop.create_promise();
        interp.event_loop.reject_promise(&promise, arg(args, 0));
        Ok(interp.promise_object(promise))
    });

    interp.define_method(&constructor, "all", 1, |interp, _, args| {
        combine(interp, &arg(args, 0), Combinator::All)
    });
    interp.define_method(&constructor, "allSettled", 1, |interp, _, args| {
        combine(interp, &arg(args, 0), Combinator::AllSettled)
    });
    interp.define_method(&constructor, "any", 1, |interp, _, args| {
        combine(interp, &arg(args, 0), Combinator::Any)
    });
    interp.define_method(&constructor, "race", 1, |interp, _, args| {
        let items = interp.iterate(&arg(args, 0))?;
        let result = interp.event_loop.create_promise();
        let (resolve, reject) = interp.resolving_functions(&result);
        for item in items {
            let input = interp.promise_resolve(item)?;
            interp.promise_then(&input, Some(resolve.clone()), Some(reject.clone()));
        }
        Ok(interp.promise_object(result))
    });

    interp.define_method(&prototype, "then", 2, |interp, this, args| {
        let promise = this_promise(interp, this, "then")?;
        let on_fulfilled = Some(arg(args, 0));
        let on_rejected = Some(arg(args, 1));
        Ok(interp.promise_then(&promise, on_fulfilled, on_rejected))
    });

    interp.define_method(&prototype, "catch", 1, |interp, this, args| {
        let promise = this_promise(interp, this, "catch")?;
        Ok(interp.promise_then(&promise, None, Some(arg(args, 0))))
    });

    interp.define_method(&prototype, "finally", 1, |interp, this, args| {
        let promise = this_promise(interp, this, "finally")?;
        let callback = arg(args, 0);
        if !callback.is_callable() {
            return Ok(interp.promise_then(&promise, None, None));
        }
        let on_fulfilled = {
            let callback = callback.clone();
            interp.native_function("", 1, move |interp, _, args| {
                interp.call(&callback, Value::Undefined, &[])?;
                Ok(arg(args, 0))
            })
        };
        let on_rejected = interp.native_function("", 1, move |interp, _, args| {
            interp.call(&callback, Value::Undefined, &[])?;
            Err(Interrupt::Throw(arg(args, 0)))
        });
        Ok(interp.promise_then(&promise, Some(on_fulfilled), Some(on_rejected)))
    });
}

fn this_promise(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<PromiseRef> {
    Interpreter::promise_state(this).ok_or_else(|| {
        interp.type_error(format!(
            "Method Promise.prototype.{} called on incompatible receiver {}",
            method,
            inspect(this)
        ))
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Combinator {
    All,
    AllSettled,
    Any,
}

/// Shared state of one `Promise.all`-style call
struct Pending {
    slots: Vec<Value>,
    remaining: usize,
}

fn combine(interp: &mut Interpreter, iterable: &Value, kind: Combinator) -> JsResult<Value> {
    let items = interp.iterate(iterable)?;
    let result = interp.event_loop.create_promise();
    let (resolve, reject) = interp.resolving_functions(&result);

    if items.is_empty() {
        if kind == Combinator::Any {
            let error = interp.make_error("Error", "All promises were rejected");
            interp.call(&reject, Value::Undefined, &[error])?;
        } else {
            let empty = interp.new_array(Vec::new());
            interp.call(&resolve, Value::Undefined, &[empty])?;
        }
        return Ok(interp.promise_object(result));
    }

    let pending = Rc::new(RefCell::new(Pending {
        slots: vec![Value::Undefined; items.len()],
        remaining: items.len(),
    }));

    for (index, item) in items.into_iter().enumerate() {
        let input = interp.promise_resolve(item)?;
        // Records one outcome; the last one settles `result` through `settle`
        let record = |settle: Value, wrap: fn(&Interpreter, Value) -> Value| {
            let pending = pending.clone();
            move |interp: &mut Interpreter, _: &Value, args: &[Value]| -> JsResult<Value> {
                let done = {
                    let mut p = pending.borrow_mut();
                    p.slots[index] = wrap(interp, arg(args, 0));
                    p.remaining -= 1;
                    p.remaining == 0
                };
                if done {
                    let values = std::mem::take(&mut pending.borrow_mut().slots);
                    let outcome = match kind {
                        Combinator::Any => {
                            let error = interp.make_error("Error", "All promises were rejected");
                            if let Value::Object(obj) = &error {
                                obj.borrow_mut().set_own("errors", interp.new_array(values));
                            }
                            error
                        }
                        _ => interp.new_array(values),
                    };
                    interp.call(&settle, Value::Undefined, &[outcome])?;
                }
                Ok(Value::Undefined)
            }
        };

        let (on_fulfilled, on_rejected) = match kind {
            Combinator::All => (
                interp.native_function("", 1, record(resolve.clone(), |_, v| v)),
                reject.clone(),
            ),
            Combinator::AllSettled => (
                interp.native_function("", 1, record(resolve.clone(), |i, v| settled(i, "fulfilled", "value", v))),
                interp.native_function("", 1, record(resolve.clone(), |i, v| settled(i, "rejected", "reason", v))),
            ),
            Combinator::Any => (
                resolve.clone(),
                interp.native_function("", 1, record(reject.clone(), |_, v| v)),
            ),
        };
        interp.promise_then(&input, Some(on_fulfilled), Some(on_rejected));
    }
    Ok(interp.promise_object(result))
}

/// `{ status, value }` / `{ status, reason }` entry of `allSettled`
fn settled(interp: &Interpreter, status: &str, key: &str, value: Value) -> Value {
    let entry = interp.new_object();
    {
        let mut e = entry.borrow_mut();
        e.set_own("status", Value::from(status));
        e.set_own(key, value);
    }
    Value::Object(entry)
}

pub fn register_timers(interp: &mut Interpreter) {
    let set_timeout = interp.native_function("setTimeout", 2, |interp, _, args| {
        let callback = arg(args, 0);
        if !callback.is_callable() {
            return Err(interp.type_error(format!(
                "The \"callback\" argument must be of type function. Received {}",
                inspect(&callback)
            )));
        }
        let delay = interp.to_number(&arg(args, 1))?;
        let delay = if delay.is_finite() && delay > 0.0 {
            delay as u64
        } else {
            0
        };
        let extra = args.get(2..).unwrap_or(&[]).to_vec();
        let id = interp.event_loop.schedule_timer(callback, extra, delay);
        Ok(Value::Number(id as f64))
    });
    define_global(interp, "setTimeout", set_timeout);

    let clear_timeout = interp.native_function("clearTimeout", 1, |interp, _, args| {
        if let Value::Number(id) = arg(args, 0) {
            if id >= 0.0 {
                interp.event_loop.cancel_timer(id as u64);
            }
        }
        Ok(Value::Undefined)
    });
    define_global(interp, "clearTimeout", clear_timeout);
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    fn eval_log(source: &str) -> String {
        let mut runtime = Runtime::new();
        runtime
            .eval(&format!("const log = []; {}", source))
            .expect("eval");
        runtime.eval("log.join(',')").expect("eval").to_js_string()
    }

    #[test]
    fn test_microtasks_run_after_sync_code() {
        assert_eq!(
            eval_log("Promise.resolve(1).then(v => log.push('then' + v)); log.push('sync');"),
            "sync,then1"
        );
    }

    #[test]
    fn test_timers_after_microtasks() {
        assert_eq!(
            eval_log(
                "setTimeout(() => log.push('t2'), 20);
                 setTimeout(() => log.push('t1'), 10);
                 Promise.resolve().then(() => log.push('micro'));"
            ),
            "micro,t1,t2"
        );
    }

    #[test]
    fn test_clear_timeout() {
        assert_eq!(
            eval_log("const id = setTimeout(() => log.push('no'), 5); clearTimeout(id); log.push('ok');"),
            "ok"
        );
    }

    #[test]
    fn test_executor_and_chaining() {
        assert_eq!(
            eval_log(
                "new Promise(r => setTimeout(() => r(2), 10))
                    .then(v => v * 3)
                    .then(v => { throw new Error('e' + v); })
                    .catch(e => log.push(e.message))
                    .finally(() => log.push('done'));"
            ),
            "e6,done"
        );
    }

    #[test]
    fn test_combinators() {
        assert_eq!(
            eval_log("Promise.all([1, Promise.resolve(2), new Promise(r => setTimeout(() => r(3), 5))]).then(v => log.push(v.join('+')));"),
            "1+2+3"
        );
        assert_eq!(
            eval_log("Promise.all([Promise.reject(new Error('x')), 1]).catch(e => log.push(e.message));"),
            "x"
        );
        assert_eq!(
            eval_log("Promise.race([new Promise(r => setTimeout(() => r('slow'), 50)), new Promise(r => setTimeout(() => r('fast'), 5))]).then(v => log.push(v));"),
            "fast"
        );
        assert_eq!(
            eval_log("Promise.allSettled([Promise.reject(1), 2]).then(r => log.push(r.map(x => x.status).join('/')));"),
            "rejected/fulfilled"
        );
    }

    #[test]
    fn test_async_await() {
        assert_eq!(
            eval_log(
                "async function load() { const v = await new Promise(r => setTimeout(() => r(5), 100)); return v + 1; }
                 load().then(v => log.push(v));"
            ),
            "6"
        );
    }
}
