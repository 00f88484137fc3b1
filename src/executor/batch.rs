//! INSERT batching: split a sequence parameter into fixed-size windows,
//! amortising prepared-statement reuse across them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::executor::{ExecHandler, Executor, PreparedHandler};
use crate::session::ExecResult;
use crate::value::Value;

/// The batchable parameter shapes: an ordered sequence, or a single-entry
/// map whose sole value is one (windows are re-wrapped under the same
/// key).
enum BatchParam {
    Plain(Vec<Value>),
    Keyed(String, Vec<Value>),
}

impl BatchParam {
    fn extract(value: Value) -> Result<BatchParam> {
        match value {
            Value::Array(items) => Ok(BatchParam::Plain(items)),
            Value::Map(mut entries) if entries.len() == 1 => {
                let (key, inner) = entries.pop_first().ok_or(Error::SliceOrArrayRequired)?;
                match inner {
                    Value::Array(items) => Ok(BatchParam::Keyed(key, items)),
                    _ => Err(Error::SliceOrArrayRequired),
                }
            }
            _ => Err(Error::SliceOrArrayRequired),
        }
    }

    fn len(&self) -> usize {
        match self {
            BatchParam::Plain(items) | BatchParam::Keyed(_, items) => items.len(),
        }
    }

    fn window(&self, start: usize, end: usize) -> Value {
        match self {
            BatchParam::Plain(items) => Value::Array(items[start..end].to_vec()),
            BatchParam::Keyed(key, items) => {
                let mut entries = BTreeMap::new();
                entries.insert(key.clone(), Value::Array(items[start..end].to_vec()));
                Value::Map(entries)
            }
        }
    }

    fn whole(self) -> Value {
        match self {
            BatchParam::Plain(items) => Value::Array(items),
            BatchParam::Keyed(key, items) => {
                let mut entries = BTreeMap::new();
                entries.insert(key, Value::Array(items));
                Value::Map(entries)
            }
        }
    }
}

/// Run a batched INSERT. Windows are rendered and executed one by one
/// through a shared single-slot prepared handler, so at most two distinct
/// statements are prepared: the full-window query and the remainder's.
/// A skip-wrapped batch failure is recorded and execution continues; any
/// other failure aborts, leaving session state to the caller's
/// transaction.
pub(crate) fn execute(
    executor: &Executor,
    batch_size: usize,
    value: Value,
) -> Result<ExecResult> {
    let param = BatchParam::extract(value)?;
    let total = param.len();
    let times = total.div_ceil(batch_size);
    if times <= 1 {
        return executor.exec_value(param.whole());
    }

    let prepared = Arc::new(Mutex::new(PreparedHandler::new(Arc::clone(
        executor.session(),
    ))));
    let tail: ExecHandler = {
        let prepared = Arc::clone(&prepared);
        Box::new(move |ctx, sql, args| {
            prepared
                .lock()
                .expect("prepared handler poisoned")
                .exec(ctx, sql, args)
        })
    };
    let mut handler = executor
        .middlewares()
        .exec_handler(executor.statement(), tail);

    let mut aggregate = ExecResult::default();
    let mut errors = Vec::new();
    for chunk in 0..times {
        let start = chunk * batch_size;
        let end = (start + batch_size).min(total);
        match executor.exec_through(&mut handler, param.window(start, end)) {
            Ok(result) => {
                aggregate.rows_affected += result.rows_affected;
                aggregate.last_insert_id = result.last_insert_id;
            }
            Err(e) if e.is_skip() => errors.push(e),
            Err(e) => return Err(e),
        }
    }

    if errors.is_empty() {
        Ok(aggregate)
    } else {
        Err(Error::Batch {
            batches: times,
            partial: aggregate,
            errors,
        })
    }
}
