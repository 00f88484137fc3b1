//! Single-row, multi-row, and iterator result mappers.

use std::marker::PhantomData;

use crate::bind::{apply_plan, plan_for, FromRow, Schema};
use crate::error::{Error, Result};
use crate::session::Rows;

fn scan_into<T: FromRow>(dest: &mut T, rows: &mut dyn Rows, columns: &[String]) -> Result<()> {
    match T::schema() {
        Schema::RowScanner => {
            let row = rows.take_row()?;
            dest.scan_row(columns, row)
        }
        _ => {
            let plan = plan_for::<T>(columns)?;
            let row = rows.take_row()?;
            apply_plan(dest, &plan, columns, row)
        }
    }
}

/// Bind exactly one row: no rows and more-than-one row are distinct
/// errors.
pub fn bind_one<T: FromRow>(rows: &mut dyn Rows) -> Result<T> {
    if !rows.advance()? {
        return Err(Error::NoRows);
    }
    let columns = rows.columns()?;
    let mut dest = T::default();
    scan_into(&mut dest, rows, &columns)?;
    if rows.advance()? {
        return Err(Error::TooManyRows);
    }
    Ok(dest)
}

/// Bind every row into a `Vec`. An empty cursor yields an empty vec.
pub fn bind_list<T: FromRow>(rows: &mut dyn Rows) -> Result<Vec<T>> {
    bind_list_with(rows, T::default)
}

/// Bind every row, building each element with `factory`.
pub fn bind_list_with<T: FromRow>(
    rows: &mut dyn Rows,
    factory: impl Fn() -> T,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    let mut columns: Option<Vec<String>> = None;
    while rows.advance()? {
        if columns.is_none() {
            columns = Some(rows.columns()?);
        }
        let Some(columns) = columns.as_ref() else {
            break;
        };
        let mut dest = factory();
        scan_into(&mut dest, rows, columns)?;
        out.push(dest);
    }
    Ok(out)
}

/// A lazy sequence of bound rows. Owns the cursor: abandoning the
/// iterator drops (and thereby releases) it without advancing further.
/// The cursor's terminal error is yielded as the last item.
pub struct RowIter<T: FromRow> {
    rows: Box<dyn Rows>,
    columns: Option<Vec<String>>,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromRow> RowIter<T> {
    pub fn new(rows: Box<dyn Rows>) -> RowIter<T> {
        RowIter {
            rows,
            columns: None,
            done: false,
            _marker: PhantomData,
        }
    }
}

impl<T: FromRow> Iterator for RowIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.rows.advance() {
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => {
                if self.columns.is_none() {
                    match self.rows.columns() {
                        Ok(columns) => self.columns = Some(columns),
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                }
                let Some(columns) = self.columns.as_ref() else {
                    self.done = true;
                    return None;
                };
                let mut dest = T::default();
                match scan_into(&mut dest, &mut *self.rows, columns) {
                    Ok(()) => Some(Ok(dest)),
                    Err(e) => {
                        self.done = true;
                        Some(Err(e))
                    }
                }
            }
        }
    }
}
