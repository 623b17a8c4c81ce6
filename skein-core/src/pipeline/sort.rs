//! Sort stage.
//!
//! Keys are resolved for every item before anything is compared, then the
//! items are stable-sorted by the key columns in order. Every key in a
//! column must belong to the same category (numbers, strings or booleans).

use std::cmp::Ordering;

use super::{Role, Stage};
use crate::error::GraphError;
use crate::node::{Direction, Handle, SortKey, Value};
use crate::resolve::Engine;

impl Engine {
    pub(super) fn sort_stage(
        &mut self,
        stage: &Stage<'_>,
        keys: &[SortKey],
        items: Vec<Handle>,
    ) -> Result<Vec<Handle>, GraphError> {
        if keys.is_empty() {
            return Ok(items);
        }

        let mut keyed = Vec::with_capacity(items.len());
        for chunk in items.chunks(self.config().chunk_size()) {
            for item in chunk {
                let mut columns = Vec::with_capacity(keys.len());
                for (index, key) in keys.iter().enumerate() {
                    let column = match &key.selector {
                        Some(selector) => {
                            let output = self.stage_output(stage, Role::SortKey(index), item, selector)?;
                            self.materialize(&output)?
                        }
                        None => self.materialize(item)?,
                    };
                    columns.push(column);
                }
                keyed.push((columns, item.clone()));
            }
        }

        check_columns(&keyed, keys.len())?;
        keyed.sort_by(|(a, _), (b, _)| compare_rows(a, b, keys));
        Ok(keyed.into_iter().map(|(_, item)| item).collect())
    }
}

fn check_columns(keyed: &[(Vec<Value>, Handle)], columns: usize) -> Result<(), GraphError> {
    for column in 0..columns {
        let mut expected = None;
        for (row, _) in keyed {
            let key = &row[column];
            let Some(category) = key.category() else {
                return Err(GraphError::mismatch("number, string or boolean sort key", key.kind_name()));
            };
            match expected {
                None => expected = Some(category),
                Some(expected) if expected != category => {
                    return Err(GraphError::mismatch("sort keys of one type", key.kind_name()));
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

fn compare_rows(a: &[Value], b: &[Value], keys: &[SortKey]) -> Ordering {
    for ((left, right), key) in a.iter().zip(b).zip(keys) {
        let ordering = left.compare(right).unwrap_or(Ordering::Equal);
        let ordering = match key.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::build::value;
    use crate::scope::ScopeId;

    fn row(values: &[Value]) -> (Vec<Value>, Handle) {
        (values.to_vec(), Handle::new(value(0), ScopeId::ROOT))
    }

    #[test]
    fn later_columns_break_ties() {
        let keys = [
            SortKey { selector: None, direction: Direction::Ascending },
            SortKey { selector: None, direction: Direction::Descending },
        ];
        let a = [Value::Int(1), Value::from("a")];
        let b = [Value::Int(1), Value::from("b")];
        assert_eq!(compare_rows(&a, &b, &keys), Ordering::Greater);
        assert_eq!(compare_rows(&a, &a, &keys), Ordering::Equal);
    }

    #[test]
    fn mixed_categories_are_rejected() {
        let keyed = [row(&[Value::Int(1)]), row(&[Value::from("one")])];
        assert!(matches!(
            check_columns(&keyed, 1),
            Err(GraphError::TypeMismatch { .. })
        ));

        let numbers = [row(&[Value::Int(1)]), row(&[Value::Float(0.5)])];
        assert!(check_columns(&numbers, 1).is_ok());

        let absent = [row(&[Value::Absent])];
        assert!(check_columns(&absent, 1).is_err());
    }
}
