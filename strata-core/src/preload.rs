use crate::{
    Condition, Entity, EntityMetadata, Error, Executor, Operator, Registry, Result, RowLabeled,
    StatementPlan, stream::TryStreamExt,
};
use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
};

/// Fills the association slots `names` of `records`.
///
/// One query per association, `child.fk IN (parent keys)`, skipped when there is no
/// parent key. Children are matched to parents on the textual form of the key so that an
/// `Int64` foreign key matches a `UInt64` primary key. Parents without children get an
/// empty, loaded slot.
pub(crate) async fn load<E: Entity, X: Executor>(
    registry: &Registry,
    metadata: &EntityMetadata,
    executor: &mut X,
    records: &mut [E],
    names: &[Cow<'static, str>],
) -> Result<()> {
    for name in names {
        let association = metadata.association(name).ok_or_else(|| {
            Error::schema(format!(
                "Entity `{}` has no association named `{name}`",
                metadata.name
            ))
        })?;
        let child = registry.resolve_with(association.child_type, association.child)?;
        let mut keys = Vec::new();
        let mut seen = HashSet::new();
        for record in records.iter() {
            let key = record.primary_key();
            if !key.is_null() && seen.insert(key.to_string()) {
                keys.push(key);
            }
        }
        let mut children: HashMap<String, Vec<RowLabeled>> = HashMap::new();
        if !keys.is_empty() {
            let mut plan = StatementPlan::new(child.table);
            plan.condition = Some(Condition::Leaf {
                column: association.foreign_key.into(),
                operator: Operator::In,
                values: keys,
            });
            plan.order_by = vec![child.primary_key().name.into()];
            let rows = executor.fetch(plan).try_collect::<Vec<_>>().await?;
            log::debug!(
                "Preloaded {} `{}` rows for {} `{}` records",
                rows.len(),
                child.table,
                records.len(),
                metadata.table
            );
            for row in rows {
                let key = row
                    .get_column(association.foreign_key)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                children.entry(key).or_default().push(row);
            }
        }
        let mut last = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            last.insert(record.primary_key().to_string(), i);
        }
        for (i, record) in records.iter_mut().enumerate() {
            let key = record.primary_key().to_string();
            // The last parent with a key takes the rows, earlier duplicates get copies
            let rows = if last.get(&key) == Some(&i) {
                children.remove(&key)
            } else {
                children.get(&key).cloned()
            };
            record.attach(name, rows.unwrap_or_default())?;
        }
    }
    Ok(())
}
