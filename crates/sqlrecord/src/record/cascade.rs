//! Related-record cascades and virtual foreign keys.
//!
//! Belongs-to targets are saved before the owner so their keys can be
//! copied onto it; has-one/has-many dependents are saved after the owner so
//! they can receive its key. Both halves run inside the implicit transaction
//! the owning save opened. The virtual foreign-key checks count matching
//! rows of the other side of each relation with bound parameters.

use sqlrecord_core::{
    BindType, BoundCondition, Error, FetchMode, Fields, Message, MessageKind, Relation,
    RelationKind, Result, Value,
};

use super::{Record, Related, RelatedBag};
use crate::model::ModelEvent;

/// Which side of a relation a virtual foreign-key check guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Saving: every referenced row must exist.
    Forward,
    /// Deleting: no dependent row may exist.
    Reverse,
}

fn single_pair<'r>(relation: &'r Relation) -> Result<(&'r str, &'r str)> {
    match (relation.fields.single(), relation.referenced_fields.single()) {
        (Some(field), Some(referenced)) => Ok((field, referenced)),
        _ => Err(Error::NotImplemented(format!(
            "cascading related records of \"{}\" over composite columns",
            relation.model
        ))),
    }
}

impl Record {
    /// Copy `from`'s messages onto this record, tagged with `from`'s model.
    fn absorb_messages(&mut self, from: &Record) {
        let model = from.model_name().to_string();
        self.messages.extend(from.messages().iter().cloned().map(|mut message| {
            message.set_model(model.clone());
            message
        }));
    }

    /// Save pending belongs-to targets and copy their keys onto this record.
    ///
    /// Returns `false` after collecting the failing target's messages.
    pub(crate) fn pre_save_related(&mut self, related: &mut RelatedBag) -> Result<bool> {
        for (alias, entry) in &mut related.entries {
            let Some(relation) = self.manager.relation_by_alias(self.model_name(), alias) else {
                continue;
            };
            if relation.kind != RelationKind::BelongsTo {
                continue;
            }
            let Related::One(target) = entry else {
                return Err(Error::InvalidArgument(
                    "only records can be stored as part of belongs-to relations".to_string(),
                ));
            };
            let (field, referenced_field) = single_pair(&relation)?;

            if target.save()?.is_failed() {
                tracing::debug!(
                    model = %self.model_name(),
                    alias = %alias,
                    "Belongs-to target failed to save"
                );
                self.absorb_messages(target);
                return Ok(false);
            }

            let value = target
                .read_attribute(referenced_field)
                .cloned()
                .unwrap_or(Value::Null);
            self.attributes.insert(field.to_string(), value);
        }
        Ok(true)
    }

    /// Save pending has-one/has-many dependents with this record's key.
    ///
    /// Returns `false` after collecting the failing dependent's messages.
    pub(crate) fn post_save_related(&mut self, related: &mut RelatedBag) -> Result<bool> {
        for (alias, entry) in &mut related.entries {
            let Some(relation) = self.manager.relation_by_alias(self.model_name(), alias) else {
                if matches!(entry, Related::Data(_)) {
                    continue;
                }
                return Err(Error::Relation(format!(
                    "there is no defined relations for the model \"{}\" using alias \"{alias}\"",
                    self.model_name()
                )));
            };
            match relation.kind {
                RelationKind::BelongsTo => continue,
                RelationKind::HasManyThrough => {
                    return Err(Error::NotImplemented(format!(
                        "saving related records of \"{}\" through an intermediate model",
                        self.model_name()
                    )));
                }
                RelationKind::HasOne | RelationKind::HasMany => {}
            }

            let dependents: Vec<&mut Record> = match entry {
                Related::One(record) => vec![record.as_mut()],
                Related::Many(records) => records.iter_mut().collect(),
                Related::Data(_) => {
                    return Err(Error::InvalidArgument(format!(
                        "only records can be stored under the \"{alias}\" relation"
                    )));
                }
            };
            let (field, referenced_field) = single_pair(&relation)?;
            let value = self.attributes.get(field).cloned().ok_or_else(|| {
                Error::State(format!("the column '{field}' needs to be present in the model"))
            })?;

            for dependent in dependents {
                dependent.write_attribute(referenced_field, value.clone());
                if dependent.save()?.is_failed() {
                    tracing::debug!(
                        model = %self.model_name(),
                        alias = %alias,
                        "Dependent record failed to save"
                    );
                    self.absorb_messages(dependent);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Every belongs-to relation with foreign-key options must point at an
    /// existing row.
    pub(crate) fn check_foreign_keys(&mut self) -> Result<bool> {
        let relations = self.manager.belongs_to(self.model_name());
        self.check_relations(&relations, Direction::Forward)
    }

    /// No has-one/has-many relation with foreign-key options may have
    /// dependent rows.
    pub(crate) fn check_foreign_keys_reverse(&mut self) -> Result<bool> {
        let relations = self.manager.has_one_and_has_many(self.model_name());
        self.check_relations(&relations, Direction::Reverse)
    }

    fn check_relations(&mut self, relations: &[Relation], direction: Direction) -> Result<bool> {
        let mut violated = false;

        for relation in relations {
            let Some(foreign_key) = relation.foreign_key() else {
                continue;
            };
            let count = self.count_referenced(relation, foreign_key.conditions.as_deref())?;
            let violation = match direction {
                Direction::Forward => count == 0,
                Direction::Reverse => count > 0,
            };
            if !violation {
                continue;
            }

            let text = foreign_key.message.clone().unwrap_or_else(|| match direction {
                Direction::Forward => match &relation.fields {
                    Fields::Single(field) => {
                        format!("Value of field \"{field}\" does not exist on referenced table")
                    }
                    Fields::Composite(fields) => format!(
                        "Value of fields \"{}\" does not exist on referenced table",
                        fields.join(", ")
                    ),
                },
                Direction::Reverse => {
                    format!("Record is referenced by model {}", relation.referenced_model)
                }
            });
            self.messages.push(
                Message::new(text)
                    .fields(relation.fields.to_vec())
                    .kind(MessageKind::ConstraintViolation),
            );
            violated = true;
            break;
        }

        if violated {
            if self.config().events {
                self.fire_event(ModelEvent::OnValidationFails);
                self.cancel_operation();
            }
            return Ok(false);
        }
        Ok(true)
    }

    /// COUNT the rows of the referenced model matching this record's values
    /// for the relation's fields.
    fn count_referenced(&self, relation: &Relation, extra: Option<&str>) -> Result<i64> {
        let referenced = relation.referenced_model.as_str();
        let fields = relation.fields.to_vec();
        let referenced_fields = relation.referenced_fields.to_vec();
        if fields.len() != referenced_fields.len() {
            return Err(Error::Relation(format!(
                "relation from \"{}\" to \"{referenced}\" pairs {} fields with {}",
                relation.model,
                fields.len(),
                referenced_fields.len()
            )));
        }

        let connection = self
            .di
            .connection(&self.manager.read_connection_service(referenced))?;
        let referenced_meta = self.metadata.read(referenced)?;
        let reverse_map = if self.config().column_renaming {
            referenced_meta.reverse_column_map()
        } else {
            None
        };

        let mut condition = BoundCondition::default();
        let mut fragments = Vec::with_capacity(fields.len());
        for (field, referenced_field) in fields.iter().zip(&referenced_fields) {
            let column = reverse_map
                .and_then(|map| map.get(referenced_field))
                .unwrap_or(referenced_field);
            let value = self.attributes.get(field).cloned().unwrap_or(Value::Null);
            let bind_type = referenced_meta
                .bind_types()
                .get(column)
                .copied()
                .unwrap_or_else(|| BindType::for_value(&value));
            fragments.push(format!("{} = ?", connection.escape_identifier(column)));
            condition.params.push(value);
            condition.types.push(bind_type);
        }
        condition.sql = fragments.join(" AND ");
        if let Some(extra) = extra {
            condition.and_raw(extra);
        }

        let table = self.manager.model_table(referenced);
        let sql = format!(
            "SELECT COUNT(*) AS rowcount FROM {} WHERE {}",
            connection.escape_table(&table),
            condition.sql
        );
        tracing::debug!(
            model = %self.model_name(),
            referenced = %referenced,
            sql = %sql,
            "Checking virtual foreign key"
        );
        let row =
            connection.fetch_one(&sql, FetchMode::Assoc, &condition.params, &condition.types)?;
        Ok(row
            .as_ref()
            .and_then(|r| r.get("rowcount"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }
}
