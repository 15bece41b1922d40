//! Running an entity's validators against a record.

use crate::record::Record;
use crate::session::Session;
use activerow_core::{
    AttributeValidator, CheckResult, Cx, Error, Outcome, ValidationError, Validator, Value,
    try_outcome, try_result,
};
use activerow_query::Expr;
use std::sync::Arc;

impl Record {
    /// Run every validator of every attribute and collect the violations.
    ///
    /// An empty result means the record is valid. Uniqueness checks query
    /// the database, excluding this record's own row.
    pub async fn validate(&self, cx: &Cx, session: &Session) -> Outcome<ValidationError, Error> {
        let id = (!self.id().is_null()).then(|| self.id().clone());
        let mut errors = ValidationError::for_record(self.schema.name(), id);
        for validator in self.schema.validators() {
            let label = self.schema.human_attribute_name(&validator.attribute);
            let value = try_result!(self.get(&validator.attribute));
            if validator.check(&label, value, &mut errors) == CheckResult::NeedsDatabase
                && try_outcome!(self.is_taken(cx, session, validator, value).await)
            {
                validator.add_taken(&label, &mut errors);
            }
        }
        if !errors.is_empty() {
            tracing::trace!(
                entity = %self.schema.name(),
                messages = ?errors.full_messages(),
                "Record invalid"
            );
        }
        Outcome::Ok(errors)
    }

    /// Whether [`validate`](Self::validate) finds no violations.
    pub async fn is_valid(&self, cx: &Cx, session: &Session) -> Outcome<bool, Error> {
        let errors = try_outcome!(self.validate(cx, session).await);
        Outcome::Ok(errors.is_empty())
    }

    async fn is_taken(
        &self,
        cx: &Cx,
        session: &Session,
        validator: &AttributeValidator,
        value: &Value,
    ) -> Outcome<bool, Error> {
        let Validator::Uniqueness { scope } = &validator.validator else {
            return Outcome::Ok(false);
        };
        // NULL never equals NULL in SQL, so it cannot collide.
        if value.is_null() {
            return Outcome::Ok(false);
        }

        let table = self.schema.table();
        let mut query = try_result!(activerow_query::Query::new(
            Arc::clone(&self.registry),
            self.schema.name()
        ))
        .where_eq(&validator.attribute, value.clone());
        for column in scope {
            let scoped = try_result!(self.get(column));
            query = if scoped.is_null() {
                query.where_expr(Expr::qualified(table, column.as_str()).is_null())
            } else {
                query.where_eq(column, scoped.clone())
            };
        }
        if self.is_persisted() {
            let primary_key = self.schema.primary_key();
            let own = self
                .persisted
                .get(primary_key)
                .cloned()
                .unwrap_or(Value::Null);
            query = query.where_expr(Expr::qualified(table, primary_key).ne(own));
        }

        let count = try_outcome!(session.count(cx, &query).await);
        Outcome::Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::record::Record;
    use crate::testing::registry;
    use activerow_core::{ValidationError, ValidationErrorKind};

    // Synchronous validators only; uniqueness runs against SQLite in the
    // integration tests.
    fn check_sync(record: &Record) -> ValidationError {
        let mut errors = ValidationError::new();
        for validator in record.schema().validators() {
            let label = record.schema().human_attribute_name(&validator.attribute);
            validator.check(&label, record.get(&validator.attribute).unwrap(), &mut errors);
        }
        errors
    }

    #[test]
    fn blank_names_are_reported_with_the_attribute_label() {
        let task = Record::new(registry(), "Task").unwrap();
        let errors = check_sync(&task);
        assert!(errors.has("name", ValidationErrorKind::Blank));
        assert_eq!(errors.full_messages(), vec!["Name can't be blank"]);
    }

    #[test]
    fn every_validator_runs() {
        let mut project = Record::new(registry(), "Project").unwrap();
        project.set("code", "no spaces allowed").unwrap();
        let errors = check_sync(&project);
        assert_eq!(
            errors.full_messages(),
            vec!["Name can't be blank", "Code is invalid"]
        );
        assert_eq!(
            errors.to_string(),
            "Name can't be blank, Code is invalid"
        );
    }
}
