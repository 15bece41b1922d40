//! Translated attributes.
//!
//! An entity declared with `translates` keeps per-locale values in rows of
//! a companion entity, reached through its `translations` relationship.
//! Reads walk a locale chain (see `Configuration::locale_chain`) and take
//! the first non-blank value; writes update the row of the given locale or
//! build one that is saved with the owner.

use crate::record::Record;
use crate::session::Session;
use activerow_core::{
    ConfigErrorKind, Cx, Error, Outcome, Result, TranslationConfig, Value, try_outcome,
    try_result,
};

impl Record {
    fn translated(&self, attribute: &str) -> Result<TranslationConfig> {
        let config = self.schema.translations().ok_or_else(|| {
            Error::config(
                ConfigErrorKind::Invalid,
                format!("{} has no translated attributes", self.schema.name()),
            )
        })?;
        if !config.attributes.iter().any(|a| a == attribute) {
            return Err(Error::config(
                ConfigErrorKind::UnknownAttribute,
                format!(
                    "Unknown translated attribute \"{}\" on {}",
                    attribute,
                    self.schema.name()
                ),
            ));
        }
        Ok(config.clone())
    }

    /// First non-blank value of `attribute` along `locale_chain`.
    pub async fn translated_attribute(
        &mut self,
        cx: &Cx,
        session: &Session,
        attribute: &str,
        locale_chain: &[String],
    ) -> Outcome<Option<Value>, Error> {
        let config = try_result!(self.translated(attribute));
        let translations = try_outcome!(self.load_relationship(cx, session, &config.relationship).await);

        for locale in locale_chain {
            let value = translations
                .iter()
                .filter(|t| !t.is_destroyed())
                .find(|t| {
                    t.get(&config.locale_column).ok().and_then(Value::as_str) == Some(locale.as_str())
                })
                .and_then(|t| t.get(attribute).ok())
                .filter(|v| !v.is_blank());
            if let Some(value) = value {
                return Outcome::Ok(Some(value.clone()));
            }
        }
        Outcome::Ok(None)
    }

    /// Set `attribute` for `locale`, updating that locale's translation or
    /// building a new one. The translation is written when the owner is
    /// saved.
    pub async fn set_translated_attribute(
        &mut self,
        cx: &Cx,
        session: &Session,
        attribute: &str,
        locale: &str,
        value: impl Into<Value>,
    ) -> Outcome<(), Error> {
        let config = try_result!(self.translated(attribute));
        try_outcome!(self.load_relationship(cx, session, &config.relationship).await);
        let value = value.into();

        let existing = try_result!(self.relationship_mut(&config.relationship))
            .and_then(|translations| {
                translations.iter_mut().find(|t| {
                    !t.is_destroyed()
                        && t.get(&config.locale_column).ok().and_then(Value::as_str) == Some(locale)
                })
            });
        if let Some(translation) = existing {
            try_result!(translation.set(attribute, value));
            return Outcome::Ok(());
        }

        let translation = try_result!(self.build_relationship(&config.relationship));
        try_result!(translation.set(&config.locale_column, locale));
        try_result!(translation.set(attribute, value));
        tracing::trace!(
            entity = %self.schema.name(),
            locale = %locale,
            attribute = %attribute,
            "Built translation"
        );
        Outcome::Ok(())
    }
}
