use serde_json::{Map, Value as Json};

use crate::types::{
    ALL_DOMAIN, ActiveEffectLike, Character, Diagnostic, DiagnosticStage, EffectMode,
    FlatModifier, Item, ModifierType, Phase, Predicate, RollOptionElement, RuleElement,
    RuleElementError, RuleElementKind, ValueSource, is_property_path,
};

/// Construct every rule element of every item. Declarations that fail
/// validation become disabled stubs and are reported once here.
pub(crate) fn compile(character: &Character) -> (Vec<RuleElement>, Vec<Diagnostic>) {
    let mut elements = Vec::new();
    let mut diagnostics = Vec::new();
    for (item_index, item) in character.items.iter().enumerate() {
        for (index, declaration) in item.rules.iter().enumerate() {
            let element = construct(declaration, item, item_index, index);
            if let RuleElementKind::Failed { error, .. } = &element.kind {
                tracing::warn!(
                    character = %character.name,
                    element = %element.id(),
                    key = element.key(),
                    %error,
                    "rule element disabled"
                );
                diagnostics.push(Diagnostic {
                    element: element.id(),
                    key: element.key().to_owned(),
                    stage: DiagnosticStage::Construction,
                    phase: None,
                    message: error.to_string(),
                });
            }
            elements.push(element);
        }
    }
    (elements, diagnostics)
}

/// Build one element, degrading to a [`RuleElementKind::Failed`] stub.
pub(crate) fn construct(
    declaration: &Json,
    item: &Item,
    item_index: usize,
    index: usize,
) -> RuleElement {
    let mut element = RuleElement {
        item_slug: item.slug.clone(),
        item_name: item.name.clone(),
        item_index,
        index,
        label: None,
        slug: None,
        predicate: Predicate::always(),
        priority: None,
        phase: Phase::PrepareData,
        ignored: false,
        kind: RuleElementKind::Failed {
            key: None,
            error: RuleElementError::MissingKey,
        },
    };
    if let Err(error) = populate(&mut element, declaration) {
        let key = declaration
            .get("key")
            .and_then(Json::as_str)
            .map(str::to_owned);
        element.kind = RuleElementKind::Failed { key, error };
        element.phase = element.kind.default_phase();
    }
    element
}

fn populate(element: &mut RuleElement, declaration: &Json) -> Result<(), RuleElementError> {
    let map = declaration
        .as_object()
        .ok_or_else(|| RuleElementError::NotAnObject(declaration.to_string()))?;
    let key = match map.get("key") {
        Some(Json::String(key)) => key.as_str(),
        _ => return Err(RuleElementError::MissingKey),
    };
    let fields = Fields { kind: key, map };

    let kind = match key {
        "FlatModifier" => RuleElementKind::FlatModifier(flat_modifier(&fields)?),
        "RollOption" => RuleElementKind::RollOption(roll_option(&fields)?),
        "ActiveEffectLike" => RuleElementKind::ActiveEffectLike(active_effect(&fields)?),
        other => return Err(RuleElementError::UnknownKind(other.to_owned())),
    };

    element.predicate = fields.predicate("predicate")?;
    element.priority = fields.integer("priority")?;
    element.phase = match fields.string("phase")? {
        Some(phase) => phase
            .parse::<Phase>()
            .map_err(|reason| fields.invalid("phase", reason))?,
        None => kind.default_phase(),
    };
    element.label = fields.string("label")?.map(str::to_owned);
    element.slug = fields.string("slug")?.map(str::to_owned);
    element.ignored = fields.flag("ignored")?;
    element.kind = kind;
    Ok(())
}

fn flat_modifier(fields: &Fields<'_>) -> Result<FlatModifier, RuleElementError> {
    let selectors = match fields.required("selector")? {
        Json::String(s) => vec![s.clone()],
        Json::Array(items) => items
            .iter()
            .map(|s| {
                s.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| fields.invalid("selector", format!("{s} is not a string")))
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(fields.invalid(
                "selector",
                format!("expected a string or list, found {other}"),
            ));
        }
    };
    if selectors.is_empty() || selectors.iter().any(String::is_empty) {
        return Err(fields.invalid("selector", "selector must not be empty".to_owned()));
    }
    let modifier_type = match fields.string("type")? {
        Some(t) => t
            .parse::<ModifierType>()
            .map_err(|reason| fields.invalid("type", reason))?,
        None => ModifierType::Untyped,
    };
    Ok(FlatModifier {
        selectors,
        modifier_type,
        value: fields.value_source("value")?,
        roll_predicate: fields.predicate("rollPredicate")?,
        stackable: fields.flag("stackable")?,
        forced: fields.flag("forced")?,
        hidden: fields.flag("hidden")?,
    })
}

fn roll_option(fields: &Fields<'_>) -> Result<RollOptionElement, RuleElementError> {
    let option = fields
        .string("option")?
        .ok_or_else(|| fields.missing("option"))?;
    if option.trim().is_empty() {
        return Err(fields.invalid("option", "option must not be empty".to_owned()));
    }
    let domain = fields.string("domain")?.unwrap_or(ALL_DOMAIN);
    Ok(RollOptionElement {
        option: option.to_owned(),
        domain: domain.to_owned(),
    })
}

fn active_effect(fields: &Fields<'_>) -> Result<ActiveEffectLike, RuleElementError> {
    let path = fields.string("path")?.ok_or_else(|| fields.missing("path"))?;
    let path = path.strip_prefix('@').unwrap_or(path);
    if !is_property_path(path) {
        return Err(fields.invalid("path", format!("'{path}' is not a property path")));
    }
    let mode = fields
        .string("mode")?
        .ok_or_else(|| fields.missing("mode"))?
        .parse::<EffectMode>()
        .map_err(|reason| fields.invalid("mode", reason))?;
    Ok(ActiveEffectLike {
        path: path.to_owned(),
        mode,
        value: fields.value_source("value")?,
    })
}

/// Typed access to the fields of one declaration.
struct Fields<'a> {
    kind: &'a str,
    map: &'a Map<String, Json>,
}

impl<'a> Fields<'a> {
    fn missing(&self, field: &'static str) -> RuleElementError {
        RuleElementError::MissingField {
            kind: self.kind.to_owned(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, reason: String) -> RuleElementError {
        RuleElementError::InvalidField {
            kind: self.kind.to_owned(),
            field,
            reason,
        }
    }

    /// A present, non-null field.
    fn get(&self, field: &str) -> Option<&'a Json> {
        self.map.get(field).filter(|v| !v.is_null())
    }

    fn required(&self, field: &'static str) -> Result<&'a Json, RuleElementError> {
        self.get(field).ok_or_else(|| self.missing(field))
    }

    fn string(&self, field: &'static str) -> Result<Option<&'a str>, RuleElementError> {
        match self.get(field) {
            None => Ok(None),
            Some(Json::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.invalid(field, format!("expected a string, found {other}"))),
        }
    }

    fn flag(&self, field: &'static str) -> Result<bool, RuleElementError> {
        match self.get(field) {
            None => Ok(false),
            Some(Json::Bool(b)) => Ok(*b),
            Some(other) => Err(self.invalid(field, format!("expected a boolean, found {other}"))),
        }
    }

    fn integer(&self, field: &'static str) -> Result<Option<i32>, RuleElementError> {
        match self.get(field) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(field, format!("expected an integer, found {v}"))),
        }
    }

    fn predicate(&self, field: &'static str) -> Result<Predicate, RuleElementError> {
        match self.get(field) {
            None => Ok(Predicate::always()),
            Some(json) => Ok(Predicate::from_json(json)?),
        }
    }

    fn value_source(&self, field: &'static str) -> Result<ValueSource, RuleElementError> {
        ValueSource::from_json(self.required(field)?).map_err(|reason| self.invalid(field, reason))
    }
}
