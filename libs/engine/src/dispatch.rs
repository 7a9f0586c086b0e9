//! The dispatch registry: method names bound to typed handlers.
//!
//! A registry is declared once per actor kind, then shared read-only by every
//! activation of that kind. Two kinds of method are supported:
//!
//! - **events** are journaled. They have an optional `validate` step that
//!   may reject the command before anything is written, and an `apply` step
//!   that folds the event into state. Replay only ever runs `apply`.
//! - **queries** read state and are never journaled.
//!
//! Arguments are positional JSON values decoded into the handler's declared
//! tuple type; see [`Arguments`].

use std::collections::BTreeMap;
use std::fmt;

use chronicle_events::{Event, EventError};
use serde::Serialize;
use serde_json::Value;

use crate::{
    ActorDescription, ArgDescription, Arguments, DispatchError, HandlerError, MethodDescription,
    Rejection,
};

type ValidateFn<S> = Box<dyn Fn(&S, &[Value]) -> Result<(), DispatchError> + Send + Sync>;
type ApplyFn<S> = Box<dyn Fn(&mut S, &[Value]) -> Result<Value, DispatchError> + Send + Sync>;
type QueryFn<S> = Box<dyn Fn(&S, &[Value]) -> Result<Value, DispatchError> + Send + Sync>;
type NormalizeFn = fn(&[Value]) -> Result<Vec<Value>, EventError>;

/// Lower-cases the first character of a method name: `Add` becomes `add`.
pub fn canonical_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

enum Handler<S> {
    Event {
        validate: Option<ValidateFn<S>>,
        apply: ApplyFn<S>,
    },
    Query(QueryFn<S>),
}

struct Method<S> {
    description: MethodDescription,
    handler: Handler<S>,
    normalize: NormalizeFn,
}

/// Method table of one actor kind over state `S`.
pub struct DispatchRegistry<S> {
    kind: String,
    methods: BTreeMap<String, Method<S>>,
}

impl<S> fmt::Debug for DispatchRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("kind", &self.kind)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<S: 'static> DispatchRegistry<S> {
    /// Starts declaring the methods of `kind`.
    pub fn builder(kind: &str) -> RegistryBuilder<S> {
        RegistryBuilder {
            kind: kind.to_lowercase(),
            methods: BTreeMap::new(),
            last: None,
        }
    }

    /// The actor kind this registry serves.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    fn method(&self, name: &str) -> Result<&Method<S>, DispatchError> {
        self.methods
            .get(&canonical_name(name))
            .ok_or_else(|| DispatchError::UnknownType {
                kind: self.kind.clone(),
                name: name.to_string(),
            })
    }

    fn event_handlers(
        &self,
        name: &str,
    ) -> Result<(&Option<ValidateFn<S>>, &ApplyFn<S>), DispatchError> {
        match &self.method(name)?.handler {
            Handler::Event { validate, apply } => Ok((validate, apply)),
            Handler::Query(_) => Err(DispatchError::UnknownType {
                kind: self.kind.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(&canonical_name(name))
    }

    /// Returns true if `name` is a journaled event, false for a query.
    pub fn is_journaled(&self, name: &str) -> Result<bool, DispatchError> {
        Ok(self.method(name)?.description.journaled)
    }

    /// Checks that `name` exists and takes `arity` arguments.
    pub fn check(&self, name: &str, arity: usize) -> Result<(), DispatchError> {
        let method = self.method(name)?;
        let expected = method.description.args.len();
        if expected != arity {
            return Err(DispatchError::Arity {
                name: method.description.name.clone(),
                expected,
                actual: arity,
            });
        }
        Ok(())
    }

    /// Runs the validation step of event `name`, if it has one.
    pub fn validate(&self, state: &S, name: &str, args: &[Value]) -> Result<(), DispatchError> {
        let (validate, _) = self.event_handlers(name)?;
        self.check(name, args.len())?;
        match validate {
            Some(validate) => validate(state, args),
            None => Ok(()),
        }
    }

    /// Folds event `name` into `state` and returns the handler's result.
    pub fn apply(&self, state: &mut S, name: &str, args: &[Value]) -> Result<Value, DispatchError> {
        let (_, apply) = self.event_handlers(name)?;
        apply(state, args)
    }

    /// Re-applies a journaled event, discarding the result.
    pub fn replay(&self, state: &mut S, event: &Event) -> Result<(), DispatchError> {
        self.apply(state, &event.event_type, &event.args).map(|_| ())
    }

    /// Runs query `name` against `state`.
    pub fn query(&self, state: &S, name: &str, args: &[Value]) -> Result<Value, DispatchError> {
        match &self.method(name)?.handler {
            Handler::Query(run) => run(state, args),
            Handler::Event { .. } => Err(DispatchError::UnknownType {
                kind: self.kind.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Converts arguments to the declared parameter types and re-encodes
    /// them, so stored values read back in their canonical form.
    pub fn normalize_args(&self, name: &str, args: &[Value]) -> Result<Vec<Value>, DispatchError> {
        let method = self.method(name)?;
        self.check(name, args.len())?;
        (method.normalize)(args).map_err(|source| DispatchError::Argument {
            name: method.description.name.clone(),
            source,
        })
    }

    /// Describes every registered method, hidden ones included.
    pub fn describe(&self) -> ActorDescription {
        ActorDescription {
            kind: self.kind.clone(),
            methods: self
                .methods
                .iter()
                .map(|(name, m)| (name.clone(), m.description.clone()))
                .collect(),
        }
    }

    /// Visible method names starting with `prefix`, sorted.
    pub fn complete(&self, prefix: &str) -> Vec<String> {
        let prefix = canonical_name(prefix);
        self.methods
            .iter()
            .filter(|(name, m)| m.description.visible && name.starts_with(&prefix))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Declares the methods of a [`DispatchRegistry`].
///
/// Registering a name twice replaces the earlier handler.
pub struct RegistryBuilder<S> {
    kind: String,
    methods: BTreeMap<String, Method<S>>,
    last: Option<String>,
}

impl<S: 'static> RegistryBuilder<S> {
    /// Registers a journaled event with no validation step.
    pub fn event<A, R, F>(self, name: &str, params: &[&str], apply: F) -> Self
    where
        A: Arguments,
        R: Serialize + 'static,
        F: Fn(&mut S, A) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        let handler = Handler::Event {
            validate: None,
            apply: erase_apply(canonical_name(name), apply),
        };
        self.register::<A, R>(name, params, true, handler)
    }

    /// Registers a journaled event whose `validate` step runs before the
    /// event is written.
    pub fn validated_event<A, R, V, F>(self, name: &str, params: &[&str], validate: V, apply: F) -> Self
    where
        A: Arguments,
        R: Serialize + 'static,
        V: Fn(&S, &A) -> Result<(), Rejection> + Send + Sync + 'static,
        F: Fn(&mut S, A) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        let canonical = canonical_name(name);
        let handler = Handler::Event {
            validate: Some(erase_validate(canonical.clone(), validate)),
            apply: erase_apply(canonical, apply),
        };
        self.register::<A, R>(name, params, true, handler)
    }

    /// Registers a read-only query.
    pub fn query<A, R, F>(self, name: &str, params: &[&str], run: F) -> Self
    where
        A: Arguments,
        R: Serialize + 'static,
        F: Fn(&S, A) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        let canonical = canonical_name(name);
        let run: QueryFn<S> = Box::new(move |state, args| {
            let args = decode::<A>(&canonical, args)?;
            let result = run(state, args).map_err(|source| DispatchError::Handler {
                name: canonical.clone(),
                source,
            })?;
            encode(&canonical, result)
        });
        self.register::<A, R>(name, params, false, Handler::Query(run))
    }

    /// Hides the most recently registered method from introspection and
    /// completion. It stays dispatchable.
    pub fn hidden(mut self) -> Self {
        if let Some(method) = self.last.as_ref().and_then(|n| self.methods.get_mut(n)) {
            method.description.visible = false;
        }
        self
    }

    pub fn build(self) -> DispatchRegistry<S> {
        DispatchRegistry {
            kind: self.kind,
            methods: self.methods,
        }
    }

    fn register<A: Arguments, R: 'static>(
        mut self,
        name: &str,
        params: &[&str],
        journaled: bool,
        handler: Handler<S>,
    ) -> Self {
        let canonical = canonical_name(name);
        let args = A::type_names()
            .into_iter()
            .enumerate()
            .map(|(i, type_name)| ArgDescription {
                name: params
                    .get(i)
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| format!("arg{i}")),
                type_name,
            })
            .collect();

        let description = MethodDescription {
            name: canonical.clone(),
            args,
            returns: chronicle_events::type_display_name::<R>(),
            journaled,
            visible: true,
        };

        self.methods.insert(
            canonical.clone(),
            Method {
                description,
                handler,
                normalize: normalize::<A>,
            },
        );
        self.last = Some(canonical);
        self
    }
}

fn decode<A: Arguments>(name: &str, args: &[Value]) -> Result<A, DispatchError> {
    if args.len() != A::ARITY {
        return Err(DispatchError::Arity {
            name: name.to_string(),
            expected: A::ARITY,
            actual: args.len(),
        });
    }
    A::from_values(args).map_err(|source| DispatchError::Argument {
        name: name.to_string(),
        source,
    })
}

fn encode<R: Serialize>(name: &str, result: R) -> Result<Value, DispatchError> {
    serde_json::to_value(result).map_err(|source| DispatchError::Result {
        name: name.to_string(),
        source,
    })
}

fn normalize<A: Arguments>(args: &[Value]) -> Result<Vec<Value>, EventError> {
    A::from_values(args)?.to_values()
}

fn erase_validate<S, A, V>(name: String, validate: V) -> ValidateFn<S>
where
    S: 'static,
    A: Arguments,
    V: Fn(&S, &A) -> Result<(), Rejection> + Send + Sync + 'static,
{
    Box::new(move |state, args| {
        let args = decode::<A>(&name, args)?;
        validate(state, &args).map_err(|rejection| DispatchError::Rejected {
            name: name.clone(),
            rejection,
        })
    })
}

fn erase_apply<S, A, R, F>(name: String, apply: F) -> ApplyFn<S>
where
    S: 'static,
    A: Arguments,
    R: Serialize + 'static,
    F: Fn(&mut S, A) -> Result<R, HandlerError> + Send + Sync + 'static,
{
    Box::new(move |state, args| {
        let args = decode::<A>(&name, args)?;
        let result = apply(state, args).map_err(|source| DispatchError::Handler {
            name: name.clone(),
            source,
        })?;
        encode(&name, result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Tally {
        total: i64,
        labels: Vec<String>,
    }

    fn registry() -> DispatchRegistry<Tally> {
        DispatchRegistry::builder("Tally")
            .validated_event(
                "Add",
                &["amount"],
                |_: &Tally, (amount,): &(i64,)| {
                    if *amount < 0 {
                        return Err(Rejection::new("amount must not be negative"));
                    }
                    Ok(())
                },
                |s: &mut Tally, (amount,): (i64,)| {
                    s.total += amount;
                    Ok(s.total)
                },
            )
            .event("label", &["text", "times"], |s: &mut Tally, (text, times): (String, u8)| {
                for _ in 0..times {
                    s.labels.push(text.clone());
                }
                Ok(())
            })
            .event("explode", &[], |_: &mut Tally, (): ()| -> Result<(), HandlerError> {
                Err(HandlerError::new("boom"))
            })
            .hidden()
            .query("total", &[], |s: &Tally, (): ()| Ok(s.total))
            .build()
    }

    #[test]
    fn test_names_are_canonical() {
        let registry = registry();
        assert_eq!(registry.kind(), "tally");
        assert!(registry.contains("add"));
        assert!(registry.contains("Add"));
        assert_eq!(canonical_name("Multiply"), "multiply");
        assert_eq!(canonical_name(""), "");
    }

    #[test]
    fn test_validate_then_apply() {
        let registry = registry();
        let mut state = Tally::default();
        registry.validate(&state, "add", &[json!(4)]).unwrap();
        let result = registry.apply(&mut state, "add", &[json!(4)]).unwrap();
        assert_eq!(result, json!(4));
        assert_eq!(state.total, 4);
    }

    #[test]
    fn test_validation_rejection() {
        let registry = registry();
        let err = registry
            .validate(&Tally::default(), "add", &[json!(-1)])
            .unwrap_err();
        assert_eq!(
            err.rejection().map(Rejection::message),
            Some("amount must not be negative")
        );
    }

    #[rstest]
    #[case("add", vec![], 1, 0)]
    #[case("add", vec![json!(1), json!(2)], 1, 2)]
    #[case("label", vec![json!("x")], 2, 1)]
    fn test_arity_mismatch(
        #[case] name: &str,
        #[case] args: Vec<Value>,
        #[case] expected: usize,
        #[case] actual: usize,
    ) {
        let registry = registry();
        let err = registry
            .validate(&Tally::default(), name, &args)
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Arity { expected: e, actual: a, .. } if e == expected && a == actual
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let registry = registry();
        let err = registry
            .apply(&mut Tally::default(), "label", &[json!("x"), json!("many")])
            .unwrap_err();
        assert!(matches!(err, DispatchError::Argument { .. }));
    }

    #[test]
    fn test_unknown_type() {
        let registry = registry();
        let err = registry
            .apply(&mut Tally::default(), "subtract", &[json!(1)])
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownType { .. }));
    }

    #[test]
    fn test_query_is_not_replayable() {
        let registry = registry();
        let event = Event::builder().event_type("total").build().unwrap();
        let err = registry.replay(&mut Tally::default(), &event).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownType { .. }));
        assert!(!registry.is_journaled("total").unwrap());
    }

    #[test]
    fn test_query_runs_against_state() {
        let registry = registry();
        let state = Tally {
            total: 9,
            ..Default::default()
        };
        assert_eq!(registry.query(&state, "total", &[]).unwrap(), json!(9));
        assert!(registry.query(&state, "add", &[json!(1)]).is_err());
    }

    #[test]
    fn test_replay_discards_result() {
        let registry = registry();
        let mut state = Tally::default();
        let event = Event::builder()
            .event_type("label")
            .args(vec![json!("a"), json!(2)])
            .build()
            .unwrap();
        registry.replay(&mut state, &event).unwrap();
        assert_eq!(state.labels, vec!["a", "a"]);
    }

    #[test]
    fn test_handler_failure() {
        let registry = registry();
        let err = registry
            .apply(&mut Tally::default(), "explode", &[])
            .unwrap_err();
        assert!(matches!(err, DispatchError::Handler { .. }));
    }

    #[test]
    fn test_normalize_args() {
        let registry = registry();
        let args = registry
            .normalize_args("label", &[json!("a"), json!(3)])
            .unwrap();
        assert_eq!(args, vec![json!("a"), json!(3)]);
        assert!(registry.normalize_args("label", &[json!("a")]).is_err());
    }

    #[test]
    fn test_describe() {
        let description = registry().describe();
        assert_eq!(description.kind, "tally");
        assert_eq!(description.methods.len(), 4);
        assert_eq!(
            description.methods["label"].to_string(),
            "() label(String text, u8 times)"
        );
        assert_eq!(description.methods["add"].to_string(), "i64 add(i64 amount)");
        assert!(!description.methods["explode"].visible);
        assert!(!description.methods["total"].journaled);
    }

    #[test]
    fn test_complete_skips_hidden() {
        let registry = registry();
        assert_eq!(registry.complete("e"), Vec::<String>::new());
        assert_eq!(registry.complete("t"), vec!["total"]);
        assert_eq!(registry.complete(""), vec!["add", "label", "total"]);
    }
}
